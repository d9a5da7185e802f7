//! One synchronizer pass: resolve the high-water mark, catch up chunk by
//! chunk, then verify the tail against the ledger and repair rollbacks.

use std::sync::Arc;

use crate::ledger::LedgerSource;
use crate::transformations::{Chunk, ChunkSource, Transformer};

use super::commit::commit_rows;
use super::error::SyncError;
use super::scheduler::{PipelineContext, PipelineState};
use super::store::DerivedStore;

/// Outcome of one completed pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub chunks: usize,
    pub rows_committed: u64,
    pub rows_deleted: u64,
    pub high_water_mark: i64,
}

pub struct Pipeline {
    transformer: Arc<dyn Transformer>,
    ledger: Arc<dyn LedgerSource>,
    store: Arc<dyn DerivedStore>,
    chunk_size: i64,
    batch_size: usize,
}

impl Pipeline {
    pub fn new(
        transformer: Arc<dyn Transformer>,
        ledger: Arc<dyn LedgerSource>,
        store: Arc<dyn DerivedStore>,
        chunk_size: i64,
        batch_size: usize,
    ) -> Self {
        Self {
            transformer,
            ledger,
            store,
            chunk_size: chunk_size.max(1),
            batch_size,
        }
    }

    pub fn name(&self) -> &'static str {
        self.transformer.name()
    }

    /// Highest block id present in the derived table, 0 on cold start.
    pub async fn high_water_mark(&self) -> Result<i64, SyncError> {
        let last = self.store.last_row(self.transformer.table()).await?;
        Ok(last.map(|a| a.block_id).unwrap_or(0))
    }

    /// Highest block id this pipeline can read from the ledger.
    async fn ledger_tip(&self) -> Result<i64, SyncError> {
        let tip = match self.transformer.source() {
            ChunkSource::Blocks => self.ledger.max_block_id().await?,
            ChunkSource::Transactions => self
                .ledger
                .last_transaction()
                .await?
                .map(|tx| tx.block_id)
                .unwrap_or(0),
        };
        Ok(tip)
    }

    /// Ledger rows with block id in `(lower, upper]`.
    async fn fetch_chunk(&self, lower: i64, upper: i64) -> Result<Chunk, SyncError> {
        let chunk = match self.transformer.source() {
            ChunkSource::Blocks => Chunk::Blocks(self.ledger.block_range(lower, upper).await?),
            ChunkSource::Transactions => {
                Chunk::Transactions(self.ledger.transactions_in_range(lower, upper).await?)
            }
        };
        Ok(chunk)
    }

    /// Check the tail, then run fetch → transform → commit until the ledger
    /// tip is reached and check the tail again. A repair after catch-up sends
    /// control back to the fetch loop.
    pub async fn run_pass(&self, ctx: &PipelineContext) -> Result<PassReport, SyncError> {
        let mut report = PassReport {
            rows_deleted: self.repair(ctx).await?,
            ..PassReport::default()
        };

        loop {
            ctx.set_state(PipelineState::Running);

            let mark = self.high_water_mark().await?;
            let tip = self.ledger_tip().await?;

            if mark < tip {
                tracing::info!(
                    "{}: catching up blocks {}-{} (chunk size {})",
                    self.name(),
                    mark + 1,
                    tip,
                    self.chunk_size
                );
            }

            let mut cursor = mark;
            while cursor < tip {
                let upper = cursor.saturating_add(self.chunk_size).min(tip);
                let chunk = self.fetch_chunk(cursor, upper).await?;

                if !chunk.is_empty() {
                    let rows = self
                        .transformer
                        .transform(&chunk, self.ledger.as_ref())
                        .await?;
                    let inserted = commit_rows(self.store.as_ref(), rows, self.batch_size).await?;
                    report.rows_committed += inserted;

                    tracing::debug!(
                        "{}: blocks {}-{}: {} ledger rows, {} derived rows inserted",
                        self.name(),
                        cursor + 1,
                        upper,
                        chunk.len(),
                        inserted
                    );
                }

                report.chunks += 1;
                cursor = upper;
            }

            let deleted = self.repair(ctx).await?;
            if deleted == 0 {
                break;
            }
            report.rows_deleted += deleted;
        }

        report.high_water_mark = self.high_water_mark().await?;
        Ok(report)
    }

    /// Walk back from the last derived row until its hash is still in the
    /// ledger, deleting every row at or above each stale anchor. Returns the
    /// number of rows deleted.
    pub async fn repair(&self, ctx: &PipelineContext) -> Result<u64, SyncError> {
        let table = self.transformer.table();
        let mut deleted = 0;

        while let Some(anchor) = self.store.last_row(table).await? {
            if self.ledger.transaction_by_hash(&anchor.hash).await?.is_some() {
                break;
            }

            ctx.set_state(PipelineState::Repairing);
            tracing::warn!(
                "{}: transaction {} is no longer in the ledger, deleting rows from block {}",
                self.name(),
                anchor.hash,
                anchor.block_id
            );

            let n = self
                .store
                .delete_from(table, anchor.block_id)
                .await
                .map_err(|source| SyncError::RepairFailed {
                    anchor: anchor.block_id,
                    source,
                })?;
            if n == 0 {
                return Err(SyncError::RepairStalled {
                    anchor: anchor.block_id,
                });
            }
            deleted += n;
        }

        if deleted > 0 {
            tracing::info!("{}: rollback repair deleted {} rows", self.name(), deleted);
        }
        Ok(deleted)
    }
}
