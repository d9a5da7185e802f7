//! Core trait for pipeline transformers.
//!
//! A transformer turns one fetched ledger chunk into derived rows. It never
//! writes; the batch committer owns all writes.

use async_trait::async_trait;

use crate::ledger::{LedgerBlock, LedgerSource, TransactionRecord};

use super::error::TransformationError;
use super::rows::{DerivedRow, DerivedTable};

/// Which ledger rows a transformer consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkSource {
    Blocks,
    Transactions,
}

/// Ledger rows for one block window, ascending by block id.
#[derive(Debug, Clone)]
pub enum Chunk {
    Blocks(Vec<LedgerBlock>),
    Transactions(Vec<TransactionRecord>),
}

impl Chunk {
    pub fn len(&self) -> usize {
        match self {
            Chunk::Blocks(blocks) => blocks.len(),
            Chunk::Transactions(txs) => txs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
pub trait Transformer: Send + Sync + 'static {
    /// Name used in logging.
    fn name(&self) -> &'static str;

    /// Table this transformer's rows land in.
    fn table(&self) -> DerivedTable;

    fn source(&self) -> ChunkSource;

    /// Produce the derived rows for a chunk, in block order.
    ///
    /// Any error aborts the whole chunk; nothing from it is committed.
    async fn transform(
        &self,
        chunk: &Chunk,
        ledger: &dyn LedgerSource,
    ) -> Result<Vec<DerivedRow>, TransformationError>;
}
