use alloy_primitives::keccak256;
use async_trait::async_trait;

use crate::ledger::{decode_block_payload, LedgerSource};

use super::error::TransformationError;
use super::rows::{DerivedRow, DerivedTable, PayloadCacheRow};
use super::traits::{Chunk, ChunkSource, Transformer};

/// Splits block blobs into one hash-keyed cache row per transaction.
pub struct PayloadCacheTransformer;

#[async_trait]
impl Transformer for PayloadCacheTransformer {
    fn name(&self) -> &'static str {
        "payload_cache"
    }

    fn table(&self) -> DerivedTable {
        DerivedTable::PayloadCache
    }

    fn source(&self) -> ChunkSource {
        ChunkSource::Blocks
    }

    async fn transform(
        &self,
        chunk: &Chunk,
        _ledger: &dyn LedgerSource,
    ) -> Result<Vec<DerivedRow>, TransformationError> {
        let Chunk::Blocks(blocks) = chunk else {
            return Err(TransformationError::transformer(
                self.name(),
                "expected a block chunk",
            ));
        };

        let mut rows = Vec::new();
        for block in blocks {
            for tx in decode_block_payload(block.id, &block.payload)? {
                rows.push(DerivedRow::PayloadCache(PayloadCacheRow {
                    hash: keccak256(tx),
                    block_id: block.id,
                    payload: tx.to_vec(),
                }));
            }
        }

        tracing::debug!(
            "{}: {} blocks -> {} payload rows",
            self.name(),
            blocks.len(),
            rows.len()
        );
        Ok(rows)
    }
}
