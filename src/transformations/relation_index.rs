use async_trait::async_trait;

use crate::ledger::{LedgerSource, SpendRecord, TransactionRecord};

use super::error::TransformationError;
use super::rows::{DerivedRow, DerivedTable, RelationRow};
use super::traits::{Chunk, ChunkSource, Transformer};

/// Reverse index of (hash, ecosystem) to the accounts a transaction touched.
pub struct RelationIndexTransformer;

#[async_trait]
impl Transformer for RelationIndexTransformer {
    fn name(&self) -> &'static str {
        "relation_index"
    }

    fn table(&self) -> DerivedTable {
        DerivedTable::RelationIndex
    }

    fn source(&self) -> ChunkSource {
        ChunkSource::Transactions
    }

    async fn transform(
        &self,
        chunk: &Chunk,
        ledger: &dyn LedgerSource,
    ) -> Result<Vec<DerivedRow>, TransformationError> {
        let Chunk::Transactions(txs) = chunk else {
            return Err(TransformationError::transformer(
                self.name(),
                "expected a transaction chunk",
            ));
        };

        let mut rows = Vec::new();
        for tx in txs {
            let spends = ledger.spend_records(&tx.hash).await?;
            rows.extend(relations_for(tx, &spends).into_iter().map(DerivedRow::Relation));
        }
        Ok(rows)
    }
}

struct EcosystemGroup {
    ecosystem_id: i64,
    senders: Vec<String>,
    recipients: Vec<String>,
}

/// One row per ecosystem, in the order ecosystems first appear.
pub fn relations_for(tx: &TransactionRecord, spends: &[SpendRecord]) -> Vec<RelationRow> {
    if spends.is_empty() {
        if tx.has_contract() {
            return Vec::new();
        }
        return vec![RelationRow {
            hash: tx.hash,
            ecosystem_id: tx.ecosystem_id,
            sender_ids: tx.address.to_string(),
            recipient_ids: String::new(),
            block_id: tx.block_id,
            timestamp: tx.timestamp,
        }];
    }

    let mut groups: Vec<EcosystemGroup> = Vec::new();
    for spend in spends {
        let pos = match groups
            .iter()
            .position(|g| g.ecosystem_id == spend.ecosystem_id)
        {
            Some(pos) => pos,
            None => {
                groups.push(EcosystemGroup {
                    ecosystem_id: spend.ecosystem_id,
                    senders: Vec::new(),
                    recipients: Vec::new(),
                });
                groups.len() - 1
            }
        };
        groups[pos].senders.push(spend.sender_id.to_string());
        groups[pos].recipients.push(spend.recipient_id.to_string());
    }

    groups
        .into_iter()
        .map(|g| RelationRow {
            hash: tx.hash,
            ecosystem_id: g.ecosystem_id,
            sender_ids: g.senders.join(","),
            recipient_ids: g.recipients.join(","),
            block_id: tx.block_id,
            timestamp: tx.timestamp,
        })
        .collect()
}
