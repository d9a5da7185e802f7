//! Classifies UTXO outputs into the typed spend history.
//!
//! Outputs are classified by position. The ordered slots `[Fee, Tax]` are
//! filled first by base-ecosystem outputs; in a secondary-ecosystem
//! transaction the secondary outputs then take whatever slots are left.
//! Everything past the slots is an on-chain transfer. Self-transfers never
//! take a slot and are tagged `Transfer`. Contract calls that move no value
//! produce no rows.

use alloy_primitives::U256;
use async_trait::async_trait;

use crate::ledger::{
    LedgerSource, SpendRecord, TransactionRecord, BASE_ECOSYSTEM, GENESIS_BLOCK_ID,
};

use super::error::TransformationError;
use super::rows::{DerivedRow, DerivedTable, SpendHistoryRow, SpendKind};
use super::traits::{Chunk, ChunkSource, Transformer};

/// Reserved sender id of the genesis grant.
pub const GENESIS_SENDER_ID: i64 = 0;

const SLOTS: [SpendKind; 2] = [SpendKind::Fee, SpendKind::Tax];

pub struct SpendHistoryTransformer;

#[async_trait]
impl Transformer for SpendHistoryTransformer {
    fn name(&self) -> &'static str {
        "spend_history"
    }

    fn table(&self) -> DerivedTable {
        DerivedTable::SpendHistory
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
            rows.extend(
                classify_transaction(tx, &spends)?
                    .into_iter()
                    .map(DerivedRow::SpendHistory),
            );
        }
        Ok(rows)
    }
}

fn is_genesis(tx: &TransactionRecord) -> bool {
    tx.block_id == GENESIS_BLOCK_ID && !tx.has_contract()
}

/// Build the spend-history rows of one transaction.
pub fn classify_transaction(
    tx: &TransactionRecord,
    spends: &[SpendRecord],
) -> Result<Vec<SpendHistoryRow>, TransformationError> {
    if is_genesis(tx) {
        let amount = spends
            .iter()
            .fold(U256::ZERO, |acc, s| acc.saturating_add(s.amount));
        return Ok(vec![SpendHistoryRow {
            block_id: tx.block_id,
            hash: tx.hash,
            seq: 0,
            sender_id: GENESIS_SENDER_ID,
            recipient_id: tx.address,
            amount,
            ecosystem_id: tx.ecosystem_id,
            kind: SpendKind::GenesisGrant,
            timestamp: tx.timestamp,
        }]);
    }

    if spends.is_empty() {
        if tx.has_contract() {
            return Ok(Vec::new());
        }
        return Err(TransformationError::MissingData(format!(
            "no spend records for transaction {} in block {}",
            tx.hash, tx.block_id
        )));
    }

    let kinds = positional_kinds(tx.ecosystem_id, spends);

    Ok(spends
        .iter()
        .zip(kinds)
        .map(|(spend, kind)| SpendHistoryRow {
            block_id: tx.block_id,
            hash: tx.hash,
            seq: spend.output_index,
            sender_id: spend.sender_id,
            recipient_id: spend.recipient_id,
            amount: spend.amount,
            ecosystem_id: spend.ecosystem_id,
            kind,
            timestamp: tx.timestamp,
        })
        .collect())
}

/// Kind of each spend, index-aligned with `spends`.
fn positional_kinds(tx_ecosystem: i64, spends: &[SpendRecord]) -> Vec<SpendKind> {
    let mut kinds = vec![SpendKind::OnChainTx; spends.len()];
    let mut slots = SLOTS.iter().copied();

    for (i, spend) in spends.iter().enumerate() {
        if spend.is_self_transfer() {
            kinds[i] = SpendKind::Transfer;
        } else if spend.ecosystem_id == BASE_ECOSYSTEM {
            if let Some(kind) = slots.next() {
                kinds[i] = kind;
            }
        }
    }

    if tx_ecosystem != BASE_ECOSYSTEM {
        for (i, spend) in spends.iter().enumerate() {
            if spend.is_self_transfer() || spend.ecosystem_id == BASE_ECOSYSTEM {
                continue;
            }
            match slots.next() {
                Some(kind) => kinds[i] = kind,
                None => break,
            }
        }
    }

    kinds
}
