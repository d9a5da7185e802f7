//! In-memory ledger and derived store for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use alloy_primitives::{keccak256, B256, U256};
use async_trait::async_trait;

use crate::db::DbError;
use crate::ledger::payload::encode_block_payload;
use crate::ledger::{LedgerBlock, LedgerSource, SpendRecord, TransactionRecord};
use crate::sync::store::{Anchor, DerivedStore};
use crate::transformations::{DerivedRow, DerivedTable};

pub fn spend(
    output_index: i32,
    sender_id: i64,
    recipient_id: i64,
    amount: u64,
    ecosystem_id: i64,
) -> SpendRecord {
    SpendRecord {
        output_index,
        sender_id,
        recipient_id,
        amount: U256::from(amount),
        ecosystem_id,
    }
}

fn injected(table: &'static str) -> DbError {
    DbError::row_decode(table, "injected failure")
}

#[derive(Default)]
struct LedgerState {
    blocks: BTreeMap<i64, LedgerBlock>,
    txs: Vec<TransactionRecord>,
    spends: HashMap<B256, Vec<SpendRecord>>,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a block holding `txs` and a plain transaction record for each.
    /// Returns the transaction hashes in block order.
    pub fn push_block(&self, id: i64, txs: &[&[u8]]) -> Vec<B256> {
        let mut state = self.state.lock().unwrap();
        state.blocks.insert(
            id,
            LedgerBlock {
                id,
                payload: encode_block_payload(txs),
                timestamp: id * 10,
            },
        );

        txs.iter()
            .enumerate()
            .map(|(i, tx)| {
                let hash = keccak256(tx);
                state.txs.push(TransactionRecord {
                    hash,
                    block_id: id,
                    timestamp: id * 10 + i as i64,
                    ecosystem_id: 1,
                    address: 1000 + id,
                    contract_name: None,
                });
                hash
            })
            .collect()
    }

    /// Append a block with an arbitrary blob and no transaction records.
    pub fn push_raw_block(&self, id: i64, payload: Vec<u8>) {
        let mut state = self.state.lock().unwrap();
        state.blocks.insert(
            id,
            LedgerBlock {
                id,
                payload,
                timestamp: id * 10,
            },
        );
    }

    pub fn push_transaction(&self, record: TransactionRecord, spends: Vec<SpendRecord>) {
        let mut state = self.state.lock().unwrap();
        state.spends.insert(record.hash, spends);
        state.txs.push(record);
    }

    /// Roll the ledger back so that `last_kept` is the tip.
    pub fn truncate(&self, last_kept: i64) {
        let mut state = self.state.lock().unwrap();
        state.blocks.retain(|id, _| *id <= last_kept);

        let (kept, dropped): (Vec<_>, Vec<_>) =
            state.txs.drain(..).partition(|tx| tx.block_id <= last_kept);
        state.txs = kept;
        for tx in dropped {
            state.spends.remove(&tx.hash);
        }
    }
}

#[async_trait]
impl LedgerSource for MemoryLedger {
    async fn max_block_id(&self) -> Result<i64, DbError> {
        let state = self.state.lock().unwrap();
        let from_blocks = state.blocks.keys().next_back().copied().unwrap_or(0);
        let from_txs = state.txs.iter().map(|t| t.block_id).max().unwrap_or(0);
        Ok(from_blocks.max(from_txs))
    }

    async fn block_range(
        &self,
        from_exclusive: i64,
        to_inclusive: i64,
    ) -> Result<Vec<LedgerBlock>, DbError> {
        let state = self.state.lock().unwrap();
        if from_exclusive >= to_inclusive {
            return Ok(Vec::new());
        }
        Ok(state
            .blocks
            .range(from_exclusive + 1..=to_inclusive)
            .map(|(_, b)| b.clone())
            .collect())
    }

    async fn transactions_in_range(
        &self,
        from_exclusive: i64,
        to_inclusive: i64,
    ) -> Result<Vec<TransactionRecord>, DbError> {
        let state = self.state.lock().unwrap();
        let mut txs: Vec<_> = state
            .txs
            .iter()
            .filter(|t| t.block_id > from_exclusive && t.block_id <= to_inclusive)
            .cloned()
            .collect();
        txs.sort_by_key(|t| (t.block_id, t.timestamp));
        Ok(txs)
    }

    async fn transaction_by_hash(
        &self,
        hash: &B256,
    ) -> Result<Option<TransactionRecord>, DbError> {
        let state = self.state.lock().unwrap();
        Ok(state.txs.iter().find(|t| t.hash == *hash).cloned())
    }

    async fn last_transaction(&self) -> Result<Option<TransactionRecord>, DbError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .txs
            .iter()
            .max_by_key(|t| (t.block_id, t.timestamp))
            .cloned())
    }

    async fn spend_records(&self, hash: &B256) -> Result<Vec<SpendRecord>, DbError> {
        let state = self.state.lock().unwrap();
        Ok(state.spends.get(hash).cloned().unwrap_or_default())
    }
}

/// Unique key of a row within its table.
fn row_key(row: &DerivedRow) -> (B256, i64) {
    match row {
        DerivedRow::PayloadCache(r) => (r.hash, 0),
        DerivedRow::SpendHistory(r) => (r.hash, r.seq as i64),
        DerivedRow::Relation(r) => (r.hash, r.ecosystem_id),
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<BTreeMap<DerivedTable, Vec<DerivedRow>>>,
    fail_inserts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of a table in insertion order.
    pub fn rows(&self, table: DerivedTable) -> Vec<DerivedRow> {
        let tables = self.tables.lock().unwrap();
        tables.get(&table).cloned().unwrap_or_default()
    }

    pub fn fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    pub fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DerivedStore for MemoryStore {
    async fn last_row(&self, table: DerivedTable) -> Result<Option<Anchor>, DbError> {
        let tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get(&table) else {
            return Ok(None);
        };
        // Ties on block id go to the most recently inserted row.
        Ok(rows
            .iter()
            .enumerate()
            .max_by_key(|(i, r)| (r.block_id(), *i))
            .map(|(_, r)| Anchor {
                block_id: r.block_id(),
                hash: r.hash(),
            }))
    }

    async fn insert_batch(&self, rows: &[DerivedRow]) -> Result<u64, DbError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(injected("insert"));
        }

        let mut tables = self.tables.lock().unwrap();
        let mut inserted = 0;
        for row in rows {
            let existing = tables.entry(row.table()).or_default();
            let key = row_key(row);
            if existing.iter().any(|r| row_key(r) == key) {
                continue;
            }
            existing.push(row.clone());
            inserted += 1;
        }
        Ok(inserted)
    }

    async fn delete_from(&self, table: DerivedTable, block_id: i64) -> Result<u64, DbError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(injected("delete"));
        }

        let mut tables = self.tables.lock().unwrap();
        let Some(rows) = tables.get_mut(&table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| r.block_id() < block_id);
        Ok((before - rows.len()) as u64)
    }
}
