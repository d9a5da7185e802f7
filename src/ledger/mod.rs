//! Read-only view of the node's ledger.
//!
//! The node owns and writes these tables; the synchronizer only reads them.
//! Everything a pipeline needs from the chain goes through [`LedgerSource`].

pub mod payload;
pub mod postgres;

use alloy_primitives::{B256, U256};
use async_trait::async_trait;

use crate::db::DbError;

pub use payload::decode_block_payload;
pub use postgres::PgLedger;

/// Ecosystem id of the base (platform) ecosystem.
pub const BASE_ECOSYSTEM: i64 = 1;

/// Block id of the genesis block.
pub const GENESIS_BLOCK_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerBlock {
    pub id: i64,
    pub payload: Vec<u8>,
    pub timestamp: i64,
}

/// A transaction that is part of the current canonical chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionRecord {
    pub hash: B256,
    pub block_id: i64,
    pub timestamp: i64,
    pub ecosystem_id: i64,
    /// Key id of the originating account.
    pub address: i64,
    /// Name of the smart contract the transaction was wrapped in, if any.
    pub contract_name: Option<String>,
}

impl TransactionRecord {
    pub fn has_contract(&self) -> bool {
        self.contract_name.as_deref().is_some_and(|n| !n.is_empty())
    }
}

/// One UTXO output produced by a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendRecord {
    pub output_index: i32,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub amount: U256,
    pub ecosystem_id: i64,
}

impl SpendRecord {
    pub fn is_self_transfer(&self) -> bool {
        self.sender_id == self.recipient_id
    }
}

#[async_trait]
pub trait LedgerSource: Send + Sync + 'static {
    /// Highest block id in the ledger, 0 when empty.
    async fn max_block_id(&self) -> Result<i64, DbError>;

    /// Blocks with id in `(from_exclusive, to_inclusive]`, ascending.
    async fn block_range(
        &self,
        from_exclusive: i64,
        to_inclusive: i64,
    ) -> Result<Vec<LedgerBlock>, DbError>;

    /// Transaction records with block id in `(from_exclusive, to_inclusive]`,
    /// ordered by block id then timestamp.
    async fn transactions_in_range(
        &self,
        from_exclusive: i64,
        to_inclusive: i64,
    ) -> Result<Vec<TransactionRecord>, DbError>;

    async fn transaction_by_hash(&self, hash: &B256)
        -> Result<Option<TransactionRecord>, DbError>;

    async fn last_transaction(&self) -> Result<Option<TransactionRecord>, DbError>;

    /// Outputs of a transaction ordered by output index.
    async fn spend_records(&self, hash: &B256) -> Result<Vec<SpendRecord>, DbError>;
}
