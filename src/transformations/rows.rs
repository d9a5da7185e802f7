//! Derived table rows and how they are written.

use alloy_primitives::{B256, U256};

use crate::db::{DbOperation, DbValue, WhereClause};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DerivedTable {
    PayloadCache,
    SpendHistory,
    RelationIndex,
}

impl DerivedTable {
    pub fn table_name(&self) -> &'static str {
        match self {
            DerivedTable::PayloadCache => "tx_payload_cache",
            DerivedTable::SpendHistory => "spend_history",
            DerivedTable::RelationIndex => "tx_relations",
        }
    }

    pub fn conflict_columns(&self) -> &'static [&'static str] {
        match self {
            DerivedTable::PayloadCache => &["hash"],
            DerivedTable::SpendHistory => &["hash", "seq"],
            DerivedTable::RelationIndex => &["hash", "ecosystem_id"],
        }
    }

    /// ORDER BY clause selecting the most recently committed row first.
    pub fn latest_first(&self) -> &'static str {
        match self {
            DerivedTable::PayloadCache => "block_id DESC",
            DerivedTable::SpendHistory => "block_id DESC, id DESC",
            DerivedTable::RelationIndex => "block_id DESC, timestamp DESC",
        }
    }

    /// Bulk delete of every row at or above `block_id`.
    pub fn delete_from(&self, block_id: i64) -> DbOperation {
        DbOperation::Delete {
            table: self.table_name().to_string(),
            where_clause: WhereClause::Gte("block_id".to_string(), DbValue::Int64(block_id)),
        }
    }
}

/// Semantic tag of a spend-history row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum SpendKind {
    Transfer = 1,
    OnChainTx = 2,
    Fee = 3,
    Tax = 4,
    GenesisGrant = 5,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PayloadCacheRow {
    pub hash: B256,
    pub block_id: i64,
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpendHistoryRow {
    pub block_id: i64,
    pub hash: B256,
    /// Output index within the transaction's spend set.
    pub seq: i32,
    pub sender_id: i64,
    pub recipient_id: i64,
    pub amount: U256,
    pub ecosystem_id: i64,
    pub kind: SpendKind,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRow {
    pub hash: B256,
    pub ecosystem_id: i64,
    pub sender_ids: String,
    pub recipient_ids: String,
    pub block_id: i64,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DerivedRow {
    PayloadCache(PayloadCacheRow),
    SpendHistory(SpendHistoryRow),
    Relation(RelationRow),
}

impl DerivedRow {
    pub fn table(&self) -> DerivedTable {
        match self {
            DerivedRow::PayloadCache(_) => DerivedTable::PayloadCache,
            DerivedRow::SpendHistory(_) => DerivedTable::SpendHistory,
            DerivedRow::Relation(_) => DerivedTable::RelationIndex,
        }
    }

    pub fn block_id(&self) -> i64 {
        match self {
            DerivedRow::PayloadCache(r) => r.block_id,
            DerivedRow::SpendHistory(r) => r.block_id,
            DerivedRow::Relation(r) => r.block_id,
        }
    }

    pub fn hash(&self) -> B256 {
        match self {
            DerivedRow::PayloadCache(r) => r.hash,
            DerivedRow::SpendHistory(r) => r.hash,
            DerivedRow::Relation(r) => r.hash,
        }
    }

    /// Conflict-tolerant insert: an existing key is skipped, never updated.
    pub fn to_operation(&self) -> DbOperation {
        let table = self.table();
        let (columns, values): (Vec<&str>, Vec<DbValue>) = match self {
            DerivedRow::PayloadCache(r) => (
                vec!["hash", "block_id", "payload"],
                vec![
                    DbValue::Bytes32(r.hash.0),
                    DbValue::Int64(r.block_id),
                    DbValue::Bytes(r.payload.clone()),
                ],
            ),
            DerivedRow::SpendHistory(r) => (
                vec![
                    "block_id",
                    "hash",
                    "seq",
                    "sender_id",
                    "recipient_id",
                    "amount",
                    "ecosystem_id",
                    "kind",
                    "timestamp",
                ],
                vec![
                    DbValue::Int64(r.block_id),
                    DbValue::Bytes32(r.hash.0),
                    DbValue::Int32(r.seq),
                    DbValue::Int64(r.sender_id),
                    DbValue::Int64(r.recipient_id),
                    DbValue::Numeric(r.amount.to_string()),
                    DbValue::Int64(r.ecosystem_id),
                    DbValue::Int2(r.kind as u8),
                    DbValue::Int64(r.timestamp),
                ],
            ),
            DerivedRow::Relation(r) => (
                vec![
                    "hash",
                    "ecosystem_id",
                    "sender_ids",
                    "recipient_ids",
                    "block_id",
                    "timestamp",
                ],
                vec![
                    DbValue::Bytes32(r.hash.0),
                    DbValue::Int64(r.ecosystem_id),
                    DbValue::Text(r.sender_ids.clone()),
                    DbValue::Text(r.recipient_ids.clone()),
                    DbValue::Int64(r.block_id),
                    DbValue::Int64(r.timestamp),
                ],
            ),
        };

        DbOperation::InsertIgnore {
            table: table.table_name().to_string(),
            columns: columns.into_iter().map(String::from).collect(),
            values,
            conflict_columns: table
                .conflict_columns()
                .iter()
                .map(|c| c.to_string())
                .collect(),
        }
    }
}
