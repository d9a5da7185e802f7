//! Write side of the derived tables.

use std::sync::Arc;

use alloy_primitives::B256;
use async_trait::async_trait;

use crate::db::{DbError, DbPool};
use crate::transformations::{DerivedRow, DerivedTable};

/// Block id and hash of the most recently committed derived row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Anchor {
    pub block_id: i64,
    pub hash: B256,
}

#[async_trait]
pub trait DerivedStore: Send + Sync + 'static {
    /// Last committed row ordered by block id descending.
    async fn last_row(&self, table: DerivedTable) -> Result<Option<Anchor>, DbError>;

    /// Insert rows in one transaction, skipping keys that already exist.
    /// Returns the number of rows actually inserted.
    async fn insert_batch(&self, rows: &[DerivedRow]) -> Result<u64, DbError>;

    /// Delete every row with block id >= `block_id`.
    async fn delete_from(&self, table: DerivedTable, block_id: i64) -> Result<u64, DbError>;
}

pub struct PgDerivedStore {
    pool: Arc<DbPool>,
}

impl PgDerivedStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DerivedStore for PgDerivedStore {
    async fn last_row(&self, table: DerivedTable) -> Result<Option<Anchor>, DbError> {
        let sql = format!(
            "SELECT block_id, hash FROM {} ORDER BY {} LIMIT 1",
            table.table_name(),
            table.latest_first()
        );
        let Some(row) = self.pool.query_opt(&sql, &[]).await? else {
            return Ok(None);
        };

        let block_id: i64 = row.try_get(0)?;
        let hash: Vec<u8> = row.try_get(1)?;
        let hash = B256::try_from(hash.as_slice()).map_err(|_| {
            DbError::row_decode(table.table_name(), format!("hash has {} bytes", hash.len()))
        })?;

        Ok(Some(Anchor { block_id, hash }))
    }

    async fn insert_batch(&self, rows: &[DerivedRow]) -> Result<u64, DbError> {
        let ops = rows.iter().map(DerivedRow::to_operation).collect();
        self.pool.execute_transaction(ops).await
    }

    async fn delete_from(&self, table: DerivedTable, block_id: i64) -> Result<u64, DbError> {
        self.pool
            .execute_transaction(vec![table.delete_from(block_id)])
            .await
    }
}
