use std::str::FromStr;
use std::sync::Arc;

use alloy_primitives::{B256, U256};
use async_trait::async_trait;
use tokio_postgres::Row;

use super::{LedgerBlock, LedgerSource, SpendRecord, TransactionRecord};
use crate::db::{DbError, DbPool};

const TX_COLUMNS: &str = "hash, block, timestamp, ecosystem_id, address, contract_name";

/// Ledger reader over the node's PostgreSQL tables (`block_chain`,
/// `log_transactions`, `spent_info`).
pub struct PgLedger {
    pool: Arc<DbPool>,
}

impl PgLedger {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LedgerSource for PgLedger {
    async fn max_block_id(&self) -> Result<i64, DbError> {
        let row = self
            .pool
            .query_opt("SELECT COALESCE(MAX(id), 0) FROM block_chain", &[])
            .await?;
        match row {
            Some(row) => Ok(row.try_get(0)?),
            None => Ok(0),
        }
    }

    async fn block_range(
        &self,
        from_exclusive: i64,
        to_inclusive: i64,
    ) -> Result<Vec<LedgerBlock>, DbError> {
        let rows = self
            .pool
            .query(
                "SELECT id, data, time FROM block_chain WHERE id > $1 AND id <= $2 ORDER BY id ASC",
                &[&from_exclusive, &to_inclusive],
            )
            .await?;

        rows.iter()
            .map(|row| -> Result<LedgerBlock, DbError> {
                Ok(LedgerBlock {
                    id: row.try_get(0)?,
                    payload: row.try_get(1)?,
                    timestamp: row.try_get(2)?,
                })
            })
            .collect()
    }

    async fn transactions_in_range(
        &self,
        from_exclusive: i64,
        to_inclusive: i64,
    ) -> Result<Vec<TransactionRecord>, DbError> {
        let sql = format!(
            "SELECT {} FROM log_transactions WHERE block > $1 AND block <= $2 \
             ORDER BY block ASC, timestamp ASC",
            TX_COLUMNS
        );
        let rows = self
            .pool
            .query(&sql, &[&from_exclusive, &to_inclusive])
            .await?;
        rows.iter().map(transaction_from_row).collect()
    }

    async fn transaction_by_hash(
        &self,
        hash: &B256,
    ) -> Result<Option<TransactionRecord>, DbError> {
        let sql = format!("SELECT {} FROM log_transactions WHERE hash = $1", TX_COLUMNS);
        let row = self.pool.query_opt(&sql, &[&hash.as_slice()]).await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn last_transaction(&self) -> Result<Option<TransactionRecord>, DbError> {
        let sql = format!(
            "SELECT {} FROM log_transactions ORDER BY block DESC, timestamp DESC LIMIT 1",
            TX_COLUMNS
        );
        let row = self.pool.query_opt(&sql, &[]).await?;
        row.as_ref().map(transaction_from_row).transpose()
    }

    async fn spend_records(&self, hash: &B256) -> Result<Vec<SpendRecord>, DbError> {
        let rows = self
            .pool
            .query(
                "SELECT output_index, sender_id, output_key_id, output_value::text, ecosystem \
                 FROM spent_info WHERE output_tx_hash = $1 ORDER BY output_index ASC",
                &[&hash.as_slice()],
            )
            .await?;
        rows.iter().map(spend_from_row).collect()
    }
}

fn hash_from_row(row: &Row, idx: usize, table: &'static str) -> Result<B256, DbError> {
    let bytes: Vec<u8> = row.try_get(idx)?;
    B256::try_from(bytes.as_slice())
        .map_err(|_| DbError::row_decode(table, format!("hash has {} bytes", bytes.len())))
}

fn transaction_from_row(row: &Row) -> Result<TransactionRecord, DbError> {
    Ok(TransactionRecord {
        hash: hash_from_row(row, 0, "log_transactions")?,
        block_id: row.try_get(1)?,
        timestamp: row.try_get(2)?,
        ecosystem_id: row.try_get(3)?,
        address: row.try_get(4)?,
        contract_name: row.try_get(5)?,
    })
}

fn spend_from_row(row: &Row) -> Result<SpendRecord, DbError> {
    let amount: String = row.try_get(3)?;
    let amount = U256::from_str(&amount)
        .map_err(|e| DbError::row_decode("spent_info", format!("amount {:?}: {}", amount, e)))?;

    Ok(SpendRecord {
        output_index: row.try_get(0)?,
        sender_id: row.try_get(1)?,
        recipient_id: row.try_get(2)?,
        amount,
        ecosystem_id: row.try_get(4)?,
    })
}
