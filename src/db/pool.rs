use bytes::BytesMut;
use deadpool_postgres::{Manager, ManagerConfig, Pool, RecyclingMethod, Runtime};
use tokio_postgres::types::ToSql;
use tokio_postgres::NoTls;

use super::error::DbError;
use super::types::{DbOperation, DbValue, WhereClause};

pub struct DbPool {
    pool: Pool,
}

impl DbPool {
    pub async fn new(database_url: &str, max_size: usize) -> Result<Self, DbError> {
        let config = database_url
            .parse::<tokio_postgres::Config>()
            .map_err(|e| DbError::InvalidConnectionString(e.to_string()))?;

        let manager_config = ManagerConfig {
            recycling_method: RecyclingMethod::Fast,
        };

        let manager = Manager::from_config(config, NoTls, manager_config);

        let pool = Pool::builder(manager)
            .max_size(max_size)
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(DbError::BuildError)?;

        let _conn = pool.get().await?;
        tracing::info!("Database connection pool created (max_size={})", max_size);

        Ok(Self { pool })
    }

    /// Execute all operations in one transaction and return the total number
    /// of affected rows. Conflicting inserts count as zero.
    pub async fn execute_transaction(&self, operations: Vec<DbOperation>) -> Result<u64, DbError> {
        if operations.is_empty() {
            return Ok(0);
        }

        let mut client = self.pool.get().await?;
        let transaction = client.transaction().await?;
        let mut affected = 0u64;

        for op in operations {
            let (sql, params) = build_sql(op);

            let params_refs: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();

            match transaction.execute(&sql, &params_refs[..]).await {
                Ok(n) => affected += n,
                Err(e) => {
                    let db_err: DbError = e.into();
                    tracing::error!("SQL execution failed\n  SQL: {}\n  Error: {}", sql, db_err);
                    return Err(db_err);
                }
            }
        }

        transaction.commit().await?;
        Ok(affected)
    }

    pub async fn run_migrations(&self) -> Result<(), DbError> {
        super::migrations::run(&self.pool).await
    }

    pub async fn query(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Vec<tokio_postgres::Row>, DbError> {
        let client = self.pool.get().await?;
        let rows = client.query(query, params).await?;
        Ok(rows)
    }

    pub async fn query_opt(
        &self,
        query: &str,
        params: &[&(dyn ToSql + Sync)],
    ) -> Result<Option<tokio_postgres::Row>, DbError> {
        let client = self.pool.get().await?;
        let row = client.query_opt(query, params).await?;
        Ok(row)
    }
}

#[derive(Debug, PartialEq)]
enum SqlParam {
    Int64(i64),
    Int32(i32),
    Int16(i16),
    Text(String),
    Bytes(Vec<u8>),
}

impl ToSql for SqlParam {
    fn to_sql(
        &self,
        ty: &tokio_postgres::types::Type,
        out: &mut BytesMut,
    ) -> Result<tokio_postgres::types::IsNull, Box<dyn std::error::Error + Sync + Send>> {
        match self {
            SqlParam::Int64(v) => v.to_sql(ty, out),
            SqlParam::Int32(v) => v.to_sql(ty, out),
            SqlParam::Int16(v) => v.to_sql(ty, out),
            SqlParam::Text(v) => v.to_sql(ty, out),
            SqlParam::Bytes(v) => v.to_sql(ty, out),
        }
    }

    fn accepts(ty: &tokio_postgres::types::Type) -> bool {
        <i64 as ToSql>::accepts(ty)
            || <i32 as ToSql>::accepts(ty)
            || <i16 as ToSql>::accepts(ty)
            || <String as ToSql>::accepts(ty)
            || <Vec<u8> as ToSql>::accepts(ty)
    }

    tokio_postgres::types::to_sql_checked!();
}

fn convert_db_value(value: &DbValue) -> SqlParam {
    match value {
        DbValue::Int64(v) => SqlParam::Int64(*v),
        DbValue::Int32(v) => SqlParam::Int32(*v),
        DbValue::Int2(v) => SqlParam::Int16(*v as i16),
        DbValue::Text(v) => SqlParam::Text(v.clone()),
        DbValue::Bytes(v) => SqlParam::Bytes(v.clone()),
        DbValue::Bytes32(v) => SqlParam::Bytes(v.to_vec()),
        DbValue::Numeric(v) => SqlParam::Text(v.clone()),
    }
}

fn convert_values_to_params(values: &[DbValue]) -> Vec<SqlParam> {
    values.iter().map(convert_db_value).collect()
}

/// Generate the SQL placeholder for a value at the given parameter index.
/// Numeric values are sent as text and cast by PostgreSQL.
fn placeholder_for(value: &DbValue, param_idx: usize) -> String {
    match value {
        DbValue::Numeric(_) => format!("${}::text::numeric", param_idx),
        _ => format!("${}", param_idx),
    }
}

/// Wrap a column name in double quotes to handle reserved keywords.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name)
}

fn quote_cols(columns: &[String]) -> String {
    columns.iter().map(|c| quote_ident(c)).collect::<Vec<_>>().join(", ")
}

fn build_sql(op: DbOperation) -> (String, Vec<SqlParam>) {
    match op {
        DbOperation::InsertIgnore {
            table,
            columns,
            values,
            conflict_columns,
        } => build_insert_ignore_sql(&table, &columns, &values, &conflict_columns),
        DbOperation::Delete { table, where_clause } => build_delete_sql(&table, &where_clause),
    }
}

fn build_insert_ignore_sql(
    table: &str,
    columns: &[String],
    values: &[DbValue],
    conflict_columns: &[String],
) -> (String, Vec<SqlParam>) {
    let placeholders: Vec<String> = values
        .iter()
        .enumerate()
        .map(|(i, v)| placeholder_for(v, i + 1))
        .collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT ({}) DO NOTHING",
        table,
        quote_cols(columns),
        placeholders.join(", "),
        quote_cols(conflict_columns)
    );

    (sql, convert_values_to_params(values))
}

fn build_delete_sql(table: &str, where_clause: &WhereClause) -> (String, Vec<SqlParam>) {
    let mut params = Vec::new();
    let mut param_idx = 1;

    let where_str = build_where_sql(where_clause, &mut params, &mut param_idx);

    let sql = format!("DELETE FROM {} WHERE {}", table, where_str);
    (sql, params)
}

fn build_where_sql(
    where_clause: &WhereClause,
    params: &mut Vec<SqlParam>,
    param_idx: &mut usize,
) -> String {
    match where_clause {
        WhereClause::Gte(col, val) => {
            let ph = placeholder_for(val, *param_idx);
            params.push(convert_db_value(val));
            *param_idx += 1;
            format!("{} >= {}", quote_ident(col), ph)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_ignore_sql() {
        let (sql, params) = build_sql(DbOperation::InsertIgnore {
            table: "spend_history".to_string(),
            columns: vec!["hash".to_string(), "seq".to_string(), "amount".to_string()],
            values: vec![
                DbValue::Bytes32([7u8; 32]),
                DbValue::Int32(2),
                DbValue::Numeric("1000".to_string()),
            ],
            conflict_columns: vec!["hash".to_string(), "seq".to_string()],
        });

        assert_eq!(
            sql,
            "INSERT INTO spend_history (\"hash\", \"seq\", \"amount\") \
             VALUES ($1, $2, $3::text::numeric) ON CONFLICT (\"hash\", \"seq\") DO NOTHING"
        );
        assert_eq!(
            params,
            vec![
                SqlParam::Bytes(vec![7u8; 32]),
                SqlParam::Int32(2),
                SqlParam::Text("1000".to_string()),
            ]
        );
    }

    #[test]
    fn test_delete_gte_sql() {
        let (sql, params) = build_sql(DbOperation::Delete {
            table: "tx_relations".to_string(),
            where_clause: WhereClause::Gte("block_id".to_string(), DbValue::Int64(4)),
        });

        assert_eq!(sql, "DELETE FROM tx_relations WHERE \"block_id\" >= $1");
        assert_eq!(params, vec![SqlParam::Int64(4)]);
    }

    #[test]
    fn test_smallint_param() {
        assert_eq!(convert_db_value(&DbValue::Int2(5)), SqlParam::Int16(5));
    }
}
