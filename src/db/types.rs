/// A value that can be bound as a query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum DbValue {
    /// Signed 64-bit integer (BIGINT)
    Int64(i64),
    /// Signed 32-bit integer (INTEGER)
    Int32(i32),
    /// Unsigned 8-bit integer (stored as SMALLINT/INT2)
    Int2(u8),
    /// Text (unlimited length)
    Text(String),
    /// Raw bytes (stored as BYTEA)
    Bytes(Vec<u8>),
    /// 32-byte hash (stored as BYTEA)
    Bytes32([u8; 32]),
    /// Numeric string for uint256 amounts (stored as NUMERIC)
    Numeric(String),
}

/// Write operation against a derived table.
#[derive(Debug, Clone)]
pub enum DbOperation {
    /// INSERT ... ON CONFLICT (...) DO NOTHING
    InsertIgnore {
        table: String,
        columns: Vec<String>,
        values: Vec<DbValue>,
        /// Columns that form the unique constraint
        conflict_columns: Vec<String>,
    },
    /// DELETE with WHERE clause
    Delete {
        table: String,
        where_clause: WhereClause,
    },
}

/// WHERE clause for DELETE operations.
#[derive(Debug, Clone)]
pub enum WhereClause {
    /// column >= value
    Gte(String, DbValue),
}
