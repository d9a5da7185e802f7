//! Transformation error types.

use thiserror::Error;

use crate::db::DbError;

#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("Transformer '{transformer}' failed: {message}")]
    TransformerError {
        transformer: String,
        message: String,
    },

    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),

    #[error("Missing required data: {0}")]
    MissingData(String),

    #[error("Decode error: {0}")]
    DecodeError(String),
}

impl TransformationError {
    /// Create a transformer error with context.
    pub fn transformer(name: &str, message: impl Into<String>) -> Self {
        Self::TransformerError {
            transformer: name.to_string(),
            message: message.into(),
        }
    }
}
