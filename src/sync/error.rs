use thiserror::Error;

use crate::db::DbError;
use crate::transformations::TransformationError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Database error: {0}")]
    DatabaseError(#[from] DbError),

    #[error(transparent)]
    TransformationError(#[from] TransformationError),

    #[error("Rollback repair failed at block {anchor}: {source}")]
    RepairFailed {
        anchor: i64,
        #[source]
        source: DbError,
    },

    #[error("Rollback repair made no progress at block {anchor}")]
    RepairStalled { anchor: i64 },
}
