//! Transformation rules that turn ledger chunks into derived rows.
//!
//! # Architecture
//!
//! ```text
//! Ledger chunk ──► Transformer ──► DerivedRows ──► commit_rows ──► PostgreSQL
//!                      │
//!                      └─► LedgerSource (spend-record lookups by hash)
//! ```
//!
//! Each pipeline owns exactly one transformer:
//! - [`PayloadCacheTransformer`] over block blobs
//! - [`SpendHistoryTransformer`] over transaction records
//! - [`RelationIndexTransformer`] over transaction records

pub mod error;
pub mod payload_cache;
pub mod relation_index;
pub mod rows;
pub mod spend_history;
pub mod traits;

pub use error::TransformationError;
pub use payload_cache::PayloadCacheTransformer;
pub use relation_index::RelationIndexTransformer;
pub use rows::{DerivedRow, DerivedTable, SpendKind};
pub use spend_history::SpendHistoryTransformer;
pub use traits::{Chunk, ChunkSource, Transformer};
