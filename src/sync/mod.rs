//! Incremental synchronizer core.
//!
//! ```text
//! trigger() ──► Scheduler ──► Pipeline::run_pass
//!                               ├─ high-water mark (last derived row)
//!                               ├─ fetch (mark, mark + chunk] ──► Transformer ──► commit
//!                               └─ tail check ──► rollback repair ──► back to fetch
//! ```

pub mod commit;
pub mod error;
pub mod pipeline;
pub mod scheduler;
pub mod store;

use std::sync::Arc;

use crate::ledger::LedgerSource;
use crate::transformations::{
    PayloadCacheTransformer, RelationIndexTransformer, SpendHistoryTransformer, Transformer,
};
use crate::types::config::pipeline::PipelineKind;
use crate::types::config::sync::SyncConfig;

pub use pipeline::Pipeline;
pub use scheduler::Scheduler;
pub use store::{DerivedStore, PgDerivedStore};

fn transformer_for(kind: PipelineKind) -> Arc<dyn Transformer> {
    match kind {
        PipelineKind::PayloadCache => Arc::new(PayloadCacheTransformer),
        PipelineKind::SpendHistory => Arc::new(SpendHistoryTransformer),
        PipelineKind::RelationIndex => Arc::new(RelationIndexTransformer),
    }
}

/// Build every enabled pipeline from config.
pub fn build_pipelines(
    config: &SyncConfig,
    ledger: Arc<dyn LedgerSource>,
    store: Arc<dyn DerivedStore>,
) -> Vec<Pipeline> {
    PipelineKind::ALL
        .into_iter()
        .filter_map(|kind| {
            let settings = config.pipelines.get(kind);
            if !settings.is_enabled() {
                tracing::info!("Pipeline {} disabled in config", kind);
                return None;
            }

            let chunk_size = settings.chunk_size(kind);
            let batch_size = settings.batch_size(kind);
            tracing::info!(
                "Pipeline {}: chunk_size={}, batch_size={}",
                kind,
                chunk_size,
                batch_size
            );

            Some(Pipeline::new(
                transformer_for(kind),
                ledger.clone(),
                store.clone(),
                chunk_size,
                batch_size,
            ))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryLedger, MemoryStore};

    #[test]
    fn test_build_pipelines_skips_disabled() {
        let config: SyncConfig =
            serde_json::from_str(r#"{"pipelines": {"spend_history": {"enabled": false}}}"#)
                .unwrap();
        let pipelines = build_pipelines(
            &config,
            Arc::new(MemoryLedger::new()),
            Arc::new(MemoryStore::new()),
        );

        let names: Vec<&str> = pipelines.iter().map(Pipeline::name).collect();
        assert_eq!(names, vec!["payload_cache", "relation_index"]);
    }
}
