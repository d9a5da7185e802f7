use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineKind {
    PayloadCache,
    SpendHistory,
    RelationIndex,
}

impl PipelineKind {
    pub const ALL: [PipelineKind; 3] = [
        PipelineKind::PayloadCache,
        PipelineKind::SpendHistory,
        PipelineKind::RelationIndex,
    ];

    /// Blocks per fetch.
    pub fn default_chunk_size(&self) -> i64 {
        match self {
            PipelineKind::PayloadCache => 5000,
            PipelineKind::SpendHistory | PipelineKind::RelationIndex => 100,
        }
    }

    pub fn default_batch_size(&self) -> usize {
        match self {
            PipelineKind::PayloadCache => 5000,
            PipelineKind::SpendHistory | PipelineKind::RelationIndex => 1000,
        }
    }
}

impl fmt::Display for PipelineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineKind::PayloadCache => "payload_cache",
            PipelineKind::SpendHistory => "spend_history",
            PipelineKind::RelationIndex => "relation_index",
        };
        f.write_str(name)
    }
}

/// Per-pipeline overrides. Unset fields fall back to the pipeline's defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelineConfig {
    pub enabled: Option<bool>,
    pub chunk_size: Option<i64>,
    pub batch_size: Option<usize>,
}

impl PipelineConfig {
    pub fn is_enabled(&self) -> bool {
        self.enabled.unwrap_or(true)
    }

    pub fn chunk_size(&self, kind: PipelineKind) -> i64 {
        self.chunk_size
            .filter(|n| *n > 0)
            .unwrap_or_else(|| kind.default_chunk_size())
    }

    pub fn batch_size(&self, kind: PipelineKind) -> usize {
        self.batch_size
            .filter(|n| *n > 0)
            .unwrap_or_else(|| kind.default_batch_size())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PipelinesConfig {
    #[serde(default)]
    pub payload_cache: PipelineConfig,
    #[serde(default)]
    pub spend_history: PipelineConfig,
    #[serde(default)]
    pub relation_index: PipelineConfig,
}

impl PipelinesConfig {
    pub fn get(&self, kind: PipelineKind) -> &PipelineConfig {
        match kind {
            PipelineKind::PayloadCache => &self.payload_cache,
            PipelineKind::SpendHistory => &self.spend_history,
            PipelineKind::RelationIndex => &self.relation_index,
        }
    }
}
