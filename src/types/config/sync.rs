use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::types::config::pipeline::PipelinesConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Env var holding the connection string of the derived-table database.
    #[serde(default = "default_database_url_env_var")]
    pub database_url_env_var: String,

    /// Env var for the ledger database when it is not the derived one.
    #[serde(default)]
    pub ledger_database_url_env_var: Option<String>,

    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Seconds between in-process triggers; 0 means only the startup pass.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default)]
    pub pipelines: PipelinesConfig,
}

fn default_database_url_env_var() -> String {
    "DATABASE_URL".to_string()
}

fn default_pool_size() -> usize {
    16
}

fn default_poll_interval_secs() -> u64 {
    10
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            database_url_env_var: default_database_url_env_var(),
            ledger_database_url_env_var: None,
            pool_size: default_pool_size(),
            poll_interval_secs: default_poll_interval_secs(),
            pipelines: PipelinesConfig::default(),
        }
    }
}

impl SyncConfig {
    /// Load the config file, or defaults when it does not exist.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        if !path.exists() {
            tracing::info!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file at {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file at {}", path.display()))
    }

    /// Env var naming the ledger database, falling back to the derived one.
    pub fn ledger_url_env_var(&self) -> &str {
        self.ledger_database_url_env_var
            .as_deref()
            .unwrap_or(&self.database_url_env_var)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::config::pipeline::PipelineKind;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: SyncConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.database_url_env_var, "DATABASE_URL");
        assert_eq!(config.ledger_url_env_var(), "DATABASE_URL");
        assert_eq!(config.pool_size, 16);

        let payload = config.pipelines.get(PipelineKind::PayloadCache);
        assert!(payload.is_enabled());
        assert_eq!(payload.chunk_size(PipelineKind::PayloadCache), 5000);
        let spend = config.pipelines.get(PipelineKind::SpendHistory);
        assert_eq!(spend.chunk_size(PipelineKind::SpendHistory), 100);
        assert_eq!(spend.batch_size(PipelineKind::SpendHistory), 1000);
    }

    #[test]
    fn test_pipeline_overrides() {
        let config: SyncConfig = serde_json::from_str(
            r#"{
                "ledger_database_url_env_var": "LEDGER_DATABASE_URL",
                "poll_interval_secs": 0,
                "pipelines": {
                    "relation_index": { "chunk_size": 25, "batch_size": 0 },
                    "payload_cache": { "enabled": false }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.ledger_url_env_var(), "LEDGER_DATABASE_URL");
        assert_eq!(config.poll_interval_secs, 0);
        assert!(!config.pipelines.payload_cache.is_enabled());

        let relation = config.pipelines.get(PipelineKind::RelationIndex);
        assert_eq!(relation.chunk_size(PipelineKind::RelationIndex), 25);
        assert_eq!(relation.batch_size(PipelineKind::RelationIndex), 1000);
    }

    #[test]
    fn test_missing_file_is_default() {
        let config = SyncConfig::load(Path::new("does/not/exist.json")).unwrap();
        assert_eq!(config.poll_interval_secs, 10);
    }
}
