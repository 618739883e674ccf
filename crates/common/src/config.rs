use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum time between two recomputations of a progressive operator.
    pub update_interval_ms: u64,
    /// Tuples buffered by batch-partial operators before emitting a batch.
    pub partial_batch_size: usize,
    /// Workers assigned to operators that can run in parallel.
    pub default_workers: usize,
    /// Connector backlog size that triggers a warning.
    pub connector_buffer_warn_rows: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 500,
            partial_batch_size: 100,
            default_workers: 2,
            connector_buffer_warn_rows: 64 * 1024,
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with `TEXTFLOW_*` environment variables.
    ///
    /// Unparsable values are ignored; counts are clamped to at least 1.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_parse::<u64>("TEXTFLOW_UPDATE_INTERVAL_MS") {
            cfg.update_interval_ms = v;
        }
        if let Some(v) = env_parse::<usize>("TEXTFLOW_PARTIAL_BATCH_SIZE") {
            cfg.partial_batch_size = v.max(1);
        }
        if let Some(v) = env_parse::<usize>("TEXTFLOW_DEFAULT_WORKERS") {
            cfg.default_workers = v.max(1);
        }
        if let Some(v) = env_parse::<usize>("TEXTFLOW_CONNECTOR_BUFFER_WARN_ROWS") {
            cfg.connector_buffer_warn_rows = v.max(1);
        }
        cfg
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}
