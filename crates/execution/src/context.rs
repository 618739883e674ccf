//! Services shared by the executors of one run.

use std::sync::Arc;
use std::time::Duration;

use textflow_common::{global_metrics, EngineConfig, MetricsRegistry};

use crate::catalog::{MemoryCatalog, TableProvider};

/// Runtime services shared by every executor of one run.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Engine tuning knobs.
    pub config: EngineConfig,
    /// Metrics sink.
    pub metrics: MetricsRegistry,
    /// Tables for source operators.
    pub catalog: Arc<dyn TableProvider>,
}

impl ExecutionContext {
    /// Context over `catalog` with default config and the global metrics registry.
    pub fn new(catalog: Arc<dyn TableProvider>) -> Self {
        Self {
            config: EngineConfig::default(),
            metrics: global_metrics().clone(),
            catalog,
        }
    }

    /// Replace the engine config.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Replace the metrics registry.
    pub fn with_metrics(mut self, metrics: MetricsRegistry) -> Self {
        self.metrics = metrics;
        self
    }

    /// Debounce interval for progressive operators.
    pub fn update_interval(&self) -> Duration {
        Duration::from_millis(self.config.update_interval_ms)
    }
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self::new(Arc::new(MemoryCatalog::new()))
    }
}

impl std::fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
