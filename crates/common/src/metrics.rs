use std::sync::{Arc, OnceLock};

use prometheus::{
    CounterVec, Encoder, GaugeVec, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder,
};

#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    operator_rows_in: CounterVec,
    operator_rows_out: CounterVec,
    operator_process_seconds: HistogramVec,
    connector_buffered_rows: GaugeVec,
    run_failures: CounterVec,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    /// Record one `process` call of an operator executor.
    pub fn record_operator(
        &self,
        operator: &str,
        kind: &str,
        rows_in: u64,
        rows_out: u64,
        secs: f64,
    ) {
        let labels = [operator, kind];
        self.inner
            .operator_rows_in
            .with_label_values(&labels)
            .inc_by(rows_in as f64);
        self.inner
            .operator_rows_out
            .with_label_values(&labels)
            .inc_by(rows_out as f64);
        self.inner
            .operator_process_seconds
            .with_label_values(&labels)
            .observe(secs.max(0.0));
    }

    pub fn set_connector_buffered_rows(&self, producer: &str, rows: usize) {
        self.inner
            .connector_buffered_rows
            .with_label_values(&[producer])
            .set(rows as f64);
    }

    pub fn inc_run_failures(&self, error_kind: &str) {
        self.inner
            .run_failures
            .with_label_values(&[error_kind])
            .inc();
    }

    pub fn render_prometheus(&self) -> String {
        let metric_families = self.inner.registry.gather();
        let mut out = Vec::new();
        let enc = TextEncoder::new();
        if enc.encode(&metric_families, &mut out).is_err() {
            return String::new();
        }
        String::from_utf8_lossy(&out).to_string()
    }
}

impl Default for MetricsRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsInner {
    fn new() -> Self {
        let registry = Registry::new();

        let operator_rows_in = counter_vec(
            &registry,
            "textflow_operator_rows_in_total",
            "Input tuples delivered to each operator",
            &["operator", "kind"],
        );
        let operator_rows_out = counter_vec(
            &registry,
            "textflow_operator_rows_out_total",
            "Output tuples produced by each operator",
            &["operator", "kind"],
        );
        let operator_process_seconds = histogram_vec(
            &registry,
            "textflow_operator_process_seconds",
            "Time spent in each process call",
            &["operator", "kind"],
        );
        let connector_buffered_rows = gauge_vec(
            &registry,
            "textflow_connector_buffered_rows",
            "Tuples buffered in a fan-out connector",
            &["producer"],
        );
        let run_failures = counter_vec(
            &registry,
            "textflow_run_failures_total",
            "Workflow runs aborted by an error",
            &["error_kind"],
        );

        Self {
            registry,
            operator_rows_in,
            operator_rows_out,
            operator_process_seconds,
            connector_buffered_rows,
            run_failures,
        }
    }
}

fn counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> CounterVec {
    let c = CounterVec::new(Opts::new(name, help), labels).expect("counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn gauge_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> GaugeVec {
    let g = GaugeVec::new(Opts::new(name, help), labels).expect("gauge vec");
    registry
        .register(Box::new(g.clone()))
        .expect("register gauge");
    g
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;

    #[test]
    fn renders_operator_and_connector_families() {
        let m = MetricsRegistry::new();
        m.record_operator("regex", "RegexMatcher", 10, 4, 0.01);
        m.set_connector_buffered_rows("keyword source", 3);
        m.inc_run_failures("field_type");
        let text = m.render_prometheus();

        assert!(text.contains("textflow_operator_rows_in_total"));
        assert!(text.contains("textflow_operator_rows_out_total"));
        assert!(text.contains("textflow_operator_process_seconds"));
        assert!(text.contains("textflow_connector_buffered_rows"));
        assert!(text.contains("textflow_run_failures_total"));
        assert!(text.contains("RegexMatcher"));
    }
}
