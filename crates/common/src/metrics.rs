use std::sync::{Arc, OnceLock};

use prometheus::{
    CounterVec, Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};

/// Shared metrics registry for the analysis pipeline.
///
/// Observational only: nothing recorded here feeds back into advisor
/// outputs, so determinism of responses is unaffected.
#[derive(Clone, Debug)]
pub struct MetricsRegistry {
    inner: Arc<MetricsInner>,
}

#[derive(Debug)]
struct MetricsInner {
    registry: Registry,
    analyses_total: IntCounterVec,
    suggestions_total: CounterVec,
    gateway_failures_total: IntCounterVec,
    whatif_trials_total: IntCounter,
    whatif_trial_failures_total: IntCounter,
    whatif_filtered_total: IntCounter,
    whatif_trial_seconds: HistogramVec,
    analysis_seconds: HistogramVec,
}

impl MetricsRegistry {
    /// Build an empty registry with all metric families registered.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::new()),
        }
    }

    /// Count one inbound operation (`lint`, `explain`, `optimize`, `workload`).
    pub fn record_analysis(&self, operation: &str, secs: f64) {
        self.inner
            .analyses_total
            .with_label_values(&[operation])
            .inc();
        self.inner
            .analysis_seconds
            .with_label_values(&[operation])
            .observe(secs.max(0.0));
    }

    /// Count emitted suggestions by kind (`rewrite` or `index`).
    pub fn record_suggestions(&self, kind: &str, count: usize) {
        self.inner
            .suggestions_total
            .with_label_values(&[kind])
            .inc_by(count as f64);
    }

    /// Count a degraded planner call by failure kind (`timeout`, `transport`, `unavailable`).
    pub fn record_gateway_failure(&self, kind: &str) {
        self.inner
            .gateway_failures_total
            .with_label_values(&[kind])
            .inc();
    }

    /// Record one completed hypothetical-index trial.
    pub fn observe_whatif_trial(&self, outcome: &str, secs: f64) {
        self.inner.whatif_trials_total.inc();
        if outcome != "ok" {
            self.inner.whatif_trial_failures_total.inc();
        }
        self.inner
            .whatif_trial_seconds
            .with_label_values(&[outcome])
            .observe(secs.max(0.0));
    }

    /// Count suggestions dropped by the minimum cost-reduction gate.
    pub fn count_whatif_filtered(&self, n: usize) {
        self.inner.whatif_filtered_total.inc_by(n as u64);
    }

    /// Render the registry in the Prometheus text exposition format.
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

        let analyses_total = int_counter_vec(
            &registry,
            "pglens_analyses_total",
            "Inbound operations served",
            &["operation"],
        );
        let suggestions_total = counter_vec(
            &registry,
            "pglens_suggestions_total",
            "Suggestions emitted by kind",
            &["kind"],
        );
        let gateway_failures_total = int_counter_vec(
            &registry,
            "pglens_gateway_failures_total",
            "Planner gateway calls degraded by failure kind",
            &["kind"],
        );
        let whatif_trials_total = int_counter(
            &registry,
            "pglens_whatif_trials_total",
            "Hypothetical-index trials started",
        );
        let whatif_trial_failures_total = int_counter(
            &registry,
            "pglens_whatif_trial_failures_total",
            "Hypothetical-index trials that failed",
        );
        let whatif_filtered_total = int_counter(
            &registry,
            "pglens_whatif_filtered_total",
            "Index suggestions dropped by the cost-reduction gate",
        );
        let whatif_trial_seconds = histogram_vec(
            &registry,
            "pglens_whatif_trial_seconds",
            "Hypothetical-index trial latency",
            &["outcome"],
        );
        let analysis_seconds = histogram_vec(
            &registry,
            "pglens_analysis_seconds",
            "Inbound operation latency",
            &["operation"],
        );

        Self {
            registry,
            analyses_total,
            suggestions_total,
            gateway_failures_total,
            whatif_trials_total,
            whatif_trial_failures_total,
            whatif_filtered_total,
            whatif_trial_seconds,
            analysis_seconds,
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

fn int_counter_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> IntCounterVec {
    let c = IntCounterVec::new(Opts::new(name, help), labels).expect("int counter vec");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn int_counter(registry: &Registry, name: &str, help: &str) -> IntCounter {
    let c = IntCounter::new(name, help).expect("int counter");
    registry
        .register(Box::new(c.clone()))
        .expect("register counter");
    c
}

fn histogram_vec(registry: &Registry, name: &str, help: &str, labels: &[&str]) -> HistogramVec {
    let h = HistogramVec::new(HistogramOpts::new(name, help), labels).expect("histogram vec");
    registry
        .register(Box::new(h.clone()))
        .expect("register histogram");
    h
}

static GLOBAL_METRICS: OnceLock<MetricsRegistry> = OnceLock::new();

/// Process-wide registry for callers that do not thread their own through.
pub fn global_metrics() -> &'static MetricsRegistry {
    GLOBAL_METRICS.get_or_init(MetricsRegistry::new)
}

#[cfg(test)]
mod tests {
    use super::MetricsRegistry;

    #[test]
    fn renders_prometheus_text() {
        let m = MetricsRegistry::new();
        m.record_analysis("optimize", 0.02);
        m.record_suggestions("index", 3);
        let text = m.render_prometheus();
        assert!(text.contains("pglens_analyses_total"));
        assert!(text.contains("pglens_suggestions_total"));
    }

    #[test]
    fn renders_all_metric_families() {
        let m = MetricsRegistry::new();
        m.record_analysis("lint", 0.001);
        m.record_gateway_failure("timeout");
        m.observe_whatif_trial("ok", 0.05);
        m.observe_whatif_trial("failed", 0.01);
        m.count_whatif_filtered(2);
        let text = m.render_prometheus();

        assert!(text.contains("pglens_gateway_failures_total"));
        assert!(text.contains("pglens_whatif_trials_total"));
        assert!(text.contains("pglens_whatif_trial_failures_total"));
        assert!(text.contains("pglens_whatif_filtered_total"));
        assert!(text.contains("pglens_whatif_trial_seconds"));
        assert!(text.contains("pglens_analysis_seconds"));
    }
}
