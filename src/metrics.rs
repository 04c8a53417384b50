//! Metrics collection and export module

use prometheus::{
    Encoder, Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
    TextEncoder,
};
use std::time::Instant;

/// Marketplace client metrics on a private registry
#[derive(Clone)]
pub struct MarketMetrics {
    registry: Registry,

    // Counters
    pub assemblies_total: IntCounterVec,
    pub assemblies_failed: IntCounterVec,
    pub bootstrap_instructions: IntCounter,
    pub scan_records_seen: IntCounterVec,
    pub scan_records_dropped: IntCounterVec,

    // Histograms
    pub ledger_latency: HistogramVec,
    pub build_latency: Histogram,
}

impl MarketMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let assemblies_total = IntCounterVec::new(
            Opts::new(
                "market_assemblies_total",
                "Instruction bundles requested, by operation",
            ),
            &["operation"],
        )?;

        let assemblies_failed = IntCounterVec::new(
            Opts::new(
                "market_assemblies_failed",
                "Instruction bundles that failed to assemble, by operation and error category",
            ),
            &["operation", "category"],
        )?;

        let bootstrap_instructions = IntCounter::with_opts(Opts::new(
            "market_bootstrap_instructions",
            "Token account creation instructions prepended to bundles",
        ))?;

        let scan_records_seen = IntCounterVec::new(
            Opts::new("market_scan_records_seen", "Accounts returned by scans"),
            &["kind"],
        )?;

        let scan_records_dropped = IntCounterVec::new(
            Opts::new(
                "market_scan_records_dropped",
                "Scanned accounts dropped because they failed to decode",
            ),
            &["kind"],
        )?;

        let ledger_latency = HistogramVec::new(
            HistogramOpts::new("market_ledger_latency_seconds", "Ledger query latency")
                .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 5.0]),
            &["method"],
        )?;

        let build_latency = Histogram::with_opts(
            HistogramOpts::new("market_build_latency_seconds", "Bundle assembly latency")
                .buckets(vec![0.001, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0]),
        )?;

        registry.register(Box::new(assemblies_total.clone()))?;
        registry.register(Box::new(assemblies_failed.clone()))?;
        registry.register(Box::new(bootstrap_instructions.clone()))?;
        registry.register(Box::new(scan_records_seen.clone()))?;
        registry.register(Box::new(scan_records_dropped.clone()))?;
        registry.register(Box::new(ledger_latency.clone()))?;
        registry.register(Box::new(build_latency.clone()))?;

        Ok(Self {
            registry,
            assemblies_total,
            assemblies_failed,
            bootstrap_instructions,
            scan_records_seen,
            scan_records_dropped,
            ledger_latency,
            build_latency,
        })
    }

    /// Get the registry for exporting
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Prometheus text exposition of every registered metric
    pub fn render(&self) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        Ok(String::from_utf8(buf)?)
    }

    pub fn record_scan(&self, kind: &str, seen: usize, dropped: usize) {
        self.scan_records_seen
            .with_label_values(&[kind])
            .inc_by(seen as u64);
        self.scan_records_dropped
            .with_label_values(&[kind])
            .inc_by(dropped as u64);
    }

    pub fn observe_ledger(&self, method: &str, timer: &Timer) {
        self.ledger_latency
            .with_label_values(&[method])
            .observe(timer.elapsed_secs());
    }
}

impl std::fmt::Debug for MarketMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MarketMetrics").finish_non_exhaustive()
    }
}

/// Timer helper for measuring operation duration
#[derive(Debug, Clone, Copy)]
pub struct Timer {
    start: Instant,
}

impl Timer {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    pub fn observe_duration(&self, histogram: &Histogram) {
        histogram.observe(self.elapsed_secs());
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

impl Default for Timer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_register_and_render() {
        let metrics = MarketMetrics::new().unwrap();
        metrics
            .assemblies_total
            .with_label_values(&["purchase"])
            .inc();
        metrics.bootstrap_instructions.inc_by(2);
        metrics.record_scan("SellData", 5, 1);

        let text = metrics.render().unwrap();
        assert!(text.contains("market_assemblies_total{operation=\"purchase\"} 1"));
        assert!(text.contains("market_bootstrap_instructions 2"));
        assert!(text.contains("market_scan_records_dropped{kind=\"SellData\"} 1"));
    }

    #[test]
    fn test_independent_registries() {
        // Two clients in one process must not collide on registration
        let a = MarketMetrics::new().unwrap();
        let b = MarketMetrics::new().unwrap();
        a.bootstrap_instructions.inc();
        assert_eq!(b.bootstrap_instructions.get(), 0);
    }

    #[test]
    fn test_timer_observes() {
        let metrics = MarketMetrics::new().unwrap();
        let timer = Timer::new();
        timer.observe_duration(&metrics.build_latency);
        metrics.observe_ledger("get_account_data", &timer);
        assert_eq!(metrics.build_latency.get_sample_count(), 1);
        assert_eq!(
            metrics
                .ledger_latency
                .with_label_values(&["get_account_data"])
                .get_sample_count(),
            1
        );
    }
}
