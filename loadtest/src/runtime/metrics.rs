//! Process-wide metric registry shared by all virtual users
//!
//! Observations are append-only. Each named series lives in a `DashMap`
//! shard so concurrent VUs only contend when they hit the same metric.
//! Every observation is also forwarded to the `metrics` facade so an
//! embedding process can install its own recorder.

use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::warn;

/// Built-in metric names recorded by the runtime
pub mod builtin {
    pub const HTTP_REQS: &str = "http_reqs";
    pub const HTTP_REQ_DURATION: &str = "http_req_duration";
    pub const HTTP_REQ_FAILED: &str = "http_req_failed";
    pub const CHECKS: &str = "checks";
    pub const ITERATIONS: &str = "iterations";
    pub const ITERATION_DURATION: &str = "iteration_duration";
    pub const VUS: &str = "vus";
    pub const VUS_MAX: &str = "vus_max";
}

/// Kind of a metric series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Counter,
    Gauge,
    Rate,
    Trend,
}

#[derive(Debug, Clone)]
enum Series {
    Counter { sum: f64 },
    Gauge { last: f64, min: f64, max: f64 },
    Rate { nonzero: u64, total: u64 },
    Trend { samples: Vec<f64> },
}

impl Series {
    fn kind(&self) -> MetricKind {
        match self {
            Series::Counter { .. } => MetricKind::Counter,
            Series::Gauge { .. } => MetricKind::Gauge,
            Series::Rate { .. } => MetricKind::Rate,
            Series::Trend { .. } => MetricKind::Trend,
        }
    }

    fn empty(kind: MetricKind) -> Self {
        match kind {
            MetricKind::Counter => Series::Counter { sum: 0.0 },
            MetricKind::Gauge => Series::Gauge {
                last: 0.0,
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            MetricKind::Rate => Series::Rate {
                nonzero: 0,
                total: 0,
            },
            MetricKind::Trend => Series::Trend {
                samples: Vec::new(),
            },
        }
    }

    fn observe(&mut self, value: f64) {
        match self {
            Series::Counter { sum } => *sum += value,
            Series::Gauge { last, min, max } => {
                *last = value;
                *min = min.min(value);
                *max = max.max(value);
            }
            Series::Rate { nonzero, total } => {
                *total += 1;
                if value != 0.0 {
                    *nonzero += 1;
                }
            }
            Series::Trend { samples } => samples.push(value),
        }
    }

    fn values(&self) -> MetricValues {
        match self {
            Series::Counter { sum } => MetricValues::Counter { count: *sum },
            Series::Gauge { last, min, max } => MetricValues::Gauge {
                value: *last,
                min: *min,
                max: *max,
            },
            Series::Rate { nonzero, total } => MetricValues::Rate {
                passes: *nonzero,
                fails: total - nonzero,
            },
            Series::Trend { samples } => MetricValues::Trend(TrendValues::new(samples.clone())),
        }
    }
}

/// Sorted samples of a trend with summary statistics
#[derive(Debug, Clone, PartialEq)]
pub struct TrendValues {
    sorted: Vec<f64>,
}

impl TrendValues {
    pub fn new(mut samples: Vec<f64>) -> Self {
        samples.sort_by(f64::total_cmp);
        Self { sorted: samples }
    }

    pub fn count(&self) -> usize {
        self.sorted.len()
    }

    pub fn avg(&self) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        Some(self.sorted.iter().sum::<f64>() / self.sorted.len() as f64)
    }

    pub fn min(&self) -> Option<f64> {
        self.sorted.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.sorted.last().copied()
    }

    pub fn med(&self) -> Option<f64> {
        self.percentile(50.0)
    }

    /// Percentile (0-100) with linear interpolation between closest ranks
    pub fn percentile(&self, p: f64) -> Option<f64> {
        if self.sorted.is_empty() {
            return None;
        }
        let p = p.clamp(0.0, 100.0);
        let rank = (p / 100.0) * (self.sorted.len() - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = rank.ceil() as usize;
        let weight = rank - lower as f64;
        Some(self.sorted[lower] + (self.sorted[upper] - self.sorted[lower]) * weight)
    }
}

/// Aggregated view of a single series
#[derive(Debug, Clone, PartialEq)]
pub enum MetricValues {
    Counter { count: f64 },
    Gauge { value: f64, min: f64, max: f64 },
    Rate { passes: u64, fails: u64 },
    Trend(TrendValues),
}

impl MetricValues {
    /// Fraction of non-zero observations, for rates
    pub fn rate(&self) -> Option<f64> {
        match self {
            MetricValues::Rate { passes, fails } => {
                let total = passes + fails;
                Some(if total == 0 {
                    0.0
                } else {
                    *passes as f64 / total as f64
                })
            }
            _ => None,
        }
    }

    /// Named aggregates used by the summary and the JSON export.
    ///
    /// `elapsed` turns counters into per-second rates.
    pub fn summary_fields(&self, elapsed: Duration) -> Vec<(String, f64)> {
        match self {
            MetricValues::Counter { count } => {
                let secs = elapsed.as_secs_f64();
                let per_sec = if secs > 0.0 { count / secs } else { 0.0 };
                vec![("count".into(), *count), ("rate".into(), per_sec)]
            }
            MetricValues::Gauge { value, min, max } => vec![
                ("value".into(), *value),
                ("min".into(), *min),
                ("max".into(), *max),
            ],
            MetricValues::Rate { passes, fails } => vec![
                ("rate".into(), self.rate().unwrap_or(0.0)),
                ("passes".into(), *passes as f64),
                ("fails".into(), *fails as f64),
            ],
            MetricValues::Trend(trend) => {
                let fields = [
                    ("avg", trend.avg()),
                    ("min", trend.min()),
                    ("med", trend.med()),
                    ("max", trend.max()),
                    ("p(90)", trend.percentile(90.0)),
                    ("p(95)", trend.percentile(95.0)),
                    ("count", Some(trend.count() as f64)),
                ];
                fields
                    .into_iter()
                    .filter_map(|(name, v)| v.map(|v| (name.to_string(), v)))
                    .collect()
            }
        }
    }
}

/// Snapshot of one named series
#[derive(Debug, Clone)]
pub struct MetricSnapshot {
    pub name: String,
    pub kind: MetricKind,
    pub values: MetricValues,
}

/// Pass/fail tally for a named check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckTally {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
    #[serde(skip)]
    order: u64,
}

/// Thread-safe registry of all metric series and check tallies for a run
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    series: DashMap<String, Series>,
    checks: DashMap<String, CheckTally>,
    check_order: AtomicU64,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn observe(&self, name: &str, kind: MetricKind, value: f64) {
        if let Some(mut series) = self.series.get_mut(name) {
            if series.kind() != kind {
                warn!(
                    "Metric '{}' is a {:?}, ignoring {:?} observation",
                    name,
                    series.kind(),
                    kind
                );
                return;
            }
            series.observe(value);
            return;
        }

        self.series
            .entry(name.to_string())
            .or_insert_with(|| Series::empty(kind))
            .observe(value);
    }

    /// Add `value` to a counter. Counters only take whole increments.
    pub fn add_counter(&self, name: &str, value: u64) {
        self.observe(name, MetricKind::Counter, value as f64);
        metrics::counter!("chatload_counter", "metric" => name.to_string()).increment(value);
    }

    /// Set a gauge to `value`
    pub fn set_gauge(&self, name: &str, value: f64) {
        self.observe(name, MetricKind::Gauge, value);
        metrics::gauge!("chatload_gauge", "metric" => name.to_string()).set(value);
    }

    /// Add a boolean observation to a rate
    pub fn add_rate(&self, name: &str, hit: bool) {
        self.observe(name, MetricKind::Rate, if hit { 1.0 } else { 0.0 });
        metrics::counter!(
            "chatload_rate_total",
            "metric" => name.to_string(),
            "hit" => if hit { "true" } else { "false" }
        )
        .increment(1);
    }

    /// Add a sample to a trend
    pub fn add_trend(&self, name: &str, value: f64) {
        self.observe(name, MetricKind::Trend, value);
        metrics::histogram!("chatload_trend", "metric" => name.to_string()).record(value);
    }

    /// Record the outcome of a named check into its tally and the `checks` rate
    pub fn record_check(&self, name: &str, passed: bool) {
        if let Some(mut tally) = self.checks.get_mut(name) {
            if passed {
                tally.passes += 1;
            } else {
                tally.fails += 1;
            }
        } else {
            let order = self.check_order.fetch_add(1, Ordering::Relaxed);
            let mut tally = self
                .checks
                .entry(name.to_string())
                .or_insert_with(|| CheckTally {
                    name: name.to_string(),
                    passes: 0,
                    fails: 0,
                    order,
                });
            if passed {
                tally.passes += 1;
            } else {
                tally.fails += 1;
            }
        }
        self.add_rate(builtin::CHECKS, passed);
    }

    /// Current values of one series
    pub fn get(&self, name: &str) -> Option<MetricValues> {
        self.series.get(name).map(|s| s.values())
    }

    /// `(passes, fails)` of a rate series
    pub fn rate_counts(&self, name: &str) -> Option<(u64, u64)> {
        match self.get(name)? {
            MetricValues::Rate { passes, fails } => Some((passes, fails)),
            _ => None,
        }
    }

    /// All series, sorted by name
    pub fn snapshot(&self) -> Vec<MetricSnapshot> {
        let mut snapshots: Vec<MetricSnapshot> = self
            .series
            .iter()
            .map(|entry| MetricSnapshot {
                name: entry.key().clone(),
                kind: entry.value().kind(),
                values: entry.value().values(),
            })
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }

    /// Check tallies in the order checks were first seen
    pub fn checks(&self) -> Vec<CheckTally> {
        let mut checks: Vec<CheckTally> = self.checks.iter().map(|e| e.value().clone()).collect();
        checks.sort_by_key(|c| c.order);
        checks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_trend_percentiles_interpolate() {
        let trend = TrendValues::new(vec![40.0, 10.0, 30.0, 20.0]);
        assert_eq!(trend.count(), 4);
        assert_eq!(trend.min(), Some(10.0));
        assert_eq!(trend.max(), Some(40.0));
        assert_eq!(trend.avg(), Some(25.0));
        assert_eq!(trend.med(), Some(25.0));
        assert_eq!(trend.percentile(100.0), Some(40.0));
        assert_eq!(trend.percentile(0.0), Some(10.0));
    }

    #[test]
    fn test_trend_percentile_of_100_samples() {
        let trend = TrendValues::new((1..=100).map(f64::from).collect());
        let p95 = trend.percentile(95.0).unwrap();
        assert!((p95 - 95.05).abs() < 1e-9);
    }

    #[test]
    fn test_empty_trend_has_no_stats() {
        let trend = TrendValues::new(Vec::new());
        assert_eq!(trend.avg(), None);
        assert_eq!(trend.percentile(95.0), None);
    }

    #[test]
    fn test_rate_counts_nonzero_observations() {
        let registry = MetricsRegistry::new();
        registry.add_rate("errors", false);
        registry.add_rate("errors", true);
        registry.add_rate("errors", false);
        registry.add_rate("errors", false);

        assert_eq!(registry.rate_counts("errors"), Some((1, 3)));
        assert_eq!(registry.get("errors").unwrap().rate(), Some(0.25));
    }

    #[test]
    fn test_kind_mismatch_is_ignored() {
        let registry = MetricsRegistry::new();
        registry.add_trend("latency", 5.0);
        registry.add_rate("latency", true);

        match registry.get("latency").unwrap() {
            MetricValues::Trend(trend) => assert_eq!(trend.count(), 1),
            other => panic!("expected trend, got {:?}", other),
        }
        assert_eq!(registry.rate_counts("latency"), None);
    }

    #[test]
    fn test_checks_keep_first_seen_order() {
        let registry = MetricsRegistry::new();
        registry.record_check("b", true);
        registry.record_check("a", false);
        registry.record_check("b", false);

        let checks = registry.checks();
        assert_eq!(checks.len(), 2);
        assert_eq!(checks[0].name, "b");
        assert_eq!((checks[0].passes, checks[0].fails), (1, 1));
        assert_eq!(checks[1].name, "a");
        assert_eq!(registry.rate_counts(builtin::CHECKS), Some((1, 2)));
    }

    #[test]
    fn test_counter_and_gauge_summary_fields() {
        let registry = MetricsRegistry::new();
        registry.add_counter("http_reqs", 1);
        registry.add_counter("http_reqs", 1);
        registry.set_gauge("vus", 3.0);
        registry.set_gauge("vus", 1.0);

        let fields = registry
            .get("http_reqs")
            .unwrap()
            .summary_fields(Duration::from_secs(2));
        assert_eq!(
            fields,
            vec![("count".to_string(), 2.0), ("rate".to_string(), 1.0)]
        );

        match registry.get("vus").unwrap() {
            MetricValues::Gauge { value, min, max } => {
                assert_eq!((value, min, max), (1.0, 1.0, 3.0));
            }
            other => panic!("expected gauge, got {:?}", other),
        }
    }

    #[test]
    fn test_counter_sums_whole_increments() {
        let registry = MetricsRegistry::new();
        registry.add_counter("bytes_sent", 3);
        registry.add_counter("bytes_sent", 4);

        match registry.get("bytes_sent").unwrap() {
            MetricValues::Counter { count } => assert_eq!(count, 7.0),
            other => panic!("expected counter, got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_is_sorted() {
        let registry = MetricsRegistry::new();
        registry.add_counter("zeta", 1);
        registry.add_counter("alpha", 1);
        let names: Vec<String> = registry.snapshot().into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_concurrent_observations_are_not_lost() {
        let registry = Arc::new(MetricsRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..250 {
                    registry.add_trend("latency", i as f64);
                    registry.add_rate("errors", i % 50 == 0);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        match registry.get("latency").unwrap() {
            MetricValues::Trend(trend) => assert_eq!(trend.count(), 2000),
            other => panic!("expected trend, got {:?}", other),
        }
        assert_eq!(registry.rate_counts("errors"), Some((40, 1960)));
    }
}
