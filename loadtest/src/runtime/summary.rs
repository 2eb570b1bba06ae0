//! End-of-test summary: console table and JSON export

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use uuid::Uuid;

use super::executor::ExecutionStats;
use super::metrics::{CheckTally, MetricKind, MetricsRegistry};
use super::threshold::ThresholdResult;
use super::types::{EXIT_GENERIC_ERROR, EXIT_THRESHOLDS_FAILED, LoadTestError};

/// Aggregates of one metric in the report
#[derive(Debug, Clone, Serialize)]
pub struct MetricSummary {
    #[serde(rename = "type")]
    pub kind: MetricKind,
    pub values: BTreeMap<String, f64>,
    /// Fields in display order (the map above is sorted)
    #[serde(skip)]
    ordered: Vec<(String, f64)>,
}

/// Everything known about a finished run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub scenario: String,
    pub base_url: String,
    pub started_at: DateTime<Utc>,
    pub duration_secs: f64,
    pub iterations_completed: u64,
    pub iterations_failed: u64,
    pub iterations_interrupted: u64,
    pub peak_vus: u64,
    pub vus_panicked: u64,
    pub checks: Vec<CheckTally>,
    pub metrics: BTreeMap<String, MetricSummary>,
    pub thresholds: Vec<ThresholdResult>,
}

impl RunReport {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        run_id: Uuid,
        scenario: &str,
        base_url: &str,
        started_at: DateTime<Utc>,
        elapsed: Duration,
        stats: ExecutionStats,
        metrics: &MetricsRegistry,
        thresholds: Vec<ThresholdResult>,
    ) -> Self {
        let metric_summaries = metrics
            .snapshot()
            .into_iter()
            .map(|snapshot| {
                let ordered = snapshot.values.summary_fields(elapsed);
                let summary = MetricSummary {
                    kind: snapshot.kind,
                    values: ordered.iter().cloned().collect(),
                    ordered,
                };
                (snapshot.name, summary)
            })
            .collect();

        Self {
            run_id,
            scenario: scenario.to_string(),
            base_url: base_url.to_string(),
            started_at,
            duration_secs: elapsed.as_secs_f64(),
            iterations_completed: stats.iterations_completed,
            iterations_failed: stats.iterations_failed,
            iterations_interrupted: stats.iterations_interrupted,
            peak_vus: stats.peak_vus,
            vus_panicked: stats.vus_panicked,
            checks: metrics.checks(),
            metrics: metric_summaries,
            thresholds,
        }
    }

    /// True if every threshold passed (vacuously true without thresholds)
    pub fn passed(&self) -> bool {
        self.thresholds.iter().all(|t| t.passed)
    }

    /// Thresholds that were crossed
    pub fn breaches(&self) -> Vec<&ThresholdResult> {
        self.thresholds.iter().filter(|t| !t.passed).collect()
    }

    /// Process exit code for this run. Panicked VUs outrank threshold results.
    pub fn exit_code(&self) -> u8 {
        if self.vus_panicked > 0 {
            EXIT_GENERIC_ERROR
        } else if self.passed() {
            0
        } else {
            EXIT_THRESHOLDS_FAILED
        }
    }

    /// Serialize the report as pretty JSON
    pub fn to_json(&self) -> Result<String, LoadTestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write the JSON summary to `path`
    pub fn export(&self, path: &Path) -> Result<(), LoadTestError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Print the human-readable summary to stdout
    pub fn print_summary(&self) {
        println!();
        println!("═══════════════════════════════════════════════════════════════");
        println!(" SCENARIO: {} (run {})", self.scenario, self.run_id);
        println!(" Target:   {}", self.base_url);
        println!(
            " Duration: {:.1}s | Peak VUs: {} | Iterations: {} complete, {} failed, {} interrupted",
            self.duration_secs,
            self.peak_vus,
            self.iterations_completed,
            self.iterations_failed,
            self.iterations_interrupted
        );
        println!("═══════════════════════════════════════════════════════════════");

        if !self.checks.is_empty() {
            println!();
            println!(" ─── Checks ──────────────────────────────────────────────────");
            println!();
            for check in &self.checks {
                let mark = if check.fails == 0 { "✓" } else { "✗" };
                println!(
                    "   {} {:40} {:>8} passed {:>8} failed",
                    mark, check.name, check.passes, check.fails
                );
            }
        }

        println!();
        println!(" ─── Metrics ─────────────────────────────────────────────────");
        println!();
        for (name, summary) in &self.metrics {
            println!("   {:24} {}", name, format_fields(summary));
        }

        if !self.thresholds.is_empty() {
            println!();
            println!(" ─── Thresholds ──────────────────────────────────────────────");
            println!();
            for t in &self.thresholds {
                let mark = if t.passed { "✓" } else { "✗" };
                let observed = t
                    .observed
                    .map(|v| format!("{:.4}", v))
                    .unwrap_or_else(|| "no samples".to_string());
                println!(
                    "   {} {:24} {:16} observed {}",
                    mark, t.metric, t.expression, observed
                );
            }
        }

        println!();
        println!("═══════════════════════════════════════════════════════════════");
        let overall = if self.vus_panicked > 0 {
            format!("ERROR ({} VU tasks panicked)", self.vus_panicked)
        } else if self.thresholds.is_empty() {
            "DONE (no thresholds declared)".to_string()
        } else if self.passed() {
            "PASS".to_string()
        } else {
            format!("FAIL ({} thresholds crossed)", self.breaches().len())
        };
        println!(" OVERALL: {}", overall);
        println!("═══════════════════════════════════════════════════════════════");
        println!();
    }
}

fn format_fields(summary: &MetricSummary) -> String {
    summary
        .ordered
        .iter()
        .map(|(field, value)| match summary.kind {
            MetricKind::Trend if field != "count" => format!("{}={:.2}ms", field, value),
            MetricKind::Rate if field == "rate" => format!("{}={:.2}%", field, value * 100.0),
            MetricKind::Counter if field == "rate" => format!("{:.2}/s", value),
            _ => format!("{}={}", field, value),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::threshold::Threshold;

    fn report(thresholds: Vec<ThresholdResult>) -> RunReport {
        let metrics = MetricsRegistry::new();
        metrics.add_counter("http_reqs", 4);
        metrics.add_trend("http_req_duration", 10.0);
        metrics.add_trend("http_req_duration", 30.0);
        metrics.record_check("status is 200", true);

        RunReport::new(
            Uuid::new_v4(),
            "spike",
            "http://localhost:3000",
            Utc::now(),
            Duration::from_secs(2),
            ExecutionStats::default(),
            &metrics,
            thresholds,
        )
    }

    #[test]
    fn test_report_without_thresholds_passes() {
        let report = report(Vec::new());
        assert!(report.passed());
        assert_eq!(report.exit_code(), 0);
    }

    #[test]
    fn test_breached_threshold_sets_exit_code() {
        let metrics = MetricsRegistry::new();
        metrics.add_rate("http_req_failed", true);
        let result = Threshold::parse("http_req_failed", "rate<0.10")
            .unwrap()
            .evaluate(&metrics, Duration::from_secs(1));

        let report = report(vec![result]);
        assert!(!report.passed());
        assert_eq!(report.breaches().len(), 1);
        assert_eq!(report.exit_code(), EXIT_THRESHOLDS_FAILED);
    }

    #[test]
    fn test_panicked_vus_fail_the_run() {
        let metrics = MetricsRegistry::new();
        let stats = ExecutionStats {
            vus_panicked: 2,
            ..ExecutionStats::default()
        };
        let report = RunReport::new(
            Uuid::new_v4(),
            "load",
            "http://localhost:3000",
            Utc::now(),
            Duration::from_secs(1),
            stats,
            &metrics,
            Vec::new(),
        );

        assert!(report.passed());
        assert_eq!(report.exit_code(), EXIT_GENERIC_ERROR);
    }

    #[test]
    fn test_json_export_shape() {
        let report = report(Vec::new());
        let json: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(json["scenario"], "spike");
        assert_eq!(json["metrics"]["http_reqs"]["type"], "counter");
        assert_eq!(json["metrics"]["http_reqs"]["values"]["count"], 4.0);
        assert_eq!(json["metrics"]["http_reqs"]["values"]["rate"], 2.0);
        assert_eq!(json["metrics"]["http_req_duration"]["values"]["avg"], 20.0);
        assert_eq!(json["metrics"]["http_req_duration"]["values"]["count"], 2.0);
        assert_eq!(json["checks"][0]["name"], "status is 200");
        assert_eq!(json["checks"][0]["passes"], 1);
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.json");

        report(Vec::new()).export(&path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("\"run_id\""));
    }
}
