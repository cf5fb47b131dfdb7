//! Execution and performance trends (`execution-history.json`)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::engine::TrendEngine;
use super::{
    AnalysisPeriod, InsightRule, InsightType, MetricBundle, MetricKind, MetricSpec, Movement,
    Polarity, TrendAnalysis, TrendDataPoint, PASS_RATE_KEY,
};
use crate::classify::Severity;
use crate::config::TrendConfig;
use crate::results::{EnvironmentInfo, PerformanceStats, RunContext, RunSummary, TestRunResult};
use crate::stats::{clamp_percent, ratio};

pub const HISTORY_FILE: &str = "execution-history.json";

/// Execution metrics captured for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionSnapshot {
    pub summary: RunSummary,
    pub performance: PerformanceStats,
    /// Busy time / (wall clock x workers), in percent
    pub parallel_efficiency: f64,
    /// Executed tests per minute
    pub throughput: f64,
    /// Failed or timed-out runs
    pub error_count: usize,
    /// Retries per executed run
    pub retry_rate: f64,
    pub workers: usize,
    pub environment: EnvironmentInfo,
}

impl ExecutionSnapshot {
    pub fn from_results(results: &[TestRunResult], ctx: &RunContext) -> Self {
        let summary = RunSummary::from_results(results);
        let performance = PerformanceStats::from_results(results);
        let workers = ctx.workers.max(1);

        let retries: u64 = results
            .iter()
            .filter(|r| r.status.is_executed())
            .map(|r| u64::from(r.retry))
            .sum();

        Self {
            parallel_efficiency: parallel_efficiency(
                performance.total_duration_ms,
                ctx.wall_clock_ms,
                workers,
            ),
            throughput: throughput(
                summary.executed(),
                performance.total_duration_ms,
                ctx.wall_clock_ms,
                workers,
            ),
            error_count: summary.failures(),
            retry_rate: ratio(retries as f64, summary.executed() as f64),
            workers,
            environment: ctx.environment.clone(),
            summary,
            performance,
        }
    }
}

/// Share of available worker time spent running tests
///
/// Without a wall-clock measurement the run is assumed fully efficient.
pub fn parallel_efficiency(busy_ms: f64, wall_clock_ms: Option<f64>, workers: usize) -> f64 {
    match wall_clock_ms {
        Some(wall) if wall > 0.0 => {
            clamp_percent(ratio(busy_ms, wall * workers.max(1) as f64) * 100.0)
        }
        _ => 100.0,
    }
}

/// Executed tests per minute of wall clock (estimated from busy time when unknown)
pub fn throughput(
    executed: usize,
    busy_ms: f64,
    wall_clock_ms: Option<f64>,
    workers: usize,
) -> f64 {
    let elapsed_ms = match wall_clock_ms {
        Some(wall) if wall > 0.0 => wall,
        _ => busy_ms / workers.max(1) as f64,
    };
    ratio(executed as f64, elapsed_ms / 60_000.0)
}

static EXECUTION_SPECS: [MetricSpec; 8] = [
    MetricSpec::percentage(
        PASS_RATE_KEY,
        "Pass rate",
        Polarity::HigherIsBetter,
        MetricKind::Stability,
    ),
    MetricSpec::non_negative(
        "total_duration_ms",
        "Total test time",
        Polarity::LowerIsBetter,
        MetricKind::Performance,
    ),
    MetricSpec::non_negative(
        "average_duration_ms",
        "Average test duration",
        Polarity::LowerIsBetter,
        MetricKind::Performance,
    ),
    MetricSpec::non_negative(
        "p95_duration_ms",
        "95th percentile duration",
        Polarity::LowerIsBetter,
        MetricKind::Performance,
    ),
    MetricSpec::percentage(
        "parallel_efficiency",
        "Parallel efficiency",
        Polarity::HigherIsBetter,
        MetricKind::Performance,
    ),
    MetricSpec::non_negative(
        "throughput",
        "Throughput",
        Polarity::HigherIsBetter,
        MetricKind::Performance,
    ),
    MetricSpec::non_negative(
        "error_count",
        "Failing tests",
        Polarity::LowerIsBetter,
        MetricKind::Stability,
    ),
    MetricSpec::non_negative(
        "retry_rate",
        "Retry rate",
        Polarity::LowerIsBetter,
        MetricKind::Stability,
    ),
];

impl MetricBundle for ExecutionSnapshot {
    fn specs() -> &'static [MetricSpec] {
        &EXECUTION_SPECS
    }

    fn value(&self, key: &str) -> Option<f64> {
        let value = match key {
            PASS_RATE_KEY => self.summary.pass_rate,
            "total_duration_ms" => self.performance.total_duration_ms,
            "average_duration_ms" => self.performance.average_duration_ms,
            "p95_duration_ms" => self.performance.p95_duration_ms,
            "parallel_efficiency" => self.parallel_efficiency,
            "throughput" => self.throughput,
            "error_count" => self.error_count as f64,
            "retry_rate" => self.retry_rate,
            _ => return None,
        };
        Some(value)
    }
}

const EXECUTION_RULES: &[InsightRule] = &[
    InsightRule {
        metric: "total_duration_ms",
        movement: Movement::Rise,
        threshold_percent: 20.0,
        insight_type: InsightType::Performance,
        severity: Severity::High,
        title: "Suite duration increased",
        impact: "CI feedback takes longer on every change",
    },
    InsightRule {
        metric: "total_duration_ms",
        movement: Movement::Fall,
        threshold_percent: 20.0,
        insight_type: InsightType::Improvement,
        severity: Severity::Low,
        title: "Suite runs faster",
        impact: "Shorter feedback loops",
    },
    InsightRule {
        metric: "average_duration_ms",
        movement: Movement::Rise,
        threshold_percent: 20.0,
        insight_type: InsightType::Performance,
        severity: Severity::High,
        title: "Average test duration increased",
        impact: "Individual tests are slower and closer to their timeouts",
    },
    InsightRule {
        metric: "p95_duration_ms",
        movement: Movement::Rise,
        threshold_percent: 30.0,
        insight_type: InsightType::Performance,
        severity: Severity::Medium,
        title: "Slowest tests getting slower",
        impact: "Tail latency drives total suite time when running in parallel",
    },
    InsightRule {
        metric: "parallel_efficiency",
        movement: Movement::Fall,
        threshold_percent: 15.0,
        insight_type: InsightType::Performance,
        severity: Severity::Medium,
        title: "Parallel efficiency dropped",
        impact: "Workers sit idle while a few long tests finish",
    },
    InsightRule {
        metric: PASS_RATE_KEY,
        movement: Movement::Fall,
        threshold_percent: 10.0,
        insight_type: InsightType::Regression,
        severity: Severity::High,
        title: "Pass rate dropped",
        impact: "More failures reach review and releases slow down",
    },
    InsightRule {
        metric: "error_count",
        movement: Movement::Rise,
        threshold_percent: 25.0,
        insight_type: InsightType::Regression,
        severity: Severity::High,
        title: "More failing tests",
        impact: "Failures are accumulating faster than they are fixed",
    },
    InsightRule {
        metric: "retry_rate",
        movement: Movement::Rise,
        threshold_percent: 25.0,
        insight_type: InsightType::Stability,
        severity: Severity::Medium,
        title: "Retries increasing",
        impact: "Retries hide instability and lengthen runs",
    },
];

/// Collects execution snapshots and analyzes their trends
#[derive(Debug, Clone)]
pub struct ExecutionTrendAnalyzer {
    engine: TrendEngine<ExecutionSnapshot>,
}

impl ExecutionTrendAnalyzer {
    pub fn new(data_dir: &Path, config: &TrendConfig) -> Self {
        Self {
            engine: TrendEngine::new(
                &data_dir.join(HISTORY_FILE),
                config.execution_retention_days,
                config,
            ),
        }
    }

    pub fn history_path(&self) -> &Path {
        self.engine.store().path()
    }

    /// Record a snapshot of this run
    pub fn collect(
        &self,
        results: &[TestRunResult],
        ctx: &RunContext,
    ) -> TrendDataPoint<ExecutionSnapshot> {
        self.collect_at(results, ctx, Utc::now())
    }

    pub fn collect_at(
        &self,
        results: &[TestRunResult],
        ctx: &RunContext,
        now: DateTime<Utc>,
    ) -> TrendDataPoint<ExecutionSnapshot> {
        self.engine.record(ExecutionSnapshot::from_results(results, ctx), now)
    }

    pub fn analyze(&self, period: AnalysisPeriod) -> TrendAnalysis {
        self.analyze_at(period, Utc::now())
    }

    pub fn analyze_at(&self, period: AnalysisPeriod, now: DateTime<Utc>) -> TrendAnalysis {
        self.engine.analyze(period, now, EXECUTION_RULES)
    }

    pub fn history(&self) -> Vec<TrendDataPoint<ExecutionSnapshot>> {
        self.engine.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trends::{RecommendationArea, TrendDirection};
    use chrono::Duration;
    use tempfile::TempDir;

    fn ctx(wall_clock_ms: Option<f64>, workers: usize) -> RunContext {
        RunContext {
            coverage: None,
            wall_clock_ms,
            workers,
            environment: EnvironmentInfo::new("linux", "x86_64", false, None),
        }
    }

    fn batch(count: usize, duration: f64) -> Vec<TestRunResult> {
        (0..count)
            .map(|i| TestRunResult::passed(format!("search {}", i), duration))
            .collect()
    }

    fn day(n: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::days(n)
    }

    #[test]
    fn test_parallel_efficiency() {
        // 4 workers x 10s wall clock, 30s busy
        assert_eq!(parallel_efficiency(30_000.0, Some(10_000.0), 4), 75.0);
        assert_eq!(parallel_efficiency(30_000.0, None, 4), 100.0);
        assert_eq!(parallel_efficiency(90_000.0, Some(10_000.0), 4), 100.0);
    }

    #[test]
    fn test_throughput() {
        assert_eq!(throughput(30, 0.0, Some(60_000.0), 1), 30.0);
        // 60s busy over 2 workers = 30s elapsed
        assert_eq!(throughput(10, 60_000.0, None, 2), 20.0);
        assert_eq!(throughput(0, 0.0, None, 1), 0.0);
    }

    #[test]
    fn test_snapshot_counts_errors_and_retries() {
        let mut results = batch(3, 1000.0);
        results[0] = results[0].clone().with_retry(2);
        results.push(TestRunResult::failed("search broken", 1000.0, "boom"));

        let snapshot = ExecutionSnapshot::from_results(&results, &ctx(Some(2000.0), 2));
        assert_eq!(snapshot.error_count, 1);
        assert_eq!(snapshot.retry_rate, 0.5);
        assert_eq!(snapshot.parallel_efficiency, 100.0);
        assert_eq!(snapshot.value("error_count"), Some(1.0));
    }

    #[test]
    fn test_large_retry_counts_do_not_overflow() {
        let results = vec![
            TestRunResult::passed("search retried", 1000.0).with_retry(u32::MAX),
            TestRunResult::passed("search retried", 1000.0).with_retry(u32::MAX),
        ];
        let snapshot = ExecutionSnapshot::from_results(&results, &ctx(None, 1));
        assert_eq!(snapshot.retry_rate, u32::MAX as f64);
    }

    #[test]
    fn test_slowdown_detected() {
        let tmp = TempDir::new().unwrap();
        let analyzer = ExecutionTrendAnalyzer::new(tmp.path(), &TrendConfig::default());

        analyzer.collect_at(&batch(10, 1000.0), &ctx(None, 1), day(0));
        analyzer.collect_at(&batch(10, 2000.0), &ctx(None, 1), day(1));

        assert!(analyzer.history_path().ends_with(HISTORY_FILE));
        let analysis = analyzer.analyze_at(AnalysisPeriod::Daily, day(1));
        assert_eq!(
            analysis.trend("total_duration_ms").unwrap().direction,
            TrendDirection::Declining
        );
        assert!(analysis.insights.iter().any(|i| i.title == "Suite duration increased"));
        assert!(analysis
            .recommendations
            .iter()
            .any(|r| r.area == RecommendationArea::Performance));
    }

    #[test]
    fn test_execution_retention_is_shorter() {
        let tmp = TempDir::new().unwrap();
        let analyzer = ExecutionTrendAnalyzer::new(tmp.path(), &TrendConfig::default());

        analyzer.collect_at(&batch(5, 1000.0), &ctx(None, 1), day(0));
        analyzer.collect_at(&batch(5, 1000.0), &ctx(None, 1), day(45));

        assert_eq!(analyzer.history().len(), 1);
    }
}
