//! Quality and coverage trends (`trend-history.json`)

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
use crate::results::{
    CoverageStats, EnvironmentInfo, PerformanceStats, RunContext, RunSummary, TestRunResult,
};
use crate::stability::StabilityMonitor;
use crate::stats::percent;

pub const HISTORY_FILE: &str = "trend-history.json";

/// Quality metrics captured for one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualitySnapshot {
    pub summary: RunSummary,
    pub performance: PerformanceStats,
    /// Mean per-test stability score, 0.0 - 1.0
    pub stability_score: f64,
    pub coverage: CoverageStats,
    pub environment: EnvironmentInfo,
}

impl QualitySnapshot {
    pub fn from_results(results: &[TestRunResult], ctx: &RunContext) -> Self {
        let summary = RunSummary::from_results(results);
        let stability_score = StabilityMonitor::default().analyze(results).mean_test_score();
        Self {
            performance: PerformanceStats::from_results(results),
            stability_score,
            coverage: ctx.coverage_for(&summary),
            environment: ctx.environment.clone(),
            summary,
        }
    }
}

static QUALITY_SPECS: [MetricSpec; 8] = [
    MetricSpec::percentage(
        PASS_RATE_KEY,
        "Pass rate",
        Polarity::HigherIsBetter,
        MetricKind::Stability,
    ),
    MetricSpec::percentage(
        "stability",
        "Stability",
        Polarity::HigherIsBetter,
        MetricKind::Stability,
    ),
    MetricSpec::percentage(
        "flaky_rate",
        "Flaky rate",
        Polarity::LowerIsBetter,
        MetricKind::Stability,
    ),
    MetricSpec::non_negative(
        "average_duration_ms",
        "Average test duration",
        Polarity::LowerIsBetter,
        MetricKind::Performance,
    ),
    MetricSpec::percentage(
        "coverage_statements",
        "Statement coverage",
        Polarity::HigherIsBetter,
        MetricKind::Coverage,
    ),
    MetricSpec::percentage(
        "coverage_branches",
        "Branch coverage",
        Polarity::HigherIsBetter,
        MetricKind::Coverage,
    ),
    MetricSpec::percentage(
        "coverage_functions",
        "Function coverage",
        Polarity::HigherIsBetter,
        MetricKind::Coverage,
    ),
    MetricSpec::percentage(
        "coverage_lines",
        "Line coverage",
        Polarity::HigherIsBetter,
        MetricKind::Coverage,
    ),
];

impl MetricBundle for QualitySnapshot {
    fn specs() -> &'static [MetricSpec] {
        &QUALITY_SPECS
    }

    fn value(&self, key: &str) -> Option<f64> {
        let value = match key {
            PASS_RATE_KEY => self.summary.pass_rate,
            "stability" => self.stability_score * 100.0,
            "flaky_rate" => percent(self.summary.flaky as f64, self.summary.executed() as f64),
            "average_duration_ms" => self.performance.average_duration_ms,
            "coverage_statements" => self.coverage.statements,
            "coverage_branches" => self.coverage.branches,
            "coverage_functions" => self.coverage.functions,
            "coverage_lines" => self.coverage.lines,
            _ => return None,
        };
        Some(value)
    }
}

const QUALITY_RULES: &[InsightRule] = &[
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
        metric: PASS_RATE_KEY,
        movement: Movement::Rise,
        threshold_percent: 10.0,
        insight_type: InsightType::Improvement,
        severity: Severity::Low,
        title: "Pass rate improved",
        impact: "Fewer failures to triage",
    },
    InsightRule {
        metric: "stability",
        movement: Movement::Fall,
        threshold_percent: 10.0,
        insight_type: InsightType::Stability,
        severity: Severity::Medium,
        title: "Stability declining",
        impact: "Test results are becoming less trustworthy",
    },
    InsightRule {
        metric: "flaky_rate",
        movement: Movement::Rise,
        threshold_percent: 50.0,
        insight_type: InsightType::Stability,
        severity: Severity::Medium,
        title: "More tests pass only on retry",
        impact: "Retries hide instability and lengthen runs",
    },
    InsightRule {
        metric: "average_duration_ms",
        movement: Movement::Rise,
        threshold_percent: 20.0,
        insight_type: InsightType::Performance,
        severity: Severity::High,
        title: "Tests are getting slower",
        impact: "Longer feedback loops for every change",
    },
    InsightRule {
        metric: "coverage_lines",
        movement: Movement::Fall,
        threshold_percent: 5.0,
        insight_type: InsightType::Coverage,
        severity: Severity::Medium,
        title: "Line coverage dropped",
        impact: "New code is landing without tests",
    },
    InsightRule {
        metric: "coverage_branches",
        movement: Movement::Fall,
        threshold_percent: 5.0,
        insight_type: InsightType::Coverage,
        severity: Severity::Medium,
        title: "Branch coverage dropped",
        impact: "Error paths are less exercised",
    },
];

/// Collects quality snapshots and analyzes their trends
#[derive(Debug, Clone)]
pub struct TrendAnalyzer {
    engine: TrendEngine<QualitySnapshot>,
}

impl TrendAnalyzer {
    pub fn new(data_dir: &Path, config: &TrendConfig) -> Self {
        Self {
            engine: TrendEngine::new(&data_dir.join(HISTORY_FILE), config.retention_days, config),
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
    ) -> TrendDataPoint<QualitySnapshot> {
        self.collect_at(results, ctx, Utc::now())
    }

    pub fn collect_at(
        &self,
        results: &[TestRunResult],
        ctx: &RunContext,
        now: DateTime<Utc>,
    ) -> TrendDataPoint<QualitySnapshot> {
        self.engine.record(QualitySnapshot::from_results(results, ctx), now)
    }

    /// Record an already computed snapshot
    pub fn record_at(
        &self,
        snapshot: QualitySnapshot,
        now: DateTime<Utc>,
    ) -> TrendDataPoint<QualitySnapshot> {
        self.engine.record(snapshot, now)
    }

    pub fn analyze(&self, period: AnalysisPeriod) -> TrendAnalysis {
        self.analyze_at(period, Utc::now())
    }

    pub fn analyze_at(&self, period: AnalysisPeriod, now: DateTime<Utc>) -> TrendAnalysis {
        self.engine.analyze(period, now, QUALITY_RULES)
    }

    pub fn history(&self) -> Vec<TrendDataPoint<QualitySnapshot>> {
        self.engine.history()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trends::TrendDirection;
    use chrono::Duration;
    use tempfile::TempDir;

    fn ctx() -> RunContext {
        RunContext {
            coverage: None,
            wall_clock_ms: None,
            workers: 1,
            environment: EnvironmentInfo::new("linux", "x86_64", true, None),
        }
    }

    fn batch(passed: usize, failed: usize, duration: f64) -> Vec<TestRunResult> {
        let mut results: Vec<TestRunResult> = (0..passed)
            .map(|i| TestRunResult::passed(format!("login {}", i), duration))
            .collect();
        results.extend((0..failed).map(|i| {
            TestRunResult::failed(
                format!("checkout {}", i),
                duration,
                "expect(received).toBe(expected)",
            )
        }));
        results
    }

    fn day(n: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-01T08:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::days(n)
    }

    #[test]
    fn test_snapshot_values() {
        let snapshot = QualitySnapshot::from_results(&batch(8, 2, 1000.0), &ctx());
        assert_eq!(snapshot.value(PASS_RATE_KEY), Some(80.0));
        assert_eq!(snapshot.value("stability"), Some(80.0));
        assert_eq!(snapshot.value("average_duration_ms"), Some(1000.0));
        // No coverage report: every test executed
        assert_eq!(snapshot.value("coverage_lines"), Some(100.0));
        assert_eq!(snapshot.value("coverage_functions"), Some(100.0));
        assert_eq!(snapshot.value("unknown"), None);
    }

    #[test]
    fn test_stability_averages_per_test_scores() {
        let mut results: Vec<TestRunResult> =
            (0..3).map(|_| TestRunResult::passed("login", 1000.0)).collect();
        results.push(TestRunResult::failed("checkout", 1000.0, "boom"));

        let snapshot = QualitySnapshot::from_results(&results, &ctx());
        assert_eq!(snapshot.value(PASS_RATE_KEY), Some(75.0));
        assert_eq!(snapshot.value("stability"), Some(50.0));
    }

    #[test]
    fn test_collect_then_analyze() {
        let tmp = TempDir::new().unwrap();
        let analyzer = TrendAnalyzer::new(tmp.path(), &TrendConfig::default());

        analyzer.collect_at(&batch(19, 1, 1000.0), &ctx(), day(0));
        analyzer.collect_at(&batch(16, 4, 1500.0), &ctx(), day(1));

        assert!(analyzer.history_path().ends_with(HISTORY_FILE));
        assert_eq!(analyzer.history().len(), 2);

        let analysis = analyzer.analyze_at(AnalysisPeriod::Daily, day(1));
        assert_eq!(analysis.data_points, 2);
        assert_eq!(analysis.trend(PASS_RATE_KEY).unwrap().direction, TrendDirection::Declining);
        assert_eq!(
            analysis.trend("average_duration_ms").unwrap().direction,
            TrendDirection::Declining
        );
        assert!(analysis.insights.iter().any(|i| i.title == "Pass rate dropped"));
        assert!(analysis.insights.iter().any(|i| i.title == "Tests are getting slower"));
        assert!(!analysis.recommendations.is_empty());
    }

    #[test]
    fn test_missing_history_is_insufficient() {
        let tmp = TempDir::new().unwrap();
        let analyzer = TrendAnalyzer::new(tmp.path(), &TrendConfig::default());
        let analysis = analyzer.analyze_at(AnalysisPeriod::Monthly, day(0));
        assert!(analysis.insufficient_data);
        assert_eq!(analysis.data_points, 0);
    }
}
