//! Quality improvement tracking
//!
//! Runs the whole pipeline for one batch of results and scores it:
//!
//! 1. Failure classification and stability analysis
//! 2. Quality and execution trend snapshots (appended to history)
//! 3. Five weighted dimensions, diffed against the previous snapshot
//! 4. Action items, executive summary, recommendations and roadmap
//!
//! The scored snapshot is persisted to `quality-history.json` so the next
//! run can detect improvements and regressions.

mod dimensions;
mod report;

pub use dimensions::{
    action_items, compute_dimensions, detect_changes, gap_band, overall_score, regression_priority,
    score_dimensions, ActionItem, ActionSource, Dimension, DimensionChange, DimensionInputs,
    DimensionScore, DimensionTargets,
};
pub use report::{
    executive_summary, recommendations, roadmap, ExecutiveSummary, HealthLabel,
    QualityRecommendation, Roadmap, RoadmapItem,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info, warn};

use crate::classify::{FailureAnalysisReport, FailureAnalyzer};
use crate::config::{EngineConfig, QualityConfig};
use crate::results::{RunContext, TestRunResult};
use crate::stability::{StabilityMetrics, StabilityMonitor};
use crate::trends::{
    AnalysisPeriod, ExecutionSnapshot, ExecutionTrendAnalyzer, HistoryStore, QualitySnapshot,
    Timestamped, TrendAnalysis, TrendAnalyzer,
};

pub const HISTORY_FILE: &str = "quality-history.json";

/// Scored quality snapshot, persisted once per run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMetrics {
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    pub timestamp: DateTime<Utc>,
    pub overall_score: f64,
    pub dimensions: Vec<DimensionScore>,
    pub improvements: Vec<DimensionChange>,
    pub regressions: Vec<DimensionChange>,
    pub action_items: Vec<ActionItem>,
}

impl QualityMetrics {
    pub fn dimension(&self, dimension: Dimension) -> Option<&DimensionScore> {
        self.dimensions.iter().find(|d| d.name == dimension)
    }
}

impl Timestamped for QualityMetrics {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Score a run against the previous snapshot
///
/// Pure; the tracker persists the result.
pub fn score_quality(
    inputs: &DimensionInputs,
    previous: Option<&QualityMetrics>,
    failures: &FailureAnalysisReport,
    config: &QualityConfig,
    now: DateTime<Utc>,
) -> QualityMetrics {
    let current = compute_dimensions(inputs);
    let dimensions = score_dimensions(
        &current,
        previous.map(|p| p.dimensions.as_slice()),
        &config.targets,
        config.trend_dead_band.max(0.0),
    );
    let overall_score = overall_score(&dimensions);
    let (improvements, regressions) =
        detect_changes(&dimensions, config.significant_change.max(0.0));
    let action_items = action_items(&dimensions, &regressions, failures);

    QualityMetrics {
        date: now.format("%Y-%m-%d").to_string(),
        timestamp: now,
        overall_score,
        dimensions,
        improvements,
        regressions,
        action_items,
    }
}

/// Everything one tracking pass produced
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub metrics: QualityMetrics,
    pub executive_summary: ExecutiveSummary,
    pub recommendations: Vec<QualityRecommendation>,
    pub roadmap: Roadmap,
    pub failure_analysis: FailureAnalysisReport,
    pub stability: StabilityMetrics,
    pub quality_snapshot: QualitySnapshot,
    pub execution_snapshot: ExecutionSnapshot,
    pub quality_trends: TrendAnalysis,
    pub execution_trends: TrendAnalysis,
}

/// Orchestrates classification, stability, trends and scoring
#[derive(Debug)]
pub struct QualityImprovementTracker {
    config: QualityConfig,
    period: AnalysisPeriod,
    failures: FailureAnalyzer,
    stability: StabilityMonitor,
    trends: TrendAnalyzer,
    execution: ExecutionTrendAnalyzer,
    history: HistoryStore<QualityMetrics>,
}

impl QualityImprovementTracker {
    pub fn new(data_dir: &Path, config: &EngineConfig) -> Self {
        Self {
            config: config.quality.clone(),
            period: AnalysisPeriod::Weekly,
            failures: FailureAnalyzer::default(),
            stability: StabilityMonitor::new(config.stability.clone()),
            trends: TrendAnalyzer::new(data_dir, &config.trends),
            execution: ExecutionTrendAnalyzer::new(data_dir, &config.trends),
            history: HistoryStore::new(
                data_dir.join(HISTORY_FILE),
                config.trends.quality_retention_days,
            ),
        }
    }

    /// Look-back window for the trend analyses (weekly by default)
    pub fn with_period(mut self, period: AnalysisPeriod) -> Self {
        self.period = period;
        self
    }

    pub fn with_failure_analyzer(mut self, failures: FailureAnalyzer) -> Self {
        self.failures = failures;
        self
    }

    pub fn stability_monitor(&self) -> &StabilityMonitor {
        &self.stability
    }

    pub fn trend_analyzer(&self) -> &TrendAnalyzer {
        &self.trends
    }

    pub fn execution_analyzer(&self) -> &ExecutionTrendAnalyzer {
        &self.execution
    }

    /// Track one batch of results
    ///
    /// `failure_report` is used as given when the caller already classified
    /// the batch; otherwise it is computed here.
    pub fn track(
        &mut self,
        results: &[TestRunResult],
        ctx: &RunContext,
        failure_report: Option<FailureAnalysisReport>,
    ) -> QualityReport {
        self.track_at(results, ctx, failure_report, Utc::now())
    }

    pub fn track_at(
        &mut self,
        results: &[TestRunResult],
        ctx: &RunContext,
        failure_report: Option<FailureAnalysisReport>,
        now: DateTime<Utc>,
    ) -> QualityReport {
        info!("Tracking quality for {} results", results.len());

        let failure_analysis = failure_report.unwrap_or_else(|| self.failures.analyze(results));
        let stability = self.stability.analyze(results);

        let mut quality_snapshot = QualitySnapshot::from_results(results, ctx);
        quality_snapshot.stability_score = stability.mean_test_score();
        self.trends.record_at(quality_snapshot.clone(), now);
        let execution_snapshot = self.execution.collect_at(results, ctx, now).metrics;

        let quality_trends = self.trends.analyze_at(self.period, now);
        let execution_trends = self.execution.analyze_at(self.period, now);

        let inputs = DimensionInputs {
            pass_rate: quality_snapshot.summary.pass_rate,
            stability_score: stability.overall_stability,
            average_duration_ms: quality_snapshot.performance.average_duration_ms,
            parallel_efficiency: execution_snapshot.parallel_efficiency,
            retry_rate: execution_snapshot.retry_rate,
            coverage: quality_snapshot.coverage.clone(),
        };

        let previous = self.history.latest();
        if previous.is_none() {
            debug!("No previous quality snapshot; trends start stable");
        }
        let metrics =
            score_quality(&inputs, previous.as_ref(), &failure_analysis, &self.config, now);

        if let Err(e) = self.history.append(metrics.clone(), now) {
            warn!("Failed to persist quality snapshot: {}", e);
        }

        info!(
            "Quality score {:.0} ({} regressions, {} action items)",
            metrics.overall_score,
            metrics.regressions.len(),
            metrics.action_items.len()
        );

        QualityReport {
            executive_summary: executive_summary(
                metrics.overall_score,
                &metrics.dimensions,
                &metrics.improvements,
                &metrics.regressions,
                &metrics.action_items,
            ),
            recommendations: recommendations(&metrics.dimensions),
            roadmap: roadmap(metrics.overall_score, &metrics.dimensions),
            metrics,
            failure_analysis,
            stability,
            quality_snapshot,
            execution_snapshot,
            quality_trends,
            execution_trends,
        }
    }

    /// Persisted snapshots, oldest first
    pub fn history(&self) -> Vec<QualityMetrics> {
        self.history.load_or_empty()
    }

    pub fn latest(&self) -> Option<QualityMetrics> {
        self.history.latest()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::EnvironmentInfo;
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

    fn batch(passed: usize, failed: usize) -> Vec<TestRunResult> {
        let mut results: Vec<TestRunResult> = (0..passed)
            .map(|i| TestRunResult::passed(format!("search case {}", i), 1000.0))
            .collect();
        results.extend((0..failed).map(|i| {
            TestRunResult::failed(format!("login case {}", i), 1000.0, "Timeout 5000ms exceeded")
        }));
        results
    }

    fn day(n: i64) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
            + Duration::days(n)
    }

    #[test]
    fn test_first_run_has_no_changes() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = QualityImprovementTracker::new(tmp.path(), &EngineConfig::default());

        let report = tracker.track_at(&batch(9, 1), &ctx(), None, day(0));
        assert!(report.metrics.improvements.is_empty());
        assert!(report.metrics.regressions.is_empty());
        assert!(report
            .metrics
            .dimensions
            .iter()
            .all(|d| d.trend == TrendDirection::Stable));
        assert!(report.quality_trends.insufficient_data);
        assert_eq!(tracker.history().len(), 1);
    }

    #[test]
    fn test_second_run_detects_regression() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = QualityImprovementTracker::new(tmp.path(), &EngineConfig::default());

        tracker.track_at(&batch(10, 0), &ctx(), None, day(0));
        let report = tracker.track_at(&batch(5, 5), &ctx(), None, day(1));

        let reliability = report.metrics.dimension(Dimension::Reliability).unwrap();
        assert_eq!(reliability.previous, 100.0);
        assert_eq!(reliability.trend, TrendDirection::Declining);

        assert!(report
            .metrics
            .regressions
            .iter()
            .any(|r| r.dimension == Dimension::Reliability));
        assert_eq!(report.metrics.action_items[0].priority, crate::priority::Priority::Critical);
        assert!(!report.quality_trends.insufficient_data);
        assert_eq!(tracker.latest().unwrap().timestamp, day(1));
    }

    #[test]
    fn test_supplied_failure_report_is_used() {
        let tmp = TempDir::new().unwrap();
        let mut tracker = QualityImprovementTracker::new(tmp.path(), &EngineConfig::default());

        let supplied = FailureAnalysisReport {
            total_results: 99,
            ..Default::default()
        };
        let report = tracker.track_at(&batch(3, 1), &ctx(), Some(supplied), day(0));
        assert_eq!(report.failure_analysis.total_results, 99);
    }

    #[test]
    fn test_score_quality_overall_in_range() {
        let metrics = score_quality(
            &DimensionInputs::default(),
            None,
            &FailureAnalysisReport::default(),
            &QualityConfig::default(),
            day(0),
        );
        assert!((0.0..=100.0).contains(&metrics.overall_score));
        let expected: f64 = metrics.dimensions.iter().map(|d| d.current * d.weight).sum();
        assert_eq!(metrics.overall_score, expected.round());
        assert_eq!(metrics.date, "2026-06-01");
    }
}
