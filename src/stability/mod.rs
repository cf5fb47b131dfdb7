//! Test stability monitoring
//!
//! Groups runs by test name, scores each test by its success ratio,
//! sorts tests into stable/unstable/flaky bands and rolls the bands up
//! per test category.
//!
//! ## Bands
//! - stable: score >= `stable`
//! - unstable: `unstable` <= score < `stable`
//! - flaky: score < `unstable`; below `flaky` the test needs a redesign

mod categorize;
mod recommendations;

pub use categorize::{TestCategorizer, DEFAULT_CATEGORY};
pub use recommendations::{RecommendationKind, StabilityRecommendation};

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

use crate::classify::ErrorClassifier;
use crate::config::StabilityConfig;
use crate::results::{RunSummary, TestRunResult, TestStatus};
use crate::stats::{clamp_unit, mean, ratio};

/// Maximum length kept for a failure reason
const MAX_REASON_LEN: usize = 200;

/// Number of common issues reported per category
const COMMON_ISSUES: usize = 3;

/// Score thresholds separating the stability bands
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityThresholds {
    /// Minimum score of a stable test
    pub stable: f64,
    /// Minimum score of an unstable test; anything lower is flaky
    pub unstable: f64,
    /// Flaky tests below this score need a redesign
    pub flaky: f64,
}

impl Default for StabilityThresholds {
    fn default() -> Self {
        Self {
            stable: 0.95,
            unstable: 0.80,
            flaky: 0.50,
        }
    }
}

impl StabilityThresholds {
    pub fn classify(&self, score: f64) -> StabilityStatus {
        if score >= self.stable {
            StabilityStatus::Stable
        } else if score >= self.unstable {
            StabilityStatus::Unstable
        } else {
            StabilityStatus::Flaky
        }
    }

    /// Clamp into [0, 1] and force `stable >= unstable >= flaky`
    pub fn normalized(&self) -> Self {
        let stable = clamp_unit(self.stable);
        let unstable = clamp_unit(self.unstable).min(stable);
        let flaky = clamp_unit(self.flaky).min(unstable);
        Self {
            stable,
            unstable,
            flaky,
        }
    }
}

/// Stability band of a test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StabilityStatus {
    Stable,
    Unstable,
    Flaky,
}

impl StabilityStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            StabilityStatus::Stable => "stable",
            StabilityStatus::Unstable => "unstable",
            StabilityStatus::Flaky => "flaky",
        }
    }
}

/// Stability of one test
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestStabilityInfo {
    pub name: String,
    pub category: String,
    /// All runs, skipped ones included
    pub total_runs: usize,
    pub successful_runs: usize,
    pub failed_runs: usize,
    pub skipped_runs: usize,
    /// successful / total, 0.0 - 1.0
    pub stability_score: f64,
    pub average_duration_ms: f64,
    /// Retries per run
    pub retry_rate: f64,
    pub status: StabilityStatus,
    pub last_failure_reason: Option<String>,
    pub suggestions: Vec<String>,
}

/// Stability roll-up of one test category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryStabilityInfo {
    pub category: String,
    pub total_tests: usize,
    pub stable_tests: usize,
    pub unstable_tests: usize,
    pub flaky_tests: usize,
    /// stable / total, 0.0 - 1.0
    pub stability_score: f64,
    /// Most frequent root causes among the category's failing runs
    pub common_issues: Vec<String>,
}

impl CategoryStabilityInfo {
    pub fn flaky_ratio(&self) -> f64 {
        ratio(self.flaky_tests as f64, self.total_tests as f64)
    }
}

/// Result of one stability pass
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StabilityMetrics {
    /// successful / total runs across the whole batch, 0.0 - 1.0
    pub overall_stability: f64,
    pub total_tests: usize,
    pub stable_tests: usize,
    pub unstable_tests: usize,
    pub flaky_tests: usize,
    /// Tests whose every run was skipped
    pub skipped_only_tests: usize,
    pub tests: BTreeMap<String, TestStabilityInfo>,
    pub categories: BTreeMap<String, CategoryStabilityInfo>,
    pub recommendations: Vec<StabilityRecommendation>,
}

impl StabilityMetrics {
    pub fn tests_with_status(
        &self,
        status: StabilityStatus,
    ) -> impl Iterator<Item = &TestStabilityInfo> {
        self.tests.values().filter(move |t| t.status == status)
    }

    /// Mean of the per-test scores, 0.0 - 1.0
    pub fn mean_test_score(&self) -> f64 {
        let scores: Vec<f64> = self.tests.values().map(|t| t.stability_score).collect();
        clamp_unit(mean(&scores))
    }
}

/// Running totals for one test
#[derive(Debug, Clone, Default)]
struct TestAccumulator {
    total: usize,
    executed: usize,
    successes: usize,
    failures: usize,
    skipped: usize,
    total_duration_ms: f64,
    total_retries: u64,
    last_failure_reason: Option<String>,
}

impl TestAccumulator {
    fn push(&mut self, result: &TestRunResult) {
        self.total += 1;
        self.total_retries += result.retry as u64;
        match result.status {
            TestStatus::Skipped => {
                self.skipped += 1;
                return;
            }
            TestStatus::Passed => self.successes += 1,
            TestStatus::Failed | TestStatus::TimedOut => {
                self.failures += 1;
                self.last_failure_reason = Some(failure_reason(result));
            }
        }
        self.executed += 1;
        self.total_duration_ms += result.duration_ms();
    }

    fn to_info(&self, name: &str, category: &str, config: &StabilityConfig) -> TestStabilityInfo {
        // A skipped run counts against the score: it did not succeed
        let score = clamp_unit(ratio(self.successes as f64, self.total as f64));
        let average_duration_ms = ratio(self.total_duration_ms, self.executed as f64);
        let retry_rate = ratio(self.total_retries as f64, self.total as f64);
        let status = config.thresholds.classify(score);

        TestStabilityInfo {
            name: name.to_string(),
            category: category.to_string(),
            total_runs: self.total,
            successful_runs: self.successes,
            failed_runs: self.failures,
            skipped_runs: self.skipped,
            stability_score: score,
            average_duration_ms,
            retry_rate,
            status,
            last_failure_reason: self.last_failure_reason.clone(),
            suggestions: test_suggestions(score, status, retry_rate, average_duration_ms, config),
        }
    }
}

/// First line of the error message, or the status when there is none
fn failure_reason(result: &TestRunResult) -> String {
    let line = result.error_message().lines().next().unwrap_or("").trim();
    if line.is_empty() {
        return format!("Test {}", result.status.as_str());
    }
    match line.char_indices().nth(MAX_REASON_LEN) {
        Some((idx, _)) => format!("{}...", &line[..idx]),
        None => line.to_string(),
    }
}

fn test_suggestions(
    score: f64,
    status: StabilityStatus,
    retry_rate: f64,
    average_duration_ms: f64,
    config: &StabilityConfig,
) -> Vec<String> {
    let mut suggestions = Vec::new();

    match status {
        StabilityStatus::Flaky if score < config.thresholds.flaky => suggestions.push(format!(
            "Redesign this test: it passes only {:.0}% of the time; split it into smaller, deterministic steps",
            score * 100.0
        )),
        StabilityStatus::Flaky => suggestions.push(format!(
            "Stabilize this test ({:.0}% success): isolate shared state and remove timing assumptions",
            score * 100.0
        )),
        StabilityStatus::Unstable => suggestions.push(
            "Investigate waits and synchronization points; replace fixed delays with explicit waits".to_string(),
        ),
        StabilityStatus::Stable => {}
    }

    if retry_rate > config.retry_rate_warning {
        suggestions.push(format!(
            "Reduce reliance on retries (retry rate {:.0}%); fix the underlying intermittent failure",
            retry_rate * 100.0
        ));
    }

    if average_duration_ms > config.slow_test_ms {
        suggestions.push(format!(
            "Split or optimize this test (average {:.1}s); long tests are more exposed to timing issues",
            average_duration_ms / 1000.0
        ));
    }

    suggestions
}

/// Tracks per-test stability across analysis passes
#[derive(Debug)]
pub struct StabilityMonitor {
    config: StabilityConfig,
    classifier: ErrorClassifier,
    categorizer: TestCategorizer,
    /// Long-lived per-test totals, refreshed by `analyze` and updated by `record`
    history: HashMap<String, TestAccumulator>,
}

impl StabilityMonitor {
    pub fn new(config: StabilityConfig) -> Self {
        Self {
            config,
            classifier: ErrorClassifier::new(),
            categorizer: TestCategorizer::new(),
            history: HashMap::new(),
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_categorizer(mut self, categorizer: TestCategorizer) -> Self {
        self.categorizer = categorizer;
        self
    }

    pub fn config(&self) -> &StabilityConfig {
        &self.config
    }

    /// Run a full stability pass over a batch
    ///
    /// The batch may contain several runs per test name. Tests seen here
    /// replace their entries in the long-lived map.
    pub fn analyze(&mut self, results: &[TestRunResult]) -> StabilityMetrics {
        let mut groups: BTreeMap<&str, Vec<&TestRunResult>> = BTreeMap::new();
        for result in results {
            groups.entry(result.title.as_str()).or_default().push(result);
        }

        let mut metrics = StabilityMetrics::default();
        let mut failing_by_category: HashMap<String, Vec<&TestRunResult>> = HashMap::new();

        for (name, runs) in &groups {
            let mut acc = TestAccumulator::default();
            for run in runs {
                acc.push(run);
            }

            if acc.executed == 0 {
                metrics.skipped_only_tests += 1;
                self.history.insert(name.to_string(), acc);
                continue;
            }

            let category = self.categorizer.categorize(name);
            failing_by_category
                .entry(category.clone())
                .or_default()
                .extend(runs.iter().filter(|r| r.status.is_failure()));

            let info = acc.to_info(name, &category, &self.config);
            match info.status {
                StabilityStatus::Stable => metrics.stable_tests += 1,
                StabilityStatus::Unstable => metrics.unstable_tests += 1,
                StabilityStatus::Flaky => metrics.flaky_tests += 1,
            }

            metrics.tests.insert(name.to_string(), info);
            self.history.insert(name.to_string(), acc);
        }

        metrics.total_tests = metrics.tests.len();
        metrics.categories = self.category_stability(&metrics.tests, &failing_by_category);

        let summary = RunSummary::from_results(results);
        metrics.overall_stability =
            clamp_unit(ratio(summary.passed as f64, summary.total as f64));

        metrics.recommendations =
            recommendations::generate(&metrics.tests, &metrics.categories, &self.config);

        info!(
            "Stability: {:.1}% overall, {} stable / {} unstable / {} flaky tests",
            metrics.overall_stability * 100.0,
            metrics.stable_tests,
            metrics.unstable_tests,
            metrics.flaky_tests
        );

        metrics
    }

    /// Add one run to the long-lived map and return the test's updated info
    pub fn record(&mut self, result: &TestRunResult) -> Option<TestStabilityInfo> {
        self.history
            .entry(result.title.clone())
            .or_default()
            .push(result);
        debug!("Recorded {} run for {:?}", result.status.as_str(), result.title);
        self.test_info(&result.title)
    }

    /// Current info for a tracked test; `None` if unknown or never executed
    pub fn test_info(&self, name: &str) -> Option<TestStabilityInfo> {
        let acc = self.history.get(name)?;
        if acc.executed == 0 {
            return None;
        }
        let category = self.categorizer.categorize(name);
        Some(acc.to_info(name, &category, &self.config))
    }

    pub fn tracked_tests(&self) -> usize {
        self.history.len()
    }

    pub fn reset(&mut self) {
        self.history.clear();
    }

    fn category_stability(
        &self,
        tests: &BTreeMap<String, TestStabilityInfo>,
        failing_by_category: &HashMap<String, Vec<&TestRunResult>>,
    ) -> BTreeMap<String, CategoryStabilityInfo> {
        let mut categories: BTreeMap<String, CategoryStabilityInfo> = BTreeMap::new();

        for test in tests.values() {
            let entry = categories
                .entry(test.category.clone())
                .or_insert_with(|| CategoryStabilityInfo {
                    category: test.category.clone(),
                    total_tests: 0,
                    stable_tests: 0,
                    unstable_tests: 0,
                    flaky_tests: 0,
                    stability_score: 0.0,
                    common_issues: Vec::new(),
                });

            entry.total_tests += 1;
            match test.status {
                StabilityStatus::Stable => entry.stable_tests += 1,
                StabilityStatus::Unstable => entry.unstable_tests += 1,
                StabilityStatus::Flaky => entry.flaky_tests += 1,
            }
        }

        for (name, info) in categories.iter_mut() {
            info.stability_score =
                clamp_unit(ratio(info.stable_tests as f64, info.total_tests as f64));
            if let Some(failing) = failing_by_category.get(name) {
                info.common_issues = self.common_issues(failing);
            }
        }

        categories
    }

    fn common_issues(&self, failing: &[&TestRunResult]) -> Vec<String> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for result in failing.iter().filter(|r| r.error.is_some()) {
            let classification = self.classifier.classify(result);
            *counts.entry(classification.root_cause).or_default() += 1;
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked
            .into_iter()
            .take(COMMON_ISSUES)
            .map(|(cause, _)| cause)
            .collect()
    }
}

impl Default for StabilityMonitor {
    fn default() -> Self {
        Self::new(StabilityConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn runs(name: &str, passes: usize, failures: usize, message: &str) -> Vec<TestRunResult> {
        let mut results = Vec::new();
        for _ in 0..passes {
            results.push(TestRunResult::passed(name, 1000.0));
        }
        for _ in 0..failures {
            results.push(TestRunResult::failed(name, 1000.0, message));
        }
        results
    }

    #[test]
    fn test_all_passing_is_stable() {
        let mut monitor = StabilityMonitor::default();
        let metrics = monitor.analyze(&runs("login works", 10, 0, ""));

        let info = &metrics.tests["login works"];
        assert_eq!(info.stability_score, 1.0);
        assert_eq!(info.status, StabilityStatus::Stable);
        assert!(info.suggestions.is_empty());
    }

    #[test]
    fn test_four_of_ten_is_flaky() {
        let mut monitor = StabilityMonitor::default();
        let metrics = monitor.analyze(&runs("checkout pays", 4, 6, "Timeout 5000ms exceeded"));

        let info = &metrics.tests["checkout pays"];
        assert!((info.stability_score - 0.4).abs() < 1e-9);
        assert_eq!(info.status, StabilityStatus::Flaky);
        assert!(info.suggestions[0].starts_with("Redesign"));
        assert_eq!(info.last_failure_reason.as_deref(), Some("Timeout 5000ms exceeded"));
    }

    #[test]
    fn test_band_boundaries() {
        let thresholds = StabilityThresholds::default();
        assert_eq!(thresholds.classify(0.95), StabilityStatus::Stable);
        assert_eq!(thresholds.classify(0.94), StabilityStatus::Unstable);
        assert_eq!(thresholds.classify(0.80), StabilityStatus::Unstable);
        assert_eq!(thresholds.classify(0.79), StabilityStatus::Flaky);
    }

    #[test]
    fn test_category_counts_add_up() {
        let mut results = Vec::new();
        results.extend(runs("login works", 10, 0, ""));
        results.extend(runs("login rejects bad password", 9, 1, "expect(received).toBe(expected)"));
        results.extend(runs("logout clears session", 5, 5, "Timeout 5000ms exceeded"));
        results.extend(runs("search by name", 3, 7, "net::ERR_CONNECTION_RESET"));
        results.extend(runs("renders footer", 20, 0, ""));

        let mut monitor = StabilityMonitor::default();
        let metrics = monitor.analyze(&results);

        for category in metrics.categories.values() {
            assert_eq!(
                category.stable_tests + category.unstable_tests + category.flaky_tests,
                category.total_tests
            );
        }

        let auth = &metrics.categories["authentication"];
        assert_eq!(auth.total_tests, 3);
        assert_eq!(auth.stable_tests, 1);
        assert_eq!(auth.unstable_tests, 1);
        assert_eq!(auth.flaky_tests, 1);
        assert!(auth.common_issues.len() <= 3);
        assert!(!auth.common_issues.is_empty());

        assert_eq!(metrics.categories[DEFAULT_CATEGORY].stability_score, 1.0);
    }

    #[test]
    fn test_overall_stability() {
        let mut results = runs("a", 7, 0, "");
        results.extend(runs("b", 0, 3, "Timeout 5000ms exceeded"));
        results.push(TestRunResult::new("c", TestStatus::Skipped, 0.0));

        let mut monitor = StabilityMonitor::default();
        let metrics = monitor.analyze(&results);
        assert!((metrics.overall_stability - 7.0 / 11.0).abs() < 1e-9);
        assert_eq!(metrics.skipped_only_tests, 1);
        assert!(!metrics.tests.contains_key("c"));
    }

    #[test]
    fn test_skipped_runs_lower_the_score() {
        let mut results = runs("export csv", 9, 0, "");
        results.push(TestRunResult::new("export csv", TestStatus::Skipped, 0.0));

        let mut monitor = StabilityMonitor::default();
        let metrics = monitor.analyze(&results);
        let info = &metrics.tests["export csv"];

        assert_eq!(info.total_runs, 10);
        assert_eq!(info.skipped_runs, 1);
        assert!((info.stability_score - 0.9).abs() < 1e-9);
        assert_eq!(info.status, StabilityStatus::Unstable);
        assert_eq!(info.average_duration_ms, 1000.0);
        assert!((metrics.overall_stability - 0.9).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch() {
        let mut monitor = StabilityMonitor::default();
        let metrics = monitor.analyze(&[]);
        assert_eq!(metrics.overall_stability, 0.0);
        assert!(metrics.tests.is_empty());
        assert!(metrics.categories.is_empty());
        assert!(metrics.recommendations.is_empty());
    }

    #[test]
    fn test_retry_and_duration_suggestions() {
        let results = vec![
            TestRunResult::passed("slow report export", 25_000.0).with_retry(1),
            TestRunResult::passed("slow report export", 25_000.0),
        ];
        let mut monitor = StabilityMonitor::default();
        let metrics = monitor.analyze(&results);
        let info = &metrics.tests["slow report export"];

        assert_eq!(info.status, StabilityStatus::Stable);
        assert!((info.retry_rate - 0.5).abs() < 1e-9);
        assert_eq!(info.suggestions.len(), 2);
    }

    #[test]
    fn test_incremental_record() {
        let mut monitor = StabilityMonitor::default();
        monitor.analyze(&runs("profile updates", 9, 0, ""));

        let info = monitor
            .record(&TestRunResult::failed("profile updates", 1000.0, "boom"))
            .unwrap();
        assert_eq!(info.total_runs, 10);
        assert!((info.stability_score - 0.9).abs() < 1e-9);
        assert_eq!(info.status, StabilityStatus::Unstable);

        // A fresh analyze replaces the entry with the new batch
        monitor.analyze(&runs("profile updates", 2, 0, ""));
        assert_eq!(monitor.test_info("profile updates").unwrap().total_runs, 2);
        assert_eq!(monitor.tracked_tests(), 1);
    }

    #[test]
    fn test_thresholds_normalized() {
        let broken = StabilityThresholds {
            stable: 0.7,
            unstable: 0.9,
            flaky: 1.5,
        };
        let fixed = broken.normalized();
        assert_eq!(fixed.stable, 0.7);
        assert_eq!(fixed.unstable, 0.7);
        assert_eq!(fixed.flaky, 0.7);
    }
}
