//! Test run input model
//!
//! Raw results as produced by the test-execution layer, plus the
//! run-level aggregates every analyzer derives from them.

use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::stats::{clamp_percent, mean, percent, percentile};

/// Outcome of a single test execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TestStatus {
    Passed,
    Failed,
    Skipped,
    TimedOut,
}

impl TestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TestStatus::Passed => "passed",
            TestStatus::Failed => "failed",
            TestStatus::Skipped => "skipped",
            TestStatus::TimedOut => "timedOut",
        }
    }

    /// Failed and timed-out runs both count as failures
    pub fn is_failure(&self) -> bool {
        matches!(self, TestStatus::Failed | TestStatus::TimedOut)
    }

    /// Skipped runs never executed and are left out of rates
    pub fn is_executed(&self) -> bool {
        !matches!(self, TestStatus::Skipped)
    }
}

/// Error attached to a failing run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// One test execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRunResult {
    pub title: String,
    pub status: TestStatus,
    /// Duration in milliseconds
    #[serde(default)]
    pub duration: f64,
    /// Number of retries the runner needed
    #[serde(default)]
    pub retry: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TestError>,
}

impl TestRunResult {
    pub fn new(title: impl Into<String>, status: TestStatus, duration: f64) -> Self {
        Self {
            title: title.into(),
            status,
            duration,
            retry: 0,
            error: None,
        }
    }

    pub fn passed(title: impl Into<String>, duration: f64) -> Self {
        Self::new(title, TestStatus::Passed, duration)
    }

    pub fn failed(title: impl Into<String>, duration: f64, message: impl Into<String>) -> Self {
        Self::new(title, TestStatus::Failed, duration).with_error(message, None)
    }

    pub fn with_error(mut self, message: impl Into<String>, stack: Option<String>) -> Self {
        self.error = Some(TestError {
            message: message.into(),
            stack,
        });
        self
    }

    pub fn with_retry(mut self, retry: u32) -> Self {
        self.retry = retry;
        self
    }

    /// Duration with negative or non-finite values treated as zero
    pub fn duration_ms(&self) -> f64 {
        if self.duration.is_finite() {
            self.duration.max(0.0)
        } else {
            0.0
        }
    }

    pub fn error_message(&self) -> &str {
        self.error.as_ref().map(|e| e.message.as_str()).unwrap_or("")
    }

    pub fn error_stack(&self) -> &str {
        self.error
            .as_ref()
            .and_then(|e| e.stack.as_deref())
            .unwrap_or("")
    }
}

/// Pass/fail counts for a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub timed_out: usize,
    /// Runs that passed only after a retry
    pub flaky: usize,
    /// Passed / executed, in percent
    pub pass_rate: f64,
}

impl RunSummary {
    pub fn from_results(results: &[TestRunResult]) -> Self {
        let mut summary = RunSummary {
            total: results.len(),
            ..Default::default()
        };

        for result in results {
            match result.status {
                TestStatus::Passed => {
                    summary.passed += 1;
                    if result.retry > 0 {
                        summary.flaky += 1;
                    }
                }
                TestStatus::Failed => summary.failed += 1,
                TestStatus::Skipped => summary.skipped += 1,
                TestStatus::TimedOut => summary.timed_out += 1,
            }
        }

        summary.pass_rate = clamp_percent(percent(
            summary.passed as f64,
            summary.executed() as f64,
        ));
        summary
    }

    pub fn executed(&self) -> usize {
        self.total - self.skipped
    }

    pub fn failures(&self) -> usize {
        self.failed + self.timed_out
    }
}

/// Duration statistics over the executed runs of a batch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceStats {
    pub total_duration_ms: f64,
    pub average_duration_ms: f64,
    pub median_duration_ms: f64,
    pub p95_duration_ms: f64,
    pub max_duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slowest_test: Option<String>,
}

impl PerformanceStats {
    pub fn from_results(results: &[TestRunResult]) -> Self {
        let executed: Vec<&TestRunResult> =
            results.iter().filter(|r| r.status.is_executed()).collect();

        let mut durations: Vec<f64> = executed.iter().map(|r| r.duration_ms()).collect();
        let slowest_test = executed
            .iter()
            .max_by(|a, b| a.duration_ms().total_cmp(&b.duration_ms()))
            .map(|r| r.title.clone());

        durations.sort_by(f64::total_cmp);

        PerformanceStats {
            total_duration_ms: durations.iter().sum(),
            average_duration_ms: mean(&durations),
            median_duration_ms: percentile(&durations, 50.0),
            p95_duration_ms: percentile(&durations, 95.0),
            max_duration_ms: durations.last().copied().unwrap_or(0.0),
            slowest_test,
        }
    }
}

/// Code coverage percentages reported alongside a run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub statements: f64,
    pub branches: f64,
    pub functions: f64,
    pub lines: f64,
}

impl CoverageStats {
    /// Coverage estimate when no coverage report is available:
    /// the share of tests that actually executed.
    pub fn from_execution(summary: &RunSummary) -> Self {
        let executed = clamp_percent(percent(summary.executed() as f64, summary.total as f64));
        CoverageStats {
            statements: executed,
            branches: executed,
            functions: executed,
            lines: executed,
        }
    }

    pub fn clamped(&self) -> Self {
        CoverageStats {
            statements: clamp_percent(self.statements),
            branches: clamp_percent(self.branches),
            functions: clamp_percent(self.functions),
            lines: clamp_percent(self.lines),
        }
    }

    pub fn average(&self) -> f64 {
        mean(&[self.statements, self.branches, self.functions, self.lines])
    }
}

/// Where the run happened
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentInfo {
    pub os: String,
    pub arch: String,
    pub ci: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runner: Option<String>,
    pub fingerprint: String,
}

impl EnvironmentInfo {
    pub fn new(os: &str, arch: &str, ci: bool, runner: Option<String>) -> Self {
        let mut hasher = DefaultHasher::new();
        os.hash(&mut hasher);
        arch.hash(&mut hasher);
        ci.hash(&mut hasher);
        runner.hash(&mut hasher);

        Self {
            os: os.to_string(),
            arch: arch.to_string(),
            ci,
            runner,
            fingerprint: format!("{:016x}", hasher.finish()),
        }
    }

    /// Detect the current host from compile-time target and CI env vars
    pub fn detect() -> Self {
        let runner = [
            ("GITHUB_ACTIONS", "github-actions"),
            ("GITLAB_CI", "gitlab-ci"),
            ("JENKINS_URL", "jenkins"),
            ("BUILDKITE", "buildkite"),
            ("CIRCLECI", "circleci"),
        ]
        .iter()
        .find(|(var, _)| std::env::var_os(var).is_some())
        .map(|(_, name)| name.to_string());

        let ci = runner.is_some() || std::env::var_os("CI").is_some();

        Self::new(std::env::consts::OS, std::env::consts::ARCH, ci, runner)
    }
}

/// Run-level facts that are not part of the per-test results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    /// Coverage report, if the run produced one
    pub coverage: Option<CoverageStats>,
    /// Wall-clock time of the whole run
    pub wall_clock_ms: Option<f64>,
    /// Parallel workers used by the runner
    pub workers: usize,
    pub environment: EnvironmentInfo,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            coverage: None,
            wall_clock_ms: None,
            workers: 1,
            environment: EnvironmentInfo::detect(),
        }
    }
}

impl RunContext {
    /// Coverage for this run, falling back to the execution estimate
    pub fn coverage_for(&self, summary: &RunSummary) -> CoverageStats {
        match &self.coverage {
            Some(coverage) => coverage.clamped(),
            None => CoverageStats::from_execution(summary),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serde_names() {
        let json = serde_json::to_string(&TestStatus::TimedOut).unwrap();
        assert_eq!(json, r#""timedOut""#);

        let status: TestStatus = serde_json::from_str(r#""passed""#).unwrap();
        assert_eq!(status, TestStatus::Passed);
    }

    #[test]
    fn test_result_optional_fields_default() {
        let result: TestRunResult =
            serde_json::from_str(r#"{"title": "login works", "status": "skipped"}"#).unwrap();
        assert_eq!(result.duration, 0.0);
        assert_eq!(result.retry, 0);
        assert!(result.error.is_none());
        assert_eq!(result.error_message(), "");
    }

    #[test]
    fn test_negative_duration_is_zero() {
        let result = TestRunResult::passed("t", -50.0);
        assert_eq!(result.duration_ms(), 0.0);
    }

    #[test]
    fn test_run_summary() {
        let results = vec![
            TestRunResult::passed("a", 100.0),
            TestRunResult::passed("b", 100.0).with_retry(1),
            TestRunResult::failed("c", 100.0, "boom"),
            TestRunResult::new("d", TestStatus::Skipped, 0.0),
            TestRunResult::new("e", TestStatus::TimedOut, 30000.0),
        ];

        let summary = RunSummary::from_results(&results);
        assert_eq!(summary.total, 5);
        assert_eq!(summary.executed(), 4);
        assert_eq!(summary.failures(), 2);
        assert_eq!(summary.flaky, 1);
        assert_eq!(summary.pass_rate, 50.0);
    }

    #[test]
    fn test_empty_summary_is_zeroed() {
        let summary = RunSummary::from_results(&[]);
        assert_eq!(summary.pass_rate, 0.0);

        let perf = PerformanceStats::from_results(&[]);
        assert_eq!(perf.average_duration_ms, 0.0);
        assert!(perf.slowest_test.is_none());
    }

    #[test]
    fn test_performance_stats() {
        let results = vec![
            TestRunResult::passed("fast", 100.0),
            TestRunResult::passed("medium", 300.0),
            TestRunResult::passed("slow", 800.0),
            TestRunResult::new("skipped", TestStatus::Skipped, 5000.0),
        ];

        let perf = PerformanceStats::from_results(&results);
        assert_eq!(perf.total_duration_ms, 1200.0);
        assert_eq!(perf.average_duration_ms, 400.0);
        assert_eq!(perf.max_duration_ms, 800.0);
        assert_eq!(perf.slowest_test.as_deref(), Some("slow"));
    }

    #[test]
    fn test_environment_fingerprint_is_stable() {
        let a = EnvironmentInfo::new("linux", "x86_64", true, Some("jenkins".into()));
        let b = EnvironmentInfo::new("linux", "x86_64", true, Some("jenkins".into()));
        let c = EnvironmentInfo::new("macos", "aarch64", false, None);
        assert_eq!(a.fingerprint, b.fingerprint);
        assert_ne!(a.fingerprint, c.fingerprint);
    }

    #[test]
    fn test_coverage_fallback() {
        let summary = RunSummary {
            total: 4,
            skipped: 1,
            ..Default::default()
        };
        let ctx = RunContext {
            environment: EnvironmentInfo::new("linux", "x86_64", false, None),
            ..Default::default()
        };
        let coverage = ctx.coverage_for(&summary);
        assert_eq!(coverage.average(), 75.0);
    }
}
