//! Batch failure analysis
//!
//! Runs the classifier over every failing result of a run and
//! aggregates the classifications for reporting.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

use super::{ErrorCategory, ErrorClassification, ErrorClassifier, Severity};
use crate::results::{RunSummary, TestRunResult, TestStatus};
use crate::stats::{clamp_percent, percent};

/// How many root causes to keep in the report
const TOP_ROOT_CAUSES: usize = 5;

/// A failing run together with its classification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFailure {
    pub title: String,
    pub status: TestStatus,
    pub duration_ms: f64,
    pub retry: u32,
    pub message: String,
    pub classification: ErrorClassification,
}

/// Frequency of one root cause across the batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootCauseCount {
    pub root_cause: String,
    pub category: ErrorCategory,
    pub count: usize,
}

/// Classified failures of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FailureAnalysisReport {
    pub total_results: usize,
    pub executed: usize,
    pub total_failures: usize,
    /// Failures / executed, in percent
    pub failure_rate: f64,
    pub by_category: BTreeMap<ErrorCategory, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub top_root_causes: Vec<RootCauseCount>,
    pub failures: Vec<ClassifiedFailure>,
}

impl FailureAnalysisReport {
    /// Category with the most failures (ties go to the earlier category)
    pub fn dominant_category(&self) -> Option<ErrorCategory> {
        self.by_category
            .iter()
            .max_by(|(ca, a), (cb, b)| a.cmp(b).then_with(|| cb.cmp(ca)))
            .map(|(c, _)| *c)
    }

    /// Failures at or above `severity`
    pub fn count_at_least(&self, severity: Severity) -> usize {
        self.by_severity
            .iter()
            .filter(|(s, _)| **s <= severity)
            .map(|(_, n)| n)
            .sum()
    }
}

/// Aggregates classifications for a whole batch
#[derive(Debug, Clone, Default)]
pub struct FailureAnalyzer {
    classifier: ErrorClassifier,
}

impl FailureAnalyzer {
    pub fn new(classifier: ErrorClassifier) -> Self {
        Self { classifier }
    }

    pub fn classifier(&self) -> &ErrorClassifier {
        &self.classifier
    }

    pub fn analyze(&self, results: &[TestRunResult]) -> FailureAnalysisReport {
        let summary = RunSummary::from_results(results);

        let failures: Vec<ClassifiedFailure> = results
            .iter()
            .filter(|r| r.status.is_failure())
            .map(|r| ClassifiedFailure {
                title: r.title.clone(),
                status: r.status,
                duration_ms: r.duration_ms(),
                retry: r.retry,
                message: r.error_message().to_string(),
                classification: self.classifier.classify(r),
            })
            .collect();

        let mut by_category: BTreeMap<ErrorCategory, usize> = BTreeMap::new();
        let mut by_severity: BTreeMap<Severity, usize> = BTreeMap::new();
        let mut causes: HashMap<(String, ErrorCategory), usize> = HashMap::new();

        for failure in &failures {
            let c = &failure.classification;
            *by_category.entry(c.category).or_default() += 1;
            *by_severity.entry(c.severity).or_default() += 1;
            *causes.entry((c.root_cause.clone(), c.category)).or_default() += 1;
        }

        let mut top_root_causes: Vec<RootCauseCount> = causes
            .into_iter()
            .map(|((root_cause, category), count)| RootCauseCount {
                root_cause,
                category,
                count,
            })
            .collect();
        top_root_causes.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| a.root_cause.cmp(&b.root_cause))
        });
        top_root_causes.truncate(TOP_ROOT_CAUSES);

        info!(
            "Classified {} failures across {} categories",
            failures.len(),
            by_category.len()
        );

        FailureAnalysisReport {
            total_results: summary.total,
            executed: summary.executed(),
            total_failures: failures.len(),
            failure_rate: clamp_percent(percent(failures.len() as f64, summary.executed() as f64)),
            by_category,
            by_severity,
            top_root_causes,
            failures,
        }
    }
}
