//! Failure classification
//!
//! Maps a failed test's error text to a category, severity and most
//! likely root cause using an ordered table of regex rules. The first
//! matching rule wins, so rule order encodes priority.

mod evidence;
mod failures;
pub mod knowledge;
mod rules;

pub use evidence::extract_evidence;
pub use failures::{ClassifiedFailure, FailureAnalysisReport, FailureAnalyzer, RootCauseCount};
pub use rules::{default_rules, ClassificationRule};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::results::TestRunResult;
use crate::stats::clamp_unit;

/// Confidence assigned when no rule matches
pub const DEFAULT_CONFIDENCE: f64 = 0.5;

/// Broad class of failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    Network,
    Timing,
    TestCode,
    Application,
    Browser,
    Environment,
    Data,
    Infrastructure,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 8] = [
        ErrorCategory::Network,
        ErrorCategory::Timing,
        ErrorCategory::TestCode,
        ErrorCategory::Application,
        ErrorCategory::Browser,
        ErrorCategory::Environment,
        ErrorCategory::Data,
        ErrorCategory::Infrastructure,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "network",
            ErrorCategory::Timing => "timing",
            ErrorCategory::TestCode => "test_code",
            ErrorCategory::Application => "application",
            ErrorCategory::Browser => "browser",
            ErrorCategory::Environment => "environment",
            ErrorCategory::Data => "data",
            ErrorCategory::Infrastructure => "infrastructure",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        ErrorCategory::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How badly a failure hurts the suite
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
        }
    }

    /// Critical and high failures need attention before the next release
    pub fn is_severe(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of one failed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub severity: Severity,
    /// Most likely cause
    pub root_cause: String,
    /// Less likely causes from the same rule
    pub contributing_factors: Vec<String>,
    /// Concrete facts pulled from the error text
    pub evidence: Vec<String>,
    pub impact: String,
    pub suggestions: Vec<String>,
    pub prevention: Vec<String>,
    /// 0.0 - 1.0
    pub confidence: f64,
    /// Name of the rule that matched, `None` for the fallback
    pub matched_rule: Option<String>,
}

/// Rule-based error classifier
#[derive(Debug, Clone)]
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
}

impl ErrorClassifier {
    /// Create a classifier with the built-in rule table
    pub fn new() -> Self {
        Self {
            rules: default_rules(),
        }
    }

    /// Create a classifier with a custom, ordered rule table
    pub fn with_rules(rules: Vec<ClassificationRule>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    /// Classify a failed test result
    pub fn classify(&self, result: &TestRunResult) -> ErrorClassification {
        self.classify_text(result.error_message(), result.error_stack(), &result.title)
    }

    /// Classify raw error text
    pub fn classify_text(&self, message: &str, stack: &str, title: &str) -> ErrorClassification {
        let raw = format!("{}\n{}\n{}", message, stack, title);
        let haystack = raw.to_lowercase();
        let evidence = extract_evidence(&raw);

        let Some(rule) = self.rules.iter().find(|rule| rule.matches(&haystack)) else {
            debug!("No classification rule matched for {:?}", title);
            return ErrorClassification {
                category: ErrorCategory::Application,
                severity: Severity::Medium,
                root_cause: knowledge::UNCLASSIFIED_ROOT_CAUSE.to_string(),
                contributing_factors: Vec::new(),
                evidence,
                impact: knowledge::impact(ErrorCategory::Application, Severity::Medium).to_string(),
                suggestions: knowledge::generic_resolutions(),
                prevention: knowledge::generic_prevention(),
                confidence: DEFAULT_CONFIDENCE,
                matched_rule: None,
            };
        };

        debug!(
            "Classified {:?} as {} via rule '{}' (confidence: {:.2})",
            title, rule.category, rule.name, rule.confidence
        );

        let mut causes = rule.root_causes.iter().cloned();
        let root_cause = causes
            .next()
            .unwrap_or_else(|| knowledge::UNCLASSIFIED_ROOT_CAUSE.to_string());

        ErrorClassification {
            category: rule.category,
            severity: rule.severity,
            root_cause,
            contributing_factors: causes.collect(),
            evidence,
            impact: knowledge::impact(rule.category, rule.severity).to_string(),
            suggestions: knowledge::resolutions(rule.category),
            prevention: knowledge::prevention(rule.category),
            confidence: clamp_unit(rule.confidence),
            matched_rule: Some(rule.name.clone()),
        }
    }
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self::new()
    }
}
