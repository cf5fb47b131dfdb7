//! Classification rule table
//!
//! Rules are evaluated in declaration order against the lowercased
//! error haystack. Specific patterns must precede generic ones: a
//! browser crash often also mentions a timeout, and an assertion on a
//! slow locator also mentions `expect(`.

use regex::Regex;
use std::sync::LazyLock;
use tracing::warn;

use super::{ErrorCategory, Severity};

/// One classification rule
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub name: String,
    patterns: Vec<Regex>,
    pub category: ErrorCategory,
    pub severity: Severity,
    pub confidence: f64,
    /// Ordered by likelihood; the first entry is the primary cause
    pub root_causes: Vec<String>,
}

impl ClassificationRule {
    /// Build a rule, skipping (and logging) patterns that fail to compile
    pub fn new(
        name: &str,
        patterns: &[&str],
        category: ErrorCategory,
        severity: Severity,
        confidence: f64,
        root_causes: &[&str],
    ) -> Self {
        let patterns = patterns
            .iter()
            .filter_map(|p| match Regex::new(p) {
                Ok(re) => Some(re),
                Err(e) => {
                    warn!("Skipping invalid pattern {:?} in rule '{}': {}", p, name, e);
                    None
                }
            })
            .collect();

        Self {
            name: name.to_string(),
            patterns,
            category,
            severity,
            confidence,
            root_causes: root_causes.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Whether any pattern matches the (already lowercased) haystack
    pub fn matches(&self, haystack: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(haystack))
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }
}

static DEFAULT_RULES: LazyLock<Vec<ClassificationRule>> = LazyLock::new(|| {
    vec![
        ClassificationRule::new(
            "browser-crash",
            &[
                r"browser has been closed",
                r"target (page, context or browser )?(has been )?closed",
                r"page crashed",
                r"browser (was |has )?disconnected",
                r"protocol error",
                r"execution context was destroyed",
            ],
            ErrorCategory::Browser,
            Severity::Critical,
            0.9,
            &[
                "Browser process crashed or was closed mid-test",
                "Page or context closed while an action was pending",
                "Browser ran out of memory",
                "Browser and automation driver versions are incompatible",
            ],
        ),
        ClassificationRule::new(
            "network",
            &[
                r"net::err_[a-z_]+",
                r"econnrefused",
                r"econnreset",
                r"enotfound",
                r"socket hang up",
                r"network (error|request failed)",
                r"fetch failed",
                r"getaddrinfo",
                r"\bdns\b",
            ],
            ErrorCategory::Network,
            Severity::High,
            0.9,
            &[
                "Target service unreachable or refusing connections",
                "DNS resolution failure",
                "Connection dropped by a proxy or load balancer",
                "Intermittent network instability",
            ],
        ),
        ClassificationRule::new(
            "infrastructure",
            &[
                r"out of memory",
                r"\boom\b",
                r"enospc",
                r"no space left on device",
                r"worker process (exited|crashed)",
                r"container (exited|was killed)",
                r"\bsigkill\b",
                r"\bkilled\b",
                r"resource temporarily unavailable",
            ],
            ErrorCategory::Infrastructure,
            Severity::Critical,
            0.85,
            &[
                "CI runner exhausted memory or disk",
                "Test worker process was killed",
                "Container or VM was recycled mid-run",
                "Contention for shared infrastructure resources",
            ],
        ),
        ClassificationRule::new(
            "environment",
            &[
                r"environment variable",
                r"\benv\b.*(missing|not set|undefined)",
                r"missing (config|configuration)",
                r"not configured",
                r"permission denied",
                r"\beacces\b",
                r"cannot find module",
                r"module not found",
                r"executable doesn't exist",
                r"command not found",
            ],
            ErrorCategory::Environment,
            Severity::High,
            0.8,
            &[
                "Missing or misconfigured environment variable",
                "Dependency or browser binary not installed",
                "Insufficient file system permissions",
                "Configuration differs between local and CI environments",
            ],
        ),
        ClassificationRule::new(
            "timing",
            &[
                r"timeout \d+ms exceeded",
                r"timed out",
                r"exceeded while waiting",
                r"waiting for (selector|locator|element|navigation|event|response|function)",
                r"navigation timeout",
                r"\btimeout\b",
            ],
            ErrorCategory::Timing,
            Severity::High,
            0.85,
            &[
                "Element did not reach the expected state before the timeout",
                "Application responded slower than the configured timeout",
                "Missing or insufficient explicit wait",
                "Race condition between test actions and page updates",
            ],
        ),
        ClassificationRule::new(
            "test-code",
            &[
                r"strict mode violation",
                r"resolved to \d+ elements",
                r"typeerror",
                r"referenceerror",
                r"is not a function",
                r"is not defined",
                r"cannot read propert(y|ies) of (undefined|null)",
                r"syntaxerror",
                r"(invalid|malformed) selector",
            ],
            ErrorCategory::TestCode,
            Severity::Medium,
            0.8,
            &[
                "Selector matches multiple or wrong elements",
                "Bug in test code or helper function",
                "Selector outdated after a UI change",
                "Incorrect test setup or teardown",
            ],
        ),
        ClassificationRule::new(
            "data",
            &[
                r"duplicate key",
                r"unique constraint",
                r"foreign key constraint",
                r"\bfixture",
                r"seed(ed)? data",
                r"test data",
                r"unexpected token .* in json",
                r"invalid json",
                r"already exists",
                r"record not found",
            ],
            ErrorCategory::Data,
            Severity::Medium,
            0.75,
            &[
                "Test data missing or not seeded",
                "State leaked from a previous test",
                "Conflicting data created by parallel tests",
                "Unexpected data format from the backend",
            ],
        ),
        ClassificationRule::new(
            "application",
            &[
                r"status(\s+code)?:?\s*5\d\d",
                r"\b50[0-4]\b",
                r"internal server error",
                r"service unavailable",
                r"bad gateway",
                r"uncaught exception",
                r"unhandled (promise )?rejection",
                r"expect\(.*\)\.",
                r"expected .* (to|received)",
                r"assertionerror",
            ],
            ErrorCategory::Application,
            Severity::High,
            0.75,
            &[
                "Application returned an error response",
                "Regression in application behavior",
                "Unhandled exception in application code",
                "UI rendered unexpected content",
            ],
        ),
    ]
});

/// The built-in rule table, in priority order
pub fn default_rules() -> Vec<ClassificationRule> {
    DEFAULT_RULES.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_patterns_compile() {
        for rule in DEFAULT_RULES.iter() {
            assert!(rule.pattern_count() > 0, "rule '{}' has no patterns", rule.name);
            assert!(!rule.root_causes.is_empty());
            assert!((0.0..=1.0).contains(&rule.confidence));
        }
    }

    #[test]
    fn test_invalid_pattern_is_skipped() {
        let rule = ClassificationRule::new(
            "broken",
            &[r"(unclosed", r"valid"],
            ErrorCategory::Data,
            Severity::Low,
            0.6,
            &["cause"],
        );
        assert_eq!(rule.pattern_count(), 1);
        assert!(rule.matches("a valid haystack"));
    }

    #[test]
    fn test_every_category_has_a_rule() {
        for category in ErrorCategory::ALL {
            assert!(
                DEFAULT_RULES.iter().any(|r| r.category == category),
                "no rule for {}",
                category
            );
        }
    }
}
