//! Static impact, resolution and prevention tables

use super::{ErrorCategory, Severity};

pub const UNCLASSIFIED_ROOT_CAUSE: &str = "Unclassified failure - inspect the error output";

/// Impact text for a category at a given severity
pub fn impact(category: ErrorCategory, severity: Severity) -> &'static str {
    match (category, severity) {
        (ErrorCategory::Browser, Severity::Critical) => {
            "Browser crashes abort every test sharing the worker; results for the rest of the shard are unreliable"
        }
        (ErrorCategory::Browser, _) => {
            "Individual tests lose their page and fail without exercising the feature"
        }
        (ErrorCategory::Network, Severity::Critical | Severity::High) => {
            "Tests cannot reach the system under test; failures say nothing about application quality"
        }
        (ErrorCategory::Network, _) => {
            "Sporadic connectivity failures add noise and trigger retries"
        }
        (ErrorCategory::Infrastructure, Severity::Critical) => {
            "The test environment itself is failing; the whole run may be invalid"
        }
        (ErrorCategory::Infrastructure, _) => {
            "Resource pressure slows the suite and causes cascading failures"
        }
        (ErrorCategory::Environment, Severity::Critical | Severity::High) => {
            "Misconfigured environment blocks all dependent tests until fixed"
        }
        (ErrorCategory::Environment, _) => {
            "Environment drift causes results to differ between machines"
        }
        (ErrorCategory::Timing, Severity::Critical | Severity::High) => {
            "Timing failures make results non-deterministic and erode trust in the suite"
        }
        (ErrorCategory::Timing, _) => {
            "Occasional slow responses cause intermittent failures and retries"
        }
        (ErrorCategory::TestCode, Severity::Critical | Severity::High) => {
            "Broken test code hides real regressions behind false failures"
        }
        (ErrorCategory::TestCode, _) => {
            "Test code defects produce false failures that need manual triage"
        }
        (ErrorCategory::Data, Severity::Critical | Severity::High) => {
            "Corrupt or missing test data blocks whole feature areas"
        }
        (ErrorCategory::Data, _) => {
            "Data conflicts cause order-dependent, hard to reproduce failures"
        }
        (ErrorCategory::Application, Severity::Critical) => {
            "A user-facing feature is broken; release should be blocked"
        }
        (ErrorCategory::Application, Severity::High) => {
            "Likely product regression affecting users of this feature"
        }
        (ErrorCategory::Application, _) => {
            "Possible product defect; needs triage to confirm user impact"
        }
    }
}

const RESOLUTIONS: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Network,
        &[
            "Verify the target service is running and reachable from the test runner",
            "Check base URL, proxy and DNS configuration",
            "Add health checks before the suite starts",
            "Mock unstable third-party endpoints",
        ],
    ),
    (
        ErrorCategory::Timing,
        &[
            "Replace fixed sleeps with explicit waits on the expected state",
            "Use web-first assertions that retry until the condition holds",
            "Increase the timeout only for operations that are legitimately slow",
            "Wait for network idle or specific responses before asserting",
        ],
    ),
    (
        ErrorCategory::TestCode,
        &[
            "Use role or test-id based selectors that match exactly one element",
            "Fix the failing helper and add a unit test for it",
            "Review setup and teardown for missing steps",
        ],
    ),
    (
        ErrorCategory::Application,
        &[
            "Reproduce the failure manually and file a product bug",
            "Check application logs around the failure timestamp",
            "Compare with the last passing build to isolate the change",
        ],
    ),
    (
        ErrorCategory::Browser,
        &[
            "Avoid closing pages or contexts while actions are pending",
            "Reduce parallel workers to lower browser memory pressure",
            "Align browser and automation library versions",
        ],
    ),
    (
        ErrorCategory::Environment,
        &[
            "Validate required environment variables at startup",
            "Install browsers and dependencies as part of CI setup",
            "Document and script environment provisioning",
        ],
    ),
    (
        ErrorCategory::Data,
        &[
            "Create unique test data per test instead of sharing records",
            "Seed required data in a fixture and clean up afterwards",
            "Isolate database state between parallel workers",
        ],
    ),
    (
        ErrorCategory::Infrastructure,
        &[
            "Increase runner memory or disk allocation",
            "Reduce worker count or shard the suite",
            "Monitor runner health and retry infrastructure-level failures automatically",
        ],
    ),
];

const PREVENTION: &[(ErrorCategory, &[&str])] = &[
    (
        ErrorCategory::Network,
        &["Run a connectivity smoke check before the suite", "Stub external services in CI"],
    ),
    (
        ErrorCategory::Timing,
        &["Lint for hard-coded sleeps", "Track p95 durations to catch slowdowns early"],
    ),
    (
        ErrorCategory::TestCode,
        &[
            "Review test code with the same rigor as product code",
            "Adopt a shared page-object layer",
        ],
    ),
    (
        ErrorCategory::Data,
        &["Generate data with factories", "Reset state between tests"],
    ),
    (
        ErrorCategory::Environment,
        &[
            "Keep environment configuration in version control",
            "Fail fast on missing configuration",
        ],
    ),
    (
        ErrorCategory::Infrastructure,
        &["Alert on runner resource usage", "Pin runner images"],
    ),
];

const GENERIC_RESOLUTIONS: &[&str] = &[
    "Analyze the full error output and stack trace further",
    "Reproduce the failure locally with tracing enabled",
    "Check recent changes to the test and the application",
];

const GENERIC_PREVENTION: &[&str] = &["Add more descriptive assertions and error messages"];

fn lookup(table: &[(ErrorCategory, &[&str])], category: ErrorCategory) -> Option<Vec<String>> {
    table
        .iter()
        .find(|(c, _)| *c == category)
        .map(|(_, entries)| entries.iter().map(|e| e.to_string()).collect())
}

/// Resolution steps for a category, generic steps when the table has none
pub fn resolutions(category: ErrorCategory) -> Vec<String> {
    lookup(RESOLUTIONS, category).unwrap_or_else(generic_resolutions)
}

/// Prevention tips for a category, generic tips when the table has none
pub fn prevention(category: ErrorCategory) -> Vec<String> {
    lookup(PREVENTION, category).unwrap_or_else(generic_prevention)
}

pub fn generic_resolutions() -> Vec<String> {
    GENERIC_RESOLUTIONS.iter().map(|s| s.to_string()).collect()
}

pub fn generic_prevention() -> Vec<String> {
    GENERIC_PREVENTION.iter().map(|s| s.to_string()).collect()
}
