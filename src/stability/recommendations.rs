//! Stability recommendations
//!
//! One recommendation per problematic test and per problematic category,
//! sorted by priority (highest first).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{CategoryStabilityInfo, StabilityStatus, TestStabilityInfo};
use crate::config::StabilityConfig;
use crate::priority::{Effort, Priority};

/// What a recommendation is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationKind {
    Test,
    Category,
}

/// A suggested stability fix
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StabilityRecommendation {
    pub priority: Priority,
    pub kind: RecommendationKind,
    /// Test category the recommendation belongs to
    pub category: String,
    pub issue: String,
    pub impact: String,
    pub solution: String,
    pub effort: Effort,
    pub affected_tests: Vec<String>,
}

pub(super) fn generate(
    tests: &BTreeMap<String, TestStabilityInfo>,
    categories: &BTreeMap<String, CategoryStabilityInfo>,
    config: &StabilityConfig,
) -> Vec<StabilityRecommendation> {
    let mut recommendations = Vec::new();

    for test in tests.values() {
        match test.status {
            StabilityStatus::Flaky => recommendations.push(StabilityRecommendation {
                priority: Priority::High,
                kind: RecommendationKind::Test,
                category: test.category.clone(),
                issue: format!(
                    "'{}' is flaky ({:.0}% success over {} runs)",
                    test.name,
                    test.stability_score * 100.0,
                    test.total_runs
                ),
                impact: "Flaky results block merges and train the team to ignore failures".to_string(),
                solution: if test.stability_score < config.thresholds.flaky {
                    "Redesign the test around deterministic waits and isolated test data".to_string()
                } else {
                    "Quarantine the test, reproduce locally and fix the intermittent step".to_string()
                },
                effort: if test.stability_score < config.thresholds.flaky {
                    Effort::Large
                } else {
                    Effort::Medium
                },
                affected_tests: vec![test.name.clone()],
            }),
            StabilityStatus::Unstable => recommendations.push(StabilityRecommendation {
                priority: Priority::Medium,
                kind: RecommendationKind::Test,
                category: test.category.clone(),
                issue: format!(
                    "'{}' fails intermittently ({:.0}% success)",
                    test.name,
                    test.stability_score * 100.0
                ),
                impact: "Intermittent failures cost triage time and mask real regressions".to_string(),
                solution: "Review waits and synchronization; prefer explicit waits on application state".to_string(),
                effort: Effort::Medium,
                affected_tests: vec![test.name.clone()],
            }),
            StabilityStatus::Stable => {}
        }

        if test.retry_rate > config.retry_rate_critical {
            recommendations.push(StabilityRecommendation {
                priority: Priority::Medium,
                kind: RecommendationKind::Test,
                category: test.category.clone(),
                issue: format!(
                    "'{}' relies on retries ({:.0}% retry rate)",
                    test.name,
                    test.retry_rate * 100.0
                ),
                impact: "Retries hide instability and lengthen every run".to_string(),
                solution: "Find the step that needs a retry and make it deterministic".to_string(),
                effort: Effort::Medium,
                affected_tests: vec![test.name.clone()],
            });
        }

        if test.average_duration_ms > config.very_slow_test_ms {
            recommendations.push(StabilityRecommendation {
                priority: Priority::Low,
                kind: RecommendationKind::Test,
                category: test.category.clone(),
                issue: format!(
                    "'{}' is slow ({:.1}s average)",
                    test.name,
                    test.average_duration_ms / 1000.0
                ),
                impact: "Slow tests lengthen feedback loops and are more exposed to timeouts".to_string(),
                solution: "Split the scenario, reuse authenticated state and seed data through the API".to_string(),
                effort: Effort::Small,
                affected_tests: vec![test.name.clone()],
            });
        }
    }

    for category in categories.values() {
        let low_score = category.stability_score < config.category_min_score;
        let many_flaky = category.flaky_ratio() > config.category_max_flaky_ratio;
        if !low_score && !many_flaky {
            continue;
        }

        let affected_tests: Vec<String> = tests
            .values()
            .filter(|t| t.category == category.category && t.status != StabilityStatus::Stable)
            .map(|t| t.name.clone())
            .collect();

        let mut issue = format!(
            "Category '{}' is {:.0}% stable ({} of {} tests flaky)",
            category.category,
            category.stability_score * 100.0,
            category.flaky_tests,
            category.total_tests
        );
        if let Some(top) = category.common_issues.first() {
            issue.push_str(&format!("; most common issue: {}", top));
        }

        recommendations.push(StabilityRecommendation {
            priority: if many_flaky { Priority::High } else { Priority::Medium },
            kind: RecommendationKind::Category,
            category: category.category.clone(),
            issue,
            impact: "Coverage of this feature area cannot be trusted".to_string(),
            solution: "Review shared fixtures and page objects used across the category".to_string(),
            effort: if affected_tests.len() > 3 {
                Effort::Large
            } else {
                Effort::Medium
            },
            affected_tests,
        });
    }

    // Stable sort keeps generation order within a priority
    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}
