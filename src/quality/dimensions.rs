//! Quality dimensions: scoring, diffing and action items

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::{knowledge, ErrorCategory, FailureAnalysisReport, Severity};
use crate::priority::{Effort, Priority};
use crate::results::CoverageStats;
use crate::stats::clamp_percent;
use crate::trends::TrendDirection;

/// The five scored quality dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    Reliability,
    Performance,
    Maintainability,
    Coverage,
    Stability,
}

impl Dimension {
    pub const ALL: [Dimension; 5] = [
        Dimension::Reliability,
        Dimension::Performance,
        Dimension::Maintainability,
        Dimension::Coverage,
        Dimension::Stability,
    ];

    /// Weight in the overall score; weights sum to 1.0
    pub fn weight(&self) -> f64 {
        match self {
            Dimension::Reliability => 0.30,
            Dimension::Performance => 0.25,
            Dimension::Maintainability => 0.20,
            Dimension::Coverage => 0.15,
            Dimension::Stability => 0.10,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Reliability => "reliability",
            Dimension::Performance => "performance",
            Dimension::Maintainability => "maintainability",
            Dimension::Coverage => "coverage",
            Dimension::Stability => "stability",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Reliability => "Reliability",
            Dimension::Performance => "Performance",
            Dimension::Maintainability => "Maintainability",
            Dimension::Coverage => "Coverage",
            Dimension::Stability => "Stability",
        }
    }
}

impl std::fmt::Display for Dimension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Target score per dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DimensionTargets {
    pub reliability: f64,
    pub performance: f64,
    pub maintainability: f64,
    pub coverage: f64,
    pub stability: f64,
}

impl Default for DimensionTargets {
    fn default() -> Self {
        Self {
            reliability: 95.0,
            performance: 85.0,
            maintainability: 90.0,
            coverage: 80.0,
            stability: 95.0,
        }
    }
}

impl DimensionTargets {
    pub fn get(&self, dimension: Dimension) -> f64 {
        let target = match dimension {
            Dimension::Reliability => self.reliability,
            Dimension::Performance => self.performance,
            Dimension::Maintainability => self.maintainability,
            Dimension::Coverage => self.coverage,
            Dimension::Stability => self.stability,
        };
        clamp_percent(target)
    }
}

/// Raw measurements the dimensions are computed from
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionInputs {
    /// Percent
    pub pass_rate: f64,
    /// 0.0 - 1.0
    pub stability_score: f64,
    pub average_duration_ms: f64,
    /// Percent
    pub parallel_efficiency: f64,
    /// Retries per executed run
    pub retry_rate: f64,
    pub coverage: CoverageStats,
}

/// Current score of every dimension, each in [0, 100]
pub fn compute_dimensions(inputs: &DimensionInputs) -> BTreeMap<Dimension, f64> {
    let stability = inputs.stability_score * 100.0;
    let time_score = (100.0 - inputs.average_duration_ms / 1000.0 * 2.0).max(0.0);

    let mut scores = BTreeMap::new();
    scores.insert(
        Dimension::Reliability,
        clamp_percent((inputs.pass_rate + 0.3 * stability).min(100.0)),
    );
    scores.insert(
        Dimension::Performance,
        clamp_percent(0.6 * time_score + 0.4 * clamp_percent(inputs.parallel_efficiency)),
    );
    scores.insert(
        Dimension::Maintainability,
        clamp_percent((100.0 - inputs.retry_rate * 50.0).max(0.0)),
    );
    scores.insert(Dimension::Coverage, clamp_percent(inputs.coverage.clamped().average()));
    scores.insert(Dimension::Stability, clamp_percent(stability));
    scores
}

/// One dimension of the quality score
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub name: Dimension,
    pub current: f64,
    pub previous: f64,
    pub target: f64,
    pub trend: TrendDirection,
    pub weight: f64,
}

impl DimensionScore {
    pub fn delta(&self) -> f64 {
        self.current - self.previous
    }

    /// Points below target; zero when on or above target
    pub fn gap(&self) -> f64 {
        (self.target - self.current).max(0.0)
    }
}

/// Pair current scores with the previous snapshot's and label each trend
///
/// Without a previous score the current one is reused, so a first run is
/// always stable.
pub fn score_dimensions(
    current: &BTreeMap<Dimension, f64>,
    previous: Option<&[DimensionScore]>,
    targets: &DimensionTargets,
    dead_band: f64,
) -> Vec<DimensionScore> {
    Dimension::ALL
        .iter()
        .map(|dimension| {
            let now = current.get(dimension).copied().unwrap_or(0.0);
            let before = previous
                .and_then(|scores| scores.iter().find(|s| s.name == *dimension))
                .map(|s| s.current)
                .unwrap_or(now);

            let delta = now - before;
            let trend = if delta > dead_band {
                TrendDirection::Improving
            } else if delta < -dead_band {
                TrendDirection::Declining
            } else {
                TrendDirection::Stable
            };

            DimensionScore {
                name: *dimension,
                current: now,
                previous: before,
                target: targets.get(*dimension),
                trend,
                weight: dimension.weight(),
            }
        })
        .collect()
}

/// round(sum of current x weight), in [0, 100]
pub fn overall_score(dimensions: &[DimensionScore]) -> f64 {
    let weighted: f64 = dimensions.iter().map(|d| d.current * d.weight).sum();
    clamp_percent(weighted).round()
}

/// A significant move of one dimension since the previous run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionChange {
    pub dimension: Dimension,
    pub previous: f64,
    pub current: f64,
    /// |current - previous|
    pub impact: f64,
    pub description: String,
}

/// Improvements and regressions larger than `significant_change`
pub fn detect_changes(
    dimensions: &[DimensionScore],
    significant_change: f64,
) -> (Vec<DimensionChange>, Vec<DimensionChange>) {
    let mut improvements = Vec::new();
    let mut regressions = Vec::new();

    for score in dimensions {
        let impact = score.delta().abs();
        if impact <= significant_change {
            continue;
        }

        let change = |verb: &str| DimensionChange {
            dimension: score.name,
            previous: score.previous,
            current: score.current,
            impact,
            description: format!(
                "{} {} by {:.1} points ({:.1} -> {:.1})",
                score.name.label(),
                verb,
                impact,
                score.previous,
                score.current
            ),
        };

        match score.trend {
            TrendDirection::Improving => improvements.push(change("improved")),
            TrendDirection::Declining => regressions.push(change("regressed")),
            TrendDirection::Stable => {}
        }
    }

    (improvements, regressions)
}

/// Why an action item exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    Regression,
    TargetGap,
    FailureCategory,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionItem {
    pub priority: Priority,
    pub effort: Effort,
    pub source: ActionSource,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<ErrorCategory>,
    pub title: String,
    pub description: String,
}

/// Priority of a regression by how many points it lost
pub fn regression_priority(impact: f64) -> Priority {
    if impact > 10.0 {
        Priority::Critical
    } else if impact > 8.0 {
        Priority::High
    } else {
        Priority::Medium
    }
}

/// Effort and priority of closing a target gap
pub fn gap_band(gap: f64) -> (Effort, Priority) {
    if gap > 20.0 {
        (Effort::Large, Priority::High)
    } else if gap > 10.0 {
        (Effort::Medium, Priority::Medium)
    } else {
        (Effort::Small, Priority::Low)
    }
}

/// Action items from regressions, target gaps and severe failure categories,
/// highest priority first
pub fn action_items(
    dimensions: &[DimensionScore],
    regressions: &[DimensionChange],
    failures: &FailureAnalysisReport,
) -> Vec<ActionItem> {
    let mut items = Vec::new();

    for regression in regressions {
        items.push(ActionItem {
            priority: regression_priority(regression.impact),
            effort: Effort::Medium,
            source: ActionSource::Regression,
            dimension: Some(regression.dimension),
            category: None,
            title: format!("Investigate {} regression", regression.dimension),
            description: regression.description.clone(),
        });
    }

    for score in dimensions.iter().filter(|d| d.gap() > 0.0) {
        let (effort, priority) = gap_band(score.gap());
        items.push(ActionItem {
            priority,
            effort,
            source: ActionSource::TargetGap,
            dimension: Some(score.name),
            category: None,
            title: format!("Raise {} to {:.0}", score.name, score.target),
            description: format!(
                "{} is {:.1}, {:.1} points below target",
                score.name.label(),
                score.current,
                score.gap()
            ),
        });
    }

    // Severe failures per category, in category order
    let mut severe: BTreeMap<ErrorCategory, (usize, Severity)> = BTreeMap::new();
    for failure in &failures.failures {
        let classification = &failure.classification;
        if !classification.severity.is_severe() {
            continue;
        }
        let entry = severe
            .entry(classification.category)
            .or_insert((0, classification.severity));
        entry.0 += 1;
        entry.1 = entry.1.min(classification.severity);
    }

    for (category, (count, severity)) in severe {
        let suggestion = knowledge::resolutions(category)
            .into_iter()
            .next()
            .unwrap_or_else(|| "Review the failing tests".to_string());
        items.push(ActionItem {
            priority: if severity == Severity::Critical {
                Priority::Critical
            } else {
                Priority::High
            },
            effort: Effort::Medium,
            source: ActionSource::FailureCategory,
            dimension: None,
            category: Some(category),
            title: format!("Resolve {} {} failure(s)", count, category),
            description: suggestion,
        });
    }

    items.sort_by(|a, b| b.priority.cmp(&a.priority));
    items
}
