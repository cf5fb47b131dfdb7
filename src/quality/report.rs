//! Executive summary, templated recommendations and roadmap

use serde::{Deserialize, Serialize};

use super::dimensions::{gap_band, ActionItem, Dimension, DimensionChange, DimensionScore};
use crate::priority::{Effort, Priority};

/// Overall health band
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLabel {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl HealthLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 90.0 {
            HealthLabel::Excellent
        } else if score >= 80.0 {
            HealthLabel::Good
        } else if score >= 70.0 {
            HealthLabel::Fair
        } else {
            HealthLabel::Poor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLabel::Excellent => "excellent",
            HealthLabel::Good => "good",
            HealthLabel::Fair => "fair",
            HealthLabel::Poor => "poor",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveSummary {
    pub health: HealthLabel,
    pub overall_score: f64,
    pub headline: String,
    pub key_findings: Vec<String>,
    /// Titles of the most urgent action items
    pub top_priorities: Vec<String>,
}

pub fn executive_summary(
    overall_score: f64,
    dimensions: &[DimensionScore],
    improvements: &[DimensionChange],
    regressions: &[DimensionChange],
    action_items: &[ActionItem],
) -> ExecutiveSummary {
    let health = HealthLabel::from_score(overall_score);

    let mut key_findings = Vec::new();
    if let Some(strongest) = dimensions
        .iter()
        .max_by(|a, b| a.current.total_cmp(&b.current))
    {
        key_findings.push(format!(
            "Strongest dimension: {} ({:.1})",
            strongest.name.label(),
            strongest.current
        ));
    }
    if let Some(weakest) = dimensions
        .iter()
        .min_by(|a, b| a.current.total_cmp(&b.current))
    {
        key_findings.push(format!(
            "Weakest dimension: {} ({:.1})",
            weakest.name.label(),
            weakest.current
        ));
    }
    key_findings.extend(improvements.iter().map(|c| c.description.clone()));
    key_findings.extend(regressions.iter().map(|c| c.description.clone()));

    let below_target = dimensions.iter().filter(|d| d.gap() > 0.0).count();

    ExecutiveSummary {
        health,
        overall_score,
        headline: format!(
            "Test quality is {} at {:.0}/100 with {} of {} dimensions below target",
            health.as_str(),
            overall_score,
            below_target,
            dimensions.len()
        ),
        key_findings,
        top_priorities: action_items.iter().take(3).map(|a| a.title.clone()).collect(),
    }
}

/// Improvement plan for one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityRecommendation {
    pub dimension: Dimension,
    pub priority: Priority,
    pub effort: Effort,
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
}

fn dimension_actions(dimension: Dimension) -> &'static [&'static str] {
    match dimension {
        Dimension::Reliability => &[
            "Triage every failing test within one working day",
            "Fix or quarantine tests failing more than twice a week",
            "Add assertions on application state before interacting",
        ],
        Dimension::Performance => &[
            "Profile the slowest tests and remove redundant navigation",
            "Increase parallel workers and balance long tests across them",
            "Seed data and authenticate through the API instead of the UI",
        ],
        Dimension::Maintainability => &[
            "Lower retry budgets so instability surfaces early",
            "Extract shared flows into page objects or fixtures",
            "Remove dead and duplicated tests",
        ],
        Dimension::Coverage => &[
            "Add tests for untested user journeys",
            "Cover error and edge-case branches",
            "Enforce a coverage floor in CI",
        ],
        Dimension::Stability => &[
            "Replace fixed sleeps with explicit waits",
            "Isolate test data per worker",
            "Track flaky tests and fix the top offenders each sprint",
        ],
    }
}

/// One recommendation per dimension below target, largest gap first
pub fn recommendations(dimensions: &[DimensionScore]) -> Vec<QualityRecommendation> {
    let mut below: Vec<&DimensionScore> = dimensions.iter().filter(|d| d.gap() > 0.0).collect();
    below.sort_by(|a, b| b.gap().total_cmp(&a.gap()));

    let mut recommendations: Vec<QualityRecommendation> = below
        .into_iter()
        .map(|score| {
            let (effort, priority) = gap_band(score.gap());
            QualityRecommendation {
                dimension: score.name,
                priority,
                effort,
                title: format!("Improve {}", score.name),
                description: format!(
                    "{} is at {:.1} against a target of {:.0} ({:.1} point gap)",
                    score.name.label(),
                    score.current,
                    score.target,
                    score.gap()
                ),
                actions: dimension_actions(score.name).iter().map(|a| a.to_string()).collect(),
            }
        })
        .collect();

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadmapItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimension: Option<Dimension>,
    pub goal: String,
    pub target_score: f64,
}

/// Three-horizon improvement roadmap
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Roadmap {
    pub current_quarter: Vec<RoadmapItem>,
    pub next_quarter: Vec<RoadmapItem>,
    pub long_term: Vec<RoadmapItem>,
}

/// Gaps above 10 points go into the current quarter, smaller gaps into the
/// next; dimensions on target are kept there long term.
pub fn roadmap(overall_score: f64, dimensions: &[DimensionScore]) -> Roadmap {
    let mut roadmap = Roadmap::default();

    for score in dimensions {
        let gap = score.gap();
        if gap > 10.0 {
            roadmap.current_quarter.push(RoadmapItem {
                dimension: Some(score.name),
                goal: format!(
                    "Close half of the {} gap ({:.1} points)",
                    score.name,
                    gap
                ),
                target_score: (score.current + gap / 2.0).round(),
            });
            roadmap.next_quarter.push(RoadmapItem {
                dimension: Some(score.name),
                goal: format!("Bring {} to target", score.name),
                target_score: score.target,
            });
        } else if gap > 0.0 {
            roadmap.next_quarter.push(RoadmapItem {
                dimension: Some(score.name),
                goal: format!("Bring {} to target", score.name),
                target_score: score.target,
            });
        } else {
            roadmap.long_term.push(RoadmapItem {
                dimension: Some(score.name),
                goal: format!("Hold {} at or above {:.0}", score.name, score.target),
                target_score: score.target,
            });
        }
    }

    roadmap.long_term.push(RoadmapItem {
        dimension: None,
        goal: if overall_score >= 90.0 {
            "Sustain an excellent overall score".to_string()
        } else {
            "Reach an excellent overall score".to_string()
        },
        target_score: 90.0_f64.max(overall_score),
    });

    roadmap
}
