//! Historical trend analysis
//!
//! Each analysis run appends one data point to an on-disk history, then
//! trends are computed over a look-back window:
//!
//! 1. Trend metrics: current vs. previous point, percent change, direction
//! 2. Forecasts: least-squares line over the most recent points
//! 3. Anomalies: pass-rate variance over the most recent points
//! 4. Insights and recommendations from thresholded rules
//!
//! Two metric families share the same engine: quality/coverage
//! (`TrendAnalyzer`) and execution/performance (`ExecutionTrendAnalyzer`).

mod engine;
mod execution;
pub mod history;
mod metrics;
mod quality;

pub use engine::TrendEngine;
pub use execution::{ExecutionSnapshot, ExecutionTrendAnalyzer};
pub use history::{HistoryStore, Timestamped};
pub use metrics::{forecast, trend_metric};
pub use quality::{QualitySnapshot, TrendAnalyzer};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::classify::Severity;
use crate::priority::Priority;

/// Metric key every bundle exposes; used for the variance check
pub const PASS_RATE_KEY: &str = "pass_rate";

/// Look-back window for trend analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisPeriod {
    Daily,
    Weekly,
    Monthly,
}

impl AnalysisPeriod {
    pub fn days(&self) -> i64 {
        match self {
            AnalysisPeriod::Daily => 7,
            AnalysisPeriod::Weekly => 30,
            AnalysisPeriod::Monthly => 90,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisPeriod::Daily => "daily",
            AnalysisPeriod::Weekly => "weekly",
            AnalysisPeriod::Monthly => "monthly",
        }
    }
}

/// Direction of a metric, judged by whether higher is better
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Declining,
    Stable,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Declining => "declining",
            TrendDirection::Stable => "stable",
        }
    }
}

/// Whether a rising value is good or bad
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    HigherIsBetter,
    LowerIsBetter,
}

/// Improvement area a metric belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricKind {
    Performance,
    Stability,
    Coverage,
}

/// Static description of a tracked metric
#[derive(Debug, Clone, Copy)]
pub struct MetricSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub polarity: Polarity,
    pub kind: MetricKind,
    pub min: f64,
    pub max: Option<f64>,
}

impl MetricSpec {
    pub const fn percentage(
        key: &'static str,
        label: &'static str,
        polarity: Polarity,
        kind: MetricKind,
    ) -> Self {
        Self {
            key,
            label,
            polarity,
            kind,
            min: 0.0,
            max: Some(100.0),
        }
    }

    pub const fn non_negative(
        key: &'static str,
        label: &'static str,
        polarity: Polarity,
        kind: MetricKind,
    ) -> Self {
        Self {
            key,
            label,
            polarity,
            kind,
            min: 0.0,
            max: None,
        }
    }

    /// Clamp a value into the metric's valid range
    pub fn clamp(&self, value: f64) -> f64 {
        if value.is_nan() {
            return self.min;
        }
        let value = value.max(self.min);
        match self.max {
            Some(max) => value.min(max),
            None => value,
        }
    }
}

/// A bundle of metrics persisted once per run
pub trait MetricBundle: Serialize + DeserializeOwned + Clone + std::fmt::Debug {
    /// Metrics tracked for this family, in report order
    fn specs() -> &'static [MetricSpec];

    /// Value of a metric by key
    fn value(&self, key: &str) -> Option<f64>;
}

/// One persisted snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendDataPoint<M> {
    /// ISO date (YYYY-MM-DD)
    pub date: String,
    pub timestamp: DateTime<Utc>,
    pub metrics: M,
}

impl<M> TrendDataPoint<M> {
    pub fn new(metrics: M, now: DateTime<Utc>) -> Self {
        Self {
            date: now.format("%Y-%m-%d").to_string(),
            timestamp: now,
            metrics,
        }
    }
}

impl<M> Timestamped for TrendDataPoint<M> {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}

/// Change of one metric between the two most recent points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendMetric {
    pub metric: String,
    pub label: String,
    pub current: f64,
    pub previous: f64,
    pub change: f64,
    pub change_percent: f64,
    pub direction: TrendDirection,
    /// Heuristic, 0.0 - 1.0
    pub confidence: f64,
}

/// Next-run forecast for a moving metric
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub metric: String,
    pub label: String,
    pub current: f64,
    pub predicted: f64,
    /// Change per run of the fitted line
    pub slope: f64,
    pub direction: TrendDirection,
    pub based_on_points: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Regression,
    Improvement,
    Performance,
    Stability,
    Coverage,
    Anomaly,
}

/// A notable observation about the history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub severity: Severity,
    pub title: String,
    pub description: String,
    pub impact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

/// Area a trend recommendation targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecommendationArea {
    Performance,
    Stability,
    Coverage,
    Maintenance,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecommendation {
    pub priority: Priority,
    pub area: RecommendationArea,
    pub title: String,
    pub description: String,
    pub actions: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metric: Option<String>,
}

/// Trend analysis over one look-back window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub period: AnalysisPeriod,
    /// Points inside the window
    pub data_points: usize,
    pub insufficient_data: bool,
    pub first_date: Option<String>,
    pub last_date: Option<String>,
    pub trends: Vec<TrendMetric>,
    pub predictions: Vec<Prediction>,
    /// Population variance of the pass rate over the recent points
    pub pass_rate_variance: f64,
    pub insights: Vec<Insight>,
    pub recommendations: Vec<TrendRecommendation>,
}

impl TrendAnalysis {
    pub fn trend(&self, metric: &str) -> Option<&TrendMetric> {
        self.trends.iter().find(|t| t.metric == metric)
    }

    pub fn prediction(&self, metric: &str) -> Option<&Prediction> {
        self.predictions.iter().find(|p| p.metric == metric)
    }

    pub fn declining(&self) -> impl Iterator<Item = &TrendMetric> {
        self.trends
            .iter()
            .filter(|t| t.direction == TrendDirection::Declining)
    }
}

/// Which way a metric has to move for a rule to fire
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Movement {
    Rise,
    Fall,
}

/// Thresholded insight rule evaluated against one trend metric
#[derive(Debug, Clone, Copy)]
pub struct InsightRule {
    pub metric: &'static str,
    pub movement: Movement,
    /// Minimum |change %| for the rule to fire
    pub threshold_percent: f64,
    pub insight_type: InsightType,
    pub severity: Severity,
    pub title: &'static str,
    pub impact: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_days() {
        assert_eq!(AnalysisPeriod::Daily.days(), 7);
        assert_eq!(AnalysisPeriod::Weekly.days(), 30);
        assert_eq!(AnalysisPeriod::Monthly.days(), 90);

        use clap::ValueEnum;
        assert_eq!(AnalysisPeriod::from_str("WEEKLY", true), Ok(AnalysisPeriod::Weekly));
        assert!(AnalysisPeriod::from_str("yearly", true).is_err());
    }

    #[test]
    fn test_metric_spec_clamp() {
        let pct = MetricSpec::percentage("p", "P", Polarity::HigherIsBetter, MetricKind::Coverage);
        assert_eq!(pct.clamp(120.0), 100.0);
        assert_eq!(pct.clamp(-4.0), 0.0);

        let duration =
            MetricSpec::non_negative("d", "D", Polarity::LowerIsBetter, MetricKind::Performance);
        assert_eq!(duration.clamp(-1.0), 0.0);
        assert_eq!(duration.clamp(1e9), 1e9);
    }

    #[test]
    fn test_data_point_date() {
        let now = DateTime::parse_from_rfc3339("2026-03-04T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let point = TrendDataPoint::new(1u32, now);
        assert_eq!(point.date, "2026-03-04");
    }
}
