//! Generic trend engine shared by both metric families

use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use tracing::{debug, warn};

use super::history::HistoryStore;
use super::metrics::{forecast, trend_metric};
use super::{
    AnalysisPeriod, Insight, InsightRule, InsightType, MetricBundle, MetricKind, Movement,
    RecommendationArea, TrendAnalysis, TrendDataPoint, TrendDirection, TrendMetric,
    TrendRecommendation, PASS_RATE_KEY,
};
use crate::classify::Severity;
use crate::config::TrendConfig;
use crate::priority::Priority;
use crate::stats::variance;

/// Declines steeper than this get high-priority recommendations
const STEEP_DECLINE_PERCENT: f64 = 20.0;

/// Records snapshots of one metric family and analyzes their history
#[derive(Debug, Clone)]
pub struct TrendEngine<B> {
    store: HistoryStore<TrendDataPoint<B>>,
    change_threshold_percent: f64,
    variance_threshold: f64,
    forecast_window: usize,
}

impl<B: MetricBundle> TrendEngine<B> {
    pub fn new(path: &Path, retention_days: i64, config: &TrendConfig) -> Self {
        Self {
            store: HistoryStore::new(path, retention_days),
            change_threshold_percent: config.change_threshold_percent.max(0.0),
            variance_threshold: config.variance_threshold,
            forecast_window: config.forecast_window.max(2),
        }
    }

    pub fn store(&self) -> &HistoryStore<TrendDataPoint<B>> {
        &self.store
    }

    /// Persist one snapshot
    ///
    /// Persistence failures are logged and swallowed; the point is still
    /// returned so the caller's run is unaffected.
    pub fn record(&self, metrics: B, now: DateTime<Utc>) -> TrendDataPoint<B> {
        let point = TrendDataPoint::new(metrics, now);
        match self.store.append(point.clone(), now) {
            Ok(kept) => debug!("Recorded trend point in {:?} ({} kept)", self.store.path(), kept),
            Err(e) => warn!("Failed to persist trend point: {}", e),
        }
        point
    }

    pub fn history(&self) -> Vec<TrendDataPoint<B>> {
        self.store.load_or_empty()
    }

    /// Analyze the points inside `period` ending at `now`
    ///
    /// Reads only; repeated calls with the same `now` give the same result.
    pub fn analyze(
        &self,
        period: AnalysisPeriod,
        now: DateTime<Utc>,
        rules: &[InsightRule],
    ) -> TrendAnalysis {
        let cutoff = now - Duration::days(period.days());
        let window: Vec<TrendDataPoint<B>> = self
            .history()
            .into_iter()
            .filter(|p| p.timestamp >= cutoff && p.timestamp <= now)
            .collect();

        let first_date = window.first().map(|p| p.date.clone());
        let last_date = window.last().map(|p| p.date.clone());

        if window.len() < 2 {
            debug!("Only {} points in the {} window", window.len(), period.as_str());
            return TrendAnalysis {
                period,
                data_points: window.len(),
                insufficient_data: true,
                first_date,
                last_date,
                trends: Vec::new(),
                predictions: Vec::new(),
                pass_rate_variance: 0.0,
                insights: Vec::new(),
                recommendations: vec![TrendRecommendation {
                    priority: Priority::Low,
                    area: RecommendationArea::Maintenance,
                    title: "Collect more history".to_string(),
                    description: format!(
                        "At least two runs within the last {} days are needed to detect trends",
                        period.days()
                    ),
                    actions: vec!["Record every CI run so trends can be computed".to_string()],
                    metric: None,
                }],
            };
        }

        let mut trends = Vec::new();
        let mut predictions = Vec::new();
        for spec in B::specs() {
            let values = series(&window, spec.key);
            let trend = trend_metric(spec, &values, self.change_threshold_percent);
            if trend.direction != TrendDirection::Stable {
                predictions.extend(forecast(spec, &values, self.forecast_window, trend.direction));
            }
            trends.push(trend);
        }

        let pass_rates = series(&window, PASS_RATE_KEY);
        let recent = &pass_rates[pass_rates.len().saturating_sub(self.forecast_window)..];
        let pass_rate_variance = variance(recent);

        let mut insights = rule_insights(&trends, rules);
        if pass_rate_variance > self.variance_threshold {
            insights.push(Insight {
                insight_type: InsightType::Anomaly,
                severity: Severity::Medium,
                title: "Unstable results".to_string(),
                description: format!(
                    "Pass rate variance over the last {} runs is {:.1}",
                    recent.len(),
                    pass_rate_variance
                ),
                impact: "Results swing between runs, so a single run says little about quality".to_string(),
                metric: Some(PASS_RATE_KEY.to_string()),
            });
        }

        let recommendations = recommendations::<B>(&trends);

        TrendAnalysis {
            period,
            data_points: window.len(),
            insufficient_data: false,
            first_date,
            last_date,
            trends,
            predictions,
            pass_rate_variance,
            insights,
            recommendations,
        }
    }
}

fn series<B: MetricBundle>(window: &[TrendDataPoint<B>], key: &str) -> Vec<f64> {
    window
        .iter()
        .filter_map(|p| p.metrics.value(key))
        .filter(|v| v.is_finite())
        .collect()
}

fn rule_insights(trends: &[TrendMetric], rules: &[InsightRule]) -> Vec<Insight> {
    rules
        .iter()
        .filter_map(|rule| {
            let trend = trends.iter().find(|t| t.metric == rule.metric)?;
            let fired = match rule.movement {
                Movement::Rise => trend.change_percent > rule.threshold_percent,
                Movement::Fall => trend.change_percent < -rule.threshold_percent,
            };
            fired.then(|| Insight {
                insight_type: rule.insight_type,
                severity: rule.severity,
                title: rule.title.to_string(),
                description: format!(
                    "{} changed by {:+.1}% ({:.2} -> {:.2})",
                    trend.label, trend.change_percent, trend.previous, trend.current
                ),
                impact: rule.impact.to_string(),
                metric: Some(trend.metric.clone()),
            })
        })
        .collect()
}

fn recommendations<B: MetricBundle>(trends: &[TrendMetric]) -> Vec<TrendRecommendation> {
    let mut recommendations: Vec<TrendRecommendation> = trends
        .iter()
        .filter(|t| t.direction == TrendDirection::Declining)
        .filter_map(|trend| {
            let spec = B::specs().iter().find(|s| s.key == trend.metric)?;
            let priority = if trend.change_percent.abs() > STEEP_DECLINE_PERCENT {
                Priority::High
            } else {
                Priority::Medium
            };
            let (area, title, actions) = match spec.kind {
                MetricKind::Performance => (
                    RecommendationArea::Performance,
                    format!("Optimize {}", spec.label.to_lowercase()),
                    vec![
                        "Profile the slowest tests and trim redundant steps",
                        "Run independent tests in parallel",
                        "Reuse authenticated state and seed data through the API",
                    ],
                ),
                MetricKind::Stability => (
                    RecommendationArea::Stability,
                    format!("Recover {}", spec.label.to_lowercase()),
                    vec![
                        "Quarantine tests that fail intermittently",
                        "Replace fixed sleeps with explicit waits",
                        "Isolate test data between runs",
                    ],
                ),
                MetricKind::Coverage => (
                    RecommendationArea::Coverage,
                    format!("Restore {}", spec.label.to_lowercase()),
                    vec![
                        "Add tests for recently changed modules",
                        "Gate merges on a coverage floor in CI",
                    ],
                ),
            };

            Some(TrendRecommendation {
                priority,
                area,
                title,
                description: format!(
                    "{} moved {:+.1}% since the previous run ({:.2} -> {:.2})",
                    trend.label, trend.change_percent, trend.previous, trend.current
                ),
                actions: actions.iter().map(|a| a.to_string()).collect(),
                metric: Some(trend.metric.clone()),
            })
        })
        .collect();

    if recommendations.is_empty() {
        recommendations.push(TrendRecommendation {
            priority: Priority::Low,
            area: RecommendationArea::Maintenance,
            title: "Maintain current quality".to_string(),
            description: "No metric is declining".to_string(),
            actions: vec![
                "Keep recording every run".to_string(),
                "Review trends weekly".to_string(),
            ],
            metric: None,
        });
    }

    recommendations.sort_by(|a, b| b.priority.cmp(&a.priority));
    recommendations
}
