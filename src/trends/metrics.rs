//! Per-metric trend math

use super::{MetricSpec, Polarity, Prediction, TrendDirection, TrendMetric};
use crate::stats::{linear_regression, percent};

/// Trend of one metric from its chronological series
///
/// Only the two most recent values matter. The percent change is relative
/// to the previous value and is zero when the previous value is zero.
pub fn trend_metric(spec: &MetricSpec, series: &[f64], threshold_percent: f64) -> TrendMetric {
    let (previous, current) = match series {
        [] => {
            return TrendMetric {
                metric: spec.key.to_string(),
                label: spec.label.to_string(),
                current: 0.0,
                previous: 0.0,
                change: 0.0,
                change_percent: 0.0,
                direction: TrendDirection::Stable,
                confidence: 0.0,
            }
        }
        [only] => (*only, *only),
        [.., previous, current] => (*previous, *current),
    };

    let change = current - previous;
    let change_percent = percent(change, previous);

    TrendMetric {
        metric: spec.key.to_string(),
        label: spec.label.to_string(),
        current,
        previous,
        change,
        change_percent,
        direction: direction(spec.polarity, change_percent, threshold_percent),
        confidence: (0.5 + change_percent.abs() / 100.0).min(0.9),
    }
}

fn direction(polarity: Polarity, change_percent: f64, threshold_percent: f64) -> TrendDirection {
    if change_percent.abs() < threshold_percent {
        return TrendDirection::Stable;
    }

    let rising = change_percent > 0.0;
    match (polarity, rising) {
        (Polarity::HigherIsBetter, true) | (Polarity::LowerIsBetter, false) => {
            TrendDirection::Improving
        }
        _ => TrendDirection::Declining,
    }
}

/// Next-value forecast from a least-squares line over the last `window` values
///
/// The forecast never lands on the wrong side of the last observation:
/// a rising line predicts at least the last value, a falling line at most.
/// The result is clamped into the metric's range.
pub fn forecast(
    spec: &MetricSpec,
    series: &[f64],
    window: usize,
    direction: TrendDirection,
) -> Option<Prediction> {
    if series.len() < 2 {
        return None;
    }

    let recent = &series[series.len().saturating_sub(window.max(2))..];
    let (slope, intercept) = linear_regression(recent);
    let last = *recent.last()?;

    let mut predicted = slope * recent.len() as f64 + intercept;
    if slope > 0.0 {
        predicted = predicted.max(last);
    } else if slope < 0.0 {
        predicted = predicted.min(last);
    }

    Some(Prediction {
        metric: spec.key.to_string(),
        label: spec.label.to_string(),
        current: last,
        predicted: spec.clamp(predicted),
        slope,
        direction,
        based_on_points: recent.len(),
    })
}
