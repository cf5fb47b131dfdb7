//! testlens - test quality analytics
//!
//! Turns raw per-test results into failure classifications, stability
//! scores, historical trends and a weighted quality score with action items.
//!
//! ## Pipeline
//!
//! results -> `ErrorClassifier` / `FailureAnalyzer` -> `StabilityMonitor`
//! -> `TrendAnalyzer` + `ExecutionTrendAnalyzer` -> `QualityImprovementTracker`
//!
//! Every stage returns plain serializable data. Only the history layer
//! touches the file system, and its failures degrade to warnings.

pub mod classify;
pub mod config;
pub mod error;
pub mod priority;
pub mod quality;
pub mod results;
pub mod stability;
pub mod stats;
pub mod trends;

pub use classify::{ErrorCategory, ErrorClassification, ErrorClassifier, FailureAnalyzer, Severity};
pub use config::EngineConfig;
pub use error::{HistoryError, HistoryResult};
pub use priority::{Effort, Priority};
pub use quality::{QualityImprovementTracker, QualityMetrics, QualityReport};
pub use results::{RunContext, TestRunResult, TestStatus};
pub use stability::{StabilityMetrics, StabilityMonitor};
pub use trends::{AnalysisPeriod, ExecutionTrendAnalyzer, TrendAnalysis, TrendAnalyzer};
