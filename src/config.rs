//! Engine configuration
//!
//! Loaded from `config.toml` in the data directory. Every section falls
//! back to its defaults, so a partial file (or no file) is valid.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::quality::DimensionTargets;
use crate::stability::StabilityThresholds;

/// Directory name used for project-local and home-level data
pub const DATA_DIR_NAME: &str = ".testlens";

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Where history files live; discovered when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
    pub stability: StabilityConfig,
    pub trends: TrendConfig,
    pub quality: QualityConfig,
}

/// Stability scoring and recommendation thresholds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StabilityConfig {
    /// Retry rate above which a test gets a retry suggestion
    pub retry_rate_warning: f64,
    /// Retry rate above which a test gets a recommendation
    pub retry_rate_critical: f64,
    /// Average duration (ms) above which a test gets a speed suggestion
    pub slow_test_ms: f64,
    /// Average duration (ms) above which a test gets a recommendation
    pub very_slow_test_ms: f64,
    /// Category score below which the category gets a recommendation
    pub category_min_score: f64,
    /// Share of flaky tests above which the category gets a recommendation
    pub category_max_flaky_ratio: f64,
    pub thresholds: StabilityThresholds,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            retry_rate_warning: 0.3,
            retry_rate_critical: 0.5,
            slow_test_ms: 20_000.0,
            very_slow_test_ms: 30_000.0,
            category_min_score: 0.8,
            category_max_flaky_ratio: 0.2,
            thresholds: StabilityThresholds::default(),
        }
    }
}

/// History retention and trend detection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    /// Retention for `trend-history.json`
    pub retention_days: i64,
    /// Retention for `execution-history.json`
    pub execution_retention_days: i64,
    /// Retention for `quality-history.json`
    pub quality_retention_days: i64,
    /// |change %| below which a metric is considered stable
    pub change_threshold_percent: f64,
    /// Pass-rate variance above which results are flagged unstable
    pub variance_threshold: f64,
    /// Number of recent points used for forecasting and variance
    pub forecast_window: usize,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            retention_days: 90,
            execution_retention_days: 30,
            quality_retention_days: 90,
            change_threshold_percent: 5.0,
            variance_threshold: 100.0,
            forecast_window: 5,
        }
    }
}

/// Quality scoring settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Minimum dimension delta recorded as an improvement or regression
    pub significant_change: f64,
    /// Dimension deltas within this band are labelled stable
    pub trend_dead_band: f64,
    pub targets: DimensionTargets,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            significant_change: 5.0,
            trend_dead_band: 1.0,
            targets: DimensionTargets::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from file, using defaults when it does not exist
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {:?}", path))?;
        let config: EngineConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config {:?}", path))?;
        Ok(config.normalized())
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Repair values that would break the analysis invariants
    pub fn normalized(mut self) -> Self {
        let fixed = self.stability.thresholds.normalized();
        if fixed != self.stability.thresholds {
            warn!(
                "Stability thresholds {:?} out of order, using {:?}",
                self.stability.thresholds, fixed
            );
            self.stability.thresholds = fixed;
        }

        for days in [
            &mut self.trends.retention_days,
            &mut self.trends.execution_retention_days,
            &mut self.trends.quality_retention_days,
        ] {
            if *days < 1 {
                warn!("Retention of {} days is invalid, using 1", days);
                *days = 1;
            }
        }

        if self.trends.forecast_window < 2 {
            self.trends.forecast_window = 2;
        }
        self.trends.change_threshold_percent = self.trends.change_threshold_percent.max(0.0);

        self
    }
}

/// Find the data directory
///
/// Order: explicit path, config `data_dir`, `.testlens` in the current
/// project, `~/.testlens`.
pub fn resolve_data_dir(explicit: Option<&Path>, config: &EngineConfig) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        return Ok(dir.to_path_buf());
    }
    if let Some(dir) = &config.data_dir {
        return Ok(dir.clone());
    }

    let cwd = std::env::current_dir()?;
    let project_dir = cwd.join(DATA_DIR_NAME);
    if project_dir.exists() {
        return Ok(project_dir);
    }

    let home = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    Ok(home.join(DATA_DIR_NAME))
}

/// Commented default configuration written by `testlens init`
pub const DEFAULT_CONFIG_TOML: &str = r#"# testlens configuration

[stability]
# Retry rate that triggers a per-test suggestion / recommendation
retry_rate_warning = 0.3
retry_rate_critical = 0.5
# Average duration (ms) that triggers a suggestion / recommendation
slow_test_ms = 20000.0
very_slow_test_ms = 30000.0
# Category recommendations below this score or above this flaky share
category_min_score = 0.8
category_max_flaky_ratio = 0.2

[stability.thresholds]
# score >= stable is stable, >= unstable is unstable, otherwise flaky
stable = 0.95
unstable = 0.80
# flaky tests below this score need a redesign rather than a fix
flaky = 0.50

[trends]
retention_days = 90
execution_retention_days = 30
quality_retention_days = 90
change_threshold_percent = 5.0
variance_threshold = 100.0
forecast_window = 5

[quality]
significant_change = 5.0
trend_dead_band = 1.0

[quality.targets]
reliability = 95.0
performance = 85.0
maintainability = 90.0
coverage = 80.0
stability = 95.0
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_template_matches_defaults() {
        let parsed: EngineConfig = toml::from_str(DEFAULT_CONFIG_TOML).unwrap();
        assert_eq!(parsed, EngineConfig::default());
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = EngineConfig::load(&dir.path().join("config.toml")).unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[trends]\nretention_days = 14\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.trends.retention_days, 14);
        assert_eq!(config.trends.execution_retention_days, 30);
        assert_eq!(config.stability.thresholds.stable, 0.95);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = EngineConfig::default();
        config.quality.targets.coverage = 70.0;
        config.save(&path).unwrap();

        let reloaded = EngineConfig::load(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_invalid_retention_is_repaired() {
        let mut config = EngineConfig::default();
        config.trends.retention_days = 0;
        let config = config.normalized();
        assert_eq!(config.trends.retention_days, 1);
    }

    #[test]
    fn test_explicit_data_dir_wins() {
        let config = EngineConfig {
            data_dir: Some(PathBuf::from("/tmp/from-config")),
            ..Default::default()
        };
        let dir = resolve_data_dir(Some(Path::new("/tmp/explicit")), &config).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/explicit"));

        let dir = resolve_data_dir(None, &config).unwrap();
        assert_eq!(dir, PathBuf::from("/tmp/from-config"));
    }
}
