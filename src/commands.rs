//! CLI command implementations

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use testlens::config::{self, EngineConfig, DEFAULT_CONFIG_TOML};
use testlens::quality::{QualityImprovementTracker, HISTORY_FILE as QUALITY_HISTORY_FILE};
use testlens::results::{CoverageStats, RunContext, TestRunResult};
use testlens::trends::{AnalysisPeriod, ExecutionTrendAnalyzer, TrendAnalyzer};
use testlens::ErrorClassifier;

const CONFIG_FILE: &str = "config.toml";

/// Resolved config and data directory for one invocation
pub struct Environment {
    pub config: EngineConfig,
    pub config_path: PathBuf,
    pub data_dir: PathBuf,
}

impl Environment {
    pub fn load(config_path: Option<&Path>, data_dir: Option<&Path>) -> Result<Self> {
        let config_path = match config_path {
            Some(path) => path.to_path_buf(),
            None => config::resolve_data_dir(data_dir, &EngineConfig::default())?.join(CONFIG_FILE),
        };
        let config = EngineConfig::load(&config_path)?;
        let data_dir = config::resolve_data_dir(data_dir, &config)?;

        Ok(Self {
            config,
            config_path,
            data_dir,
        })
    }
}

pub struct AnalyzeOptions {
    pub results: PathBuf,
    pub coverage: Option<PathBuf>,
    pub wall_clock_ms: Option<f64>,
    pub workers: usize,
    pub period: AnalysisPeriod,
    pub output: Option<PathBuf>,
}

/// Analyze a results file and print or write the quality report
pub fn analyze(env: &Environment, options: &AnalyzeOptions) -> Result<()> {
    let content = std::fs::read_to_string(&options.results)
        .with_context(|| format!("Failed to read results {:?}", options.results))?;
    let results: Vec<TestRunResult> = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse results {:?}", options.results))?;

    let coverage = match &options.coverage {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read coverage {:?}", path))?;
            let coverage: CoverageStats = serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse coverage {:?}", path))?;
            Some(coverage)
        }
        None => None,
    };

    let ctx = RunContext {
        coverage,
        wall_clock_ms: options.wall_clock_ms,
        workers: options.workers.max(1),
        ..RunContext::default()
    };

    std::fs::create_dir_all(&env.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", env.data_dir))?;

    let mut tracker =
        QualityImprovementTracker::new(&env.data_dir, &env.config).with_period(options.period);
    let report = tracker.track(&results, &ctx, None);

    info!(
        "Quality {:.0}/100 ({}), stability {:.1}%, {} failures",
        report.metrics.overall_score,
        report.executive_summary.health.as_str(),
        report.stability.overall_stability * 100.0,
        report.failure_analysis.total_failures
    );

    write_json(&report, options.output.as_deref())
}

/// Classify one error message
pub fn classify(message: &str, stack: Option<&str>, title: Option<&str>) -> Result<()> {
    let classifier = ErrorClassifier::new();
    let classification =
        classifier.classify_text(message, stack.unwrap_or(""), title.unwrap_or(""));
    write_json(&classification, None)
}

#[derive(Serialize)]
struct TrendsOutput {
    quality: testlens::TrendAnalysis,
    execution: testlens::TrendAnalysis,
}

/// Print trend analyses for both metric families
pub fn trends(env: &Environment, period: AnalysisPeriod) -> Result<()> {
    let output = TrendsOutput {
        quality: TrendAnalyzer::new(&env.data_dir, &env.config.trends).analyze(period),
        execution: ExecutionTrendAnalyzer::new(&env.data_dir, &env.config.trends).analyze(period),
    };
    write_json(&output, None)
}

/// Show data directory and history status
pub fn show_status(env: &Environment) -> Result<()> {
    println!("testlens Status");
    println!("===============");
    println!();

    if !env.data_dir.exists() {
        println!("Status: NOT INITIALIZED");
        println!("Run 'testlens init' to create {:?}", env.data_dir);
        return Ok(());
    }

    println!("Data directory: {:?}", env.data_dir);
    println!(
        "Config: {:?}{}",
        env.config_path,
        if env.config_path.exists() { "" } else { " (defaults)" }
    );

    let trends = TrendAnalyzer::new(&env.data_dir, &env.config.trends);
    let execution = ExecutionTrendAnalyzer::new(&env.data_dir, &env.config.trends);
    let tracker = QualityImprovementTracker::new(&env.data_dir, &env.config);

    println!("Quality trend points: {}", trends.history().len());
    println!("Execution trend points: {}", execution.history().len());

    let quality = tracker.history();
    println!("Quality snapshots: {}", quality.len());
    if let Some(latest) = quality.last() {
        println!(
            "Latest quality score: {:.0} on {} ({} action items)",
            latest.overall_score,
            latest.date,
            latest.action_items.len()
        );
    }

    Ok(())
}

/// Create the data directory and a commented default config
pub fn init(env: &Environment) -> Result<()> {
    std::fs::create_dir_all(&env.data_dir)
        .with_context(|| format!("Failed to create data directory {:?}", env.data_dir))?;

    if env.config_path.exists() {
        warn!("Config already exists at {:?}, leaving it unchanged", env.config_path);
    } else {
        if let Some(parent) = env.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&env.config_path, DEFAULT_CONFIG_TOML)
            .with_context(|| format!("Failed to write config {:?}", env.config_path))?;
        info!("Created default configuration at {:?}", env.config_path);
    }

    info!(
        "testlens initialized at {:?} (quality history: {})",
        env.data_dir, QUALITY_HISTORY_FILE
    );
    Ok(())
}

fn write_json<T: Serialize>(value: &T, output: Option<&Path>) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    match output {
        Some(path) => {
            std::fs::write(path, json).with_context(|| format!("Failed to write {:?}", path))?;
            info!("Report written to {:?}", path);
        }
        None => println!("{}", json),
    }
    Ok(())
}
