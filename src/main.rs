use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use testlens::AnalysisPeriod;

mod commands;

/// testlens - test quality analytics
/// Failure classification, stability scoring and trend forecasting for test runs
#[derive(Parser)]
#[command(name = "testlens")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Test quality analytics for automated test runs", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to config.toml in the data directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory holding the history files
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Analyze a batch of results and record it in the history
    Analyze {
        /// JSON array of test results
        #[arg(long)]
        results: PathBuf,
        /// JSON coverage summary (statements, branches, functions, lines)
        #[arg(long)]
        coverage: Option<PathBuf>,
        /// Wall-clock duration of the whole run in milliseconds
        #[arg(long)]
        wall_clock_ms: Option<f64>,
        /// Parallel workers used by the runner
        #[arg(long, default_value = "1")]
        workers: usize,
        /// Trend look-back window
        #[arg(long, value_enum, ignore_case = true, default_value = "weekly")]
        period: AnalysisPeriod,
        /// Write the JSON report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Classify a single error message
    Classify {
        #[arg(long)]
        message: String,
        #[arg(long)]
        stack: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },

    /// Show trend analysis from the recorded history
    Trends {
        /// Trend look-back window
        #[arg(long, value_enum, ignore_case = true, default_value = "weekly")]
        period: AnalysisPeriod,
    },

    /// Show data directory and history status
    Status,

    /// Create the data directory and a default config
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr) // reports go to stdout
        .init();

    let env = commands::Environment::load(cli.config.as_deref(), cli.data_dir.as_deref())?;

    match cli.command {
        Commands::Analyze {
            results,
            coverage,
            wall_clock_ms,
            workers,
            period,
            output,
        } => {
            let options = commands::AnalyzeOptions {
                results,
                coverage,
                wall_clock_ms,
                workers,
                period,
                output,
            };
            commands::analyze(&env, &options)?;
        }
        Commands::Classify { message, stack, title } => {
            commands::classify(&message, stack.as_deref(), title.as_deref())?;
        }
        Commands::Trends { period } => {
            commands::trends(&env, period)?;
        }
        Commands::Status => {
            commands::show_status(&env)?;
        }
        Commands::Init => {
            commands::init(&env)?;
        }
    }

    Ok(())
}
