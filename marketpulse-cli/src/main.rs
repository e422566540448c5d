//! MarketPulse CLI: run the market dashboard and manage its config.
//!
//! Commands:
//! - `dashboard`: fetch every configured source, align, print the report
//! - `config default`: print the built-in configuration as TOML
//! - `config check`: parse and validate a configuration file

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use marketpulse_core::domain::LookbackWindow;
use marketpulse_runner::export::{export, report_to_json};
use marketpulse_runner::{
    DashboardConfig, DashboardReport, Pipeline, PipelineError, SourceStatus,
};

#[derive(Parser)]
#[command(
    name = "marketpulse",
    about = "MarketPulse CLI, multi-asset market dashboard"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch equities, crypto and macro series, align them, print the report.
    Dashboard {
        /// Lookback window in days (7-365). Overrides the config file.
        #[arg(long)]
        days: Option<u32>,

        /// Path to a TOML config file. Defaults to the built-in instruments.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Report format on stdout.
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,

        /// Also write the combined table (.csv, .parquet) or report (.json).
        #[arg(long)]
        export: Option<PathBuf>,
    },
    /// Configuration commands.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration as TOML.
    Default,
    /// Parse and validate a configuration file.
    Check {
        /// Path to the TOML config file.
        path: PathBuf,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so `--format json` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Dashboard {
            days,
            config,
            format,
            export,
        } => run_dashboard(days, config.as_deref(), format, export.as_deref()),
        Commands::Config { action } => match action {
            ConfigAction::Default => {
                print!("{}", DashboardConfig::default().to_toml()?);
                Ok(())
            }
            ConfigAction::Check { path } => {
                let config = DashboardConfig::from_file(&path)?;
                println!(
                    "{}: ok ({} instruments, {}-day lookback)",
                    path.display(),
                    config.all_instruments().count(),
                    config.lookback_days.days()
                );
                Ok(())
            }
        },
    }
}

fn run_dashboard(
    days: Option<u32>,
    config_path: Option<&Path>,
    format: OutputFormat,
    export_path: Option<&Path>,
) -> Result<()> {
    let config = match config_path {
        Some(path) => DashboardConfig::from_file(path)?,
        None => DashboardConfig::default(),
    };
    let window = match days {
        Some(d) => LookbackWindow::new(d)?,
        None => config.lookback_days,
    };

    let pipeline = Pipeline::from_config(&config)?;
    let requests = config.requests(window, Utc::now());
    tracing::info!(
        sources = requests.len(),
        days = window.days(),
        "starting dashboard run"
    );

    let run = match pipeline.run(&requests) {
        Ok(run) => run,
        Err(PipelineError::NoData { sources }) => {
            eprintln!("No data available from any source:");
            for s in &sources {
                if let SourceStatus::Failed { kind, message } = &s.status {
                    eprintln!("  {} [{kind}] {message}", s.request);
                }
            }
            std::process::exit(1);
        }
        Err(e) => return Err(e.into()),
    };

    let report = DashboardReport::build(&run, window, Utc::now());
    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => println!("{}", report_to_json(&report)?),
    }

    if let Some(path) = export_path {
        export(&run.table, &report, path)
            .with_context(|| format!("export to {} failed", path.display()))?;
        eprintln!("Exported to: {}", path.display());
    }

    Ok(())
}
