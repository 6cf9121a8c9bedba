//! extforge - compile a source tree into native extension modules
//!
//! Discovers the compilable files under a directory (or takes a single
//! file), compiles each one with an external toolchain in its own scratch
//! workspace, and mirrors the artifacts into an output tree.

use clap::Parser;
use extforge_engine::{BuildConfig, Orchestrator};
use extforge_types::RunReport;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod error;
mod output;

use error::CliResult;
use output::OutputFormat;

/// extforge CLI
#[derive(Parser, Debug)]
#[command(name = "extforge")]
#[command(about = "Compile a source tree into native extension modules", long_about = None)]
#[command(version)]
struct Cli {
    /// Compile a single file
    #[arg(short = 'f', long = "file", value_name = "FILE", conflicts_with = "directory")]
    file: Option<PathBuf>,

    /// Compile every unit under a directory
    #[arg(short = 'd', long = "directory", value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Output root
    #[arg(short = 'o', long = "output", value_name = "DIR")]
    output: Option<PathBuf>,

    /// Files or directories to exclude, relative to the source root (comma list)
    #[arg(short = 'm', long = "exclude", value_name = "LIST")]
    exclude: Vec<String>,

    /// Interpreter version, e.g. 3.11
    #[arg(short = 'p', long = "python", value_name = "VER")]
    python: Option<String>,

    /// Number of parallel workers
    #[arg(short = 'x', long = "workers", value_name = "N")]
    workers: Option<usize>,

    /// Only report failures and the summary
    #[arg(short, long)]
    quiet: bool,

    /// Remove scratch workspaces after the run
    #[arg(short, long)]
    release: bool,

    /// Use ccache; without a path it is searched on PATH
    #[arg(
        short = 'c',
        long = "ccache",
        value_name = "PATH",
        num_args = 0..=1,
        default_missing_value = "auto"
    )]
    ccache: Option<String>,

    /// Configuration file path
    #[arg(long, env = "EXTFORGE_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Root of the scratch workspaces
    #[arg(long, value_name = "DIR")]
    scratch_dir: Option<PathBuf>,

    /// Remove the output root before compiling
    #[arg(long)]
    clean: bool,

    /// Copy non-compilable files into the output tree
    #[arg(long)]
    copy_resources: bool,

    /// Summary format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Also write the JSON report to this file
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Log level
    #[arg(long, env = "EXTFORGE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Enable JSON logging
    #[arg(long)]
    json_logs: bool,
}

impl Cli {
    /// Layer the command-line flags over the loaded configuration.
    fn apply(&self, config: &mut BuildConfig) {
        if let Some(file) = &self.file {
            config.source_file = Some(file.clone());
            config.source_dir = None;
        }
        if let Some(directory) = &self.directory {
            config.source_dir = Some(directory.clone());
            config.source_file = None;
        }
        if let Some(output) = &self.output {
            config.output_dir = output.clone();
        }
        if let Some(scratch_dir) = &self.scratch_dir {
            config.scratch_dir = scratch_dir.clone();
        }
        config.exclude.extend(self.exclude.iter().cloned());
        if let Some(python) = &self.python {
            config.toolchain.python = Some(python.clone());
        }
        if let Some(workers) = self.workers {
            config.workers = workers;
        }
        if let Some(ccache) = &self.ccache {
            config.toolchain.ccache = Some(ccache.clone());
        }
        config.quiet |= self.quiet;
        config.release |= self.release;
        config.clean_output |= self.clean;
        config.copy_resources |= self.copy_resources;

        match &self.log_level {
            Some(level) => config.logging.level = level.clone(),
            None if config.quiet => config.logging.level = "warn".to_string(),
            None => {}
        }
        config.logging.json |= self.json_logs;
    }
}

fn init_tracing(level: &str, json: bool) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| level.to_string().into());

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .without_time()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn execute(cli: &Cli, config: &BuildConfig) -> CliResult<RunReport> {
    let orchestrator = Orchestrator::from_config(config)?;
    let report = orchestrator.run().await?;

    output::print_report(&report, cli.format, &orchestrator.plan().output_root)?;
    if let Some(path) = &cli.report {
        output::write_report_file(&report, path)?;
    }
    Ok(report)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let mut config = match BuildConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            output::print_error(&e.to_string());
            return ExitCode::FAILURE;
        }
    };
    cli.apply(&mut config);
    init_tracing(&config.logging.level, config.logging.json);
    tracing::debug!(config = ?config, "Loaded configuration");

    match execute(&cli, &config).await {
        Ok(report) if report.failed() => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            output::print_error(&e.to_string());
            ExitCode::FAILURE
        }
    }
}
