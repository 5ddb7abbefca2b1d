mod compile;
mod demux;
mod engine;
mod error;
mod evaluator;
mod executor;
mod profile;
mod runner;
mod sandbox;
mod staging;

#[cfg(test)]
mod engine_tests;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use coderunner_common::config::RunnerConfig;
use coderunner_common::types::{ExecutionReport, ExecutionRequest};
use engine::DockerEngine;
use error::RunnerError;
use executor::Harness;
use profile::ProfileTable;
use std::collections::BTreeMap;
use std::io::Read;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "coderunner-worker")]
#[command(about = "Run untrusted submissions against test cases in locked-down sandboxes", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one submission and print its report as JSON
    Run {
        /// Request JSON file (reads stdin when omitted)
        #[arg(short, long)]
        request: Option<PathBuf>,
    },

    /// Print the resolved language profiles
    Languages,
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // stdout carries the report
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_thread_ids(true)
            .with_line_number(true)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let config = RunnerConfig::from_env().context("Failed to load runner configuration")?;
    let profiles = ProfileTable::load(&config).context("Failed to load language profiles")?;

    match cli.command {
        Commands::Languages => {
            let table: BTreeMap<String, &profile::LanguageProfile> = profiles
                .iter()
                .map(|(language, profile)| (language.to_string(), profile))
                .collect();
            println!("{}", serde_json::to_string_pretty(&table)?);
            Ok(ExitCode::SUCCESS)
        }
        Commands::Run { request } => {
            let outcome = run(request, profiles, config).await;
            report_outcome(outcome)
        }
    }
}

async fn run(
    request_path: Option<PathBuf>,
    profiles: ProfileTable,
    config: RunnerConfig,
) -> Result<ExecutionReport, RunnerError> {
    let request = read_request(request_path)?;
    executor::validate_request(&profiles, &request)?;

    let engine = DockerEngine::connect(config.pull_missing_images)?;
    engine.ping().await?;
    info!(image = %config.default_image, "Connected to Docker");

    let harness = Harness::new(Arc::new(engine), profiles, config);
    harness.execute(&request).await
}

fn read_request(path: Option<PathBuf>) -> Result<ExecutionRequest, RunnerError> {
    let raw = match &path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {}", path.display()))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("Failed to read request from stdin")?;
            buf
        }
    };

    serde_json::from_str(&raw)
        .map_err(|e| RunnerError::InvalidRequest(format!("malformed request: {}", e)))
}

/// Print the report, or the error envelope, and pick the exit status
fn report_outcome(
    outcome: Result<ExecutionReport, RunnerError>,
) -> Result<ExitCode> {
    match outcome {
        Ok(report) => {
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            let envelope = serde_json::json!({
                "error": {
                    "code": e.error_code(),
                    "message": e.public_message(),
                }
            });
            println!("{}", envelope);

            if e.is_client_error() {
                Ok(ExitCode::from(2))
            } else {
                error!(code = e.error_code(), "Submission failed");
                Ok(ExitCode::from(1))
            }
        }
    }
}
