mod commands;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use labexec_client::{ExecuteOverrides, ExecutorClient, ExecutorConfig};
use labexec_common::config::normalize_base_url;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "labexec")]
#[command(about = "labexec - Run code against test cases on a remote execution service", long_about = None)]
struct Cli {
    /// Executor base URL (defaults to EXECUTOR_URL, then http://localhost:8910)
    #[arg(long, global = true)]
    url: Option<String>,

    /// Emit logs as JSON (also enabled by LOG_FORMAT=json)
    #[arg(long, global = true, default_value = "false")]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether the executor is up
    Health,

    /// List languages the executor supports
    Languages,

    /// Submit a job without waiting for it
    Submit {
        /// Language identifier (e.g., python, cpp, java)
        #[arg(short, long)]
        language: String,

        /// Source file to run
        #[arg(short, long)]
        file: PathBuf,

        /// JSON file with an array of test cases
        #[arg(short, long)]
        tests: Option<PathBuf>,
    },

    /// Read the current status of a submitted job
    Status {
        /// Job id returned by `submit`
        #[arg(short, long)]
        id: u64,
    },

    /// Submit, wait for the result, and grade it
    Run {
        /// Language identifier (e.g., python, cpp, java)
        #[arg(short, long)]
        language: String,

        /// Source file to run
        #[arg(short, long)]
        file: PathBuf,

        /// JSON file with an array of test cases
        #[arg(short, long)]
        tests: PathBuf,

        /// Marks available for a fully passing submission
        #[arg(short, long, default_value = "100")]
        marks: u32,

        /// Delay between status polls
        #[arg(long)]
        poll_interval_ms: Option<u64>,

        /// Give up after this long
        #[arg(long)]
        timeout_ms: Option<u64>,
    },
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // stdout belongs to command output
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let json_logs = cli.json_logs
        || std::env::var("LOG_FORMAT")
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);
    init_tracing(json_logs);

    let mut config = ExecutorConfig::from_env().context("Invalid executor configuration")?;
    if let Some(url) = cli.url.as_deref() {
        config.base_url = normalize_base_url(url);
    }
    let client = Arc::new(ExecutorClient::new(config).context("Failed to create executor client")?);

    match cli.command {
        Commands::Health => {
            commands::health(&client).await?;
        }
        Commands::Languages => {
            commands::languages(&client).await?;
        }
        Commands::Submit {
            language,
            file,
            tests,
        } => {
            let request = commands::load_request(&language, &file, tests.as_deref())?;
            commands::submit(&client, &request).await?;
        }
        Commands::Status { id } => {
            commands::status(&client, id).await?;
        }
        Commands::Run {
            language,
            file,
            tests,
            marks,
            poll_interval_ms,
            timeout_ms,
        } => {
            let request = commands::load_request(&language, &file, Some(&tests))?;
            let overrides = ExecuteOverrides {
                poll_interval: poll_interval_ms.map(Duration::from_millis),
                timeout: timeout_ms.map(Duration::from_millis),
            };
            commands::run(client, request, marks, overrides).await?;
        }
    }

    Ok(())
}
