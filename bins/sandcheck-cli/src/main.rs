mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "sandcheck-cli")]
#[command(about = "sandcheck CLI - Verify Python solutions in a Docker sandbox", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a solution against a problem's test cases
    Verify {
        /// Problem definition (JSON with parameters, return_type, test_cases)
        #[arg(short, long)]
        problem: PathBuf,

        /// Python source defining `solution`
        #[arg(short, long)]
        source: PathBuf,

        /// Source is a bare function body; generate the header around it
        #[arg(long, default_value = "false")]
        wrap_body: bool,

        /// Print the batch result as JSON instead of a table
        #[arg(long, default_value = "false")]
        json: bool,

        /// Override the per-test timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Override how many test cases run at once
        #[arg(long)]
        parallel: Option<usize>,
    },

    /// Print the function header for a problem
    Signature {
        /// Problem definition (JSON)
        #[arg(short, long)]
        problem: PathBuf,
    },

    /// Remove sandbox containers left behind by crashed runs
    Reap,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Verify {
            problem,
            source,
            wrap_body,
            json,
            timeout_ms,
            parallel,
        } => {
            let options = commands::VerifyOptions {
                wrap_body,
                json,
                timeout_ms,
                parallel,
            };
            let all_passed = commands::verify(&problem, &source, &options).await?;
            if !all_passed {
                return Ok(ExitCode::FAILURE);
            }
        }
        Commands::Signature { problem } => {
            commands::signature(&problem)?;
        }
        Commands::Reap => {
            commands::reap().await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
