//! `switchyard` command-line driver.

mod config;
mod demo;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "switchyard", about = "Switchyard — capability-aware task coordination")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "switchyard.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a simulated worker pool and print a JSON report
    Demo {
        /// Number of tasks to create
        #[arg(long, default_value_t = 12)]
        tasks: usize,
        /// Number of simulated workers
        #[arg(long, default_value_t = 4)]
        workers: usize,
        /// Make every k-th call of each worker fail (0 = never)
        #[arg(long, default_value_t = 0)]
        fail_every: usize,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    let config = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Demo {
            tasks,
            workers,
            fail_every,
        } => {
            info!(tasks, workers, fail_every, "Starting demo run");
            let report = demo::run_demo(
                &config,
                demo::DemoOptions {
                    tasks,
                    workers,
                    fail_every,
                },
            )
            .await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}
