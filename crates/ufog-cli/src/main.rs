//! UtilityFog CLI - command-line front end for simulation runs.

mod commands;
mod config;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use error::CliError;

#[derive(Parser)]
#[command(name = "ufog")]
#[command(author, version, about = "UtilityFog simulation control", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Address of a running SimBridge server (e.g. http://127.0.0.1:8080).
    /// When omitted, `start` runs the simulation embedded in this process.
    #[arg(long, global = true)]
    server: Option<String>,

    /// Suppress progress output.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a new simulation run.
    Start {
        /// TOML file containing a `SimConfig`.
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override the agent count from the config file/default.
        #[arg(short = 'n', long)]
        num_agents: Option<u32>,

        /// Override the RNG seed from the config file/default.
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Query the status of one run, or list all runs (requires --server).
    Status {
        /// Run ID to query. Omit to list every run on the server.
        run_id: Option<String>,
    },

    /// Request a cooperative stop of a run (requires --server).
    Stop {
        /// Run ID to stop.
        run_id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let result = dispatch(cli).await;

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(err.exit_code());
    }
}

async fn dispatch(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        Commands::Start {
            config,
            num_agents,
            seed,
        } => {
            commands::start::run(commands::start::StartArgs {
                config_path: config,
                num_agents,
                seed,
                server: cli.server,
                quiet: cli.quiet,
            })
            .await
        }
        Commands::Status { run_id } => {
            let server = cli.server.ok_or_else(|| {
                CliError::Config("`ufog status` requires --server".to_string())
            })?;
            commands::status::run(&server, run_id).await
        }
        Commands::Stop { run_id } => {
            let server = cli.server.ok_or_else(|| {
                CliError::Config("`ufog stop` requires --server".to_string())
            })?;
            commands::stop::run(&server, run_id).await
        }
    }
}
