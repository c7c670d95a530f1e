//! gridfan command-line interface.

use std::process::ExitCode;

use clap::{Parser, Subcommand};

mod commands;
mod error;
mod runner;

use commands::config::ConfigCommands;
use commands::run::RunArgs;

#[derive(Parser)]
#[command(name = "gridfan")]
#[command(about = "Batch job fan-out with cheap-probe escalation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a batch manifest through the scheduler
    Run(RunArgs),
    /// Manage gridfan configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let outcome = match cli.command {
        Commands::Run(args) => commands::run::run(args).await,
        Commands::Config { command } => commands::config::run(command).map(|_| ExitCode::SUCCESS),
    };

    match outcome {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}
