//! EmbraceU CLI - inspect and drive the offline write queue from a terminal
//!
//! Saves wellness records with offline support, replays the queue, and
//! manages dead letters against a local libSQL store.

mod cli;
mod commands;
mod config;
mod error;


use clap::{CommandFactory, Parser};

use crate::cli::{Cli, Commands};
use crate::commands::common::resolve_store_path;
use crate::commands::config::run_config;
use crate::commands::dead_letters::run_dead_letters;
use crate::commands::queue::run_queue;
use crate::commands::save::run_save;
use crate::commands::status::run_status;
use crate::commands::sync::run_sync;
use crate::commands::watch::run_watch;
use crate::config::{default_config_path, CliConfig};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    if let Ok(directive) = "embraceu=info".parse() {
        filter = filter.add_directive(directive);
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let Some(command) = cli.command else {
        Cli::command().print_help()?;
        println!();
        return Ok(());
    };

    let store_path = resolve_store_path(cli.data_dir.as_deref());
    let load_config = || CliConfig::load_effective().map_err(CliError::Config);

    match command {
        Commands::Config { command } => return run_config(command, &default_config_path()),
        Commands::Save {
            table,
            data,
            offline,
        } => {
            run_save(&table, &data, offline, &load_config()?, &store_path).await?;
        }
        Commands::Sync { json } => {
            run_sync(json, &load_config()?, &store_path).await?;
        }
        Commands::Status { json } => {
            run_status(json, &load_config()?, &store_path).await?;
        }
        Commands::Queue { json } => run_queue(json, &load_config()?, &store_path).await?,
        Commands::DeadLetters { command } => {
            run_dead_letters(command, &load_config()?, &store_path).await?;
        }
        Commands::Watch { interval } => {
            run_watch(interval, &load_config()?, &store_path).await?;
        }
    }

    Ok(())
}
