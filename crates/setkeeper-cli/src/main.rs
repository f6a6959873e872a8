//! setkeeper CLI - drive the workout persistence engine from the terminal
//!
//! Validate drafts, inspect unsaved changes and save through the same
//! coordinator the editor uses.

mod cli;
mod commands;
mod error;


use clap::Parser;

use crate::cli::{Cli, Commands};
use crate::commands::common::load_config;
use crate::commands::diff::run_diff;
use crate::commands::save::run_save;
use crate::commands::validate::run_validate;
use crate::error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("setkeeper=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { draft, level, json } => run_validate(&draft, level, json, &config)?,
        Commands::Diff {
            snapshot,
            draft,
            shallow,
            json,
        } => run_diff(&snapshot, &draft, shallow, json, &config)?,
        Commands::Save {
            draft,
            store,
            overwrite,
        } => run_save(&draft, &store, overwrite, config).await?,
    }

    Ok(())
}
