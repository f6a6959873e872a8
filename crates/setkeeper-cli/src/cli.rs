use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser)]
#[command(name = "setkeeper")]
#[command(about = "Validate, diff and save workout drafts")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Engine configuration JSON; SETKEEPER_* variables override it
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate a draft and show suggestions
    Validate {
        /// Draft workout JSON file
        draft: PathBuf,
        /// Lowest severity to report
        #[arg(long, value_enum, default_value = "info")]
        level: ReportLevel,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List fields that differ between a saved snapshot and a draft
    Diff {
        /// Last saved workout JSON file
        snapshot: PathBuf,
        /// Draft workout JSON file
        draft: PathBuf,
        /// Compare serialized fields instead of walking nested values
        #[arg(long)]
        shallow: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save a draft to a directory store; the draft file receives the new id and revision
    Save {
        /// Draft workout JSON file
        draft: PathBuf,
        /// Store directory
        #[arg(long, value_name = "DIR", default_value = "workouts")]
        store: PathBuf,
        /// Replace the stored copy even if it changed since the draft was loaded
        #[arg(long)]
        overwrite: bool,
    },
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, PartialOrd, Ord, ValueEnum)]
pub enum ReportLevel {
    Error,
    Warning,
    Info,
}
