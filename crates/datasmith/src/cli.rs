//! CLI argument definitions for the `datasmith` server binary.

use std::path::PathBuf;

use clap::Parser;

/// DataSmith: a synthetic-data population engine driven over a
/// line-delimited JSON protocol on stdin/stdout.
#[derive(Debug, Parser)]
#[command(name = "datasmith", version, about)]
pub struct Cli {
    /// Log debug output to stderr instead of the runner log file.
    #[arg(short, long)]
    pub verbose: bool,

    /// Override the data directory (default: $DATASMITH_DIR or ~/.datasmith).
    #[arg(long)]
    pub data_dir: Option<PathBuf>,
}
