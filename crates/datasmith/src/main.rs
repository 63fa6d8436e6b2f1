//! `datasmith` -- synthetic-data population server.
//!
//! Reads line-delimited JSON requests on stdin, writes one JSON response
//! per line on stdout. All persistent state lives in the data directory
//! (`$DATASMITH_DIR` or `~/.datasmith`).

mod cli;
mod handlers;
mod jobs;
mod protocol;
mod session;
mod sqlrun;

use std::io::{self, IsTerminal};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

use cli::Cli;
use datasmith_config::DataDir;
use handlers::Server;

/// Tracks whether a Ctrl+C has already been received.
static CTRLC_RECEIVED: AtomicBool = AtomicBool::new(false);

fn main() {
    // First Ctrl+C: exit cleanly. Second: force exit.
    let _ = ctrlc::set_handler(|| {
        if CTRLC_RECEIVED.swap(true, Ordering::SeqCst) {
            std::process::exit(1);
        }
        std::process::exit(0);
    });

    let cli = Cli::parse();

    let data_dir = match cli.data_dir {
        Some(path) => DataDir::at(path),
        None => match DataDir::resolve() {
            Ok(dir) => dir,
            Err(e) => {
                eprintln!("Error: {e:#}");
                std::process::exit(1);
            }
        },
    };

    if let Err(e) = run(data_dir, cli.verbose) {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn run(data_dir: DataDir, verbose: bool) -> anyhow::Result<()> {
    data_dir.ensure()?;
    init_logging(&data_dir, verbose)?;

    let mut server = Server::new(data_dir)?;
    let stdin = io::stdin().lock();
    let stdout = io::stdout().lock();
    server.listen(stdin, stdout)
}

/// Verbose mode logs to stderr; otherwise server activity is appended to
/// `logs/runner.log`.
fn init_logging(data_dir: &DataDir, verbose: bool) -> anyhow::Result<()> {
    if verbose {
        tracing_subscriber::fmt()
            .with_env_filter("datasmith=debug")
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .init();
    } else {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(data_dir.runner_log())?;
        tracing_subscriber::fmt()
            .with_env_filter("datasmith=info")
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init();
    }
    Ok(())
}
