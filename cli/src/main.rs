use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use indexlog_kernel::config::LogConfig;
use indexlog_kernel::log::{LogEntry, LogId, LogManager};
use indexlog_kernel::storage::LocalFsBackend;

/// Index metadata log CLI
#[derive(Parser, Debug)]
#[command(name = "indexlog")]
#[command(about = "Inspect and append to an index metadata log", long_about = None)]
struct Cli {
    /// Log namespace directory
    #[arg(long)]
    namespace: PathBuf,

    /// Path to log config JSON
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the highest id in the log
    LatestId,

    /// Print the entry at an id
    Get { id: LogId },

    /// Print the entry with the highest id
    Latest,

    /// Print the most recent stable entry
    LatestStable,

    /// Print every entry in id order
    History,

    /// Append an entry read from a JSON file
    Write {
        id: LogId,

        #[arg(long)]
        entry: PathBuf,
    },

    /// Point the stable pointer at an id
    Promote { id: LogId },

    /// Remove the stable pointer
    DeleteStable,
}

/// Wrapper for JSON output of mutating commands
#[derive(Debug, Serialize)]
struct Outcome {
    command: &'static str,
    id: Option<LogId>,
    ok: bool,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(command: &'static str, id: Option<LogId>, ok: bool) -> Result<ExitCode> {
    print_json(&Outcome { command, id, ok })?;
    Ok(if ok { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

fn main() -> Result<ExitCode> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // ----------------------------
    // Load config
    // ----------------------------
    let config = match &cli.config {
        Some(path) => LogConfig::load(path)?,
        None => LogConfig::default_config(),
    };

    // Paths are given relative to the working directory.
    let log = LogManager::new(LocalFsBackend::new(""), &cli.namespace).with_config(config);

    // ----------------------------
    // Run command
    // ----------------------------
    match cli.command {
        Command::LatestId => print_json(&log.latest_id()?)?,
        Command::Get { id } => print_json(&log.get(id)?)?,
        Command::Latest => print_json(&log.latest_entry()?)?,
        Command::LatestStable => print_json(&log.latest_stable_entry()?)?,
        Command::History => print_json(&log.history()?)?,
        Command::Write { id, entry: path } => {
            let data = fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let entry: LogEntry = serde_json::from_str(&data)
                .with_context(|| format!("parsing {}", path.display()))?;
            return report("write", Some(id), log.write(id, &entry));
        }
        Command::Promote { id } => return report("promote", Some(id), log.promote_stable(id)),
        Command::DeleteStable => return report("delete-stable", None, log.delete_stable()),
    }

    Ok(ExitCode::SUCCESS)
}
