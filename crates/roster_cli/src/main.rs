//! Operator CLI for the roster store.
//!
//! # Responsibility
//! - List, export and import partitions against a local overlay database.
//! - Resolve configuration from flags first, then `ROSTER_*` environment.

use chrono::Utc;
use clap::{Parser, Subcommand};
use roster_core::db::open_db;
use roster_core::{
    export_csv, export_file_name, import_csv, init_logging, resolve_partition, ReconcileService,
    SeedRegistry, SqliteKvStore, StoreConfig,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "roster")]
#[command(about = "Inspect and exchange roster reference entities")]
#[command(version)]
struct Cli {
    /// Overlay database file (defaults to ROSTER_DB_PATH or a temp file)
    #[arg(long, global = true)]
    db: Option<PathBuf>,
    /// Log level: trace|debug|info|warn|error
    #[arg(long, global = true)]
    log_level: Option<String>,
    /// Absolute directory for rolling log files (logging is off without one)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the merged view of a partition as JSON lines
    List { partition: String },
    /// Write the merged view of a partition to `{partition}_{date}.csv`
    Export {
        partition: String,
        /// Output directory
        #[arg(long, default_value = ".")]
        out: PathBuf,
    },
    /// Append every valid row of a CSV file to a partition
    Import { partition: String, file: PathBuf },
    /// Print health and version information
    Ping,
}

fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let mut config = StoreConfig::from_env()?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }
    if let Some(dir) = cli.log_dir {
        config.log_dir = Some(dir);
    }
    if let Some(dir) = &config.log_dir {
        init_logging(&config.log_level, dir)?;
    }

    let partition = match &cli.command {
        Command::Ping => {
            println!("roster_core ping={}", roster_core::ping());
            println!("roster_core version={}", roster_core::core_version());
            return Ok(());
        }
        Command::List { partition }
        | Command::Export { partition, .. }
        | Command::Import { partition, .. } => partition.as_str(),
    };

    let schema = resolve_partition(partition)?;
    let conn = open_db(&config.db_path)?;
    let service =
        ReconcileService::open(SqliteKvStore::new(&conn), schema, SeedRegistry::builtin());

    match &cli.command {
        Command::List { .. } => {
            for record in service.get_all() {
                println!("{}", serde_json::to_string(&record)?);
            }
        }
        Command::Export { out, .. } => {
            let path = out.join(export_file_name(schema, Utc::now()));
            std::fs::write(&path, export_csv(schema, &service.get_all()))?;
            println!("exported {}", path.display());
        }
        Command::Import { file, .. } => {
            let text = std::fs::read_to_string(file)?;
            let report = import_csv(&service, &text);
            println!(
                "imported={} skipped_rows={:?} ignored_columns={:?}",
                report.imported, report.skipped_rows, report.ignored_columns
            );
        }
        Command::Ping => {}
    }
    Ok(())
}
