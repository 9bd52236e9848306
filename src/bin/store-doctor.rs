//! store-doctor - build/test-time diagnostics for the CoinKeeper store
//!
//! Usage:
//!   store-doctor verify              prove fresh and migrated schemas match
//!   store-doctor health [<db-path>]  print the health report as JSON
//!   store-doctor version             print the target schema version

use anyhow::Context;
use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use coinkeeper_store::consistency;
use coinkeeper_store::health;
use coinkeeper_store::{default_db_path, TARGET_SCHEMA_VERSION};

#[derive(Debug)]
enum Command {
    Verify,
    Health { db_path: PathBuf },
    Version,
    Help,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    match parse_args(&args) {
        Ok(cmd) => match run_command(cmd) {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            eprintln!("Error: {}", e);
            print_help();
            ExitCode::FAILURE
        }
    }
}

fn parse_args(args: &[String]) -> Result<Command, String> {
    if args.len() < 2 {
        return Ok(Command::Help);
    }
    match args[1].as_str() {
        "help" | "--help" | "-h" => Ok(Command::Help),
        "version" => Ok(Command::Version),
        "verify" => Ok(Command::Verify),
        "health" => {
            let db_path = args
                .get(2)
                .map(PathBuf::from)
                .unwrap_or_else(default_db_path);
            Ok(Command::Health { db_path })
        }
        other => Err(format!("unknown command: {}", other)),
    }
}

fn run_command(cmd: Command) -> anyhow::Result<ExitCode> {
    match cmd {
        Command::Help => {
            print_help();
            Ok(ExitCode::SUCCESS)
        }
        Command::Version => {
            println!("target schema version: {}", TARGET_SCHEMA_VERSION);
            Ok(ExitCode::SUCCESS)
        }
        Command::Verify => {
            let diffs = consistency::verify_fresh_vs_migrated()?;
            if diffs.is_empty() {
                println!("OK: fresh and migrated schemas are identical");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("DRIFT: {} difference(s) found", diffs.len());
                for diff in &diffs {
                    println!("  {}: {}", diff.table, diff.detail);
                }
                Ok(ExitCode::FAILURE)
            }
        }
        Command::Health { db_path } => {
            let conn = rusqlite::Connection::open(&db_path)
                .with_context(|| format!("opening store at {}", db_path.display()))?;
            let report = health::health_report(&conn)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
            Ok(if report.healthy {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn print_help() {
    println!("store-doctor - CoinKeeper store diagnostics");
    println!();
    println!("Commands:");
    println!("  verify              prove fresh-install and migrated schemas are identical");
    println!("  health [<db-path>]  print the health report for a store as JSON");
    println!("  version             print the target schema version");
}
