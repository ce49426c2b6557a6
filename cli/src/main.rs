//! Relay beta operator tool.
//!
//! Usage:
//!   relay-beta keygen
//!   relay-beta issue 42 --name alice
//!   relay-beta verify RELAY-BETA-...
//!   relay-beta activate RELAY-BETA-... --app-version 1.4.0
//!   relay-beta deactivate 0f1e2d3c4b5a6978 <machine-id>
//!   relay-beta stats
//!
//! Settings come from `--config` (or the default config file) and the
//! `RELAY_BETA_*` environment variables.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use relay_beta_cli::{Beta, BetaConfig, Report, keygen};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "relay-beta")]
#[command(about = "Issue Relay beta tokens and manage machine activations")]
struct Args {
    /// Path to a config.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database (overrides config and RELAY_BETA_DB)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a new Ed25519 signing key pair
    Keygen,
    /// Issue a beta token, or return the one the owner already has
    Issue {
        owner_id: i64,
        /// Owner display name
        #[arg(short, long, default_value = "")]
        name: String,
    },
    /// Verify a token offline
    Verify { token: String },
    /// Verify a token and bind a machine to its key
    Activate {
        token: String,
        /// Machine to bind; defaults to this machine's fingerprint
        #[arg(long)]
        machine_id: Option<String>,
        #[arg(long)]
        app_version: Option<String>,
    },
    /// Free a machine's slot on a key
    Deactivate { key_id: String, machine_id: String },
    /// Show issuance and activation counts
    Stats,
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

fn run(args: Args) -> Result<bool> {
    if let Command::Keygen = args.command {
        return emit(&keygen(), args.json);
    }

    let mut config =
        BetaConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    if let Some(db) = args.db {
        config.database = Some(db);
    }
    debug!("Using database {:?}", config.database_path());
    let beta = Beta::open(config)?;

    match args.command {
        Command::Keygen => emit(&keygen(), args.json),
        Command::Issue { owner_id, name } => emit(&beta.issue(owner_id, &name)?, args.json),
        Command::Verify { token } => emit(&beta.verify(&token)?, args.json),
        Command::Activate {
            token,
            machine_id,
            app_version,
        } => emit(
            &beta.activate(&token, machine_id.as_deref(), app_version.as_deref())?,
            args.json,
        ),
        Command::Deactivate { key_id, machine_id } => {
            emit(&beta.deactivate(&key_id, &machine_id)?, args.json)
        }
        Command::Stats => emit(&beta.stats()?, args.json),
    }
}

fn emit<R: Report>(report: &R, json: bool) -> Result<bool> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
    }
    Ok(report.succeeded())
}
