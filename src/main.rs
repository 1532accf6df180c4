//! RunLedger - workflow run summary writer
//!
//! A CLI tool that folds the per-batch execution reports of one
//! workflow run into a single summary row and inserts it into SQLite.
//!
//! Exit codes:
//!   0 - A result object was printed (success, or a recovered failure)
//!   1 - Runtime error (bad input, config, or a failure with --fail-on-error)

mod analysis;
mod cli;
mod config;
mod error;
mod input;
mod models;
mod outcome;
mod sink;

use anyhow::{Context, Result};
use chrono::Utc;
use cli::Args;
use config::{Config, CONFIG_FILE};
use models::InvocationContext;
use outcome::InvocationSettings;
use sink::{SqliteSink, TableRef};
use std::path::Path;
use tracing::{debug, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    // Initialize logging
    init_logging(&args);

    info!("RunLedger v{}", env!("CARGO_PKG_VERSION"));
    debug!("Arguments: {:?}", args);

    match run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            error!("Invocation failed: {:#}", e);
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .runledger.toml.
fn handle_init_config() -> Result<()> {
    let path = Path::new(CONFIG_FILE);

    if path.exists() {
        eprintln!("{} already exists. Remove it first or edit it manually.", CONFIG_FILE);
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content).with_context(|| format!("Failed to write {}", CONFIG_FILE))?;

    println!("Created {} with default settings.", CONFIG_FILE);
    Ok(())
}

/// Initialize logging based on verbosity settings.
///
/// Logs go to stderr; stdout carries only the result object.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Load reports, aggregate, write the row and print the result.
async fn run(args: Args) -> Result<()> {
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);

    let input = args.input.as_deref().context("No input file given")?;
    let reports = input::load_reports(input)?;
    info!("Loaded {} batch report(s) from {}", reports.len(), input.display());

    let settings = InvocationSettings {
        mode: config.aggregation.mode,
        fail_on_error: config.general.fail_on_error,
        verbose_logging: config.general.verbose_logging,
        write_timeout: config.write_timeout(),
    };

    let context = InvocationContext {
        now: Utc::now(),
        workflow_name: config.general.workflow_name.clone(),
        execution_type: config.general.execution_type,
    };

    if args.dry_run {
        let result = outcome::dry_run(&reports, &settings, &context)?;
        info!("Dry run: nothing written to {}", config.sink.database.display());
        return outcome::write_json(&result, args.output.as_deref());
    }

    let opened = TableRef::new(&config.sink.schema, &config.sink.table)
        .and_then(|table| SqliteSink::open(&config.sink.database, table));

    let result = match opened {
        Ok(mut sink) => outcome::run_invocation(&reports, &settings, &context, &mut sink).await?,
        Err(e) => outcome::settle_without_sink(&reports, &settings, &context, e)?,
    };
    if !result.is_success() {
        warn!("Run summary was not written");
    }

    outcome::write_json(&result, args.output.as_deref())
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location; a present but malformed file is an error
    let config = Config::load_or_default(Path::new(CONFIG_FILE))?;
    debug!("Effective config: {:?}", config);
    Ok(config)
}
