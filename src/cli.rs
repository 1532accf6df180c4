//! Command-line interface argument parsing.
//!
//! This module handles all CLI argument parsing using clap,
//! including validation and default values.

use crate::models::{ExecutionType, ModeSetting};
use clap::Parser;
use std::path::PathBuf;

/// RunLedger - fold workflow batch reports into one run summary row
///
/// Reads the execution reports of every batch of a workflow run, merges
/// their counters, event counts and sent items, and inserts a single
/// summary row into a SQLite table. Prints a JSON result object.
///
/// Examples:
///   runledger --input reports.json
///   runledger --input reports.json --mode monthly --table import_runs
///   cat reports.json | runledger --input - --fail-on-error
///   runledger --input reports.json --dry-run
///   runledger --init-config
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    /// JSON file with the batch reports (`-` for stdin)
    ///
    /// Either an array of reports, a single report, or `{"json": ...}` item envelopes.
    #[arg(short, long, value_name = "FILE", required_unless_present = "init_config")]
    pub input: Option<PathBuf>,

    /// Execution mode override
    ///
    /// `auto` takes the mode from the first report, defaulting to `regular`.
    #[arg(short, long, value_name = "MODE")]
    pub mode: Option<ModeSetting>,

    /// Workflow display name stored with the row
    #[arg(short, long, value_name = "NAME", env = "RUNLEDGER_WORKFLOW_NAME")]
    pub workflow_name: Option<String>,

    /// How the workflow was started
    #[arg(long, value_name = "TYPE", env = "RUNLEDGER_EXECUTION_TYPE")]
    pub execution_type: Option<ExecutionType>,

    /// SQLite database file
    #[arg(short, long, value_name = "FILE", env = "RUNLEDGER_DATABASE")]
    pub database: Option<PathBuf>,

    /// Schema holding the target table
    #[arg(long, value_name = "SCHEMA")]
    pub schema: Option<String>,

    /// Target table
    #[arg(short, long, value_name = "TABLE")]
    pub table: Option<String>,

    /// Write timeout in seconds (0 disables it)
    #[arg(long, value_name = "SECS")]
    pub write_timeout: Option<u64>,

    /// Propagate failures instead of printing a failure result
    ///
    /// Exit code 1 when the identifier is missing or the write fails.
    #[arg(long)]
    pub fail_on_error: bool,

    /// Path to configuration file
    ///
    /// If not specified, looks for .runledger.toml in the current directory
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Write the result object to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Enable verbose logging output (also logs the row before writing)
    #[arg(short, long)]
    pub verbose: bool,

    /// Run in quiet mode (minimal output)
    #[arg(short, long)]
    pub quiet: bool,

    /// Dry run: aggregate and print the row without touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Generate a default .runledger.toml configuration file
    #[arg(long)]
    pub init_config: bool,
}

impl Args {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Validate the parsed arguments.
    pub fn validate(&self) -> Result<(), String> {
        // Skip validation for --init-config
        if self.init_config {
            return Ok(());
        }

        // Validate input path
        match self.input.as_deref() {
            None => return Err("An input file is required (use - for stdin)".to_string()),
            Some(path) if path.as_os_str() != "-" && !path.exists() => {
                return Err(format!("Input file does not exist: {}", path.display()));
            }
            _ => {}
        }

        // Check for conflicting options
        if self.verbose && self.quiet {
            return Err("Cannot use both --verbose and --quiet".to_string());
        }

        if let Some(ref table) = self.table {
            if table.trim().is_empty() {
                return Err("Table name must not be empty".to_string());
            }
        }

        if let Some(ref schema) = self.schema {
            if schema.trim().is_empty() {
                return Err("Schema name must not be empty".to_string());
            }
        }

        if let Some(ref name) = self.workflow_name {
            if name.trim().is_empty() {
                return Err("Workflow name must not be empty".to_string());
            }
        }

        Ok(())
    }

    /// Returns the log level based on verbosity settings.
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            tracing::Level::ERROR
        } else if self.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }
}
