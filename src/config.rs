//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.runledger.toml` files.

use crate::models::{ExecutionType, ModeSetting};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default configuration file name.
pub const CONFIG_FILE: &str = ".runledger.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Aggregation settings.
    #[serde(default)]
    pub aggregation: AggregationConfig,

    /// Sink settings.
    #[serde(default)]
    pub sink: SinkConfig,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Propagate failures instead of emitting a failure result.
    #[serde(default)]
    pub fail_on_error: bool,

    /// Log the assembled row before writing it.
    #[serde(default)]
    pub verbose_logging: bool,

    /// Workflow display name stored with each row.
    #[serde(default = "default_workflow_name")]
    pub workflow_name: String,

    /// How the workflow was started.
    #[serde(default)]
    pub execution_type: ExecutionType,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            fail_on_error: false,
            verbose_logging: false,
            workflow_name: default_workflow_name(),
            execution_type: ExecutionType::default(),
        }
    }
}

fn default_workflow_name() -> String {
    "Unnamed workflow".to_string()
}

/// Aggregation settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AggregationConfig {
    /// Execution mode override (`auto`, `regular`, `monthly`).
    #[serde(default)]
    pub mode: ModeSetting,
}

/// Target table settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkConfig {
    /// SQLite database file.
    #[serde(default = "default_database")]
    pub database: PathBuf,

    /// Schema (attached database name) holding the table.
    #[serde(default = "default_schema")]
    pub schema: String,

    /// Table receiving the summary rows.
    #[serde(default = "default_table")]
    pub table: String,

    /// Write timeout in seconds (0 disables it).
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
            schema: default_schema(),
            table: default_table(),
            timeout_seconds: default_timeout(),
        }
    }
}

fn default_database() -> PathBuf {
    PathBuf::from("runledger.db")
}

fn default_schema() -> String {
    "main".to_string()
}

fn default_table() -> String {
    "workflow_runs".to_string()
}

fn default_timeout() -> u64 {
    30
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Load configuration from `path` when it exists, defaults otherwise.
    ///
    /// A file that exists but can't be parsed is an error, never a silent
    /// fallback to defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading config from: {}", path.display());
            Self::load(path)
        } else {
            debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings.
    /// Only values given explicitly on the command line override the file.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(mode) = args.mode {
            self.aggregation.mode = mode;
        }
        if let Some(ref name) = args.workflow_name {
            self.general.workflow_name = name.clone();
        }
        if let Some(execution_type) = args.execution_type {
            self.general.execution_type = execution_type;
        }

        if let Some(ref database) = args.database {
            self.sink.database = database.clone();
        }
        if let Some(ref schema) = args.schema {
            self.sink.schema = schema.clone();
        }
        if let Some(ref table) = args.table {
            self.sink.table = table.clone();
        }
        if let Some(timeout) = args.write_timeout {
            self.sink.timeout_seconds = timeout;
        }

        // Flags always override
        if args.fail_on_error {
            self.general.fail_on_error = true;
        }
        if args.verbose {
            self.general.verbose_logging = true;
        }
    }

    /// Write timeout, `None` when disabled.
    pub fn write_timeout(&self) -> Option<std::time::Duration> {
        match self.sink.timeout_seconds {
            0 => None,
            secs => Some(std::time::Duration::from_secs(secs)),
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
