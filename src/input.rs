//! Report loading.
//!
//! Accepts a JSON array of reports, a single report object, or host item
//! envelopes of the form `{"json": { ...report... }}`.

use crate::models::Report;
use anyhow::{bail, Context, Result};
use serde_json::Value;
use std::io::Read;
use std::path::Path;
use tracing::debug;

/// Read reports from a file, or from stdin when `path` is `-`.
pub fn load_reports(path: &Path) -> Result<Vec<Report>> {
    let content = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read reports from stdin")?;
        buf
    } else {
        std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reports file: {}", path.display()))?
    };

    parse_reports(&content)
}

/// Parse reports from JSON text.
pub fn parse_reports(content: &str) -> Result<Vec<Report>> {
    let value: Value = serde_json::from_str(content).context("Reports are not valid JSON")?;

    let entries = match value {
        Value::Array(entries) => entries,
        Value::Object(_) => vec![value],
        other => bail!("Expected a report object or an array of reports, got {}", other),
    };

    let reports = entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            serde_json::from_value(unwrap_envelope(entry))
                .with_context(|| format!("Report #{} has an invalid shape", index))
        })
        .collect::<Result<Vec<Report>>>()?;

    debug!("Loaded {} report(s)", reports.len());
    Ok(reports)
}

/// Strip a `{"json": {...}}` item envelope when present.
fn unwrap_envelope(entry: Value) -> Value {
    match entry {
        Value::Object(mut map) if map.len() == 1 && map.get("json").is_some_and(Value::is_object) => {
            map.remove("json").unwrap_or(Value::Null)
        }
        other => other,
    }
}
