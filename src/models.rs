//! Data models for run aggregation.
//!
//! This module contains the incoming per-batch [`Report`] shape, the
//! merged [`Summary`] accumulator, and the flat [`Insertable`] row that
//! is handed to a sink.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Mode setting chosen by the caller.
///
/// `Auto` defers to the first report's `execution.mode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    /// Take the mode from the first report (default)
    #[default]
    Auto,
    /// Regular run
    Regular,
    /// Monthly run
    Monthly,
}

impl ModeSetting {
    /// The literal mode name, `None` for `Auto`.
    pub fn literal(&self) -> Option<&'static str> {
        match self {
            ModeSetting::Auto => None,
            ModeSetting::Regular => Some("regular"),
            ModeSetting::Monthly => Some("monthly"),
        }
    }
}

/// Mode used when `auto` finds no `execution.mode` on the first report.
pub const DEFAULT_MODE: &str = "regular";

/// How the workflow run was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionType {
    /// Started by hand
    #[default]
    Manual,
    /// Started by a trigger or schedule
    Scheduled,
}

impl fmt::Display for ExecutionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionType::Manual => write!(f, "manual"),
            ExecutionType::Scheduled => write!(f, "scheduled"),
        }
    }
}

/// Overall outcome stored with the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Success,
    Failed,
}

impl RunStatus {
    pub fn from_failures(has_failures: bool) -> Self {
        if has_failures {
            RunStatus::Failed
        } else {
            RunStatus::Success
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Success => write!(f, "success"),
            RunStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One upstream batch's execution outcome, as received.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Identity and configuration of the run this batch belongs to.
    #[serde(default)]
    pub execution: Option<ExecutionInfo>,
    /// Counters for this batch.
    #[serde(default)]
    pub summary: Option<BatchSummary>,
    /// Raw payloads sent by this batch.
    #[serde(default)]
    pub details: Option<BatchDetails>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionInfo {
    #[serde(default)]
    pub mode: Option<String>,
    /// String or integer; parsed by the aggregator.
    #[serde(default)]
    pub run_identifier: Option<Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchSummary {
    #[serde(default)]
    pub total_input: Option<u64>,
    #[serde(default)]
    pub new_items: Option<u64>,
    #[serde(default)]
    pub exact_duplicates: Option<u64>,
    #[serde(default)]
    pub updated_items: Option<u64>,
    #[serde(default)]
    pub failed_items: Option<u64>,
    #[serde(default)]
    pub event_summary: Option<BTreeMap<String, u64>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchDetails {
    #[serde(default)]
    pub sent_items: Option<SentItems>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SentItems {
    #[serde(default)]
    pub items: Option<Vec<Value>>,
}

impl Report {
    fn counters(&self) -> Option<&BatchSummary> {
        self.summary.as_ref()
    }

    pub fn total_input(&self) -> u64 {
        self.counters().and_then(|s| s.total_input).unwrap_or(0)
    }

    pub fn new_items(&self) -> u64 {
        self.counters().and_then(|s| s.new_items).unwrap_or(0)
    }

    pub fn exact_duplicates(&self) -> u64 {
        self.counters().and_then(|s| s.exact_duplicates).unwrap_or(0)
    }

    pub fn updated_items(&self) -> u64 {
        self.counters().and_then(|s| s.updated_items).unwrap_or(0)
    }

    pub fn failed_items(&self) -> u64 {
        self.counters().and_then(|s| s.failed_items).unwrap_or(0)
    }

    /// Event counts of this batch; empty when absent.
    pub fn event_counts(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.counters()
            .and_then(|s| s.event_summary.as_ref())
            .into_iter()
            .flatten()
    }

    /// Items sent by this batch; empty when absent.
    pub fn sent_items(&self) -> &[Value] {
        self.details
            .as_ref()
            .and_then(|d| d.sent_items.as_ref())
            .and_then(|s| s.items.as_deref())
            .unwrap_or(&[])
    }

    pub fn execution_mode(&self) -> Option<&str> {
        self.execution.as_ref().and_then(|e| e.mode.as_deref())
    }

    pub fn run_identifier(&self) -> Option<&Value> {
        self.execution
            .as_ref()
            .and_then(|e| e.run_identifier.as_ref())
    }
}

/// Item counters summed across batches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    pub processed: u64,
    pub new: u64,
    pub duplicates: u64,
    pub updated: u64,
}

/// Merged accumulator across all reports of one invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub run_identifier: i64,
    pub mode: String,
    pub totals: Totals,
    pub event_summary: BTreeMap<String, u64>,
    pub has_failures: bool,
    pub all_items: Vec<Value>,
}

impl Summary {
    pub fn status(&self) -> RunStatus {
        RunStatus::from_failures(self.has_failures)
    }
}

/// Values supplied by the environment rather than the reports.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    /// Timestamp stamped on the result object.
    pub now: DateTime<Utc>,
    /// Display name of the workflow.
    pub workflow_name: String,
    /// How the workflow run was started.
    pub execution_type: ExecutionType,
}

/// Flat row handed to a sink, one column per field in table order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insertable {
    pub run_identifier: i64,
    pub execution_mode: String,
    pub execution_type: ExecutionType,
    pub workflow_name: String,
    pub status: RunStatus,
    pub items_processed: u64,
    pub items_new: u64,
    pub items_duplicates: u64,
    pub items_updated: u64,
    /// JSON text of the merged event counts.
    pub event_summary: String,
    /// JSON text of every sent item, in report order.
    pub full_details: String,
}

impl Insertable {
    /// Column names in insert order.
    pub const COLUMNS: [&'static str; 11] = [
        "run_identifier",
        "execution_mode",
        "execution_type",
        "workflow_name",
        "status",
        "items_processed",
        "items_new",
        "items_duplicates",
        "items_updated",
        "event_summary",
        "full_details",
    ];

    /// Flatten a summary into a row.
    pub fn from_summary(
        summary: &Summary,
        context: &InvocationContext,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            run_identifier: summary.run_identifier,
            execution_mode: summary.mode.clone(),
            execution_type: context.execution_type,
            workflow_name: context.workflow_name.clone(),
            status: summary.status(),
            items_processed: summary.totals.processed,
            items_new: summary.totals.new,
            items_duplicates: summary.totals.duplicates,
            items_updated: summary.totals.updated,
            event_summary: serde_json::to_string(&summary.event_summary)?,
            full_details: serde_json::to_string(&summary.all_items)?,
        })
    }
}

/// Result object emitted once per invocation.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum InvocationResult {
    Succeeded(SuccessResult),
    Failed(FailureResult),
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuccessResult {
    pub success: bool,
    pub timestamp: DateTime<Utc>,
    pub run_identifier: i64,
    pub batches_aggregated: usize,
    pub summary: Insertable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailureResult {
    pub success: bool,
    pub error: String,
    pub run_identifier: Option<i64>,
}

impl InvocationResult {
    pub fn succeeded(
        timestamp: DateTime<Utc>,
        batches_aggregated: usize,
        summary: Insertable,
    ) -> Self {
        InvocationResult::Succeeded(SuccessResult {
            success: true,
            timestamp,
            run_identifier: summary.run_identifier,
            batches_aggregated,
            summary,
        })
    }

    pub fn failed(error: String, run_identifier: Option<i64>) -> Self {
        InvocationResult::Failed(FailureResult {
            success: false,
            error,
            run_identifier,
        })
    }

    pub fn is_success(&self) -> bool {
        matches!(self, InvocationResult::Succeeded(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn context() -> InvocationContext {
        InvocationContext {
            now: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            workflow_name: "Nightly import".to_string(),
            execution_type: ExecutionType::Scheduled,
        }
    }

    #[test]
    fn test_report_with_missing_fields_defaults_to_zero() {
        let report: Report = serde_json::from_value(json!({})).unwrap();
        assert_eq!(report.total_input(), 0);
        assert_eq!(report.failed_items(), 0);
        assert_eq!(report.event_counts().count(), 0);
        assert!(report.sent_items().is_empty());
        assert!(report.run_identifier().is_none());
    }

    #[test]
    fn test_report_nulls_are_absent() {
        let report: Report = serde_json::from_value(json!({
            "execution": null,
            "summary": { "totalInput": null, "eventSummary": null },
            "details": { "sentItems": { "items": null } }
        }))
        .unwrap();
        assert_eq!(report.total_input(), 0);
        assert!(report.sent_items().is_empty());
        assert!(report.execution_mode().is_none());
    }

    #[test]
    fn test_report_parses_camel_case() {
        let report: Report = serde_json::from_value(json!({
            "execution": { "mode": "monthly", "runIdentifier": "42" },
            "summary": {
                "totalInput": 10,
                "newItems": 3,
                "exactDuplicates": 2,
                "updatedItems": 1,
                "failedItems": 4,
                "eventSummary": { "created": 3 }
            },
            "details": { "sentItems": { "items": [{ "id": 1 }] } }
        }))
        .unwrap();

        assert_eq!(report.execution_mode(), Some("monthly"));
        assert_eq!(report.run_identifier(), Some(&json!("42")));
        assert_eq!(report.new_items(), 3);
        assert_eq!(report.exact_duplicates(), 2);
        assert_eq!(report.updated_items(), 1);
        assert_eq!(report.failed_items(), 4);
        assert_eq!(report.sent_items().len(), 1);
    }

    #[test]
    fn test_status_from_failures() {
        assert_eq!(RunStatus::from_failures(true), RunStatus::Failed);
        assert_eq!(RunStatus::from_failures(false).to_string(), "success");
    }

    #[test]
    fn test_insertable_from_summary() {
        let summary = Summary {
            run_identifier: 7,
            mode: "regular".to_string(),
            totals: Totals {
                processed: 15,
                new: 3,
                duplicates: 2,
                updated: 0,
            },
            event_summary: [("b".to_string(), 2), ("a".to_string(), 1)]
                .into_iter()
                .collect(),
            has_failures: true,
            all_items: vec![json!("a"), json!({ "k": 1 })],
        };

        let row = Insertable::from_summary(&summary, &context()).unwrap();
        assert_eq!(row.run_identifier, 7);
        assert_eq!(row.execution_type, ExecutionType::Scheduled);
        assert_eq!(row.workflow_name, "Nightly import");
        assert_eq!(row.status, RunStatus::Failed);
        assert_eq!(row.items_processed, 15);
        assert_eq!(row.event_summary, r#"{"a":1,"b":2}"#);
        assert_eq!(row.full_details, r#"["a",{"k":1}]"#);
    }

    #[test]
    fn test_result_shapes() {
        let failed = InvocationResult::failed("boom".to_string(), None);
        let value = serde_json::to_value(&failed).unwrap();
        assert_eq!(
            value,
            json!({ "success": false, "error": "boom", "runIdentifier": null })
        );
        assert!(!failed.is_success());
    }
}
