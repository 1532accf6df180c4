//! Report aggregation.
//!
//! Folds the per-batch reports of one run into a single [`Summary`] in one
//! left-to-right pass. Counters and event counts are order independent;
//! `all_items` keeps report order and in-report item order.

use crate::error::AggregateError;
use crate::models::{ModeSetting, Report, Summary, Totals, DEFAULT_MODE};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::debug;

/// Aggregate all reports of one run into a summary.
///
/// The first report supplies the run identifier and, for
/// [`ModeSetting::Auto`], the execution mode. An empty slice or a first
/// report without a parseable identifier fails before anything is folded.
pub fn aggregate(reports: &[Report], mode: ModeSetting) -> Result<Summary, AggregateError> {
    let first = reports.first().ok_or_else(|| {
        AggregateError::MissingIdentifier("no reports received".to_string())
    })?;
    let run_identifier = parse_run_identifier(first.run_identifier())?;

    let mut totals = Totals::default();
    let mut event_summary: BTreeMap<String, u64> = BTreeMap::new();
    let mut has_failures = false;
    let mut all_items: Vec<Value> = Vec::new();

    for report in reports {
        add_totals(&mut totals, report);

        if report.failed_items() > 0 {
            has_failures = true;
        }

        merge_event_counts(&mut event_summary, report);
        all_items.extend(report.sent_items().iter().cloned());
    }

    let mode = resolve_mode(mode, first);

    debug!(
        run_identifier,
        batches = reports.len(),
        processed = totals.processed,
        items = all_items.len(),
        "Aggregated reports"
    );

    Ok(Summary {
        run_identifier,
        mode,
        totals,
        event_summary,
        has_failures,
        all_items,
    })
}

/// Parse a run identifier given as a JSON integer or a numeric string.
pub fn parse_run_identifier(value: Option<&Value>) -> Result<i64, AggregateError> {
    match value {
        None | Some(Value::Null) => Err(AggregateError::MissingIdentifier(
            "first report has no execution.runIdentifier".to_string(),
        )),
        Some(Value::Number(n)) => n.as_i64().ok_or_else(|| {
            AggregateError::MissingIdentifier(format!("runIdentifier {} is not an integer", n))
        }),
        Some(Value::String(s)) => s.trim().parse::<i64>().map_err(|_| {
            AggregateError::MissingIdentifier(format!("runIdentifier {:?} is not an integer", s))
        }),
        Some(other) => Err(AggregateError::MissingIdentifier(format!(
            "runIdentifier {} is not an integer",
            other
        ))),
    }
}

/// Resolve the execution mode for the run.
pub fn resolve_mode(setting: ModeSetting, first: &Report) -> String {
    match setting.literal() {
        Some(literal) => literal.to_string(),
        None => first.execution_mode().unwrap_or(DEFAULT_MODE).to_string(),
    }
}

fn add_totals(totals: &mut Totals, report: &Report) {
    totals.processed = totals.processed.saturating_add(report.total_input());
    totals.new = totals.new.saturating_add(report.new_items());
    totals.duplicates = totals.duplicates.saturating_add(report.exact_duplicates());
    totals.updated = totals.updated.saturating_add(report.updated_items());
}

fn merge_event_counts(merged: &mut BTreeMap<String, u64>, report: &Report) {
    for (event, count) in report.event_counts() {
        let entry = merged.entry(event.clone()).or_insert(0);
        *entry = entry.saturating_add(*count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(value: Value) -> Report {
        serde_json::from_value(value).unwrap()
    }

    fn with_id(id: &str, mut value: Value) -> Report {
        value["execution"] = json!({ "runIdentifier": id });
        report(value)
    }

    #[test]
    fn test_sums_two_batches() {
        let reports = vec![
            with_id("7", json!({ "summary": { "totalInput": 10, "newItems": 3 } })),
            with_id("7", json!({ "summary": { "totalInput": 5, "exactDuplicates": 2 } })),
        ];

        let summary = aggregate(&reports, ModeSetting::Auto).unwrap();

        assert_eq!(summary.run_identifier, 7);
        assert_eq!(
            summary.totals,
            Totals {
                processed: 15,
                new: 3,
                duplicates: 2,
                updated: 0
            }
        );
        assert!(!summary.has_failures);
    }

    #[test]
    fn test_auto_mode_defaults_to_regular() {
        let reports = vec![with_id("42", json!({}))];

        let summary = aggregate(&reports, ModeSetting::Auto).unwrap();

        assert_eq!(summary.run_identifier, 42);
        assert_eq!(summary.mode, "regular");
    }

    #[test]
    fn test_auto_mode_uses_first_report() {
        let reports = vec![
            report(json!({ "execution": { "runIdentifier": "1", "mode": "monthly" } })),
            report(json!({ "execution": { "runIdentifier": "1", "mode": "weekly" } })),
        ];

        let summary = aggregate(&reports, ModeSetting::Auto).unwrap();
        assert_eq!(summary.mode, "monthly");
    }

    #[test]
    fn test_explicit_mode_ignores_reports() {
        let reports = vec![report(
            json!({ "execution": { "runIdentifier": "1", "mode": "regular" } }),
        )];

        let summary = aggregate(&reports, ModeSetting::Monthly).unwrap();
        assert_eq!(summary.mode, "monthly");
    }

    #[test]
    fn test_empty_reports_is_missing_identifier() {
        let err = aggregate(&[], ModeSetting::Auto).unwrap_err();
        assert!(matches!(err, AggregateError::MissingIdentifier(_)));
    }

    #[test]
    fn test_identifier_only_read_from_first_report() {
        let reports = vec![report(json!({})), with_id("9", json!({}))];
        assert!(aggregate(&reports, ModeSetting::Auto).is_err());
    }

    #[test]
    fn test_parse_run_identifier() {
        assert_eq!(parse_run_identifier(Some(&json!("42"))).unwrap(), 42);
        assert_eq!(parse_run_identifier(Some(&json!(" 42 "))).unwrap(), 42);
        assert_eq!(parse_run_identifier(Some(&json!(42))).unwrap(), 42);
        assert!(parse_run_identifier(None).is_err());
        assert!(parse_run_identifier(Some(&Value::Null)).is_err());
        assert!(parse_run_identifier(Some(&json!(""))).is_err());
        assert!(parse_run_identifier(Some(&json!("abc"))).is_err());
        assert!(parse_run_identifier(Some(&json!(4.5))).is_err());
        assert!(parse_run_identifier(Some(&json!([1]))).is_err());
    }

    #[test]
    fn test_failures_are_sticky() {
        let reports = vec![
            with_id("1", json!({ "summary": { "failedItems": 0 } })),
            with_id("1", json!({ "summary": { "failedItems": 2 } })),
            with_id("1", json!({ "summary": { "failedItems": 0 } })),
        ];
        assert!(aggregate(&reports, ModeSetting::Auto).unwrap().has_failures);

        let clean = vec![with_id("1", json!({})), with_id("1", json!({ "summary": {} }))];
        assert!(!aggregate(&clean, ModeSetting::Auto).unwrap().has_failures);
    }

    #[test]
    fn test_items_keep_report_order() {
        let reports = vec![
            with_id(
                "1",
                json!({ "details": { "sentItems": { "items": ["a", "b"] } } }),
            ),
            with_id("1", json!({})),
            with_id("1", json!({ "details": { "sentItems": { "items": ["c"] } } })),
        ];

        let summary = aggregate(&reports, ModeSetting::Auto).unwrap();
        assert_eq!(summary.all_items, vec![json!("a"), json!("b"), json!("c")]);
    }

    #[test]
    fn test_event_merge_ignores_order_after_first() {
        let first = with_id(
            "3",
            json!({ "summary": { "totalInput": 1, "eventSummary": { "created": 1 } } }),
        );
        let b = report(json!({
            "summary": { "totalInput": 4, "updatedItems": 2, "eventSummary": { "created": 2, "deleted": 1 } },
            "details": { "sentItems": { "items": ["b"] } }
        }));
        let c = report(json!({
            "summary": { "newItems": 6, "eventSummary": { "updated": 5, "deleted": 3 } },
            "details": { "sentItems": { "items": ["c"] } }
        }));

        let forward = aggregate(&[first.clone(), b.clone(), c.clone()], ModeSetting::Auto).unwrap();
        let reversed = aggregate(&[first, c, b], ModeSetting::Auto).unwrap();

        assert_eq!(forward.event_summary, reversed.event_summary);
        assert_eq!(forward.totals, reversed.totals);
        assert_eq!(forward.event_summary.get("created"), Some(&3));
        assert_eq!(forward.event_summary.get("deleted"), Some(&4));
        assert_eq!(forward.event_summary.get("updated"), Some(&5));
        assert_ne!(forward.all_items, reversed.all_items);
    }

    #[test]
    fn test_empty_report_contributes_nothing() {
        let reports = vec![with_id("5", json!({ "summary": { "totalInput": 2 } })), report(json!({}))];

        let summary = aggregate(&reports, ModeSetting::Auto).unwrap();
        assert_eq!(summary.totals.processed, 2);
        assert!(summary.event_summary.is_empty());
        assert!(summary.all_items.is_empty());
    }
}
