//! One invocation: aggregate, build the row, write it, assemble the result.

use crate::analysis::aggregate;
use crate::error::{InvocationError, SinkError};
use crate::models::{Insertable, InvocationContext, InvocationResult, ModeSetting, Report};
use crate::sink::{write_with_timeout, Sink};
use std::time::Duration;
use tracing::{error, info};

/// Settings that shape a single invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationSettings {
    /// Execution mode override.
    pub mode: ModeSetting,
    /// Propagate errors instead of returning a failure result.
    pub fail_on_error: bool,
    /// Log the assembled row before writing it.
    pub verbose_logging: bool,
    /// Upper bound for the sink write.
    pub write_timeout: Option<Duration>,
}

/// Fold the reports into one row without writing it.
pub fn prepare_row(
    reports: &[Report],
    settings: &InvocationSettings,
    context: &InvocationContext,
) -> Result<Insertable, InvocationError> {
    let summary = aggregate(reports, settings.mode)?;
    let row = Insertable::from_summary(&summary, context)?;

    if settings.verbose_logging {
        info!(
            "Prepared row: {}",
            serde_json::to_string(&row).unwrap_or_else(|e| e.to_string())
        );
    }

    Ok(row)
}

/// Run one invocation against `sink`.
///
/// With `fail_on_error` unset every failure is turned into a failure result
/// and this never returns `Err`.
pub async fn run_invocation<S: Sink>(
    reports: &[Report],
    settings: &InvocationSettings,
    context: &InvocationContext,
    sink: &mut S,
) -> Result<InvocationResult, InvocationError> {
    let row = match prepare_row(reports, settings, context) {
        Ok(row) => row,
        Err(e) => return recover(e, None, settings),
    };
    let run_identifier = row.run_identifier;

    if let Err(e) = write_with_timeout(sink, &row, settings.write_timeout).await {
        return recover(e.into(), Some(run_identifier), settings);
    }

    info!(
        "Aggregated {} batch(es) into run {} ({})",
        reports.len(),
        run_identifier,
        row.status
    );

    Ok(InvocationResult::succeeded(context.now, reports.len(), row))
}

/// Aggregate and assemble the result without writing anything.
///
/// Follows the same `fail_on_error` policy as [`run_invocation`].
pub fn dry_run(
    reports: &[Report],
    settings: &InvocationSettings,
    context: &InvocationContext,
) -> Result<InvocationResult, InvocationError> {
    match prepare_row(reports, settings, context) {
        Ok(row) => Ok(InvocationResult::succeeded(context.now, reports.len(), row)),
        Err(e) => recover(e, None, settings),
    }
}

/// Settle an invocation whose sink could not be opened.
///
/// Identifier errors still take precedence over the sink error.
pub fn settle_without_sink(
    reports: &[Report],
    settings: &InvocationSettings,
    context: &InvocationContext,
    err: SinkError,
) -> Result<InvocationResult, InvocationError> {
    match prepare_row(reports, settings, context) {
        Ok(row) => recover(err.into(), Some(row.run_identifier), settings),
        Err(e) => recover(e, None, settings),
    }
}

fn recover(
    err: InvocationError,
    run_identifier: Option<i64>,
    settings: &InvocationSettings,
) -> Result<InvocationResult, InvocationError> {
    if settings.fail_on_error {
        return Err(err);
    }

    error!("Invocation failed: {}", err);
    Ok(InvocationResult::failed(err.to_string(), run_identifier))
}
