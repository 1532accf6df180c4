//! Row persistence.
//!
//! A [`Sink`] inserts exactly one summary row per invocation. The pipeline
//! never retries; retry policy, if any, belongs to the sink.

pub mod sqlite;

pub use sqlite::{SqliteSink, TableRef};

use crate::error::SinkError;
use crate::models::Insertable;
use std::future::Future;
use std::time::Duration;

/// Single-row write capability.
pub trait Sink: Send {
    /// Insert one row. Partial writes are the sink's concern.
    fn write(
        &mut self,
        record: &Insertable,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;

    /// Insert one row, giving up once `limit` has elapsed.
    ///
    /// A write that gives up must leave no row behind. The default drops the
    /// pending [`Sink::write`] future, which is only enough for sinks whose
    /// writes do nothing once dropped.
    fn write_within(
        &mut self,
        record: &Insertable,
        limit: Duration,
    ) -> impl Future<Output = Result<(), SinkError>> + Send {
        async move {
            tokio::time::timeout(limit, self.write(record))
                .await
                .map_err(|_| SinkError::Timeout(limit))?
        }
    }
}

/// Write a row, bounded by `limit` when one is set.
pub async fn write_with_timeout<S: Sink>(
    sink: &mut S,
    record: &Insertable,
    limit: Option<Duration>,
) -> Result<(), SinkError> {
    match limit {
        Some(limit) => sink.write_within(record, limit).await,
        None => sink.write(record).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ExecutionType, RunStatus};

    struct SlowSink;

    impl Sink for SlowSink {
        async fn write(&mut self, _record: &Insertable) -> Result<(), SinkError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn row() -> Insertable {
        Insertable {
            run_identifier: 1,
            execution_mode: "regular".to_string(),
            execution_type: ExecutionType::Manual,
            workflow_name: "wf".to_string(),
            status: RunStatus::Success,
            items_processed: 0,
            items_new: 0,
            items_duplicates: 0,
            items_updated: 0,
            event_summary: "{}".to_string(),
            full_details: "[]".to_string(),
        }
    }

    #[tokio::test]
    async fn test_write_times_out() {
        let err = write_with_timeout(&mut SlowSink, &row(), Some(Duration::from_millis(20)))
            .await
            .unwrap_err();
        assert!(matches!(err, SinkError::Timeout(d) if d == Duration::from_millis(20)));
    }
}
