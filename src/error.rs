//! Error types for aggregation and persistence.

use std::time::Duration;
use thiserror::Error;

/// Failure while folding reports into a summary.
#[derive(Debug, Error)]
pub enum AggregateError {
    /// The first report has no usable `execution.runIdentifier`.
    #[error("Missing run identifier: {0}")]
    MissingIdentifier(String),
}

/// Failure reported by a sink while writing the row.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Invalid table identifier: {0}")]
    InvalidTable(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Write timed out after {0:?}")]
    Timeout(Duration),

    #[error("Write interrupted: {0}")]
    Interrupted(String),

    #[error("Failed to acquire database connection: {0}")]
    Lock(String),
}

/// Any failure of one invocation.
#[derive(Debug, Error)]
pub enum InvocationError {
    #[error(transparent)]
    Aggregate(#[from] AggregateError),

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Failed to encode summary row: {0}")]
    Encode(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = InvocationError::from(AggregateError::MissingIdentifier(
            "no reports received".to_string(),
        ));
        assert_eq!(err.to_string(), "Missing run identifier: no reports received");

        let err = InvocationError::from(SinkError::Timeout(Duration::from_secs(5)));
        assert_eq!(err.to_string(), "Write timed out after 5s");
    }
}
