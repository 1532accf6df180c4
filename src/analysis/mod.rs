//! Analysis modules.
//!
//! Aggregation of per-batch reports into one run summary.

pub mod aggregator;

pub use aggregator::*;
