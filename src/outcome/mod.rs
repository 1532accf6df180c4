//! Invocation pipeline and result output.

pub mod pipeline;
pub mod writer;

pub use pipeline::{dry_run, run_invocation, settle_without_sink, InvocationSettings};
pub use writer::{generate_json, write_json};
