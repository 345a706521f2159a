//! Client-side orchestration for the remote code-execution service.
//!
//! Layers, leaves first:
//! - [`transport`]: one HTTP round-trip, uniform error classification
//! - [`client`]: submit-then-poll engine with timeout and cancellation
//! - [`reconcile`]: per-test verdicts and aggregate status
//! - [`adapter`]: observable single-flight state machine for interactive callers

pub mod adapter;
pub mod cancel;
pub mod client;
pub mod error;
pub mod health;
pub mod reconcile;
pub mod transport;

pub use adapter::{
    CodeExecution, ExecuteOverrides, ExecutionFailure, ExecutionSnapshot, ExecutionState,
};
pub use client::{ExecutorClient, JobEvent, JobPhase, PollOptions};
pub use error::{ErrorKind, ExecutorError, Result};
pub use health::HealthMonitor;
pub use labexec_common::config::ExecutorConfig;
pub use labexec_common::types::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, JobId, JobStatus, Language, TestCase,
    TestCaseResult,
};
pub use reconcile::{grade, output_matches, reconcile, Grade, Verdict};
pub use tokio_util::sync::CancellationToken;

#[cfg(test)]
mod test_support;

#[cfg(test)]
mod client_tests;
