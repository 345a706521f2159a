//! Cancellation-aware suspension points.
//!
//! Both places where the engine waits (a network round-trip and the
//! inter-poll sleep) go through these helpers, so a cancellation fired
//! while waiting wakes the wait at once instead of at its natural end.

use crate::error::{ExecutorError, Result};
use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Overall wall-clock budget for one execution
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    started: Instant,
    budget: Duration,
}

impl Deadline {
    pub fn after(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    pub fn expired(&self) -> bool {
        self.elapsed() >= self.budget
    }

    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }

    pub fn instant(&self) -> Instant {
        self.started + self.budget
    }

    pub fn error(&self) -> ExecutorError {
        ExecutorError::Timeout {
            timeout_ms: self.budget.as_millis() as u64,
        }
    }
}

/// Sleep for `duration`, failing with `Aborted` as soon as `token` fires
pub async fn sleep_or_cancel(duration: Duration, token: &CancellationToken) -> Result<()> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ExecutorError::Aborted),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}

/// Drive `fut` unless `token` fires first; the losing future is dropped
pub async fn cancellable<F, T>(token: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ExecutorError::Aborted),
        out = fut => out,
    }
}

/// Like [`cancellable`], but also gives up with `Timeout` when `deadline` passes
pub async fn bounded<F, T>(token: &CancellationToken, deadline: &Deadline, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(ExecutorError::Aborted),
        _ = tokio::time::sleep_until(deadline.instant()) => Err(deadline.error()),
        out = fut => out,
    }
}
