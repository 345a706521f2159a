/// Client-side State Machine Adapter
///
/// **Responsibility:**
/// Wrap the polling engine for interactive callers that need live progress,
/// resets, and cancellation.
///
/// **States:**
/// `Idle → Submitting → Polling → {Completed | Error}`
/// - `reset()` returns to `Idle` from anywhere and clears result and error
/// - `cancel()` aborts in-flight work and returns to `Idle`, never `Error`
///
/// **Single-flight:**
/// Starting an execution cancels the previous one. Every execution carries a
/// generation number; only the current generation may publish state, so a
/// superseded call settles as `Aborted` and never overwrites newer state.
/// Use separate adapters for independent concurrent executions.
///
/// Dropping the adapter cancels whatever is in flight. Dropping the future of
/// the current `execute` call does the same and returns the adapter to `Idle`.

use crate::client::{ExecutorClient, JobEvent, PollOptions};
use crate::error::{ErrorKind, ExecutorError, Result};
use chrono::{DateTime, Utc};
use labexec_common::types::{ExecutionRequest, ExecutionResult, JobId};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionState {
    #[default]
    Idle,
    Submitting,
    Polling,
    Completed,
    Error,
}

impl ExecutionState {
    pub fn is_loading(&self) -> bool {
        matches!(self, ExecutionState::Submitting | ExecutionState::Polling)
    }
}

/// Error as shown to observers
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionFailure {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
}

impl From<&ExecutorError> for ExecutionFailure {
    fn from(err: &ExecutorError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            status_code: err.status_code(),
        }
    }
}

/// What observers see after every transition
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExecutionSnapshot {
    pub state: ExecutionState,
    /// Identifies one `execute` call
    pub run_id: Option<Uuid>,
    pub job_id: Option<JobId>,
    pub result: Option<Arc<ExecutionResult>>,
    pub error: Option<ExecutionFailure>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ExecutionSnapshot {
    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }
}

/// Per-call overrides of the adapter's polling defaults
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecuteOverrides {
    pub poll_interval: Option<Duration>,
    pub timeout: Option<Duration>,
}

type Callback<T> = Box<dyn Fn(&T) + Send + Sync>;

#[derive(Default)]
struct InFlight {
    generation: u64,
    token: Option<CancellationToken>,
}

pub struct CodeExecution {
    client: Arc<ExecutorClient>,
    poll_interval: Duration,
    timeout: Duration,
    state: watch::Sender<ExecutionSnapshot>,
    inflight: Mutex<InFlight>,
    on_complete: Option<Callback<ExecutionResult>>,
    on_error: Option<Callback<ExecutorError>>,
}

impl CodeExecution {
    pub fn new(client: Arc<ExecutorClient>) -> Self {
        let defaults = client.poll_options();
        let (state, _) = watch::channel(ExecutionSnapshot::default());
        Self {
            client,
            poll_interval: defaults.poll_interval,
            timeout: defaults.timeout,
            state,
            inflight: Mutex::new(InFlight::default()),
            on_complete: None,
            on_error: None,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Called once per execution that completes while still current
    pub fn on_complete<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutionResult) + Send + Sync + 'static,
    {
        self.on_complete = Some(Box::new(f));
        self
    }

    /// Called once per execution that fails while still current (never for cancellation)
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(&ExecutorError) + Send + Sync + 'static,
    {
        self.on_error = Some(Box::new(f));
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<ExecutionSnapshot> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ExecutionSnapshot {
        self.state.borrow().clone()
    }

    pub fn state(&self) -> ExecutionState {
        self.state.borrow().state
    }

    pub fn is_loading(&self) -> bool {
        self.state().is_loading()
    }

    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        self.execute_with(request, ExecuteOverrides::default()).await
    }

    /// Run `request`, superseding any execution still in flight
    ///
    /// Returns `Aborted` if this execution is cancelled or superseded before
    /// it settles; in that case the adapter's state is left to whoever
    /// cancelled it.
    pub async fn execute_with(
        &self,
        request: &ExecutionRequest,
        overrides: ExecuteOverrides,
    ) -> Result<ExecutionResult> {
        let (generation, token) = self.begin();
        let mut guard = RunGuard {
            execution: self,
            generation,
            armed: true,
        };

        let options = PollOptions {
            poll_interval: overrides.poll_interval.unwrap_or(self.poll_interval),
            timeout: overrides.timeout.unwrap_or(self.timeout),
            cancellation: token.clone(),
        };

        let outcome = self
            .client
            .execute_with_observer(request, options, |event| {
                if let JobEvent::Submitted(job_id) = *event {
                    self.publish(generation, |s| {
                        s.state = ExecutionState::Polling;
                        s.job_id = Some(job_id);
                    });
                }
            })
            .await;

        guard.armed = false;
        self.finish(generation, &token, outcome)
    }

    /// Abort in-flight work and go back to `Idle`, keeping the last result or error
    pub fn cancel(&self) {
        let mut inflight = self.lock();
        Self::retire(&mut inflight);
        self.state.send_modify(|s| s.state = ExecutionState::Idle);
    }

    /// Abort in-flight work and clear everything
    pub fn reset(&self) {
        let mut inflight = self.lock();
        Self::retire(&mut inflight);
        self.state.send_replace(ExecutionSnapshot::default());
    }

    fn begin(&self) -> (u64, CancellationToken) {
        let mut inflight = self.lock();
        if let Some(previous) = inflight.token.take() {
            debug!(generation = inflight.generation, "Superseding in-flight execution");
            previous.cancel();
        }
        inflight.generation += 1;

        let token = CancellationToken::new();
        inflight.token = Some(token.clone());

        let run_id = Uuid::new_v4();
        info!(run_id = %run_id, generation = inflight.generation, "Execution started");
        self.state.send_replace(ExecutionSnapshot {
            state: ExecutionState::Submitting,
            run_id: Some(run_id),
            started_at: Some(Utc::now()),
            ..Default::default()
        });

        (inflight.generation, token)
    }

    /// Apply `update` only if `generation` is still the current execution
    fn publish<F>(&self, generation: u64, update: F) -> bool
    where
        F: FnOnce(&mut ExecutionSnapshot),
    {
        let inflight = self.lock();
        if inflight.generation != generation {
            return false;
        }
        self.state.send_modify(update);
        true
    }

    fn finish(
        &self,
        generation: u64,
        token: &CancellationToken,
        outcome: Result<ExecutionResult>,
    ) -> Result<ExecutionResult> {
        let mut inflight = self.lock();
        if inflight.generation != generation || token.is_cancelled() {
            debug!(generation = generation, "Execution settled after cancellation");
            return Err(ExecutorError::Aborted);
        }
        inflight.token = None;

        match outcome {
            Ok(result) => {
                self.state.send_modify(|s| {
                    s.state = ExecutionState::Completed;
                    s.result = Some(Arc::new(result.clone()));
                    s.finished_at = Some(Utc::now());
                });
                drop(inflight);
                if let Some(on_complete) = &self.on_complete {
                    on_complete(&result);
                }
                Ok(result)
            }
            Err(err) => {
                self.state.send_modify(|s| {
                    s.state = ExecutionState::Error;
                    s.error = Some(ExecutionFailure::from(&err));
                    s.finished_at = Some(Utc::now());
                });
                drop(inflight);
                if let Some(on_error) = &self.on_error {
                    on_error(&err);
                }
                Err(err)
            }
        }
    }

    /// The `execute_with` future for `generation` went away before settling
    fn abandon(&self, generation: u64) {
        let mut inflight = self.lock();
        if inflight.generation != generation {
            return;
        }
        debug!(generation = generation, "Execution dropped before settling");
        Self::retire(&mut inflight);
        self.state.send_modify(|s| s.state = ExecutionState::Idle);
    }

    /// Cancel the current execution and make sure it can no longer publish
    fn retire(inflight: &mut InFlight) {
        if let Some(token) = inflight.token.take() {
            token.cancel();
        }
        inflight.generation += 1;
    }

    fn lock(&self) -> MutexGuard<'_, InFlight> {
        self.inflight.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Retires its execution when the owning `execute_with` future is dropped early
struct RunGuard<'a> {
    execution: &'a CodeExecution,
    generation: u64,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.execution.abandon(self.generation);
        }
    }
}

impl Drop for CodeExecution {
    fn drop(&mut self) {
        let inflight = self
            .inflight
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(token) = inflight.token.take() {
            token.cancel();
        }
    }
}
