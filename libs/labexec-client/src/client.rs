/// Job Submission & Polling Engine
///
/// **Core Responsibility:**
/// Submit an execution request, then poll its status until a terminal state,
/// the overall deadline, or cancellation.
///
/// **Exit Paths (exactly one per call):**
/// - Completed → the embedded `ExecutionResult`
/// - Error status → `Job` with the service's message
/// - deadline passed → `Timeout` (the remote job is not cancelled)
/// - cancellation → `Aborted`, also while sleeping between polls
/// - unknown status tag → `InvalidResponse`, no further polling
/// - transport failures → `Server` / `Network`
///
/// Nothing here retries; retry policy belongs to the caller.

use crate::cancel::{bounded, sleep_or_cancel, Deadline};
use crate::error::{ExecutorError, Result};
use crate::reconcile::reconcile;
use crate::transport::Transport;
use labexec_common::config::{ExecutorConfig, DEFAULT_POLL_INTERVAL, DEFAULT_TIMEOUT};
use labexec_common::endpoints;
use labexec_common::types::{
    ExecutionRequest, ExecutionResult, HealthResponse, JobId, JobStatus, Language,
    SubmitResponse, TestCase,
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Per-call polling settings
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub cancellation: CancellationToken,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
            cancellation: CancellationToken::new(),
        }
    }
}

impl PollOptions {
    pub fn from_config(config: &ExecutorConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            timeout: config.timeout,
            cancellation: CancellationToken::new(),
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

    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Non-terminal job phase seen while polling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobPhase {
    Queued,
    Running,
}

/// Progress reported while a job is in flight
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobEvent {
    Submitted(JobId),
    Polled { attempt: u32, phase: JobPhase },
}

/// Client for the code execution service
#[derive(Debug, Clone)]
pub struct ExecutorClient {
    transport: Transport,
    config: ExecutorConfig,
}

impl ExecutorClient {
    pub fn new(config: ExecutorConfig) -> Result<Self> {
        let transport = Transport::new(&config)?;
        Ok(Self { transport, config })
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Polling defaults taken from the client configuration
    pub fn poll_options(&self) -> PollOptions {
        PollOptions::from_config(&self.config)
    }

    /// True only when GET /health answers `{"status": "ok"}`
    pub async fn health_check(&self) -> bool {
        let token = CancellationToken::new();
        match self
            .transport
            .get::<HealthResponse>(endpoints::HEALTH, &token)
            .await
        {
            Ok(body) => body.status == "ok",
            Err(e) => {
                debug!(error = %e, kind = %e.kind(), "Health check failed");
                false
            }
        }
    }

    /// Languages offered by the service, in service order
    pub async fn languages(&self) -> Result<Vec<Language>> {
        let token = CancellationToken::new();
        self.transport.get(endpoints::LANGUAGES, &token).await
    }

    /// POST /execute, returning the server-issued job id
    pub async fn submit_job(
        &self,
        request: &ExecutionRequest,
        token: &CancellationToken,
    ) -> Result<JobId> {
        let accepted: SubmitResponse = self
            .transport
            .post(endpoints::EXECUTE, request, token)
            .await?;
        Ok(accepted.id)
    }

    /// GET /status/{id}, a single point-in-time read
    pub async fn get_job_status(&self, job_id: JobId, token: &CancellationToken) -> Result<JobStatus> {
        let body: serde_json::Value = self
            .transport
            .get(&endpoints::status_path(job_id), token)
            .await?;

        JobStatus::from_json(body).map_err(|e| ExecutorError::invalid_response(e.to_string()))
    }

    /// Submit and poll until the job reaches a terminal state
    pub async fn execute_and_wait(
        &self,
        request: &ExecutionRequest,
        options: PollOptions,
    ) -> Result<ExecutionResult> {
        self.execute_with_observer(request, options, |_| {}).await
    }

    /// Same as [`execute_and_wait`](Self::execute_and_wait), reporting progress to `observer`
    #[instrument(
        skip(self, request, options, observer),
        fields(language = %request.language, test_cases = request.test_cases.len())
    )]
    pub async fn execute_with_observer<F>(
        &self,
        request: &ExecutionRequest,
        options: PollOptions,
        mut observer: F,
    ) -> Result<ExecutionResult>
    where
        F: FnMut(&JobEvent),
    {
        let deadline = Deadline::after(options.timeout);
        let token = &options.cancellation;

        let job_id = bounded(token, &deadline, self.submit_job(request, token)).await?;
        info!(job_id = %job_id, "Job submitted");
        observer(&JobEvent::Submitted(job_id));

        let mut attempt: u32 = 0;
        loop {
            if deadline.expired() {
                warn!(
                    job_id = %job_id,
                    attempts = attempt,
                    timeout_ms = options.timeout.as_millis() as u64,
                    "Job did not finish in time; leaving it to the service"
                );
                return Err(deadline.error());
            }

            if token.is_cancelled() {
                info!(job_id = %job_id, attempts = attempt, "Job polling cancelled");
                return Err(ExecutorError::Aborted);
            }

            attempt += 1;
            let status = bounded(token, &deadline, self.get_job_status(job_id, token)).await?;

            let phase = match status {
                JobStatus::Completed { result } => {
                    info!(
                        job_id = %job_id,
                        attempts = attempt,
                        elapsed_ms = deadline.elapsed().as_millis() as u64,
                        status = ?result.status,
                        results = result.results.len(),
                        "Job completed"
                    );
                    return Ok(result);
                }
                JobStatus::Error { error } => {
                    warn!(job_id = %job_id, attempts = attempt, error = %error, "Job reported error");
                    return Err(ExecutorError::Job { message: error });
                }
                JobStatus::Queued => JobPhase::Queued,
                JobStatus::Running => JobPhase::Running,
            };

            debug!(job_id = %job_id, attempt = attempt, phase = ?phase, "Job not finished");
            observer(&JobEvent::Polled { attempt, phase });

            // Never sleep past the deadline
            let pause = options.poll_interval.min(deadline.remaining());
            sleep_or_cancel(pause, token).await?;
        }
    }

    /// Convenience wrapper building the request from its parts
    pub async fn execute_code(
        &self,
        language: &str,
        code: &str,
        test_cases: Vec<TestCase>,
        options: PollOptions,
    ) -> Result<ExecutionResult> {
        let request = ExecutionRequest::new(language, code, test_cases);
        self.execute_and_wait(&request, options).await
    }

    /// Execute, then recompute verdicts locally against the request
    pub async fn execute_and_reconcile(
        &self,
        request: &ExecutionRequest,
        options: PollOptions,
    ) -> Result<ExecutionResult> {
        let raw = self.execute_and_wait(request, options).await?;
        reconcile(request, &raw)
    }
}
