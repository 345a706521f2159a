// In-memory job table for the mock executor
//
// Nothing is executed: every test "prints" its own input. A job's phase is a
// pure function of how long ago it was submitted, so no background task is
// needed to advance it.

use labexec_client::output_matches;
use labexec_common::types::{
    ExecutionRequest, ExecutionResult, ExecutionStatus, JobId, JobStatus, Language, TestCaseResult,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Per-test duration reported by the mock
const MOCK_TEST_DURATION_MS: u64 = 1;

/// How long a completed job stays readable before it is forgotten
pub const DEFAULT_JOB_RETENTION: Duration = Duration::from_secs(600);

/// Languages the mock claims to support
pub fn supported_languages() -> Vec<Language> {
    [
        ("python", "Python 3"),
        ("java", "Java 17"),
        ("cpp", "C++17"),
        ("c", "C11"),
        ("javascript", "JavaScript (Node.js)"),
        ("go", "Go"),
    ]
    .into_iter()
    .map(|(language, display_name)| Language {
        language: language.to_string(),
        display_name: display_name.to_string(),
    })
    .collect()
}

#[derive(Debug, Clone)]
struct MockJob {
    submitted_at: Instant,
    result: ExecutionResult,
}

pub struct JobTable {
    jobs: Mutex<HashMap<JobId, MockJob>>,
    next_id: AtomicU64,
    queue_delay: Duration,
    run_delay: Duration,
    retention: Duration,
}

impl JobTable {
    pub fn new(queue_delay: Duration, run_delay: Duration) -> Self {
        Self {
            jobs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_delay,
            run_delay,
            retention: DEFAULT_JOB_RETENTION,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    pub fn submit(&self, request: &ExecutionRequest) -> JobId {
        self.submit_at(request, Instant::now())
    }

    pub fn submit_at(&self, request: &ExecutionRequest, now: Instant) -> JobId {
        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let job = MockJob {
            submitted_at: now,
            result: echo_run(request),
        };

        let mut jobs = self.lock();
        let expiry = self.queue_delay + self.run_delay + self.retention;
        jobs.retain(|_, job| now.saturating_duration_since(job.submitted_at) < expiry);
        jobs.insert(id, job);
        id
    }

    pub fn status(&self, id: JobId) -> Option<JobStatus> {
        self.status_at(id, Instant::now())
    }

    pub fn status_at(&self, id: JobId, now: Instant) -> Option<JobStatus> {
        let jobs = self.lock();
        let job = jobs.get(&id)?;
        let age = now.saturating_duration_since(job.submitted_at);

        Some(if age < self.queue_delay {
            JobStatus::Queued
        } else if age < self.queue_delay + self.run_delay {
            JobStatus::Running
        } else {
            JobStatus::Completed {
                result: job.result.clone(),
            }
        })
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<JobId, MockJob>> {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// "Run" a request by echoing each test's input
pub fn echo_run(request: &ExecutionRequest) -> ExecutionResult {
    let supported = supported_languages()
        .iter()
        .any(|l| l.language == request.language);

    if !supported {
        return ExecutionResult {
            compiled: false,
            language: request.language.clone(),
            status: Some(ExecutionStatus::UnsupportedLanguage),
            message: Some(format!("Unsupported language: {}", request.language)),
            results: Vec::new(),
            total_duration_ms: 0,
        };
    }

    let results: Vec<TestCaseResult> = request
        .test_cases
        .iter()
        .map(|test_case| {
            let stdout = format!("{}\n", test_case.input);
            TestCaseResult {
                id: test_case.id,
                ok: true,
                passed: output_matches(&stdout, test_case.expected_output.as_deref()),
                input: test_case.input.clone(),
                expected: test_case.expected_output.clone(),
                stdout,
                stderr: String::new(),
                timed_out: false,
                duration_ms: MOCK_TEST_DURATION_MS,
                memory_kb: 0,
                exit_code: Some(0),
                term_signal: None,
            }
        })
        .collect();

    let all_passed = results.iter().all(|r| r.passed);
    ExecutionResult {
        compiled: true,
        language: request.language.clone(),
        status: Some(if all_passed {
            ExecutionStatus::Success
        } else {
            ExecutionStatus::Error
        }),
        message: None,
        total_duration_ms: results.iter().map(|r| r.duration_ms).sum(),
        results,
    }
}
