use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned job identifier
/// Valid only for the lifetime of the request that produced it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Language advertised by the execution service (GET /languages)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Language {
    /// Identifier used in API calls (e.g. "python")
    pub language: String,
    /// Human-readable name (e.g. "Python 3")
    pub display_name: String,
}

/// Test Case Definition (Immutable Input)
/// Ids are caller-assigned and unique within a request.
/// A missing expected output means capture only, no correctness check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: u32,
    pub input: String,
    #[serde(
        rename = "expected",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub expected_output: Option<String>,
    #[serde(
        rename = "timeout_ms",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub timeout_ms: Option<u64>,
}

impl TestCase {
    pub fn new(id: u32, input: impl Into<String>) -> Self {
        Self {
            id,
            input: input.into(),
            expected_output: None,
            timeout_ms: None,
        }
    }

    pub fn expect(mut self, expected: impl Into<String>) -> Self {
        self.expected_output = Some(expected.into());
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }
}

/// Body of POST /execute
/// Immutable once submitted; test case order is the order results come back in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    pub language: String,
    #[serde(rename = "code")]
    pub source_code: String,
    #[serde(rename = "testcases")]
    pub test_cases: Vec<TestCase>,
}

impl ExecutionRequest {
    pub fn new(
        language: impl Into<String>,
        source_code: impl Into<String>,
        test_cases: Vec<TestCase>,
    ) -> Self {
        Self {
            language: language.into(),
            source_code: source_code.into(),
            test_cases,
        }
    }
}

/// Acceptance body returned by POST /execute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub id: JobId,
}

/// Body returned by GET /health
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

/// Error body the service attaches to non-2xx responses
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Overall execution status reported by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Success,
    Error,
    Timeout,
    CompileError,
    RuntimeError,
    UnsupportedLanguage,
    #[serde(other)]
    Unknown,
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionStatus::Success => "success",
            ExecutionStatus::Error => "error",
            ExecutionStatus::Timeout => "timeout",
            ExecutionStatus::CompileError => "compile_error",
            ExecutionStatus::RuntimeError => "runtime_error",
            ExecutionStatus::UnsupportedLanguage => "unsupported_language",
            ExecutionStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Per-Test Result
/// `ok` means the program did not crash, `passed` means the output matched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseResult {
    pub id: u32,
    pub ok: bool,
    pub passed: bool,
    #[serde(default)]
    pub input: String,
    #[serde(default)]
    pub expected: Option<String>,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub timed_out: bool,
    #[serde(default)]
    pub duration_ms: u64,
    #[serde(default)]
    pub memory_kb: u64,
    #[serde(default)]
    pub exit_code: Option<i32>,
    #[serde(default)]
    pub term_signal: Option<i32>,
}

/// Execution Output embedded in a completed job status
/// `status: null` decodes to `None`, unrecognised strings to `Unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub compiled: bool,
    pub language: String,
    #[serde(default)]
    pub status: Option<ExecutionStatus>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub results: Vec<TestCaseResult>,
    #[serde(default)]
    pub total_duration_ms: u64,
}

impl ExecutionResult {
    /// True iff every test case passed (vacuously true with no test cases)
    pub fn all_passed(&self) -> bool {
        self.results.iter().all(|r| r.passed)
    }

    pub fn passed_count(&self) -> usize {
        self.results.iter().filter(|r| r.passed).count()
    }
}

/// Job State Machine as reported by GET /status/{id}
/// Completed and Error are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed { result: ExecutionResult },
    Error { error: String },
}

/// Why a status body could not be decoded
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatusDecodeError {
    #[error("status body has no string `status` tag")]
    MissingTag,
    #[error("unknown job status: {0}")]
    UnknownTag(String),
    #[error("malformed `{tag}` status: {reason}")]
    Malformed { tag: String, reason: String },
}

impl JobStatus {
    pub const TAGS: [&'static str; 4] = ["queued", "running", "completed", "error"];

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed { .. } | JobStatus::Error { .. })
    }

    pub fn tag(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed { .. } => "completed",
            JobStatus::Error { .. } => "error",
        }
    }

    /// Decode a status body, telling an unknown tag apart from a malformed known one
    pub fn from_json(value: serde_json::Value) -> Result<Self, StatusDecodeError> {
        let tag = value
            .get("status")
            .and_then(|s| s.as_str())
            .ok_or(StatusDecodeError::MissingTag)?
            .to_string();

        if !Self::TAGS.contains(&tag.as_str()) {
            return Err(StatusDecodeError::UnknownTag(tag));
        }

        serde_json::from_value(value).map_err(|e| StatusDecodeError::Malformed {
            tag,
            reason: e.to_string(),
        })
    }
}
