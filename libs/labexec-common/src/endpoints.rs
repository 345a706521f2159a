use crate::types::JobId;

/// Execution service endpoint paths - defines only the protocol surface.
/// Ensures the client and the mock service never drift.

pub const HEALTH: &str = "/health";
pub const LANGUAGES: &str = "/languages";
pub const EXECUTE: &str = "/execute";
pub const STATUS_PREFIX: &str = "/status";

/// Route pattern for the status endpoint, as mounted by the mock service
pub const STATUS_ROUTE: &str = "/status/:id";

/// Path used to poll a job
pub fn status_path(job_id: JobId) -> String {
    format!("{}/{}", STATUS_PREFIX, job_id)
}

/// Join a base URL and an endpoint path
/// The base is expected to be normalized (no trailing slash).
pub fn url(base_url: &str, endpoint: &str) -> String {
    format!("{}{}", base_url, endpoint)
}
