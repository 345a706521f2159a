// HTTP route handlers for the mock executor

use axum::{
    extract::rejection::JsonRejection,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use labexec_common::types::{
    ErrorBody, ExecutionRequest, HealthResponse, JobId, SubmitResponse,
};
use labexec_common::validate::validate_request;
use std::sync::Arc;
use tracing::{info, warn};

use crate::jobs::supported_languages;
use crate::AppState;

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

/// GET /health
pub async fn health_check() -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// GET /languages
pub async fn list_languages() -> impl IntoResponse {
    Json(supported_languages())
}

/// POST /execute - Accept a job and hand back its id
pub async fn submit_job(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ExecutionRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            warn!(error = %rejection.body_text(), "Rejected malformed submission");
            return error_response(rejection.status(), rejection.body_text());
        }
    };

    // Unsupported languages are accepted and fail inside the job
    if let Err(e) = validate_request(&request, None) {
        warn!(error = %e, "Rejected invalid submission");
        return error_response(StatusCode::BAD_REQUEST, e.to_string());
    }

    let id = state.jobs.submit(&request);
    info!(
        job_id = %id,
        language = %request.language,
        test_cases = request.test_cases.len(),
        tracked_jobs = state.jobs.len(),
        "Job queued"
    );

    (StatusCode::ACCEPTED, Json(SubmitResponse { id })).into_response()
}

/// GET /status/{id}
pub async fn get_job_status(
    State(state): State<Arc<AppState>>,
    Path(job_id): Path<String>,
) -> Response {
    let id = match job_id.parse::<u64>() {
        Ok(id) => JobId(id),
        Err(_) => return error_response(StatusCode::BAD_REQUEST, "Invalid job ID format"),
    };

    match state.jobs.status(id) {
        Some(status) => {
            info!(job_id = %id, status = status.tag(), "Job status read");
            Json(status).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, "Job not found"),
    }
}
