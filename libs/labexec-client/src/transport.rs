/// Transport Layer - one HTTP round-trip per call
///
/// **Core Responsibility:**
/// Send a JSON request to the execution service and decode the JSON reply.
///
/// **Failure Classification:**
/// - non-2xx status → `Server` with the numeric status and the body's `error`
///   field, else "HTTP <code>: <reason>"
/// - cancellation while in flight → `Aborted`
/// - anything else (DNS, refused connection, bad JSON) → `Network` wrapping the cause
///
/// Stateless between calls; transport-specific error types never escape.

use crate::cancel::cancellable;
use crate::error::{ExecutorError, Result};
use labexec_common::config::ExecutorConfig;
use labexec_common::endpoints;
use labexec_common::types::ErrorBody;
use reqwest::header::{HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct Transport {
    http: reqwest::Client,
    base_url: String,
}

impl Transport {
    pub fn new(config: &ExecutorConfig) -> Result<Self> {
        let mut builder = reqwest::Client::builder().connect_timeout(config.connect_timeout);
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ExecutorError::network("failed to build HTTP client", e))?;

        Ok(Self {
            http,
            base_url: config.base_url.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T>(&self, endpoint: &str, token: &CancellationToken) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let request = self.http.request(Method::GET, self.url(endpoint));
        self.request(Method::GET, endpoint, request, token).await
    }

    pub async fn post<B, T>(&self, endpoint: &str, body: &B, token: &CancellationToken) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let request = self.http.request(Method::POST, self.url(endpoint)).json(body);
        self.request(Method::POST, endpoint, request, token).await
    }

    async fn request<T>(
        &self,
        method: Method,
        endpoint: &str,
        request: RequestBuilder,
        token: &CancellationToken,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        debug!(method = %method, endpoint = endpoint, "Executor request");
        cancellable(token, exchange(request, endpoint)).await
    }

    fn url(&self, endpoint: &str) -> String {
        endpoints::url(&self.base_url, endpoint)
    }
}

async fn exchange<T>(request: RequestBuilder, endpoint: &str) -> Result<T>
where
    T: DeserializeOwned,
{
    let response = request
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header(ACCEPT, HeaderValue::from_static("application/json"))
        .send()
        .await
        .map_err(|e| ExecutorError::network(format!("{} request failed: {}", endpoint, e), e))?;

    let status = response.status();

    if !status.is_success() {
        // The body is only a hint for the message; losing it is fine
        let body = response.bytes().await.unwrap_or_default();
        let message = error_message(status, &body);
        debug!(endpoint = endpoint, status = status.as_u16(), message = %message, "Executor returned error status");
        return Err(ExecutorError::Server {
            status: status.as_u16(),
            message,
        });
    }

    let body = response.bytes().await.map_err(|e| {
        ExecutorError::network(format!("{} response body unreadable: {}", endpoint, e), e)
    })?;

    serde_json::from_slice(&body).map_err(|e| {
        ExecutorError::network(format!("{} returned malformed JSON: {}", endpoint, e), e)
    })
}

/// Message for a non-2xx reply: the body's `error` field when it has one
pub(crate) fn error_message(status: StatusCode, body: &[u8]) -> String {
    match serde_json::from_slice::<ErrorBody>(body) {
        Ok(ErrorBody { error }) if !error.trim().is_empty() => error,
        _ => format!(
            "HTTP {}: {}",
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown Status")
        ),
    }
}
