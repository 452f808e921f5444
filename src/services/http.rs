//! Shared plumbing for the JSON-over-HTTP service gateways

use std::time::Duration;

use serde::de::DeserializeOwned;

use super::{ServiceError, ServiceResult};

pub fn build_client(timeout: Duration) -> ServiceResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ServiceError::Transport(format!("failed to build HTTP client: {}", e)))
}

/// Send a request and decode a JSON success body.
///
/// Non-success responses surface the status and body verbatim. If the
/// rejection body itself cannot be read, that is a transport failure.
pub async fn send_json<T: DeserializeOwned>(request: reqwest::RequestBuilder) -> ServiceResult<T> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        response.json().await.map_err(|e| ServiceError::Decode(e.to_string()))
    } else {
        let body = response.text().await.map_err(|e| {
            ServiceError::Transport(format!("failed to read {} response body: {}", status.as_u16(), e))
        })?;
        Err(ServiceError::Rejected {
            status: status.as_u16(),
            body,
        })
    }
}

pub fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}
