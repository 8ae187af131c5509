use std::time::Duration;

use bookkeep_core::{ErrorEnvelope, ErrorInfo, ErrorKind};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::ApiResult;

/// Shared HTTP transport.
///
/// Every failure leaving this type is an [`ErrorInfo`]; no `reqwest` error
/// reaches callers.
#[derive(Debug, Clone)]
pub struct Http {
    client: reqwest::Client,
    base_url: String,
}

impl Http {
    pub fn new(base_url: &str, timeout: Duration) -> reqwest::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, base_url))
    }

    pub fn with_client(client: reqwest::Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Starts a request for `path` below the base URL.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, format!("{}{}", self.base_url, path))
    }

    /// Sends `request`, turning transport failures and non-2xx statuses
    /// into [`ErrorInfo`]. `operation` names the call in fallback messages.
    pub async fn send(&self, request: RequestBuilder, path: &str, operation: &str) -> ApiResult<Response> {
        let response = request.send().await.map_err(|e| {
            warn!("{} failed without response: {}", operation, e);
            transport_error(&e, path)
        })?;

        let status = response.status();
        debug!("{} {} -> {}", operation, path, status);
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let info = error_from_body(status, &body, path, operation);
        warn!("{} failed: {}", operation, info);
        Err(info)
    }

    /// Reads the body as JSON, `Null` when the body is empty.
    ///
    /// A body that is not JSON at all is an `Unknown` error.
    pub async fn value(&self, response: Response, path: &str) -> ApiResult<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| unknown(status, format!("Failed to read response: {e}"), path))?;
        parse_value(status, &body, path)
    }

    /// Parses the body into `T`, reporting a schema mismatch as `Unknown`.
    pub async fn json<T: DeserializeOwned>(&self, response: Response, path: &str) -> ApiResult<T> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| unknown(status, format!("Failed to read response: {e}"), path))?;
        serde_json::from_str(&body)
            .map_err(|e| unknown(status, format!("Unexpected response shape: {e}"), path))
    }
}

/// Builds the error for a request that never got a response.
pub fn transport_error(error: &reqwest::Error, path: &str) -> ErrorInfo {
    let message = if error.is_timeout() {
        "Request timed out".to_string()
    } else if error.is_connect() {
        "Could not connect to server".to_string()
    } else {
        format!("Network error: {error}")
    };
    ErrorInfo::new(ErrorKind::NetworkFailure, 0, message, path)
}

/// Builds the error for a non-2xx response.
///
/// Uses the backend's error envelope when the body carries one, otherwise a
/// fallback naming `operation`. The status always comes from the response.
pub fn error_from_body(status: StatusCode, body: &str, path: &str, operation: &str) -> ErrorInfo {
    let code = status.as_u16();
    let kind = ErrorKind::from_status(code);

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if envelope.message.is_some() || !envelope.validation_errors.is_empty() => {
            let message = envelope
                .message
                .or(envelope.error)
                .unwrap_or_else(|| format!("Failed to {operation}"));
            let mut info = ErrorInfo::new(kind, code, message, envelope.path.as_deref().unwrap_or(path))
                .with_field_errors(envelope.validation_errors);
            if let Some(timestamp) = envelope.timestamp {
                info.timestamp = timestamp;
            }
            info
        }
        _ => ErrorInfo::new(kind, code, format!("Failed to {operation}"), path),
    }
}

fn parse_value(status: StatusCode, body: &str, path: &str) -> ApiResult<Value> {
    if body.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(body).map_err(|e| {
        warn!("{} answered {} with a non-JSON body", path, status);
        unknown(status, format!("Malformed response: {e}"), path)
    })
}

pub fn unknown(status: StatusCode, message: String, path: &str) -> ErrorInfo {
    ErrorInfo::new(ErrorKind::Unknown, status.as_u16(), message, path)
}
