use std::collections::BTreeMap;

use bookkeep_core::ErrorEnvelope;
use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

/// Development backend errors.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("{kind} not found with id: {id}")]
    NotFound { kind: &'static str, id: String },

    #[error("Validation failed: {}", describe(.0))]
    Validation(BTreeMap<String, String>),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn describe(fields: &BTreeMap<String, String>) -> String {
    fields
        .iter()
        .map(|(field, message)| format!("{field} {message}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    pub fn not_found(kind: &'static str, id: &str) -> Self {
        Error::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Error::NotFound { .. } => StatusCode::NOT_FOUND,
            Error::Validation(_) | Error::BadRequest(_) | Error::Json(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Renders the error envelope for a request to `path`.
    pub fn into_response(self, path: &str) -> Response<Full<Bytes>> {
        let status = self.status_code();
        let message = self.to_string();
        let validation_errors = match self {
            Error::Validation(fields) => fields,
            _ => BTreeMap::new(),
        };
        let envelope = ErrorEnvelope {
            timestamp: Some(jiff::Timestamp::now().to_string()),
            status: Some(status.as_u16()),
            error: status.canonical_reason().map(String::from),
            message: Some(message),
            path: Some(path.to_string()),
            validation_errors,
        };

        error_response(status, &envelope)
    }
}

pub(crate) fn error_response(status: StatusCode, envelope: &ErrorEnvelope) -> Response<Full<Bytes>> {
    let body = serde_json::to_string(envelope).unwrap_or_else(|_| r#"{"error":"Internal error"}"#.to_string());
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_maps_to_bad_request() {
        let fields = BTreeMap::from([("email".to_string(), "must contain @".to_string())]);
        let err = Error::Validation(fields);

        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Validation failed: email must contain @");
    }

    #[test]
    fn not_found_message_names_kind() {
        let err = Error::not_found("Book", "9");

        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Book not found with id: 9");
    }
}
