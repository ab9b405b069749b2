use http::StatusCode;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Resource not found: {}", status_message(.body))]
    NotFound { body: String },

    #[error("Conflict: {}", status_message(.body))]
    Conflict { body: String },

    #[error("Name mismatch: operation targets {expected} but item is named {actual}")]
    NameMismatch { expected: String, actual: String },

    #[error("Namespace mismatch: operation targets {expected} but item is in {actual}")]
    NamespaceMismatch { expected: String, actual: String },

    #[error("Failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("No expectation matched request: {method} {path}")]
    UnmatchedRequest { method: String, path: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error ({code}): {}", status_message(.body))]
    Api { code: u16, body: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build the error matching a non-2xx response
    pub fn from_status(status: StatusCode, body: &[u8]) -> Self {
        let body = String::from_utf8_lossy(body).into_owned();
        match status {
            StatusCode::NOT_FOUND => Error::NotFound { body },
            StatusCode::CONFLICT => Error::Conflict { body },
            code => Error::Api {
                code: code.as_u16(),
                body,
            },
        }
    }

    /// HTTP status code carried by the error, if it came from a response
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::NotFound { .. } => Some(StatusCode::NOT_FOUND.as_u16()),
            Error::Conflict { .. } => Some(StatusCode::CONFLICT.as_u16()),
            Error::Api { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Raw response body carried by the error, if it came from a response
    pub fn body(&self) -> Option<&str> {
        match self {
            Error::NotFound { body } | Error::Conflict { body } | Error::Api { body, .. } => {
                Some(body)
            }
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, Error::Conflict { .. })
    }

    pub fn is_identity_mismatch(&self) -> bool {
        matches!(
            self,
            Error::NameMismatch { .. } | Error::NamespaceMismatch { .. }
        )
    }
}

/// Pull the `message` out of a Kubernetes `Status` body, falling back to the raw text
fn status_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(|m| m.as_str()).map(str::to_string))
        .unwrap_or_else(|| body.to_string())
}
