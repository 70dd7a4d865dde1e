//! Hub error taxonomy and its HTTP mapping.
//!
//! Duplicates, slow viewers and lost connections are outcomes rather than errors:
//! see `Admission`, `PushOutcome` and `ViewerPhase::Closed`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    /// A producer payload is missing required fields or has the wrong shape.
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    /// The external store or log bus could not be reached.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HubError {
    pub fn malformed(msg: impl Into<String>) -> Self {
        HubError::MalformedPayload(msg.into())
    }

    pub fn upstream(err: impl std::fmt::Display) -> Self {
        HubError::UpstreamUnavailable(err.to_string())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            HubError::MalformedPayload(_) => StatusCode::BAD_REQUEST,
            HubError::UpstreamUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            HubError::Config(_) | HubError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            HubError::MalformedPayload(_) => "malformed_payload",
            HubError::UpstreamUnavailable(_) => "upstream_unavailable",
            HubError::Config(_) => "config",
            HubError::Io(_) => "io",
        }
    }
}

impl IntoResponse for HubError {
    fn into_response(self) -> Response {
        let body = json!({ "error": self.kind(), "details": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

pub type Result<T, E = HubError> = std::result::Result<T, E>;
