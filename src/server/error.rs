//! API error responses
//!
//! Every failure leaves the server as `{"message": ..., "code"?: ...}`.

use crate::generation::GenerationError;
use crate::jira::JiraError;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Error code for requests without stored Jira credentials
pub const JIRA_NOT_CONNECTED: &str = "JIRA_NOT_CONNECTED";
/// Error code for credentials Jira no longer accepts
pub const JIRA_AUTH_FAILED: &str = "JIRA_AUTH_FAILED";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Not connected to Jira. Please connect to Jira first using the Connect button.")]
    JiraNotConnected,

    #[error("Jira authentication failed. Please check your credentials and reconnect.")]
    JiraAuthFailed,

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::JiraNotConnected | ApiError::JiraAuthFailed => StatusCode::UNAUTHORIZED,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> Option<&'static str> {
        match self {
            ApiError::JiraNotConnected => Some(JIRA_NOT_CONNECTED),
            ApiError::JiraAuthFailed => Some(JIRA_AUTH_FAILED),
            _ => None,
        }
    }

    /// Map a Jira failure on a proxied read.
    ///
    /// A 401 from Jira means the session is connected but the credentials
    /// went stale, which the UI handles differently from "never connected".
    pub fn from_jira(err: JiraError, fallback: &str) -> Self {
        if err.is_unauthorized() {
            return ApiError::JiraAuthFailed;
        }
        let message = err.user_message();
        if message.trim().is_empty() {
            ApiError::Internal(fallback.to_string())
        } else {
            ApiError::Internal(message)
        }
    }
}

impl From<GenerationError> for ApiError {
    fn from(err: GenerationError) -> Self {
        if matches!(err, GenerationError::NotConfigured(_)) {
            return ApiError::ServiceUnavailable(err.to_string());
        }
        match err {
            GenerationError::Upstream { message, .. } => ApiError::Internal(message),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            message: self.to_string(),
            code: self.code(),
        };
        (self.status(), Json(body)).into_response()
    }
}
