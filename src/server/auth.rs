//! Jira credential gate
//!
//! Route-level middleware that looks up the caller's Jira credentials in
//! their session and hands them to the handler as a request extension.

use super::error::ApiError;
use super::session::Session;
use crate::jira::SessionCredentials;
use axum::{
    extract::Request,
    middleware::Next,
    response::{IntoResponse, Response},
    Extension,
};

fn session_credentials(session: &Session) -> Option<SessionCredentials> {
    session.credentials().filter(SessionCredentials::is_valid)
}

/// Reject the request with `JIRA_NOT_CONNECTED` unless the session holds credentials
pub async fn require_jira(
    Extension(session): Extension<Session>,
    mut req: Request,
    next: Next,
) -> Response {
    match session_credentials(&session) {
        Some(creds) => {
            req.extensions_mut().insert(creds);
            next.run(req).await
        }
        None => {
            log::debug!("[jira] {} rejected: not connected", req.uri().path());
            ApiError::JiraNotConnected.into_response()
        }
    }
}

/// Attach credentials when present, but always continue
pub async fn optional_jira(
    Extension(session): Extension<Session>,
    mut req: Request,
    next: Next,
) -> Response {
    if let Some(creds) = session_credentials(&session) {
        req.extensions_mut().insert(creds);
    }
    next.run(req).await
}
