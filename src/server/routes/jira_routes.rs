//! Jira proxy routes
//!
//! Handles: connect, status, stories, story/:key and the `_store` debug dump.

use super::super::auth::{optional_jira, require_jira};
use super::super::error::ApiError;
use super::super::session::Session;
use super::super::ServerAppState;
use crate::jira::{SessionCredentials, StoryDetail, StorySummary};
use axum::{
    extract::{Path, State},
    middleware,
    routing::{get, post},
    Extension, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Body of `POST /api/jira/connect`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectRequest {
    pub base_url: Option<String>,
    pub email: Option<String>,
    pub api_token: Option<String>,
}

impl ConnectRequest {
    /// Returns (baseUrl, email, apiToken) when all three are non-blank
    fn required_fields(&self) -> Option<(&str, &str, &str)> {
        fn non_blank(v: &Option<String>) -> Option<&str> {
            v.as_deref().filter(|s| !s.trim().is_empty())
        }
        Some((
            non_blank(&self.base_url)?,
            non_blank(&self.email)?,
            non_blank(&self.api_token)?,
        ))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionStatus {
    pub connected: bool,
    pub base_url: Option<String>,
}

pub fn router(debug_routes: bool) -> Router<ServerAppState> {
    let protected = Router::new()
        .route("/stories", get(list_stories))
        .route("/story/:key", get(get_story))
        .route_layer(middleware::from_fn(require_jira));

    let mut router = Router::new()
        .route("/connect", post(connect))
        .route(
            "/status",
            get(status).route_layer(middleware::from_fn(optional_jira)),
        )
        .merge(protected);

    if debug_routes {
        router = router.route("/_store", get(debug_store));
    }

    router
}

/// Verify credentials against Jira, then store them in the session
async fn connect(
    State(state): State<ServerAppState>,
    Extension(session): Extension<Session>,
    body: Option<Json<ConnectRequest>>,
) -> Result<Json<Value>, ApiError> {
    let request = body.map(|Json(b)| b).unwrap_or_default();
    let (base_url, email, api_token) = request.required_fields().ok_or_else(|| {
        ApiError::BadRequest("baseUrl, email and apiToken are required".to_string())
    })?;

    let creds = SessionCredentials::new(base_url, email, api_token);
    log::info!("[jira] Verifying connection to {}", creds.base_url);

    let user = state.jira.test_connection(&creds).await.map_err(|e| {
        log::warn!("[jira] Connect to {} failed: {}", creds.base_url, e);
        let message = e.user_message();
        if message.trim().is_empty() {
            ApiError::Internal("Failed to connect to Jira".to_string())
        } else {
            ApiError::Internal(message)
        }
    })?;

    log::info!(
        "[jira] Connected to {} as {}",
        creds.base_url,
        user.display_name.as_deref().unwrap_or("unknown user")
    );
    session.set_credentials(creds);

    Ok(Json(json!({ "ok": true })))
}

async fn status(creds: Option<Extension<SessionCredentials>>) -> Json<ConnectionStatus> {
    let base_url = creds.map(|Extension(c)| c.base_url);
    Json(ConnectionStatus {
        connected: base_url.is_some(),
        base_url,
    })
}

async fn list_stories(
    State(state): State<ServerAppState>,
    Extension(creds): Extension<SessionCredentials>,
) -> Result<Json<Vec<StorySummary>>, ApiError> {
    let stories = state
        .jira
        .get_stories(&creds)
        .await
        .map_err(|e| ApiError::from_jira(e, "Failed to fetch stories"))?;
    log::debug!("[jira] Listed {} stories", stories.len());
    Ok(Json(stories))
}

async fn get_story(
    State(state): State<ServerAppState>,
    Extension(creds): Extension<SessionCredentials>,
    Path(key): Path<String>,
) -> Result<Json<StoryDetail>, ApiError> {
    if !is_valid_issue_key(&key) {
        return Err(ApiError::BadRequest(format!("Invalid issue key: {}", key)));
    }

    let story = state
        .jira
        .get_story(&creds, &key)
        .await
        .map_err(|e| ApiError::from_jira(e, "Failed to fetch story details"))?;
    Ok(Json(story))
}

/// Session dump for local debugging
async fn debug_store(Extension(session): Extension<Session>) -> Json<Value> {
    Json(json!({
        "session": session.is_active(),
        "jiraCreds": session.credentials(),
    }))
}

// Keys are interpolated into the upstream path
fn is_valid_issue_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}
