//! HTTP route modules
//!
//! - jira_routes: Jira connection and story proxy under /api/jira
//! - generate_routes: test case generation

pub mod generate_routes;
pub mod jira_routes;

use axum::Json;
use serde_json::{json, Value};

/// `GET /api/health`
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}
