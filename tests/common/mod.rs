// Shared harness for HTTP integration tests
//
// Spawns the real router on a loopback port, plus a fake Jira server that
// accepts a single email/token pair.

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    extract::{Path, State},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use story_tests_lib::config::ServerConfig;
use story_tests_lib::generation::{
    GenerateRequest, GenerateResponse, GenerationError, GenerationProvider, TestCase,
};
use story_tests_lib::jira::basic_auth_header;
use story_tests_lib::server::{build_router, ServerAppState};
use story_tests_lib::shutdown::ShutdownState;
use tokio::net::TcpListener;

pub const JIRA_EMAIL: &str = "qa@example.com";
pub const JIRA_TOKEN: &str = "jira-token";

/// Serve a router on an ephemeral loopback port
pub async fn spawn(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// =============================================================================
// Fake Jira
// =============================================================================

#[derive(Clone)]
pub struct FakeJira {
    pub addr: SocketAddr,
    /// When set, every request is answered with 401
    pub revoked: Arc<AtomicBool>,
    pub requests: Arc<AtomicUsize>,
}

impl FakeJira {
    pub async fn start() -> Self {
        let revoked = Arc::new(AtomicBool::new(false));
        let requests = Arc::new(AtomicUsize::new(0));
        let state = FakeJiraState {
            expected_auth: basic_auth_header(JIRA_EMAIL, JIRA_TOKEN),
            revoked: revoked.clone(),
            requests: requests.clone(),
        };

        let router = Router::new()
            .route("/rest/api/3/myself", get(fake_myself))
            .route("/rest/api/3/search/jql", get(fake_search))
            .route("/rest/api/3/issue/:key", get(fake_issue))
            .with_state(state);

        Self {
            addr: spawn(router).await,
            revoked,
            requests,
        }
    }

    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn revoke(&self) {
        self.revoked.store(true, Ordering::SeqCst);
    }

    pub fn request_count(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct FakeJiraState {
    expected_auth: String,
    revoked: Arc<AtomicBool>,
    requests: Arc<AtomicUsize>,
}

impl FakeJiraState {
    fn authorize(&self, headers: &HeaderMap) -> Result<(), Response> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        let auth = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");
        if self.revoked.load(Ordering::SeqCst) || auth != self.expected_auth {
            return Err((
                StatusCode::UNAUTHORIZED,
                Json(json!({
                    "errorMessages": ["Client must be authenticated to access this resource."],
                    "errors": {}
                })),
            )
                .into_response());
        }
        Ok(())
    }
}

async fn fake_myself(State(state): State<FakeJiraState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(json!({
        "accountId": "5b10a2844c20165700ede21g",
        "displayName": "QA Engineer",
        "emailAddress": JIRA_EMAIL
    }))
    .into_response()
}

async fn fake_search(State(state): State<FakeJiraState>, headers: HeaderMap) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    Json(json!({
        "issues": [
            {
                "key": "QA-1",
                "fields": {
                    "summary": "Login with email",
                    "status": { "name": "To Do" },
                    "issuetype": { "name": "Story" },
                    "priority": { "name": "High" },
                    "assignee": { "displayName": "Dana" },
                    "updated": "2024-05-01T10:00:00.000+0000"
                }
            },
            {
                "key": "QA-2",
                "fields": {
                    "summary": "Reset password",
                    "status": { "name": "In Progress" },
                    "issuetype": { "name": "Story" },
                    "priority": null,
                    "assignee": null
                }
            }
        ],
        "isLast": true
    }))
    .into_response()
}

async fn fake_issue(
    State(state): State<FakeJiraState>,
    headers: HeaderMap,
    Path(key): Path<String>,
) -> Response {
    if let Err(rejection) = state.authorize(&headers) {
        return rejection;
    }
    if key == "QA-404" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({
                "errorMessages": ["Issue does not exist or you do not have permission to see it."],
                "errors": {}
            })),
        )
            .into_response();
    }

    Json(json!({
        "key": key,
        "names": {
            "summary": "Summary",
            "description": "Description",
            "customfield_10050": "Acceptance Criteria"
        },
        "renderedFields": {
            "description": "<p>As a user I want to log in with my email.</p>"
        },
        "fields": {
            "summary": "Login with email",
            "status": { "name": "To Do" },
            "issuetype": { "name": "Story" },
            "description": {
                "type": "doc",
                "version": 1,
                "content": [
                    {
                        "type": "paragraph",
                        "content": [
                            { "type": "text", "text": "As a user I want to log in with my email." }
                        ]
                    }
                ]
            },
            "customfield_10050": "Valid credentials open the dashboard\nInvalid password shows an error"
        }
    }))
    .into_response()
}

// =============================================================================
// Generation provider stub
// =============================================================================

/// Provider that echoes the story title into one case
pub struct StubProvider;

#[async_trait]
impl GenerationProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, GenerationError> {
        Ok(GenerateResponse {
            cases: vec![TestCase {
                id: "TC-001".to_string(),
                title: format!("{} succeeds", request.story_title),
                category: "Positive".to_string(),
                expected_result: "User sees the dashboard".to_string(),
                steps: vec!["Open login".to_string(), "Submit".to_string()],
                test_data: None,
            }],
            model: "stub-model".to_string(),
            prompt_tokens: 12,
            completion_tokens: 34,
        })
    }
}

// =============================================================================
// App under test
// =============================================================================

pub struct TestApp {
    pub addr: SocketAddr,
    client: reqwest::Client,
    cookie: Mutex<Option<String>>,
}

impl TestApp {
    pub async fn start() -> Self {
        Self::start_with(ServerConfig::default(), Arc::new(StubProvider)).await
    }

    pub async fn start_with(config: ServerConfig, generator: Arc<dyn GenerationProvider>) -> Self {
        let state = ServerAppState::with_generator(&config, ShutdownState::new(), generator)
            .unwrap();
        let addr = spawn(build_router(state, &config)).await;
        Self {
            addr,
            client: reqwest::Client::new(),
            cookie: Mutex::new(None),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Forget the session cookie, as a fresh browser would
    pub fn clear_cookie(&self) {
        *self.cookie.lock().unwrap() = None;
    }

    pub fn cookie(&self) -> Option<String> {
        self.cookie.lock().unwrap().clone()
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let request = match self.cookie() {
            Some(cookie) => request.header("Cookie", cookie),
            None => request,
        };
        let response = request.send().await.unwrap();

        if let Some(set_cookie) = response.headers().get("set-cookie") {
            let pair = set_cookie
                .to_str()
                .unwrap()
                .split(';')
                .next()
                .unwrap()
                .to_string();
            *self.cookie.lock().unwrap() = Some(pair);
        }

        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        let text = response.text().await.unwrap();
        let body = serde_json::from_str(&text).unwrap_or(Value::String(text));
        (status, body)
    }

    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        self.send(self.client.get(self.url(path))).await
    }

    pub async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        self.send(self.client.post(self.url(path)).json(&body)).await
    }

    pub async fn post_raw(&self, path: &str, body: &'static str) -> (StatusCode, Value) {
        self.send(
            self.client
                .post(self.url(path))
                .header("Content-Type", "application/json")
                .body(body),
        )
        .await
    }

    pub async fn connect(&self, base_url: &str, email: &str, token: &str) -> (StatusCode, Value) {
        self.post(
            "/api/jira/connect",
            json!({ "baseUrl": base_url, "email": email, "apiToken": token }),
        )
        .await
    }
}
