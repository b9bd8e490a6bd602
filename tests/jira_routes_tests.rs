// Integration tests for the Jira proxy routes

mod common;

use axum::http::StatusCode;
use common::{FakeJira, StubProvider, TestApp, JIRA_EMAIL, JIRA_TOKEN};
use serde_json::json;
use std::sync::Arc;
use story_tests_lib::config::ServerConfig;

#[tokio::test]
async fn test_health() {
    let app = TestApp::start().await;
    let (status, body) = app.get("/api/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "ok": true }));
}

#[tokio::test]
async fn test_connect_requires_all_fields() {
    let app = TestApp::start().await;
    let jira = FakeJira::start().await;

    let incomplete = [
        json!({ "email": JIRA_EMAIL, "apiToken": JIRA_TOKEN }),
        json!({ "baseUrl": jira.base_url(), "apiToken": JIRA_TOKEN }),
        json!({ "baseUrl": jira.base_url(), "email": JIRA_EMAIL }),
        json!({ "baseUrl": "  ", "email": JIRA_EMAIL, "apiToken": JIRA_TOKEN }),
        json!({}),
    ];
    for body in incomplete {
        let (status, response) = app.post("/api/jira/connect", body.clone()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body: {}", body);
        assert_eq!(
            response["message"],
            "baseUrl, email and apiToken are required"
        );
    }

    // Unparsable body
    let (status, _) = app.post_raw("/api/jira/connect", "{not json").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Nothing reached Jira
    assert_eq!(jira.request_count(), 0);
}

#[tokio::test]
async fn test_protected_routes_without_connect() {
    let app = TestApp::start().await;

    for path in ["/api/jira/stories", "/api/jira/story/QA-1"] {
        let (status, body) = app.get(path).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "path: {}", path);
        assert_eq!(body["code"], "JIRA_NOT_CONNECTED");
        assert!(body["message"]
            .as_str()
            .unwrap()
            .starts_with("Not connected to Jira"));
    }

    let (status, body) = app.get("/api/jira/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "connected": false, "baseUrl": null }));

    // Reads do not create sessions
    assert!(app.cookie().is_none());
}

#[tokio::test]
async fn test_connect_then_list_and_detail() {
    let app = TestApp::start().await;
    let jira = FakeJira::start().await;

    let (status, body) = app
        .connect(&format!("{}/", jira.base_url()), JIRA_EMAIL, JIRA_TOKEN)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body, json!({ "ok": true }));
    assert!(app.cookie().unwrap().starts_with("sid="));

    let (status, body) = app.get("/api/jira/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["connected"], true);
    // Trailing slash is stripped
    assert_eq!(body["baseUrl"], jira.base_url());

    let (status, body) = app.get("/api/jira/stories").await;
    assert_eq!(status, StatusCode::OK);
    let stories = body.as_array().unwrap();
    assert_eq!(stories.len(), 2);
    assert_eq!(stories[0]["key"], "QA-1");
    assert_eq!(stories[0]["title"], "Login with email");
    assert_eq!(stories[0]["status"], "To Do");
    assert_eq!(stories[0]["assignee"], "Dana");
    assert!(stories[1]["assignee"].is_null());

    let (status, body) = app.get("/api/jira/story/QA-1").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["key"], "QA-1");
    assert_eq!(body["title"], "Login with email");
    assert_eq!(
        body["description"],
        "As a user I want to log in with my email."
    );
    assert_eq!(
        body["acceptanceCriteria"],
        "Valid credentials open the dashboard\nInvalid password shows an error"
    );
    assert_eq!(body["url"], format!("{}/browse/QA-1", jira.base_url()));
}

#[tokio::test]
async fn test_sessions_are_isolated() {
    let app = TestApp::start().await;
    let jira = FakeJira::start().await;

    let (status, _) = app.connect(&jira.base_url(), JIRA_EMAIL, JIRA_TOKEN).await;
    assert_eq!(status, StatusCode::OK);

    // A different browser has no credentials
    app.clear_cookie();
    let (status, body) = app.get("/api/jira/stories").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "JIRA_NOT_CONNECTED");
}

#[tokio::test]
async fn test_forged_cookie_is_ignored() {
    let app = TestApp::start().await;
    let client = reqwest::Client::new();

    let response = client
        .get(app.url("/api/jira/stories"))
        .header("Cookie", "sid=0123456789abcdef.deadbeef")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 401);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["code"], "JIRA_NOT_CONNECTED");
}

#[tokio::test]
async fn test_upstream_401_maps_to_auth_failed() {
    let app = TestApp::start().await;
    let jira = FakeJira::start().await;

    let (status, _) = app.connect(&jira.base_url(), JIRA_EMAIL, JIRA_TOKEN).await;
    assert_eq!(status, StatusCode::OK);

    jira.revoke();

    let (status, body) = app.get("/api/jira/stories").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "JIRA_AUTH_FAILED");

    let (status, body) = app.get("/api/jira/story/QA-1").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "JIRA_AUTH_FAILED");
}

#[tokio::test]
async fn test_failed_verification_stores_nothing() {
    let app = TestApp::start().await;
    let jira = FakeJira::start().await;

    let (status, body) = app.connect(&jira.base_url(), JIRA_EMAIL, "wrong").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["message"],
        "Client must be authenticated to access this resource."
    );
    assert!(body.get("code").is_none());
    assert!(app.cookie().is_none());

    let (_, body) = app.get("/api/jira/status").await;
    assert_eq!(body["connected"], false);
}

#[tokio::test]
async fn test_failed_reconnect_keeps_previous_credentials() {
    let app = TestApp::start().await;
    let jira = FakeJira::start().await;

    let (status, _) = app.connect(&jira.base_url(), JIRA_EMAIL, JIRA_TOKEN).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.connect(&jira.base_url(), JIRA_EMAIL, "wrong").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let (status, body) = app.get("/api/jira/stories").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_unreachable_jira_reports_error() {
    let app = TestApp::start().await;

    // Nothing listens on the discard port
    let (status, body) = app.connect("http://127.0.0.1:9", JIRA_EMAIL, JIRA_TOKEN).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body["message"].as_str().unwrap().is_empty());
}

#[tokio::test]
async fn test_story_errors() {
    let app = TestApp::start().await;
    let jira = FakeJira::start().await;
    app.connect(&jira.base_url(), JIRA_EMAIL, JIRA_TOKEN).await;

    let (status, body) = app.get("/api/jira/story/QA-404").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body["message"],
        "Issue does not exist or you do not have permission to see it."
    );

    let (status, _) = app.get("/api/jira/story/QA-1%2F..%2Fmyself").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_debug_store() {
    let app = TestApp::start().await;
    let jira = FakeJira::start().await;

    let (status, body) = app.get("/api/jira/_store").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "session": false, "jiraCreds": null }));

    app.connect(&jira.base_url(), JIRA_EMAIL, JIRA_TOKEN).await;
    let (_, body) = app.get("/api/jira/_store").await;
    assert_eq!(body["session"], true);
    assert_eq!(body["jiraCreds"]["baseUrl"], jira.base_url());
}

#[tokio::test]
async fn test_debug_store_can_be_disabled() {
    let config = ServerConfig {
        debug_routes: false,
        ..Default::default()
    };
    let app = TestApp::start_with(config, Arc::new(StubProvider)).await;

    let (status, _) = app.get("/api/jira/_store").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_cors_allows_credentialed_dev_origin() {
    let app = TestApp::start().await;
    let client = reqwest::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, app.url("/api/jira/connect"))
        .header("Origin", "http://localhost:5174")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();

    let headers = response.headers();
    assert_eq!(
        headers["access-control-allow-origin"],
        "http://localhost:5174"
    );
    assert_eq!(headers["access-control-allow-credentials"], "true");
}
