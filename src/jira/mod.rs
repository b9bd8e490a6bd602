// Jira REST API integration for story import

pub mod adf;
pub mod story_converter;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub use story_converter::{issue_to_detail, issue_to_summary};

/// JQL used to list stories when none is configured
pub const DEFAULT_STORIES_JQL: &str = "issuetype = Story ORDER BY updated DESC";

/// Page size used when listing stories
pub const DEFAULT_MAX_RESULTS: u32 = 50;

/// Fields requested for the story dropdown
const SUMMARY_FIELDS: &str = "summary,status,issuetype,priority,assignee,updated";

/// Basic-auth material for one Jira site, held in the session store
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCredentials {
    /// Site origin without trailing slash (e.g. "https://acme.atlassian.net")
    pub base_url: String,
    /// "Basic " + base64(email:apiToken)
    pub auth_header: String,
}

impl SessionCredentials {
    /// Build credentials from the connect form fields
    pub fn new(base_url: &str, email: &str, api_token: &str) -> Self {
        Self {
            base_url: normalize_base_url(base_url),
            auth_header: basic_auth_header(email, api_token),
        }
    }

    /// Credentials only count as connected when both parts are present
    pub fn is_valid(&self) -> bool {
        !self.base_url.is_empty() && !self.auth_header.is_empty()
    }
}

// Never print the auth header
impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("base_url", &self.base_url)
            .field("auth_header", &"<redacted>")
            .finish()
    }
}

/// Trim whitespace and strip a single trailing slash
pub fn normalize_base_url(raw: &str) -> String {
    let trimmed = raw.trim();
    trimmed.strip_suffix('/').unwrap_or(trimmed).to_string()
}

/// Build a Basic authorization header value
pub fn basic_auth_header(email: &str, api_token: &str) -> String {
    format!("Basic {}", BASE64.encode(format!("{}:{}", email, api_token)))
}

/// Story row shown in the issue dropdown
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorySummary {
    pub key: String,
    pub title: String,
    pub status: Option<String>,
    pub issue_type: Option<String>,
    pub priority: Option<String>,
    pub assignee: Option<String>,
    pub updated: Option<String>,
}

/// Full story used to pre-fill the generation form
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryDetail {
    pub key: String,
    pub title: String,
    pub status: Option<String>,
    pub issue_type: Option<String>,
    /// Description as Markdown-flavoured plain text
    pub description: Option<String>,
    /// Jira's rendered HTML for the description, when available
    pub description_html: Option<String>,
    pub acceptance_criteria: Option<String>,
    /// Browse link for the issue
    pub url: String,
}

/// The account behind a set of credentials (from /myself)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JiraUser {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email_address: Option<String>,
}

/// Errors talking to Jira
#[derive(Debug, Error)]
pub enum JiraError {
    /// Jira answered 401: the stored credentials are no longer accepted
    #[error("Jira rejected the credentials: {0}")]
    Unauthorized(String),

    #[error("Jira API error ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("Jira request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Unexpected Jira response: {0}")]
    InvalidResponse(String),
}

impl JiraError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, JiraError::Unauthorized(_))
    }

    /// Best message to show an API client
    pub fn user_message(&self) -> String {
        match self {
            JiraError::Unauthorized(message) | JiraError::Upstream { message, .. } => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

/// Pull a human readable message out of a Jira error body.
///
/// Jira reports failures as `{"errorMessages": [...], "errors": {field: msg}}`;
/// some proxies and older versions use a plain `message`.
pub fn extract_error_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    let value: serde_json::Value = match serde_json::from_str(trimmed) {
        Ok(value) => value,
        // HTML error pages are useless to the user
        Err(_) if trimmed.starts_with('<') => return None,
        Err(_) => return Some(trimmed.chars().take(300).collect()),
    };

    let messages: Vec<String> = value["errorMessages"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|m| m.as_str())
                .map(|s| s.to_string())
                .collect()
        })
        .unwrap_or_default();
    if !messages.is_empty() {
        return Some(messages.join("; "));
    }

    let field_errors: Vec<String> = value["errors"]
        .as_object()
        .map(|obj| {
            obj.iter()
                .filter_map(|(field, msg)| msg.as_str().map(|m| format!("{}: {}", field, m)))
                .collect()
        })
        .unwrap_or_default();
    if !field_errors.is_empty() {
        return Some(field_errors.join("; "));
    }

    value["message"].as_str().map(|s| s.to_string())
}

/// Jira REST client shared by all sessions.
///
/// The client itself holds no credentials; every call takes the
/// session's [`SessionCredentials`].
#[derive(Clone)]
pub struct JiraClient {
    client: reqwest::Client,
    stories_jql: String,
    max_results: u32,
}

impl JiraClient {
    /// Create a new Jira client with a per-request timeout
    pub fn new(timeout: Duration) -> Result<Self, JiraError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("story-tests/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            stories_jql: DEFAULT_STORIES_JQL.to_string(),
            max_results: DEFAULT_MAX_RESULTS,
        })
    }

    /// Override the JQL and page size used by [`JiraClient::get_stories`]
    pub fn with_stories_query(mut self, jql: impl Into<String>, max_results: u32) -> Self {
        self.stories_jql = jql.into();
        self.max_results = max_results.max(1);
        self
    }

    /// Verify the credentials by fetching the current user
    pub async fn test_connection(&self, creds: &SessionCredentials) -> Result<JiraUser, JiraError> {
        let data = self.get_json(creds, "/rest/api/3/myself", &[]).await?;
        serde_json::from_value(data)
            .map_err(|e| JiraError::InvalidResponse(format!("Failed to parse user: {}", e)))
    }

    /// List stories matching the configured JQL
    pub async fn get_stories(
        &self,
        creds: &SessionCredentials,
    ) -> Result<Vec<StorySummary>, JiraError> {
        let query = [
            ("jql", self.stories_jql.clone()),
            ("maxResults", self.max_results.to_string()),
            ("fields", SUMMARY_FIELDS.to_string()),
        ];
        let data = self
            .get_json(creds, "/rest/api/3/search/jql", &query)
            .await?;

        let issues = data["issues"].as_array().ok_or_else(|| {
            JiraError::InvalidResponse("Search response has no issues array".to_string())
        })?;

        Ok(issues.iter().filter_map(issue_to_summary).collect())
    }

    /// Fetch one story with its description and acceptance criteria
    pub async fn get_story(
        &self,
        creds: &SessionCredentials,
        key: &str,
    ) -> Result<StoryDetail, JiraError> {
        let path = format!("/rest/api/3/issue/{}", key);
        let query = [("expand", "renderedFields,names".to_string())];
        let data = self.get_json(creds, &path, &query).await?;

        issue_to_detail(&data, &creds.base_url)
            .ok_or_else(|| JiraError::InvalidResponse(format!("Issue {} has no key", key)))
    }

    async fn get_json(
        &self,
        creds: &SessionCredentials,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<serde_json::Value, JiraError> {
        let url = format!("{}{}", creds.base_url, path);
        log::debug!("[jira] GET {}", url);

        let response = self
            .client
            .get(&url)
            .header("Authorization", &creds.auth_header)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            log::warn!("[jira] GET {} failed ({}): {}", path, status, text);

            let message = extract_error_message(&text)
                .unwrap_or_else(|| format!("Request failed with status code {}", status.as_u16()));

            if status == reqwest::StatusCode::UNAUTHORIZED {
                return Err(JiraError::Unauthorized(message));
            }
            return Err(JiraError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| JiraError::InvalidResponse(format!("Failed to parse response: {}", e)))
    }
}
