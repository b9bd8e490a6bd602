// Mockaroo synthetic test data
//
// The browser UI calls Mockaroo directly so the key never reaches the
// server; this client backs the `testdata` subcommand.

use serde::Serialize;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_BASE_URL: &str = "https://api.mockaroo.com";
pub const DEFAULT_ROW_COUNT: u32 = 50;

/// One column in a Mockaroo schema
#[derive(Debug, Clone, Serialize)]
pub struct SchemaField {
    pub name: &'static str,
    #[serde(rename = "type")]
    pub field_type: &'static str,
}

/// Person rows used by the test data panel
pub fn default_schema() -> Vec<SchemaField> {
    vec![
        SchemaField { name: "id", field_type: "Row Number" },
        SchemaField { name: "firstname", field_type: "First Name" },
        SchemaField { name: "lastname", field_type: "Last Name" },
        SchemaField { name: "email", field_type: "Email Address" },
        SchemaField { name: "gender", field_type: "Gender" },
        SchemaField { name: "ssn", field_type: "SSN" },
    ]
}

#[derive(Debug, Error)]
pub enum TestdataError {
    #[error("Please enter your Mockaroo API key.")]
    MissingApiKey,

    #[error("Row count must be at least 1")]
    InvalidCount,

    #[error("Mockaroo request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{0}")]
    Api(String),

    #[error("Unexpected Mockaroo response: {0}")]
    InvalidResponse(String),

    #[error("Failed to write rows: {0}")]
    Io(#[from] std::io::Error),
}

/// Client for Mockaroo's generate endpoint
pub struct MockarooClient {
    client: reqwest::Client,
    base_url: String,
}

impl MockarooClient {
    pub fn new(timeout: Duration) -> Result<Self, TestdataError> {
        Self::with_base_url(DEFAULT_BASE_URL, timeout)
    }

    pub fn with_base_url(base_url: &str, timeout: Duration) -> Result<Self, TestdataError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Generate `count` rows with the default schema.
    ///
    /// A blank key is rejected before any request is made.
    pub async fn generate(&self, api_key: &str, count: u32) -> Result<Vec<Value>, TestdataError> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(TestdataError::MissingApiKey);
        }
        if count == 0 {
            return Err(TestdataError::InvalidCount);
        }

        let url = format!("{}/api/generate.json", self.base_url);
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key.to_string()), ("count", count.to_string())])
            .json(&default_schema())
            .send()
            .await?;

        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            let message = if text.trim().is_empty() {
                "Failed to fetch testdata".to_string()
            } else {
                text.trim().to_string()
            };
            return Err(TestdataError::Api(message));
        }

        let data: Value = response.json().await?;
        // Mockaroo returns a bare object when count is 1
        match data {
            Value::Array(rows) => Ok(rows),
            Value::Object(_) => Ok(vec![data]),
            other => Err(TestdataError::InvalidResponse(format!(
                "expected rows, got {}",
                other
            ))),
        }
    }
}

/// Pretty-print rows to a file, or to stdout when no path is given
pub fn write_rows(rows: &[Value], output: Option<&Path>) -> Result<(), TestdataError> {
    let json = serde_json::to_string_pretty(rows)
        .map_err(|e| TestdataError::InvalidResponse(e.to_string()))?;
    match output {
        Some(path) => {
            std::fs::write(path, json + "\n")?;
            log::info!("Wrote {} rows to {}", rows.len(), path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
