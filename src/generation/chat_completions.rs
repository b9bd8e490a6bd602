use super::parser::parse_cases;
use super::prompt::{build_user_prompt, SYSTEM_PROMPT};
use super::{
    GenerateRequest, GenerateResponse, GenerationConfig, GenerationError, GenerationProvider,
};
use async_trait::async_trait;
use serde_json::json;

/// Provider for OpenAI-compatible `/chat/completions` endpoints
pub struct ChatCompletionsProvider {
    client: reqwest::Client,
    config: GenerationConfig,
}

impl ChatCompletionsProvider {
    pub fn new(config: GenerationConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GenerationError::Request(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn api_key(&self) -> Result<&str, GenerationError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                GenerationError::NotConfigured("set GENERATION_API_KEY to enable it".to_string())
            })
    }

    fn endpoint(&self) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}/chat/completions", base)
    }
}

#[async_trait]
impl GenerationProvider for ChatCompletionsProvider {
    fn name(&self) -> &str {
        "chat-completions"
    }

    async fn generate(
        &self,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, GenerationError> {
        let api_key = self.api_key()?;

        let body = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": SYSTEM_PROMPT
                },
                {
                    "role": "user",
                    "content": build_user_prompt(request)
                }
            ],
            "temperature": 0.2,
            "response_format": { "type": "json_object" },
        });

        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GenerationError::Request(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            log::warn!("[generate] Provider returned {}: {}", status, text);

            let message = serde_json::from_str::<serde_json::Value>(&text)
                .ok()
                .and_then(|v| v["error"]["message"].as_str().map(|s| s.to_string()))
                .unwrap_or_else(|| {
                    if text.trim().is_empty() {
                        status.to_string()
                    } else {
                        text.trim().chars().take(300).collect()
                    }
                });
            return Err(GenerationError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| GenerationError::Request(format!("Failed to parse JSON: {}", e)))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                GenerationError::InvalidOutput("response has no message content".to_string())
            })?;

        let cases = parse_cases(content)?;

        Ok(GenerateResponse {
            cases,
            model: json["model"]
                .as_str()
                .unwrap_or(&self.config.model)
                .to_string(),
            prompt_tokens: token_count(&json["usage"]["prompt_tokens"]),
            completion_tokens: token_count(&json["usage"]["completion_tokens"]),
        })
    }
}

/// Usage count, saturating at `u32::MAX`; absent or non-numeric is 0
fn token_count(value: &serde_json::Value) -> u32 {
    value
        .as_u64()
        .map(|n| u32::try_from(n).unwrap_or(u32::MAX))
        .unwrap_or(0)
}
