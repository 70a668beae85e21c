use super::CompletionGateway;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LlmConfig;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;
use tracing::debug;

/// OpenAI-compatible chat completion client for the Groq API.
/// One outbound call per invocation, no retries; retries belong upstream.
pub struct GroqClient {
    client: reqwest::Client,
    config: LlmConfig,
}

impl GroqClient {
    pub fn new(config: LlmConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn api_key(&self) -> Result<&str> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| AppError::AuthError("Missing API key for Groq".to_string()))
    }

    fn completions_url(&self) -> String {
        if self.config.base_url.ends_with('/') {
            format!("{}chat/completions", self.config.base_url)
        } else {
            format!("{}/chat/completions", self.config.base_url)
        }
    }
}

#[async_trait]
impl CompletionGateway for GroqClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let api_key = self.api_key()?;

        let body = json!({
            "model": self.config.model,
            "messages": [
                {
                    "role": "system",
                    "content": system
                },
                {
                    "role": "user",
                    "content": user
                }
            ],
            "max_tokens": self.config.max_tokens,
            "temperature": self.config.temperature,
        });

        let response = self
            .client
            .post(self.completions_url())
            .bearer_auth(api_key)
            .json(&body)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::TransportError(format!(
                        "Request timed out after {} seconds",
                        self.config.request_timeout_secs
                    ))
                } else {
                    AppError::TransportError(format!("Request failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, &text));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::TransportError(format!("Failed to parse JSON: {}", e)))?;

        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .ok_or_else(|| {
                AppError::TransportError("Invalid response format: missing content".to_string())
            })?;

        debug!(chars = content.len(), "completion received");
        Ok(content)
    }
}

/// Map a non-success HTTP status to an error kind.
fn classify_status(status: reqwest::StatusCode, body: &str) -> AppError {
    match status.as_u16() {
        401 | 403 => AppError::AuthError(format!("API rejected credential ({})", status)),
        429 => AppError::RateLimited(format!("API throttled the request ({})", status)),
        _ => AppError::TransportError(format!("API error ({}): {}", status, body)),
    }
}
