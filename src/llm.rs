//! Chat-completion collaborator.
//!
//! The chat flows only need "turns in, text out", expressed by
//! the [`Completer`] trait. Two implementations ship:
//!
//! - **[`DisabledCompleter`]**: always fails; used when `[llm].provider = "disabled"`.
//! - **[`OpenAiCompleter`]**: calls an OpenAI-compatible `/chat/completions`
//!   endpoint with retry and backoff.
//!
//! # Retry Strategy
//!
//! - HTTP 429 (rate limited) and 5xx (server error) → retry
//! - HTTP 4xx (client error, not 429) → fail immediately
//! - Network errors → retry
//! - Backoff: 1s, 2s, 4s, 8s, 16s, 32s (capped at 2^5)

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

use docviz_core::models::{Role, Turn};

use crate::config::LlmConfig;

/// Turns a conversation into the next assistant message.
#[async_trait]
pub trait Completer: Send + Sync {
    /// Model identifier, for logs and the health endpoint.
    fn model_name(&self) -> &str;

    async fn complete(&self, turns: &[Turn]) -> Result<String>;
}

/// Completer used when no LLM is configured. Every call fails.
pub struct DisabledCompleter;

#[async_trait]
impl Completer for DisabledCompleter {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _turns: &[Turn]) -> Result<String> {
        bail!("LLM provider is disabled; set [llm].provider in the config to enable answers")
    }
}

/// Completer backed by an OpenAI-compatible chat completions API.
pub struct OpenAiCompleter {
    client: reqwest::Client,
    model: String,
    endpoint: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAiCompleter {
    /// Build a completer from `[llm]`.
    ///
    /// # Errors
    ///
    /// Fails when `model` is missing or the API key variable is unset.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let model = config
            .model
            .clone()
            .ok_or_else(|| anyhow!("llm.model required for the openai provider"))?;
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            model,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

fn role_name(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    }
}

#[async_trait]
impl Completer for OpenAiCompleter {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, turns: &[Turn]) -> Result<String> {
        let messages: Vec<ChatMessage<'_>> = turns
            .iter()
            .map(|t| ChatMessage {
                role: role_name(t.role),
                content: &t.content,
            })
            .collect();
        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let mut last_err = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                let delay = backoff_delay(attempt);
                debug!(attempt, ?delay, "retrying chat completion");
                tokio::time::sleep(delay).await;
            }

            let resp = self
                .client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send()
                .await;

            match resp {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        let json: serde_json::Value = response.json().await?;
                        return parse_chat_response(&json);
                    }

                    let body_text = response.text().await.unwrap_or_default();
                    if status.as_u16() == 429 || status.is_server_error() {
                        warn!(%status, attempt, "chat completion failed, will retry");
                        last_err = Some(anyhow!("LLM API error {}: {}", status, body_text));
                        continue;
                    }

                    bail!("LLM API error {}: {}", status, body_text);
                }
                Err(e) => {
                    warn!(error = %e, attempt, "chat completion request failed");
                    last_err = Some(e.into());
                    continue;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| anyhow!("chat completion failed after retries")))
    }
}

/// 1s, 2s, 4s, ... capped at 32s.
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Pull `choices[0].message.content` out of a chat completions response.
fn parse_chat_response(json: &serde_json::Value) -> Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("Malformed chat completion response: missing message content"))
}

/// Ask the model, turning a failure into reply text.
pub async fn complete_or_explain(completer: &dyn Completer, turns: &[Turn]) -> String {
    match completer.complete(turns).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, model = completer.model_name(), "completion failed");
            format!("Sorry, I could not generate an answer: {}", e)
        }
    }
}

/// Build the completer selected by `[llm].provider`.
pub fn create_completer(config: &LlmConfig) -> Result<Arc<dyn Completer>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledCompleter)),
        "openai" => Ok(Arc::new(OpenAiCompleter::new(config)?)),
        other => bail!("Unknown llm provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "  Answer.  "}}]
        });
        assert_eq!(parse_chat_response(&json).unwrap(), "Answer.");
    }

    #[test]
    fn test_parse_chat_response_malformed() {
        let json = serde_json::json!({"choices": []});
        assert!(parse_chat_response(&json).is_err());
    }

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(10), Duration::from_secs(32));
    }

    #[tokio::test]
    async fn test_disabled_completer_fails() {
        let err = DisabledCompleter
            .complete(&[Turn::user("hi")])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("disabled"));
    }

    #[test]
    fn test_create_completer() {
        let config = LlmConfig::default();
        assert_eq!(create_completer(&config).unwrap().model_name(), "disabled");

        let mut bad = LlmConfig::default();
        bad.provider = "other".to_string();
        assert!(create_completer(&bad).is_err());
    }

    #[test]
    fn test_openai_requires_api_key() {
        let config = LlmConfig {
            provider: "openai".to_string(),
            model: Some("gpt-4o-mini".to_string()),
            api_key_env: "DOCVIZ_TEST_KEY_THAT_IS_NOT_SET".to_string(),
            ..LlmConfig::default()
        };
        let err = OpenAiCompleter::new(&config).err().unwrap();
        assert!(err.to_string().contains("DOCVIZ_TEST_KEY_THAT_IS_NOT_SET"));
    }
}
