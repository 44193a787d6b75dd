// =============================================================================
// Ollama Client — local language model over the /api/chat endpoint
// =============================================================================

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tracing::debug;

use crate::providers::{CompletionClient, ProviderError};
use crate::runtime_config::LlmParams;

#[derive(Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

pub struct OllamaClient {
    client: reqwest::Client,
    params: LlmParams,
}

impl OllamaClient {
    pub fn new(params: LlmParams) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(params.timeout_secs))
            .build()
            .context("failed to build reqwest client for OllamaClient")?;
        Ok(Self { client, params })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/chat", self.params.base_url.trim_end_matches('/'))
    }

    fn request_body(&self, system: &str, prompt: &str) -> serde_json::Value {
        json!({
            "model": self.params.model,
            "stream": false,
            "format": "json",
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt},
            ],
            "options": {
                "temperature": self.params.temperature,
                "num_predict": self.params.max_tokens,
            },
        })
    }
}

#[async_trait]
impl CompletionClient for OllamaClient {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, ProviderError> {
        let url = self.endpoint();
        debug!(model = %self.params.model, prompt_chars = prompt.len(), "LLM request");

        let resp = self
            .client
            .post(&url)
            .json(&self.request_body(system, prompt))
            .send()
            .await
            .map_err(|e| ProviderError::Upstream(format!("POST {url}: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ProviderError::Upstream(format!("{url} returned {status}: {body}")));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| ProviderError::Malformed(format!("chat response: {e}")))?;
        Ok(parsed.message.content.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_carries_model_and_options() {
        let params = LlmParams {
            base_url: "http://localhost:11434/".into(),
            ..LlmParams::default()
        };
        let client = OllamaClient::new(params).unwrap();
        assert_eq!(client.endpoint(), "http://localhost:11434/api/chat");

        let body = client.request_body("sys", "hello");
        assert_eq!(body["model"], "llama3.1:8b");
        assert_eq!(body["stream"], false);
        assert_eq!(body["format"], "json");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hello");
        assert_eq!(body["options"]["num_predict"], 2048);
    }

    #[test]
    fn chat_response_shape() {
        let r: ChatResponse =
            serde_json::from_str(r#"{"model":"m","message":{"role":"assistant","content":" {} "}}"#)
                .unwrap();
        assert_eq!(r.message.content.trim(), "{}");
    }
}
