use super::LlmClient;
use crate::model::LlmResponse;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// LLM calls are the long pole of batch generation; anything slower
/// than this is treated as failed rather than held open.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Chat-completions client for OpenRouter (or any OpenAI-compatible
/// endpoint reachable at `base_url`).
pub struct OpenRouterClient {
    pub model: String,
    pub api_key: String,
    pub temperature: f64,
    pub base_url: String,
    pub client: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(model: String, api_key: String, temperature: f64, base_url: String) -> Self {
        Self {
            model,
            api_key,
            temperature,
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl LlmClient for OpenRouterClient {
    async fn complete(&self, prompt: &str) -> anyhow::Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "temperature": self.temperature,
            "response_format": { "type": "json_object" },
        });

        let resp = self
            .client
            .post(&url)
            .timeout(REQUEST_TIMEOUT)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let error_text = resp.text().await.unwrap_or_default();
            anyhow::bail!("OpenRouter chat API error ({}): {}", status, error_text);
        }

        let json: serde_json::Value = resp.json().await?;

        let text = json
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or_else(|| anyhow::anyhow!("OpenRouter response missing message content"))?
            .to_string();

        Ok(LlmResponse {
            text,
            provider: "openrouter".to_string(),
            model: self.model.clone(),
            meta: json.get("usage").cloned().unwrap_or_else(|| json!({})),
        })
    }

    fn provider_name(&self) -> &'static str {
        "openrouter"
    }
}
