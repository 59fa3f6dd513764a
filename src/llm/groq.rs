// src/llm/groq.rs
// OpenAI-compatible chat-completions adapter (Groq). JSON mode, temperature 0.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use super::{extract_json, ModelClient};
use crate::config::ArogyaConfig;

#[derive(Clone)]
pub struct GroqClient {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    model: String,
}

impl GroqClient {
    pub fn new(config: &ArogyaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key: config.groq_api_key.clone(),
            api_base: config.groq_api_base.clone(),
            model: config.groq_model.clone(),
        })
    }
}

#[async_trait]
impl ModelClient for GroqClient {
    async fn invoke_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Value> {
        let url = format!(
            "{}/chat/completions",
            self.api_base.trim_end_matches('/')
        );

        let payload = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system_prompt},
                {"role": "user", "content": user_prompt}
            ],
            "response_format": {"type": "json_object"},
            "temperature": 0
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&payload)
            .send()
            .await
            .context("inference request failed")?
            .error_for_status()
            .context("inference endpoint returned an error status")?;

        let body: Value = response.json().await?;

        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("no message content in completion response"))?;

        extract_json(content)
    }
}
