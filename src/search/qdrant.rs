// src/search/qdrant.rs
// Qdrant vector search over the protocol index, embeddings via Gemini.
// Degrades gracefully: missing Qdrant or Gemini config disables retrieval
// instead of failing startup.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use qdrant_client::qdrant::SearchPointsBuilder;
use qdrant_client::Qdrant;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::{ProtocolFragment, ProtocolSearch};

const EMBEDDING_DIM: u64 = 768;
const EMBED_TEXT_MAX_BYTES: usize = 8000;
const HTTP_TIMEOUT_SECS: u64 = 20;

pub struct QdrantProtocolSearch {
    qdrant: Option<Qdrant>,
    collection: String,
    gemini_key: Option<String>,
    http_client: reqwest::Client,
}

impl QdrantProtocolSearch {
    pub fn new(qdrant_url: Option<&str>, collection: &str, gemini_key: Option<String>) -> Self {
        let qdrant = if let Some(url) = qdrant_url {
            match Qdrant::from_url(url).skip_compatibility_check().build() {
                Ok(client) => {
                    info!("Connected to Qdrant at {}", url);
                    Some(client)
                }
                Err(e) => {
                    warn!("Failed to connect to Qdrant: {} - retrieval disabled", e);
                    None
                }
            }
        } else {
            debug!("No Qdrant URL configured - retrieval disabled");
            None
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            qdrant,
            collection: collection.to_string(),
            gemini_key,
            http_client,
        }
    }

    pub fn is_available(&self) -> bool {
        self.qdrant.is_some() && self.gemini_key.is_some()
    }

    /// Get an embedding for text using Gemini.
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let api_key = self
            .gemini_key
            .as_ref()
            .ok_or_else(|| anyhow!("Gemini API key not configured"))?;

        let text = truncate_on_char_boundary(text, EMBED_TEXT_MAX_BYTES);

        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent?key={}",
            api_key
        );

        let body = serde_json::json!({
            "model": "models/gemini-embedding-001",
            "content": {
                "parts": [{ "text": text }]
            },
            "outputDimensionality": EMBEDDING_DIM
        });

        let response = self
            .http_client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let json: serde_json::Value = response.json().await?;

        if let Some(error) = json.get("error") {
            anyhow::bail!("Gemini API error: {}", error);
        }

        let embedding = json["embedding"]["values"]
            .as_array()
            .ok_or_else(|| anyhow!("Invalid embedding response"))?
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect();

        Ok(embedding)
    }
}

/// Cap the embedding input at `max_bytes` without splitting a UTF-8
/// character. Patient text is often not ASCII, so a fixed byte offset can
/// land mid-character.
fn truncate_on_char_boundary(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    &text[..end]
}

#[async_trait]
impl ProtocolSearch for QdrantProtocolSearch {
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ProtocolFragment>> {
        let Some(qdrant) = self.qdrant.as_ref() else {
            debug!("Retrieval skipped: Qdrant not available");
            return Ok(vec![]);
        };
        if self.gemini_key.is_none() {
            debug!("Retrieval skipped: no embedding key");
            return Ok(vec![]);
        }

        let embedding = self.embed(text).await?;

        let search =
            SearchPointsBuilder::new(&self.collection, embedding, k as u64).with_payload(true);
        let results = qdrant.search_points(search).await?;

        let fragments: Vec<ProtocolFragment> = results
            .result
            .into_iter()
            .filter_map(|point| {
                let text = point.payload.get("content")?.as_str()?.to_string();
                let protocol = point
                    .payload
                    .get("protocol")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "UNKNOWN".to_string());
                let section = point
                    .payload
                    .get("section")
                    .and_then(|v| v.as_str())
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "general".to_string());
                Some(ProtocolFragment {
                    text,
                    protocol,
                    section,
                })
            })
            .collect();

        debug!("Retrieved {} protocol fragments", fragments.len());
        Ok(fragments)
    }
}
