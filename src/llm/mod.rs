// src/llm/mod.rs

//! Model inference capability.
//!
//! The triage pipeline only ever sees `ModelClient`: a prompt goes in,
//! structured JSON comes out. The production adapter lives in `groq`; tests
//! inject scripted implementations.

pub mod groq;

pub use groq::GroqClient;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

/// Capability for calling a language model and getting structured JSON back.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Run one inference call and parse the reply as JSON.
    ///
    /// Implementations must tolerate markdown-fenced output; anything that
    /// still fails to parse is an `Err` for the caller's failure policy to
    /// absorb.
    async fn invoke_json(&self, system_prompt: &str, user_prompt: &str) -> Result<Value>;
}

/// Parse model output as JSON, stripping markdown code fences first.
pub fn extract_json(raw: &str) -> Result<Value> {
    let json_str = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    serde_json::from_str(json_str)
        .map_err(|e| anyhow!("model returned non-JSON output: {} ({})", e, truncate(raw, 120)))
}

fn truncate(s: &str, chars: usize) -> String {
    if s.len() <= chars {
        s.to_string()
    } else {
        s.chars().take(chars).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_plain() {
        let value = extract_json(r#"{"is_emergency": false}"#).unwrap();
        assert_eq!(value["is_emergency"], false);
    }

    #[test]
    fn extract_json_fenced() {
        let raw = "```json\n{\"reason\": \"ok\"}\n```";
        let value = extract_json(raw).unwrap();
        assert_eq!(value["reason"], "ok");
    }

    #[test]
    fn extract_json_rejects_prose() {
        assert!(extract_json("I am not able to answer that.").is_err());
    }
}
