// src/triage/facts.rs

//! Fact extractor: turns the latest exchange into structured clinical facts
//! so later planner passes never re-ask what is already known.
//!
//! Only the latest user utterance and the question it answers go into the
//! prompt; the accumulated fact map provides the dedup context. Failure
//! policy is fail-silent: extraction problems never surface to the user.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::llm::ModelClient;
use crate::triage::state::{normalize_fact_key, Role, TriageState};

const EXTRACTOR_SYSTEM: &str = "You are a clinical fact extractor. Output JSON only.";

pub struct FactExtractor {
    llm: Arc<dyn ModelClient>,
}

impl FactExtractor {
    pub fn new(llm: Arc<dyn ModelClient>) -> Self {
        Self { llm }
    }

    /// New or updated facts from the latest exchange, keys normalized.
    /// No-op unless the latest turn is a user turn; empty on any failure.
    pub async fn extract(&self, state: &TriageState) -> BTreeMap<String, String> {
        let is_user_turn = state
            .messages
            .last()
            .map(|m| m.role == Role::User)
            .unwrap_or(false);
        if !is_user_turn {
            return BTreeMap::new();
        }

        match self.extract_inner(state).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!("Fact extraction failed ({}); continuing without updates", e);
                BTreeMap::new()
            }
        }
    }

    async fn extract_inner(&self, state: &TriageState) -> anyhow::Result<BTreeMap<String, String>> {
        let user_answer = state.last_user_message().unwrap_or_default();
        let assistant_question = state
            .last_assistant_message()
            .unwrap_or("None (start of conversation)");

        let prompt = format!(
            r#"TASK:
Analyze the user's latest response in the context of the previous question.
Extract precise medical facts and return ONLY the new or updated ones.

CONTEXT:
QUESTION ASKED: "{question}"
USER ANSWERED: "{answer}"

EXISTING FACTS: {facts}

INSTRUCTIONS:
1. Extract new facts based on the USER'S ANSWER to the QUESTION.
2. IMPLIED CONTEXT: if the user says "No", look at what was asked.
   - Asked: "Do you have rash?" -> User: "No" -> fact: "rash": "Denied"
3. COMPOUND QUESTIONS: split combined symptoms into separate facts.
   - Asked: "Do you have rash OR chills?" -> User: "No" -> facts: "rash": "Denied", "chills": "Denied"
   - User: "I have rash but no chills" -> facts: "rash": "Present", "chills": "Denied"
4. Normalize keys to snake_case (e.g. "Neck Stiffness" -> "neck_stiffness").
5. Values are short strings ("Present", "Denied", "2 days", "High", ...).

OUTPUT JSON ONLY, for example:
{{
    "travel_history": "None",
    "fever_severity": "High",
    "rash": "Denied"
}}"#,
            question = assistant_question,
            answer = user_answer,
            facts = state.facts_json(),
        );

        let raw = self.llm.invoke_json(EXTRACTOR_SYSTEM, &prompt).await?;

        let Value::Object(map) = raw else {
            anyhow::bail!("extractor returned non-object JSON");
        };

        let mut facts = BTreeMap::new();
        for (key, value) in map {
            let key = normalize_fact_key(&key);
            if key.is_empty() {
                continue;
            }
            let value = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            facts.insert(key, value);
        }

        debug!("Extracted {} fact(s)", facts.len());
        Ok(facts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use serde_json::json;

    struct FixedModel(Value);

    #[async_trait]
    impl ModelClient for FixedModel {
        async fn invoke_json(&self, _system: &str, _prompt: &str) -> Result<Value> {
            Ok(self.0.clone())
        }
    }

    struct FailingModel;

    #[async_trait]
    impl ModelClient for FailingModel {
        async fn invoke_json(&self, _system: &str, _prompt: &str) -> Result<Value> {
            anyhow::bail!("model unavailable")
        }
    }

    fn answered_state() -> TriageState {
        let mut state = TriageState::new();
        state.push_user("I have a fever");
        state.push_assistant("Do you have rash or chills?");
        state.push_user("No");
        state
    }

    #[tokio::test]
    async fn extracts_and_normalizes_keys() {
        let extractor = FactExtractor::new(Arc::new(FixedModel(json!({
            "Rash": "Denied",
            "Chills": "Denied"
        }))));
        let facts = extractor.extract(&answered_state()).await;
        assert_eq!(facts.get("rash").map(String::as_str), Some("Denied"));
        assert_eq!(facts.get("chills").map(String::as_str), Some("Denied"));
    }

    #[tokio::test]
    async fn noop_when_latest_turn_is_assistant() {
        let mut state = answered_state();
        state.push_assistant("How long has the fever lasted?");
        let extractor = FactExtractor::new(Arc::new(FixedModel(json!({"x": "y"}))));
        assert!(extractor.extract(&state).await.is_empty());
    }

    #[tokio::test]
    async fn fails_silent() {
        let extractor = FactExtractor::new(Arc::new(FailingModel));
        assert!(extractor.extract(&answered_state()).await.is_empty());
    }
}
