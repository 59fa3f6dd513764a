// src/triage/planner.rs

//! Diagnostic planner: owns the differential diagnosis and the safety
//! checklist.
//!
//! Two modes keyed on the checklist:
//! - bootstrap: empty checklist and no diagnosis yet; seed the differential
//!   and 2-3 single-topic questions, coarse containment filter against the
//!   conversation so far.
//! - incremental: the front item was just asked; pop it, ask the model for
//!   bounded additions, then enforce similarity dedup in code.
//!
//! An incremental model/parse failure must not lose the remaining checklist:
//! the popped item stays popped, everything else is preserved and the
//! decision is left as `Pending`.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ArogyaConfig;
use crate::llm::ModelClient;
use crate::triage::dedup::QuestionFilter;
use crate::triage::state::{TriageDecision, TriageState};

const PLANNER_SYSTEM: &str =
    "You are an expert diagnostic assistant conducting a focused medical assessment. Output JSON only.";

pub struct DiagnosticPlanner {
    llm: Arc<dyn ModelClient>,
    filter: QuestionFilter,
    history_window: usize,
    max_new_questions: usize,
}

impl DiagnosticPlanner {
    pub fn new(llm: Arc<dyn ModelClient>, config: &ArogyaConfig) -> Self {
        Self {
            llm,
            filter: QuestionFilter::new(config.dedup_threshold, config.min_question_chars),
            history_window: config.planner_history_window,
            max_new_questions: config.max_new_questions,
        }
    }

    pub async fn plan(&self, state: &mut TriageState) {
        if state.safety_checklist.is_empty() && state.differential_diagnosis.is_empty() {
            self.bootstrap(state).await;
        } else if state.safety_checklist.is_empty() {
            // Diagnosis exists but nothing left to ask; the strategist will
            // close the assessment.
            state.triage_decision = TriageDecision::Complete;
        } else {
            self.incremental(state).await;
        }
    }

    /// First planning pass: seed diagnosis and checklist.
    async fn bootstrap(&self, state: &mut TriageState) {
        let history = state.history_window(self.history_window);

        let prompt = format!(
            r#"PATIENT HISTORY:
{history}

KNOWN CLINICAL FACTS (DO NOT ASK ABOUT THESE):
{facts}

MEDICAL KNOWLEDGE (guidelines):
{knowledge}

TASK:
Based on the patient's specific symptom, create a focused assessment plan.
1. Identify potential conditions.
2. Create 2-3 targeted, SINGLE-TOPIC questions.
3. Prefer questions that rule out serious conditions.

CRITICAL RULES:
- Do NOT ask about anything already mentioned in the history or facts.
- One symptom per question.
- If part of a compound question is already known, ask only the unknown part.

OUTPUT JSON:
{{
    "differential_diagnosis": ["Viral fever", "Malaria"],
    "new_questions": ["How many days have you had the fever?", "Any neck stiffness?"]
}}"#,
            history = history,
            facts = state.facts_json(),
            knowledge = state.rendered_protocols(),
        );

        let parsed = match self.llm.invoke_json(PLANNER_SYSTEM, &prompt).await {
            Ok(v) => v,
            Err(e) => {
                warn!("Bootstrap planning failed ({}); leaving plan empty", e);
                return;
            }
        };

        // Coarse containment filter at bootstrap: drop candidates whose text
        // already appears in the conversation.
        let history_lower = history.to_lowercase();
        let checklist: Vec<String> = string_list(&parsed["new_questions"])
            .into_iter()
            .filter(|q| !history_lower.contains(&q.to_lowercase()))
            .collect();

        debug!(
            "Bootstrap plan: {} hypotheses, {} questions",
            string_list(&parsed["differential_diagnosis"]).len(),
            checklist.len()
        );

        state.differential_diagnosis = string_list(&parsed["differential_diagnosis"]);
        state.safety_checklist = checklist;
        state.triage_decision = TriageDecision::Pending;
    }

    /// Follow-up pass: the front checklist item was just answered.
    async fn incremental(&self, state: &mut TriageState) {
        let just_asked = state.safety_checklist.remove(0);
        let remaining = state.safety_checklist.clone();

        let prompt = format!(
            r#"PATIENT HISTORY (read carefully):
{history}

KNOWN CLINICAL FACTS (DO NOT ASK ABOUT THESE):
{facts}

MEDICAL KNOWLEDGE:
{knowledge}

PENDING CHECKLIST: {pending:?}
LAST QUESTION ASKED: "{just_asked}"

TASK:
The user answered the last question.
1. Review the history above carefully.
2. Do you need to add CRITICAL questions to narrow the diagnosis? (max {max_new}).
3. Do NOT repeat any question already asked in the history or answered in the facts.
4. If part of a compound question is already known, ask only the unknown part.
5. Set "stop_asking" true when enough is known for an assessment.

OUTPUT JSON:
{{
    "differential_diagnosis": ["Viral fever", "Malaria"],
    "new_questions_to_add": ["Any convulsions?"],
    "stop_asking": false
}}"#,
            history = state.history_window(self.history_window),
            facts = state.facts_json(),
            knowledge = state.rendered_protocols(),
            pending = remaining,
            just_asked = just_asked,
            max_new = self.max_new_questions,
        );

        let parsed = match self.llm.invoke_json(PLANNER_SYSTEM, &prompt).await {
            Ok(v) => v,
            Err(e) => {
                // Local recovery: keep the remaining checklist, decision
                // stays as it was.
                warn!("Incremental planning failed ({}); keeping checklist as-is", e);
                return;
            }
        };

        let mut candidates = string_list(&parsed["new_questions_to_add"]);
        candidates.truncate(self.max_new_questions);

        // Everything ever asked is off-limits: the investigated log plus all
        // prior assistant turns.
        let mut forbidden: Vec<String> = state.investigated_symptoms.clone();
        forbidden.extend(state.assistant_turns().into_iter().map(|s| s.to_string()));

        let accepted = self.filter.filter(candidates, &forbidden, &remaining);
        debug!(
            "Incremental plan: {} remaining, {} accepted",
            remaining.len(),
            accepted.len()
        );

        state.safety_checklist.extend(accepted);
        state.differential_diagnosis = string_list(&parsed["differential_diagnosis"]);

        let stop_asking = parsed["stop_asking"].as_bool().unwrap_or(false);
        if state.safety_checklist.is_empty() || stop_asking {
            state.safety_checklist.clear();
            state.triage_decision = TriageDecision::Complete;
        } else {
            state.triage_decision = TriageDecision::Pending;
        }
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default()
}
