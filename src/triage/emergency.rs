// src/triage/emergency.rs

//! Emergency scan gate. Runs first every turn.
//!
//! The primary evidence is the pairing of the last assistant question and the
//! latest user reply: an affirmative answer to a danger-sign question must
//! trigger immediately, with no re-confirmation round. Failure policy is
//! fail-open: any model, parse, or rule problem yields `Routine` so the
//! conversation keeps moving.

use serde_json::Value;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, warn};

use crate::llm::ModelClient;
use crate::triage::state::{Assessment, ClinicianSummary, SeverityLevel, TriageState};

/// Fixed patient-facing escalation message. Intentionally generic: the
/// suspected diagnosis stays in the clinician payload.
pub const ESCALATION_MESSAGE: &str = "\u{1F6A8} EMERGENCY DETECTED\n\n\
Based on your symptoms, we strongly recommend seeing a doctor immediately. \
We have flagged this as a high priority.\n\n\
ACTION: Immediate Consultation Recommended.";

const SCAN_SYSTEM: &str = "You are a strict JSON output bot.";

/// How many rules from the configured file are summarized into the prompt.
const RULES_IN_PROMPT: usize = 5;

pub enum ScanOutcome {
    Emergency {
        reason: String,
        payload: ClinicianSummary,
    },
    Routine,
}

pub struct EmergencyScanGate {
    llm: Arc<dyn ModelClient>,
    rules_context: String,
    history_window: usize,
}

impl EmergencyScanGate {
    pub fn new(llm: Arc<dyn ModelClient>, rules_path: Option<&str>, history_window: usize) -> Self {
        Self {
            llm,
            rules_context: load_rules_context(rules_path),
            history_window,
        }
    }

    /// Scan the latest exchange. Never errors: failures log and fall through
    /// to `Routine`.
    pub async fn scan(&self, state: &TriageState) -> ScanOutcome {
        let Some(last_user) = state.last_user_message() else {
            return ScanOutcome::Routine;
        };

        match self.scan_inner(state, last_user).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!("Emergency scan failed ({}); failing open to routine flow", e);
                ScanOutcome::Routine
            }
        }
    }

    async fn scan_inner(&self, state: &TriageState, last_user: &str) -> anyhow::Result<ScanOutcome> {
        let last_question = state.last_assistant_message().unwrap_or("(none)");
        let history = state.history_window(self.history_window);

        let prompt = format!(
            r#"You are an EMERGENCY TRIAGE NURSE.
Your job: scan the conversation for life-threatening emergencies.

RULES (JSON):
{rules}

CONVERSATION CONTEXT:
LAST QUESTION ASKED: "{question}"
USER ANSWER: "{answer}"

FULL HISTORY:
{history}

CRITICAL CHECKS:
1. MENINGITIS: fever + neck stiffness = EMERGENCY.
2. HEART ATTACK: chest pain + sweating or radiating pain = EMERGENCY.
3. STROKE: slurred speech, one-sided weakness = EMERGENCY.

TASK:
- Analyze the USER ANSWER in the context of LAST QUESTION ASKED.
- If the last question was "Do you have neck stiffness?" and the user says "Yes", trigger EMERGENCY immediately. Do not wait for further confirmation.

OUTPUT JSON ONLY:
{{
    "is_emergency": true/false,
    "reason": "Explain why (e.g. 'Fever + neck stiffness suggests meningitis')"
}}"#,
            rules = self.rules_context,
            question = last_question,
            answer = last_user,
            history = history,
        );

        let result = self.llm.invoke_json(SCAN_SYSTEM, &prompt).await?;

        if !result["is_emergency"].as_bool().unwrap_or(false) {
            return Ok(ScanOutcome::Routine);
        }

        let reason = result["reason"]
            .as_str()
            .unwrap_or("Life-threatening pattern detected")
            .to_string();
        error!("EMERGENCY detected: {}", reason);

        let payload = match self.build_escalation_payload(state, &reason).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Escalation payload generation failed ({}); using fallback", e);
                fallback_payload(&reason)
            }
        };

        Ok(ScanOutcome::Emergency { reason, payload })
    }

    /// Second model call: a structured note for the clinician dashboard.
    async fn build_escalation_payload(
        &self,
        state: &TriageState,
        reason: &str,
    ) -> anyhow::Result<ClinicianSummary> {
        let history = state.history_window(self.history_window);

        let prompt = format!(
            r#"You are an emergency medical scribe.
The patient has a confirmed EMERGENCY: "{reason}".

TASK: generate a structured JSON note for the clinician's emergency queue.

CONTEXT:
{history}

OUTPUT JSON (strictly this structure):
{{
    "trigger_reason": "{reason}",
    "history": {{ "symptoms": ["(extract from context)"], "duration": "Acute", "negatives": [] }},
    "vitals_reported": {{ "bp": null }},
    "assessment": {{
        "likely_diagnosis": "...",
        "severity_level": "CRITICAL",
        "severity_score": 95
    }},
    "red_flags": ["Life-threatening condition detected"],
    "plan": {{ "immediate_actions": ["ER admission"], "referral_needed": true }}
}}"#,
        );

        let raw = self.llm.invoke_json(SCAN_SYSTEM, &prompt).await?;
        let mut payload: ClinicianSummary = serde_json::from_value(raw)?;
        payload.assessment.severity_score = payload.assessment.severity_score.min(100);
        if payload.trigger_reason.is_empty() {
            payload.trigger_reason = reason.to_string();
        }
        Ok(payload)
    }
}

/// Static payload used when the scribe call itself fails. The escalation must
/// still reach the clinician queue.
fn fallback_payload(reason: &str) -> ClinicianSummary {
    ClinicianSummary {
        trigger_reason: reason.to_string(),
        assessment: Assessment {
            likely_diagnosis: "Emergency condition (triage)".to_string(),
            severity_level: SeverityLevel::Critical,
            severity_score: 99,
        },
        red_flags: vec!["Escalation note generation failed - review conversation".to_string()],
        ..Default::default()
    }
}

/// Summarize the first few configured emergency rules for the prompt.
/// A missing or malformed file is not an error.
fn load_rules_context(path: Option<&str>) -> String {
    let Some(path) = path else {
        return "(no custom rules configured)".to_string();
    };
    let path = Path::new(path);
    if !path.exists() {
        warn!("Emergency rules file not found: {}", path.display());
        return "(no custom rules configured)".to_string();
    }

    match std::fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|text| serde_json::from_str::<Value>(&text).map_err(Into::into))
    {
        Ok(Value::Array(rules)) => {
            let head: Vec<&Value> = rules.iter().take(RULES_IN_PROMPT).collect();
            serde_json::to_string(&head).unwrap_or_else(|_| "[]".to_string())
        }
        Ok(other) => other.to_string(),
        Err(e) => {
            warn!("Failed to load emergency rules ({}); continuing without", e);
            "(no custom rules configured)".to_string()
        }
    }
}
