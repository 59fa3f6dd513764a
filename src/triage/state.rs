// src/triage/state.rs

//! The session state passed between pipeline components.
//!
//! Merge semantics per field:
//! - `messages`, `investigated_symptoms`: append-only, never reordered.
//! - `investigated_facts`: merge-only map, keys normalized to snake_case.
//! - `differential_diagnosis`: replaced wholesale each planner run.
//! - `safety_checklist`: FIFO. The strategist asks the front item in place;
//!   the planner pops it once answered and appends new questions to the back.
//! - `retrieved_protocols`: transient, valid for the current turn only.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::search::ProtocolFragment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Coarse session outcome. Monotone within a turn: once `Emergency` or
/// `Complete` is set, no further planner/strategist steps run that turn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TriageDecision {
    #[default]
    Pending,
    Emergency,
    Routine,
    Complete,
}

impl TriageDecision {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Emergency | Self::Complete)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SeverityLevel {
    Critical,
    High,
    Medium,
    Low,
}

impl SeverityLevel {
    /// Urgent severities get the redacted patient-facing guidance.
    pub fn is_urgent(&self) -> bool {
        matches!(self, Self::Critical | Self::High)
    }
}

impl Default for SeverityLevel {
    fn default() -> Self {
        Self::Medium
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicalHistory {
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub negatives: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Assessment {
    #[serde(default)]
    pub likely_diagnosis: String,
    #[serde(default)]
    pub severity_level: SeverityLevel,
    #[serde(default = "default_severity_score")]
    pub severity_score: u8,
}

fn default_severity_score() -> u8 {
    50
}

impl Default for Assessment {
    fn default() -> Self {
        Self {
            likely_diagnosis: String::new(),
            severity_level: SeverityLevel::default(),
            severity_score: default_severity_score(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CarePlan {
    #[serde(default)]
    pub immediate_actions: Vec<String>,
    #[serde(default)]
    pub referral_needed: bool,
}

/// Structured note for the clinician. Never shown to the patient.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClinicianSummary {
    #[serde(default)]
    pub trigger_reason: String,
    #[serde(default)]
    pub history: ClinicalHistory,
    #[serde(default)]
    pub vitals_reported: serde_json::Value,
    #[serde(default)]
    pub assessment: Assessment,
    #[serde(default)]
    pub red_flags: Vec<String>,
    #[serde(default)]
    pub plan: CarePlan,
}

/// Patient-safe summary. Guidance text is subject to the redaction rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientSummary {
    #[serde(default)]
    pub clinical_guidelines: String,
    #[serde(default)]
    pub symptoms_reported: Vec<String>,
    #[serde(default)]
    pub symptoms_denied: Vec<String>,
    #[serde(default, alias = "red_flags_to_watch_out_for")]
    pub red_flags_to_watch: Vec<String>,
    #[serde(default)]
    pub triage_level: String,
}

/// Terminal payload produced at `Emergency` or `Complete`, consumed by the
/// case/booking sub-workflows.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryPayload {
    #[serde(default)]
    pub patient_summary: Option<PatientSummary>,
    #[serde(default, alias = "pre_doctor_consultation_summary")]
    pub clinician_summary: Option<ClinicianSummary>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriageState {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default)]
    pub safety_checklist: Vec<String>,
    #[serde(default)]
    pub investigated_symptoms: Vec<String>,
    #[serde(default)]
    pub investigated_facts: BTreeMap<String, String>,
    #[serde(default)]
    pub differential_diagnosis: Vec<String>,
    #[serde(default)]
    pub retrieved_protocols: Vec<ProtocolFragment>,

    #[serde(default)]
    pub triage_decision: TriageDecision,
    #[serde(default)]
    pub final_response: String,
    #[serde(default)]
    pub full_summary_payload: Option<SummaryPayload>,

    // Opaque pass-through identifiers owned by external callers and the
    // sub-workflows.
    #[serde(default)]
    pub case_id: Option<String>,
    #[serde(default)]
    pub profile_id: Option<String>,
    #[serde(default)]
    pub doctor_id: Option<String>,
    #[serde(default)]
    pub slot_id: Option<String>,
    #[serde(default)]
    pub appointment_id: Option<String>,
    #[serde(default)]
    pub booking_status: Option<String>,
}

impl TriageState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_user(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::user(content));
    }

    pub fn push_assistant(&mut self, content: impl Into<String>) {
        self.messages.push(ChatMessage::assistant(content));
    }

    /// Latest user utterance, if the conversation has one.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }

    /// The most recent assistant question, i.e. what the latest user message
    /// is answering.
    pub fn last_assistant_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
    }

    /// All assistant turns so far, used as dedup evidence.
    pub fn assistant_turns(&self) -> Vec<&str> {
        self.messages
            .iter()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.content.as_str())
            .collect()
    }

    /// The trailing `window` messages rendered as `role: content` lines.
    pub fn history_window(&self, window: usize) -> String {
        let start = self.messages.len().saturating_sub(window);
        self.messages[start..]
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::User => "user",
                    Role::Assistant => "assistant",
                };
                format!("{}: {}", role, m.content)
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Merge new facts in, normalizing keys. Existing keys are overwritten by
    /// newer values; the map never shrinks.
    pub fn merge_facts(&mut self, new_facts: BTreeMap<String, String>) {
        for (key, value) in new_facts {
            self.investigated_facts
                .insert(normalize_fact_key(&key), value);
        }
    }

    pub fn facts_json(&self) -> String {
        if self.investigated_facts.is_empty() {
            "None".to_string()
        } else {
            serde_json::to_string_pretty(&self.investigated_facts)
                .unwrap_or_else(|_| "None".to_string())
        }
    }

    pub fn rendered_protocols(&self) -> String {
        self.retrieved_protocols
            .iter()
            .map(|p| p.render())
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Canonical fact key form: lowercase, runs of non-alphanumerics collapsed to
/// single underscores ("Neck Stiffness" -> "neck_stiffness").
pub fn normalize_fact_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut last_was_sep = true;
    for c in key.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            out.push('_');
            last_was_sep = true;
        }
    }
    while out.ends_with('_') {
        out.pop();
    }
    out
}
