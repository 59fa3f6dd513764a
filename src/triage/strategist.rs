// src/triage/strategist.rs

//! Dispatch strategist: presents the next question, or closes the
//! assessment with the dual-audience summary.
//!
//! Deciding *which* question to ask belongs to the planner; this node only
//! dequeues and presents. On the completion path it synthesizes one payload
//! with a patient-safe summary and a clinician note, and enforces the safety
//! redaction rule in code rather than trusting the prompt.

use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::llm::ModelClient;
use crate::triage::state::{
    PatientSummary, SummaryPayload, TriageDecision, TriageState,
};

const SUMMARY_SYSTEM: &str = "You are a medical documentation assistant. Output JSON only.";

/// Fixed guidance shown to the patient when the clinician-side severity is
/// urgent. The specific diagnosis stays out of the patient summary.
pub const REDACTED_GUIDANCE: &str =
    "Based on your symptoms, immediate doctor consultation is recommended.";

/// Safe fallback when summary synthesis fails outright.
pub const GENERIC_COMPLETION: &str = "I have completed the assessment. \
Please consult a healthcare provider for proper diagnosis and treatment.";

pub struct DispatchStrategist {
    llm: Arc<dyn ModelClient>,
}

impl DispatchStrategist {
    pub fn new(llm: Arc<dyn ModelClient>) -> Self {
        Self { llm }
    }

    /// Produce this turn's response: the next checklist question, or the
    /// terminal summary when nothing is pending.
    ///
    /// The question stays at the front of the checklist; the planner pops it
    /// on the next turn once it has been answered.
    pub async fn respond(&self, state: &mut TriageState) {
        let Some(question) = state.safety_checklist.first().cloned() else {
            self.finalize(state).await;
            return;
        };
        debug!("Dispatching question: {}", question);

        state.investigated_symptoms.push(question.clone());
        state.final_response = question.clone();
        state.push_assistant(question);
        state.triage_decision = TriageDecision::Pending;
    }

    async fn finalize(&self, state: &mut TriageState) {
        state.triage_decision = TriageDecision::Complete;

        let payload = match self.synthesize(state).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Summary synthesis failed ({}); using generic fallback", e);
                fallback_payload(state)
            }
        };

        let response = payload
            .patient_summary
            .as_ref()
            .map(|p| p.clinical_guidelines.clone())
            .filter(|g| !g.is_empty())
            .unwrap_or_else(|| GENERIC_COMPLETION.to_string());

        info!("Assessment complete");
        state.full_summary_payload = Some(payload);
        state.final_response = response.clone();
        state.push_assistant(response);
    }

    /// One model call producing both summaries, then in-code redaction.
    async fn synthesize(&self, state: &TriageState) -> anyhow::Result<SummaryPayload> {
        let prompt = format!(
            r#"Analyze this patient encounter and generate TWO distinct outputs.

1. "patient_summary": a complete, self-contained summary FOR THE PATIENT.
   Base the guidance on standard primary-care triage protocols (NHSRC/WHO).
   Structure:
   - "clinical_guidelines": str (the reassuring advice text)
   - "symptoms_reported": [str]
   - "symptoms_denied": [str]
   - "red_flags_to_watch": [str] (3-5 specific warning signs to watch for)
   - "triage_level": "Green" | "Yellow" | "Red"

2. "clinician_summary": a structured clinical note FOR THE DOCTOR.
   - "trigger_reason": str (short title, e.g. "Persistent high fever")
   - "history": {{ "symptoms": [], "duration": str, "negatives": [] }}
   - "vitals_reported": dict (e.g. {{ "bp": "140/90" }} or {{ "bp": null }})
   - "assessment": {{
        "likely_diagnosis": str,
        "severity_level": "CRITICAL" | "HIGH" | "MEDIUM" | "LOW",
        "severity_score": int (0-100)
     }}
   - "red_flags": [str]
   - "plan": {{ "immediate_actions": [], "referral_needed": bool }}

SEVERITY SCORING (0-100):
- CRITICAL (90-100): life-threatening (heart attack, stroke).
- HIGH (70-89): severe (severe dehydration, very high fever).
- MEDIUM (40-69): moderate (flu, migraine).
- LOW (0-39): mild (common cold).

SAFETY RULE:
If severity is CRITICAL or HIGH, "clinical_guidelines" must only say:
"{redacted}"
Never name the specific diagnosis in "patient_summary"; keep it inside
"clinician_summary" only.

WORKING DIFFERENTIAL: {differential:?}
KNOWN FACTS: {facts}

CONVERSATION:
{history}

OUTPUT JSON ONLY:
{{
    "patient_summary": {{ ... }},
    "clinician_summary": {{ ... }}
}}"#,
            redacted = REDACTED_GUIDANCE,
            differential = state.differential_diagnosis,
            facts = state.facts_json(),
            history = state.history_window(state.messages.len()),
        );

        let raw: Value = self.llm.invoke_json(SUMMARY_SYSTEM, &prompt).await?;
        let mut payload: SummaryPayload = serde_json::from_value(raw)?;
        redact(&mut payload);
        Ok(payload)
    }
}

/// Enforce the redaction rule regardless of what the model produced: urgent
/// severity means fixed guidance and no diagnosis leakage patient-side.
pub fn redact(payload: &mut SummaryPayload) {
    let Some(clinician) = payload.clinician_summary.as_mut() else {
        return;
    };
    clinician.assessment.severity_score = clinician.assessment.severity_score.min(100);

    if !clinician.assessment.severity_level.is_urgent() {
        return;
    }

    let diagnosis = clinician.assessment.likely_diagnosis.to_lowercase();
    if let Some(patient) = payload.patient_summary.as_mut() {
        patient.clinical_guidelines = REDACTED_GUIDANCE.to_string();
        if !diagnosis.is_empty() {
            patient
                .red_flags_to_watch
                .retain(|flag| !flag.to_lowercase().contains(&diagnosis));
        }
    }
}

fn fallback_payload(state: &TriageState) -> SummaryPayload {
    SummaryPayload {
        patient_summary: Some(PatientSummary {
            clinical_guidelines: GENERIC_COMPLETION.to_string(),
            symptoms_reported: state
                .investigated_facts
                .iter()
                .filter(|(_, v)| v.eq_ignore_ascii_case("present"))
                .map(|(k, _)| k.clone())
                .collect(),
            symptoms_denied: state
                .investigated_facts
                .iter()
                .filter(|(_, v)| v.eq_ignore_ascii_case("denied"))
                .map(|(k, _)| k.clone())
                .collect(),
            red_flags_to_watch: vec![],
            triage_level: "Yellow".to_string(),
        }),
        clinician_summary: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::triage::state::{Assessment, ClinicianSummary, SeverityLevel};
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

    #[tokio::test]
    async fn asks_front_question_and_logs_it() {
        let mut state = TriageState::new();
        state.push_user("I have a fever");
        state.safety_checklist = vec!["Q1?".to_string(), "Q2?".to_string()];

        let strategist = DispatchStrategist::new(Arc::new(FailingModel));
        strategist.respond(&mut state).await;

        assert_eq!(state.final_response, "Q1?");
        // Stays queued until the planner pops it as answered next turn.
        assert_eq!(state.safety_checklist, vec!["Q1?", "Q2?"]);
        assert_eq!(state.investigated_symptoms, vec!["Q1?"]);
        assert_eq!(state.triage_decision, TriageDecision::Pending);
        assert_eq!(state.last_assistant_message(), Some("Q1?"));
    }

    #[tokio::test]
    async fn completion_produces_dual_summary() {
        let mut state = TriageState::new();
        state.push_user("I have a mild cold");
        state.differential_diagnosis = vec!["Common cold".to_string()];

        let strategist = DispatchStrategist::new(Arc::new(FixedModel(json!({
            "patient_summary": {
                "clinical_guidelines": "Rest, fluids, and monitor your temperature.",
                "symptoms_reported": ["runny nose"],
                "symptoms_denied": ["fever"],
                "red_flags_to_watch": ["Breathlessness"],
                "triage_level": "Green"
            },
            "clinician_summary": {
                "trigger_reason": "Mild URI symptoms",
                "history": {"symptoms": ["runny nose"], "duration": "2 days", "negatives": ["fever"]},
                "vitals_reported": {"bp": null},
                "assessment": {
                    "likely_diagnosis": "Common cold",
                    "severity_level": "LOW",
                    "severity_score": 15
                },
                "red_flags": [],
                "plan": {"immediate_actions": [], "referral_needed": false}
            }
        }))));
        strategist.respond(&mut state).await;

        assert_eq!(state.triage_decision, TriageDecision::Complete);
        let payload = state.full_summary_payload.as_ref().unwrap();
        let patient = payload.patient_summary.as_ref().unwrap();
        assert_eq!(patient.triage_level, "Green");
        assert!(state.final_response.contains("Rest, fluids"));
        let clinician = payload.clinician_summary.as_ref().unwrap();
        assert!(clinician.assessment.severity_score <= 100);
    }

    #[tokio::test]
    async fn urgent_severity_redacts_patient_guidance() {
        let mut state = TriageState::new();
        state.push_user("Crushing chest pain and sweating");

        let strategist = DispatchStrategist::new(Arc::new(FixedModel(json!({
            "patient_summary": {
                "clinical_guidelines": "You are likely having a heart attack, go to the ER now!",
                "symptoms_reported": ["chest pain", "sweating"],
                "symptoms_denied": [],
                "red_flags_to_watch": ["Worsening heart attack symptoms", "Fainting"],
                "triage_level": "Red"
            },
            "clinician_summary": {
                "trigger_reason": "Chest pain with diaphoresis",
                "history": {"symptoms": ["chest pain"], "duration": "Acute", "negatives": []},
                "vitals_reported": {"bp": null},
                "assessment": {
                    "likely_diagnosis": "Heart attack",
                    "severity_level": "CRITICAL",
                    "severity_score": 95
                },
                "red_flags": ["Diaphoresis"],
                "plan": {"immediate_actions": ["ER admission"], "referral_needed": true}
            }
        }))));
        strategist.respond(&mut state).await;

        let payload = state.full_summary_payload.as_ref().unwrap();
        let patient = payload.patient_summary.as_ref().unwrap();
        assert_eq!(patient.clinical_guidelines, REDACTED_GUIDANCE);
        assert!(!patient
            .red_flags_to_watch
            .iter()
            .any(|f| f.to_lowercase().contains("heart attack")));
        // The clinician note keeps the specific diagnosis.
        let clinician = payload.clinician_summary.as_ref().unwrap();
        assert_eq!(clinician.assessment.likely_diagnosis, "Heart attack");
    }

    #[tokio::test]
    async fn synthesis_failure_falls_back_generic() {
        let mut state = TriageState::new();
        state.push_user("I have a cough");
        state
            .investigated_facts
            .insert("cough".to_string(), "Present".to_string());

        let strategist = DispatchStrategist::new(Arc::new(FailingModel));
        strategist.respond(&mut state).await;

        assert_eq!(state.triage_decision, TriageDecision::Complete);
        assert_eq!(state.final_response, GENERIC_COMPLETION);
        let patient = state
            .full_summary_payload
            .as_ref()
            .unwrap()
            .patient_summary
            .as_ref()
            .unwrap();
        assert_eq!(patient.symptoms_reported, vec!["cough"]);
    }

    #[test]
    fn redact_clamps_score() {
        let mut payload = SummaryPayload {
            patient_summary: Some(PatientSummary::default()),
            clinician_summary: Some(ClinicianSummary {
                assessment: Assessment {
                    likely_diagnosis: "Stroke".to_string(),
                    severity_level: SeverityLevel::Critical,
                    severity_score: 255,
                },
                ..Default::default()
            }),
        };
        redact(&mut payload);
        assert_eq!(
            payload
                .clinician_summary
                .as_ref()
                .unwrap()
                .assessment
                .severity_score,
            100
        );
    }
}
