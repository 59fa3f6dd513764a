// src/workflows/records.rs

//! Case creation and summary persistence.
//!
//! The case id is the spine every downstream record hangs off. Creation is
//! idempotent: an existing id is reused, never duplicated. The terminal
//! summary payload is split into a patient-safe record and, when present, a
//! clinician record, each written once and never mutated afterwards.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{
    DocumentStore, COLLECTION_CASES, COLLECTION_CLINICIAN_SUMMARIES, COLLECTION_PATIENT_SUMMARIES,
};
use crate::triage::state::{PatientSummary, SummaryPayload};

use super::WorkflowError;

/// Case status progression. The core never deletes a case.
pub const CASE_STATUS_AI_TRIAGE: &str = "AI_TRIAGE";
pub const CASE_STATUS_DOCTOR_ASSIGNED: &str = "DOCTOR_ASSIGNED";

/// Mint a new case id: `CASE-` + 12 uppercase hex chars.
pub fn new_case_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("CASE-{}", hex[..12].to_uppercase())
}

#[derive(Debug, Clone)]
pub struct SavedSummaries {
    pub case_id: String,
    pub patient_summary_id: String,
    pub clinician_summary_id: Option<String>,
}

#[derive(Clone)]
pub struct RecordsWorkflow {
    store: Arc<dyn DocumentStore>,
}

impl RecordsWorkflow {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Ensure a case record exists and return its id.
    ///
    /// Idempotent: a provided id that already has a record is reused as-is
    /// (only `last_updated_at` is touched); a provided id without a record
    /// gets one; no id mints a fresh `CASE-…`.
    pub async fn ensure_case(
        &self,
        case_id: Option<&str>,
        profile_id: Option<&str>,
        is_emergency: bool,
    ) -> Result<String, WorkflowError> {
        let now = Utc::now().to_rfc3339();

        if let Some(id) = case_id {
            if self.store.get(COLLECTION_CASES, id).await?.is_some() {
                debug!("Reusing existing case {}", id);
                self.store
                    .update(COLLECTION_CASES, id, json!({ "last_updated_at": now }))
                    .await?;
                return Ok(id.to_string());
            }
        }

        let id = case_id
            .map(|s| s.to_string())
            .unwrap_or_else(new_case_id);
        info!("Creating case {}", id);

        self.store
            .create(
                COLLECTION_CASES,
                json!({
                    "id": id,
                    "case_id": id,
                    "profile_id": profile_id,
                    "status": CASE_STATUS_AI_TRIAGE,
                    "is_emergency": is_emergency,
                    "created_at": now,
                    "last_updated_at": now,
                }),
            )
            .await?;

        Ok(id)
    }

    /// Split the terminal payload into its two summary records, both tagged
    /// with the case id. Persistence failures propagate.
    pub async fn save_summaries(
        &self,
        case_id: &str,
        profile_id: Option<&str>,
        payload: &SummaryPayload,
    ) -> Result<SavedSummaries, WorkflowError> {
        let now = Utc::now().to_rfc3339();

        // A completed session always yields a patient record, even when the
        // payload carries only the clinician side (emergency path).
        let patient = payload.patient_summary.clone().unwrap_or_else(|| PatientSummary {
            clinical_guidelines: "Please go to the nearest hospital immediately.".to_string(),
            triage_level: "Red".to_string(),
            ..Default::default()
        });

        let patient_summary_id = format!("sum_{}", Uuid::new_v4());
        self.store
            .create(
                COLLECTION_PATIENT_SUMMARIES,
                json!({
                    "id": patient_summary_id,
                    "case_id": case_id,
                    "profile_id": profile_id,
                    "type": "AI_SUMMARY",
                    "triage_level": patient.triage_level,
                    "symptoms_reported": patient.symptoms_reported,
                    "symptoms_denied": patient.symptoms_denied,
                    "red_flags_to_watch": patient.red_flags_to_watch,
                    "guidelines": {
                        "actions": [patient.clinical_guidelines],
                        "source": "AI_GENERATED",
                    },
                    "generated_at": now,
                }),
            )
            .await?;
        debug!("Saved patient summary {}", patient_summary_id);

        let mut clinician_summary_id = None;
        if let Some(clinician) = payload.clinician_summary.as_ref() {
            let id = format!("doc_{}", Uuid::new_v4());
            let mut record = serde_json::to_value(clinician).map_err(anyhow::Error::from)?;
            if let Some(map) = record.as_object_mut() {
                map.insert("id".to_string(), json!(id));
                map.insert("case_id".to_string(), json!(case_id));
                map.insert("profile_id".to_string(), json!(profile_id));
                map.insert("type".to_string(), json!("DOCTOR_SUMMARY"));
                map.insert("generated_at".to_string(), json!(now));
            }
            self.store
                .create(COLLECTION_CLINICIAN_SUMMARIES, record)
                .await?;
            debug!("Saved clinician summary {}", id);
            clinician_summary_id = Some(id);
        }

        Ok(SavedSummaries {
            case_id: case_id.to_string(),
            patient_summary_id,
            clinician_summary_id,
        })
    }
}
