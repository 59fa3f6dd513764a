// src/api/types.rs

use serde::{Deserialize, Serialize};

use crate::triage::state::{SummaryPayload, TriageDecision};

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub session_id: String,
    pub message: String,
    pub case_id: Option<String>,
    pub profile_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub response: String,
    pub decision: TriageDecision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary_payload: Option<SummaryPayload>,
}

#[derive(Debug, Serialize)]
pub struct InitSessionResponse {
    pub session_id: String,
    pub case_id: String,
}

#[derive(Debug, Deserialize)]
pub struct SaveSummaryRequest {
    pub case_id: Option<String>,
    pub profile_id: Option<String>,
    #[serde(default)]
    pub is_emergency: bool,
    pub summary_payload: SummaryPayload,
}

#[derive(Debug, Serialize)]
pub struct SaveSummaryResponse {
    pub status: String,
    pub case_id: String,
    pub patient_summary_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clinician_summary_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    pub case_id: Option<String>,
    pub profile_id: Option<String>,
    pub doctor_id: String,
    pub slot_id: String,
    pub patient_name: Option<String>,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<String>,
    #[serde(default)]
    pub is_emergency: bool,
}

#[derive(Debug, Serialize)]
pub struct BookAppointmentResponse {
    pub status: String,
    pub appointment_id: String,
    pub slot_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub case_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CreateSlotRequest {
    pub doctor_id: String,
    pub start_time: String,
    pub end_time: Option<String>,
}
