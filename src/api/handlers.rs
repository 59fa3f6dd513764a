// src/api/handlers.rs
// HTTP handlers for the triage, records, and booking surface

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult, IntoApiError};
use crate::api::types::{
    BookAppointmentRequest, BookAppointmentResponse, ChatRequest, ChatResponse,
    CreateSlotRequest, InitSessionResponse, SaveSummaryRequest, SaveSummaryResponse,
};
use crate::state::AppState;
use crate::workflows::booking::SLOT_STATUS_AVAILABLE;
use crate::workflows::BookingRequest;

/// Health check handler
pub async fn health_handler(State(app_state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
        "model": app_state.config.groq_model,
        "timestamp": Utc::now().to_rfc3339()
    }))
}

/// Start a new conversation: mint a session id and its case record.
pub async fn init_session_handler(
    State(app_state): State<Arc<AppState>>,
) -> ApiResult<Json<InitSessionResponse>> {
    let session_id = Uuid::new_v4().to_string();
    let case_id = app_state
        .records
        .ensure_case(None, None, false)
        .await
        .into_api_error("Failed to create case")?;

    info!("Initialized session {} with case {}", session_id, case_id);
    Ok(Json(InitSessionResponse {
        session_id,
        case_id,
    }))
}

/// One conversation turn.
pub async fn chat_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatResponse>> {
    if request.message.trim().is_empty() {
        return Err(ApiError::bad_request("message must not be empty"));
    }

    let outcome = app_state
        .orchestrator
        .handle_message(
            &request.session_id,
            &request.message,
            request.case_id,
            request.profile_id,
        )
        .await
        .into_api_error("Chat turn failed")?;

    Ok(Json(ChatResponse {
        response: outcome.response,
        decision: outcome.decision,
        summary_payload: outcome.summary_payload,
    }))
}

/// Persist the terminal summary payload as case records.
pub async fn save_summary_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<SaveSummaryRequest>,
) -> ApiResult<Json<SaveSummaryResponse>> {
    let case_id = app_state
        .records
        .ensure_case(
            request.case_id.as_deref(),
            request.profile_id.as_deref(),
            request.is_emergency,
        )
        .await?;

    let saved = app_state
        .records
        .save_summaries(&case_id, request.profile_id.as_deref(), &request.summary_payload)
        .await?;

    Ok(Json(SaveSummaryResponse {
        status: "saved".to_string(),
        case_id: saved.case_id,
        patient_summary_id: saved.patient_summary_id,
        clinician_summary_id: saved.clinician_summary_id,
    }))
}

/// Book a doctor slot. Slot conflicts surface as 409.
pub async fn book_appointment_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<BookAppointmentRequest>,
) -> ApiResult<Json<BookAppointmentResponse>> {
    let confirmation = app_state
        .booking
        .book(BookingRequest {
            case_id: request.case_id,
            profile_id: request.profile_id,
            doctor_id: request.doctor_id,
            slot_id: request.slot_id,
            patient_name: request.patient_name,
            patient_age: request.patient_age,
            patient_gender: request.patient_gender,
            is_emergency: request.is_emergency,
        })
        .await?;

    Ok(Json(BookAppointmentResponse {
        status: "confirmed".to_string(),
        appointment_id: confirmation.appointment_id,
        slot_id: confirmation.slot_id,
        case_id: confirmation.case_id,
    }))
}

/// Fetch one case record.
pub async fn get_case_handler(
    State(app_state): State<Arc<AppState>>,
    Path(case_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let case = app_state
        .store
        .get(crate::store::COLLECTION_CASES, &case_id)
        .await
        .into_api_error("Failed to fetch case")?
        .ok_or_else(|| ApiError::not_found("Case not found"))?;

    Ok(Json(case))
}

/// List a doctor's AVAILABLE slots.
pub async fn get_slots_handler(
    State(app_state): State<Arc<AppState>>,
    Path(doctor_id): Path<String>,
) -> ApiResult<Json<Value>> {
    let slots: Vec<Value> = app_state
        .store
        .query(crate::store::COLLECTION_SLOTS, "doctor_id", &doctor_id)
        .await
        .into_api_error("Failed to list slots")?
        .into_iter()
        .filter(|s| s["status"] == SLOT_STATUS_AVAILABLE)
        .collect();

    Ok(Json(json!({ "doctor_id": doctor_id, "slots": slots })))
}

/// Create an AVAILABLE slot for a doctor.
pub async fn create_slot_handler(
    State(app_state): State<Arc<AppState>>,
    Json(request): Json<CreateSlotRequest>,
) -> ApiResult<Json<Value>> {
    if request.doctor_id.is_empty() {
        return Err(ApiError::bad_request("doctor_id must not be empty"));
    }

    let slot_id = format!("slot_{}", Uuid::new_v4());
    app_state
        .store
        .create(
            crate::store::COLLECTION_SLOTS,
            json!({
                "id": slot_id,
                "doctor_id": request.doctor_id,
                "start_time": request.start_time,
                "end_time": request.end_time,
                "status": SLOT_STATUS_AVAILABLE,
                "created_at": Utc::now().to_rfc3339(),
            }),
        )
        .await
        .into_api_error("Failed to create slot")?;

    Ok(Json(json!({ "status": "created", "slot_id": slot_id })))
}
