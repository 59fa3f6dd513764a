// src/workflows/booking.rs

//! Appointment booking.
//!
//! Booking is a three-write sequence over the document store: create the
//! appointment with a denormalized patient snapshot, lock the slot, then move
//! the case forward. There is no cross-record transaction, so ordering is the
//! safety mechanism: the slot availability check happens first and the slot is
//! released again if the case update fails afterwards.

use chrono::Utc;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::store::{DocumentStore, COLLECTION_APPOINTMENTS, COLLECTION_CASES, COLLECTION_SLOTS};

use super::records::CASE_STATUS_DOCTOR_ASSIGNED;
use super::WorkflowError;

pub const SLOT_STATUS_AVAILABLE: &str = "AVAILABLE";
pub const SLOT_STATUS_BOOKED: &str = "BOOKED";

#[derive(Debug, Clone, Default)]
pub struct BookingRequest {
    pub case_id: Option<String>,
    pub profile_id: Option<String>,
    pub doctor_id: String,
    pub slot_id: String,
    pub patient_name: Option<String>,
    pub patient_age: Option<u32>,
    pub patient_gender: Option<String>,
    pub is_emergency: bool,
}

#[derive(Debug, Clone)]
pub struct BookingConfirmation {
    pub appointment_id: String,
    pub slot_id: String,
    pub doctor_id: String,
    pub case_id: Option<String>,
}

#[derive(Clone)]
pub struct BookingWorkflow {
    store: Arc<dyn DocumentStore>,
}

impl BookingWorkflow {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Book a slot with a doctor.
    ///
    /// The appointment record denormalizes the patient snapshot so the doctor
    /// view never needs a second lookup. A slot that is anything other than
    /// `AVAILABLE` rejects the booking before any write happens.
    pub async fn book(&self, req: BookingRequest) -> Result<BookingConfirmation, WorkflowError> {
        if req.doctor_id.is_empty() {
            return Err(WorkflowError::MissingField("doctor_id"));
        }
        if req.slot_id.is_empty() {
            return Err(WorkflowError::MissingField("slot_id"));
        }

        let slot = self
            .store
            .get(COLLECTION_SLOTS, &req.slot_id)
            .await?
            .ok_or_else(|| WorkflowError::SlotNotFound(req.slot_id.clone()))?;

        let status = slot["status"].as_str().unwrap_or_default();
        if status != SLOT_STATUS_AVAILABLE {
            return Err(WorkflowError::SlotUnavailable(req.slot_id.clone()));
        }

        let now = Utc::now().to_rfc3339();
        let appointment_id = format!("appt_{}", Uuid::new_v4());
        let severity = if req.is_emergency { "red" } else { "green" };

        self.store
            .create(
                COLLECTION_APPOINTMENTS,
                json!({
                    "id": appointment_id,
                    "case_id": req.case_id,
                    "profile_id": req.profile_id,
                    "doctor_id": req.doctor_id,
                    "slot_id": req.slot_id,
                    "slot_time": slot["start_time"],
                    "patient_snapshot": {
                        "name": req.patient_name,
                        "age": req.patient_age,
                        "gender": req.patient_gender,
                    },
                    "severity": severity,
                    "status": "confirmed",
                    "created_at": now,
                }),
            )
            .await?;

        self.store
            .update(
                COLLECTION_SLOTS,
                &req.slot_id,
                json!({ "status": SLOT_STATUS_BOOKED, "appointment_id": appointment_id }),
            )
            .await?;

        if let Some(case_id) = req.case_id.as_deref() {
            if let Err(e) = self
                .store
                .update(
                    COLLECTION_CASES,
                    case_id,
                    json!({ "status": CASE_STATUS_DOCTOR_ASSIGNED, "last_updated_at": now }),
                )
                .await
            {
                // Release the slot so it is not stranded in BOOKED with a
                // case that never advanced.
                warn!("Case update failed after slot lock ({}); releasing slot", e);
                if let Err(revert) = self
                    .store
                    .update(
                        COLLECTION_SLOTS,
                        &req.slot_id,
                        json!({ "status": SLOT_STATUS_AVAILABLE, "appointment_id": null }),
                    )
                    .await
                {
                    return Err(WorkflowError::ReconciliationNeeded {
                        slot_id: req.slot_id,
                        detail: format!("case update failed ({e}); slot release failed ({revert})"),
                    });
                }
                return Err(WorkflowError::Store(e));
            }
        }

        info!(
            "Booked appointment {} for slot {} with doctor {}",
            appointment_id, req.slot_id, req.doctor_id
        );

        Ok(BookingConfirmation {
            appointment_id,
            slot_id: req.slot_id,
            doctor_id: req.doctor_id,
            case_id: req.case_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteDocumentStore;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store() -> Arc<dyn DocumentStore> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect(":memory:")
            .await
            .unwrap();
        Arc::new(SqliteDocumentStore::initialize(pool).await.unwrap())
    }

    fn request(slot_id: &str) -> BookingRequest {
        BookingRequest {
            doctor_id: "doc_1".to_string(),
            slot_id: slot_id.to_string(),
            patient_name: Some("Asha".to_string()),
            patient_age: Some(34),
            patient_gender: Some("female".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn booking_locks_slot_and_snapshots_patient() {
        let store = store().await;
        store
            .create(
                COLLECTION_SLOTS,
                json!({
                    "id": "slot_1",
                    "doctor_id": "doc_1",
                    "start_time": "2026-09-01T10:00:00Z",
                    "status": SLOT_STATUS_AVAILABLE,
                }),
            )
            .await
            .unwrap();

        let workflow = BookingWorkflow::new(store.clone());
        let confirmation = workflow.book(request("slot_1")).await.unwrap();

        let slot = store.get(COLLECTION_SLOTS, "slot_1").await.unwrap().unwrap();
        assert_eq!(slot["status"], SLOT_STATUS_BOOKED);
        assert_eq!(slot["appointment_id"], confirmation.appointment_id.as_str());

        let appt = store
            .get(COLLECTION_APPOINTMENTS, &confirmation.appointment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(appt["patient_snapshot"]["name"], "Asha");
        assert_eq!(appt["severity"], "green");
        assert_eq!(appt["slot_time"], "2026-09-01T10:00:00Z");
    }

    #[tokio::test]
    async fn booked_slot_rejects_second_booking() {
        let store = store().await;
        store
            .create(
                COLLECTION_SLOTS,
                json!({
                    "id": "slot_1",
                    "doctor_id": "doc_1",
                    "status": SLOT_STATUS_BOOKED,
                }),
            )
            .await
            .unwrap();

        let workflow = BookingWorkflow::new(store.clone());
        let err = workflow.book(request("slot_1")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::SlotUnavailable(_)));

        // No appointment was written.
        let appts = store
            .query(COLLECTION_APPOINTMENTS, "doctor_id", "doc_1")
            .await
            .unwrap();
        assert!(appts.is_empty());
    }

    #[tokio::test]
    async fn missing_slot_is_not_found() {
        let workflow = BookingWorkflow::new(store().await);
        let err = workflow.book(request("slot_missing")).await.unwrap_err();
        assert!(matches!(err, WorkflowError::SlotNotFound(_)));
    }

    #[tokio::test]
    async fn missing_case_releases_slot() {
        let store = store().await;
        store
            .create(
                COLLECTION_SLOTS,
                json!({
                    "id": "slot_1",
                    "doctor_id": "doc_1",
                    "status": SLOT_STATUS_AVAILABLE,
                }),
            )
            .await
            .unwrap();

        let workflow = BookingWorkflow::new(store.clone());
        let mut req = request("slot_1");
        // Case id points at a record that does not exist, so the case update
        // fails after the slot was locked.
        req.case_id = Some("CASE-MISSING00000".to_string());
        let err = workflow.book(req).await.unwrap_err();
        assert!(matches!(err, WorkflowError::Store(_)));

        let slot = store.get(COLLECTION_SLOTS, "slot_1").await.unwrap().unwrap();
        assert_eq!(slot["status"], SLOT_STATUS_AVAILABLE);
    }

    #[tokio::test]
    async fn emergency_booking_is_flagged_red() {
        let store = store().await;
        store
            .create(
                COLLECTION_SLOTS,
                json!({ "id": "slot_1", "doctor_id": "doc_1", "status": SLOT_STATUS_AVAILABLE }),
            )
            .await
            .unwrap();

        let workflow = BookingWorkflow::new(store.clone());
        let mut req = request("slot_1");
        req.is_emergency = true;
        let confirmation = workflow.book(req).await.unwrap();

        let appt = store
            .get(COLLECTION_APPOINTMENTS, &confirmation.appointment_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(appt["severity"], "red");
    }
}
