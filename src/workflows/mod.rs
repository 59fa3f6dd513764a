// src/workflows/mod.rs

//! Case and booking sub-workflows.
//!
//! Short linear flows that run out-of-band from the conversation, consuming
//! the orchestrator's terminal state. Unlike the per-turn pipeline these are
//! user-initiated writes, so failures are loud: they propagate to the caller
//! instead of being absorbed.

pub mod booking;
pub mod records;

pub use booking::{BookingConfirmation, BookingRequest, BookingWorkflow};
pub use records::{RecordsWorkflow, SavedSummaries};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("slot {0} not found")]
    SlotNotFound(String),

    #[error("slot {0} is no longer available")]
    SlotUnavailable(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// Case update failed after the slot was already locked, and the
    /// compensating slot release also failed. Needs operator reconciliation.
    #[error("booking for slot {slot_id} needs reconciliation: {detail}")]
    ReconciliationNeeded { slot_id: String, detail: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}
