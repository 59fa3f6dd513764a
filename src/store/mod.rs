// src/store/mod.rs

//! Document store capability.
//!
//! Cases, summaries, appointments, and slots are JSON records in named
//! collections. The workflows only ever use this surface; no storage logic
//! leaks into the triage core.

pub mod sqlite;

pub use sqlite::SqliteDocumentStore;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

/// Collection names used by the workflows.
pub const COLLECTION_CASES: &str = "cases";
pub const COLLECTION_PATIENT_SUMMARIES: &str = "case_patient_summaries";
pub const COLLECTION_CLINICIAN_SUMMARIES: &str = "case_clinician_summaries";
pub const COLLECTION_APPOINTMENTS: &str = "appointments";
pub const COLLECTION_SLOTS: &str = "doctor_slots";

/// Capability for persisting JSON records in named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Insert a record and return its id.
    ///
    /// If the record carries a string `id` field it is used as the document
    /// id; otherwise one is minted. Inserting an existing id is an error;
    /// use `upsert` for write-or-replace semantics.
    async fn create(&self, collection: &str, record: Value) -> Result<String>;

    /// Fetch one record by id.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Value>>;

    /// Merge `partial` into an existing record. Missing record is an error.
    async fn update(&self, collection: &str, id: &str, partial: Value) -> Result<()>;

    /// Merge `partial` into a record, inserting it first if absent.
    async fn upsert(&self, collection: &str, id: &str, partial: Value) -> Result<()>;

    /// All records in a collection whose top-level `field` equals `value`.
    async fn query(&self, collection: &str, field: &str, value: &str) -> Result<Vec<Value>>;
}
