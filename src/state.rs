// src/state.rs
// Shared application state handed to every HTTP handler

use std::sync::Arc;

use crate::config::ArogyaConfig;
use crate::store::DocumentStore;
use crate::triage::TriageOrchestrator;
use crate::workflows::{BookingWorkflow, RecordsWorkflow};

pub struct AppState {
    pub config: ArogyaConfig,
    pub orchestrator: TriageOrchestrator,
    pub records: RecordsWorkflow,
    pub booking: BookingWorkflow,
    pub store: Arc<dyn DocumentStore>,
}

impl AppState {
    pub fn new(
        config: ArogyaConfig,
        orchestrator: TriageOrchestrator,
        store: Arc<dyn DocumentStore>,
    ) -> Self {
        Self {
            config,
            orchestrator,
            records: RecordsWorkflow::new(store.clone()),
            booking: BookingWorkflow::new(store.clone()),
            store,
        }
    }
}
