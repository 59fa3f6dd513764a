// src/triage/mod.rs

//! Conversational triage orchestrator.
//!
//! One user turn runs the sequential pipeline:
//! emergency scan -> (terminal escalation) | fact extraction -> protocol
//! retrieval -> diagnostic planning -> dispatch.
//!
//! The pipeline mutates a clone of the checkpointed session state and commits
//! it only once the turn finished; an abandoned or crashed turn leaves the
//! previous snapshot untouched. Clients are injected at construction; there
//! are no module-level singletons.

pub mod dedup;
pub mod emergency;
pub mod facts;
pub mod planner;
pub mod state;
pub mod strategist;

pub use emergency::{EmergencyScanGate, ESCALATION_MESSAGE};
pub use facts::FactExtractor;
pub use planner::DiagnosticPlanner;
pub use strategist::DispatchStrategist;

use anyhow::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::ArogyaConfig;
use crate::llm::ModelClient;
use crate::search::ProtocolSearch;
use crate::sessions::SessionStore;
use emergency::ScanOutcome;
use state::{SummaryPayload, TriageDecision, TriageState};

/// Shown if the pipeline somehow ends a turn without a response. Every
/// component has its own fallback, so reaching this means a logic error.
const EMPTY_RESPONSE_FALLBACK: &str =
    "I could not process that message. Could you describe your symptoms again?";

/// What one turn hands back to the API layer.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub response: String,
    pub decision: TriageDecision,
    pub summary_payload: Option<SummaryPayload>,
}

pub struct TriageOrchestrator {
    search: Arc<dyn ProtocolSearch>,
    sessions: SessionStore,
    gate: EmergencyScanGate,
    extractor: FactExtractor,
    planner: DiagnosticPlanner,
    strategist: DispatchStrategist,
    retrieval_k: usize,
}

impl TriageOrchestrator {
    pub fn new(
        llm: Arc<dyn ModelClient>,
        search: Arc<dyn ProtocolSearch>,
        sessions: SessionStore,
        config: &ArogyaConfig,
    ) -> Self {
        Self {
            search,
            sessions,
            gate: EmergencyScanGate::new(
                llm.clone(),
                config.emergency_rules_path.as_deref(),
                config.scan_history_window,
            ),
            extractor: FactExtractor::new(llm.clone()),
            planner: DiagnosticPlanner::new(llm.clone(), config),
            strategist: DispatchStrategist::new(llm),
            retrieval_k: config.retrieval_k,
        }
    }

    /// Run one conversation turn for a session.
    ///
    /// Only the checkpoint write can fail; every in-pipeline failure is
    /// absorbed by the owning component's policy (fail-open scan, fail-silent
    /// extraction, checklist-preserving planning, fallback synthesis).
    pub async fn handle_message(
        &self,
        session_id: &str,
        message: &str,
        case_id: Option<String>,
        profile_id: Option<String>,
    ) -> Result<TurnOutcome> {
        let mut state = self.sessions.load(session_id).await?.unwrap_or_default();

        if case_id.is_some() {
            state.case_id = case_id;
        }
        if profile_id.is_some() {
            state.profile_id = profile_id;
        }

        state.push_user(message);
        state.retrieved_protocols.clear();
        state.final_response.clear();

        self.run_turn(&mut state).await;

        if state.final_response.is_empty() {
            warn!("Turn ended without a response; substituting fallback");
            state.final_response = EMPTY_RESPONSE_FALLBACK.to_string();
        }

        // Commit the snapshot only now that the turn is fully applied.
        self.sessions.save(session_id, &state).await?;

        Ok(TurnOutcome {
            response: state.final_response.clone(),
            decision: state.triage_decision,
            summary_payload: state.full_summary_payload.clone(),
        })
    }

    async fn run_turn(&self, state: &mut TriageState) {
        // 1. Emergency gate. On trigger, everything else is skipped.
        if let ScanOutcome::Emergency { reason, payload } = self.gate.scan(state).await {
            debug!("Escalating turn: {}", reason);
            state.triage_decision = TriageDecision::Emergency;
            state.full_summary_payload = Some(SummaryPayload {
                patient_summary: None,
                clinician_summary: Some(payload),
            });
            state.final_response = ESCALATION_MESSAGE.to_string();
            state.push_assistant(ESCALATION_MESSAGE);
            return;
        }

        // 2. Structured fact memory from the latest exchange.
        let new_facts = self.extractor.extract(state).await;
        state.merge_facts(new_facts);

        // 3. Protocol retrieval for the planner prompt. Retrieval problems
        //    degrade to planning without knowledge context.
        if let Some(query) = state.last_user_message().map(|s| s.to_string()) {
            match self.search.query(&query, self.retrieval_k).await {
                Ok(fragments) => state.retrieved_protocols = fragments,
                Err(e) => warn!("Protocol retrieval failed ({}); planning without it", e),
            }
        }

        // 4. Update differential and checklist.
        self.planner.plan(state).await;

        // 5. Ask the next question or close the assessment.
        self.strategist.respond(state).await;
    }
}
