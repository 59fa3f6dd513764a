// src/api/router.rs
// HTTP router composition for the REST endpoints

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use super::handlers::{
    book_appointment_handler, chat_handler, create_slot_handler, get_case_handler,
    get_slots_handler, health_handler, init_session_handler, save_summary_handler,
};
use crate::state::AppState;

pub fn api_router(app_state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/health", get(health_handler))

        // Conversation
        .route("/init_session", get(init_session_handler))
        .route("/chat", post(chat_handler))

        // Records
        .route("/save_summary", post(save_summary_handler))
        .route("/case/{case_id}", get(get_case_handler))

        // Booking
        .route("/book_appointment", post(book_appointment_handler))
        .route("/slots/{doctor_id}", get(get_slots_handler))
        .route("/slots", post(create_slot_handler))

        .with_state(app_state)
}
