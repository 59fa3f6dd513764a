// src/lib.rs

pub mod api;
pub mod config;
pub mod llm;
pub mod search;
pub mod sessions;
pub mod state;
pub mod store;
pub mod triage;
pub mod workflows;
