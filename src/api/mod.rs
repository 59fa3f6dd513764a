// src/api/mod.rs

//! HTTP surface: router, handlers, request/response types, and the
//! centralized error response format.

pub mod error;
pub mod handlers;
pub mod router;
pub mod types;

pub use error::{ApiError, ApiResult};
pub use router::api_router;
