// src/search/mod.rs

//! Protocol knowledge retrieval capability.
//!
//! Given a patient utterance, returns the most relevant clinical protocol
//! fragments. The index itself (embedding, chunking, seeding) is an external
//! concern; the pipeline only consumes ordered fragments.

pub mod qdrant;

pub use qdrant::QdrantProtocolSearch;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// One retrieved protocol fragment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProtocolFragment {
    pub text: String,
    pub protocol: String,
    pub section: String,
}

impl ProtocolFragment {
    /// Render the fragment the way planner prompts expect it.
    pub fn render(&self) -> String {
        format!(
            "[PROTOCOL: {}] [SECTION: {}]\n{}",
            self.protocol, self.section, self.text
        )
    }
}

/// Capability for semantic lookup over the protocol index.
#[async_trait]
pub trait ProtocolSearch: Send + Sync {
    /// Return up to `k` fragments relevant to `text`, best match first.
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ProtocolFragment>>;
}
