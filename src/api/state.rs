//! Shared application state for HTTP handlers

use std::sync::Arc;

use crate::pipeline::QueryLogPipeline;

pub struct AppState {
    pub pipeline: Arc<QueryLogPipeline>,
}

impl AppState {
    pub fn new(pipeline: Arc<QueryLogPipeline>) -> Self {
        Self { pipeline }
    }

    /// Get the current sequence ID
    pub fn current_sequence_id(&self) -> u64 {
        self.pipeline.hub().current_sequence_id()
    }
}
