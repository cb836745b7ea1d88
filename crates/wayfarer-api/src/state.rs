//! Application state shared across all route handlers.

use std::sync::Arc;
use std::time::Instant;

use wayfarer_chat::ChatOrchestrator;
use wayfarer_core::config::WayfarerConfig;

/// Shared application state, passed to handlers via axum's `State` extractor.
///
/// All fields are `Arc` so cloning per request is cheap.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<WayfarerConfig>,
    pub orchestrator: Arc<ChatOrchestrator>,
    /// Server start time for uptime calculation.
    pub start_time: Instant,
}

impl AppState {
    pub fn new(config: WayfarerConfig, orchestrator: ChatOrchestrator) -> Self {
        Self {
            config: Arc::new(config),
            orchestrator: Arc::new(orchestrator),
            start_time: Instant::now(),
        }
    }
}
