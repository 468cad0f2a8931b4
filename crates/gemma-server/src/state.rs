//! Application state and configuration.

use std::sync::Arc;
use std::time::Duration;

use gemma_engine::{GenerationEngine, DEFAULT_IDLE_TIMEOUT};

use crate::persistence::{MessageStore, DEFAULT_SAVE_THRESHOLD};
use crate::registry::CancellationRegistry;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The generation engine (runs on per-session worker threads).
    pub engine: Arc<dyn GenerationEngine>,
    /// Remote message store for incremental persistence.
    pub store: Arc<dyn MessageStore>,
    /// Cancellation registry for running sessions.
    pub registry: Arc<CancellationRegistry>,
    /// Server configuration.
    pub config: ServerConfig,
}

/// Tunables for generation sessions.
#[derive(Clone)]
pub struct ServerConfig {
    /// How long to wait for the next delta before the session times out.
    pub idle_timeout: Duration,
    /// Character growth required to trigger a non-final persistence flush.
    pub save_threshold: usize,
    /// Token bridge capacity (backpressure on the worker thread).
    pub token_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            save_threshold: DEFAULT_SAVE_THRESHOLD,
            token_buffer: 256,
        }
    }
}
