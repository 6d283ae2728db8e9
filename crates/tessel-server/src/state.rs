//! Application state shared across handlers.

use std::sync::Arc;

use tessel_session::SessionEngine;

use crate::config::ServerConfig;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// The session engine.
    pub engine: Arc<SessionEngine>,

    /// Server configuration.
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Create a new application state.
    pub fn new(engine: SessionEngine, config: ServerConfig) -> Self {
        Self::from_shared(Arc::new(engine), config)
    }

    /// Create application state around an engine that is already shared.
    pub fn from_shared(engine: Arc<SessionEngine>, config: ServerConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }
}
