//! Health check endpoint.
//!
//! Reports liveness plus how the engine is configured. Store statistics are
//! read from in-process counters only; a networked store is never queried.

use axum::{Json, Router, extract::State, routing::get};
use serde::{Deserialize, Serialize};
use tessel_session::StoreStats;

use crate::state::AppState;

/// Backing store summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreHealth {
    /// Store backend (`memory`, `redis`).
    pub backend: String,

    /// Keys currently held. Absent for networked stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,

    /// Key limit. Absent when unbounded or unknown.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,

    /// Keys carrying an expiry. Absent for networked stores.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_with_ttl: Option<usize>,
}

impl StoreHealth {
    fn new(backend: &str, stats: Option<StoreStats>) -> Self {
        Self {
            backend: backend.to_string(),
            size: stats.as_ref().map(|s| s.size),
            capacity: stats.as_ref().and_then(|s| s.capacity),
            keys_with_ttl: stats.map(|s| s.ttl_tracked),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    /// `transactional` or `sequential`.
    pub update_mode: String,
    pub store: StoreHealth,
}

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = &state.engine;
    let stats = engine.store_stats().await;

    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        update_mode: engine.update_mode().as_str().to_string(),
        store: StoreHealth::new(engine.store_backend(), stats),
    })
}

/// Create health check routes.
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health))
}
