//! HTTP API for the Tessel session service.
//!
//! This crate exposes a [`SessionEngine`] to remote callers:
//!
//! - `POST /api/v1/sessions` allocates a session
//! - `GET /api/v1/sessions/{id}` reads its fields
//! - `PATCH /api/v1/sessions/{id}` sets or deletes fields
//! - `GET /health` reports liveness
//!
//! Engine errors are translated into JSON error bodies; store details never
//! reach the caller.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tessel_server::{Server, ServerConfig};
//! use tessel_session::{EngineConfig, MemoryStore, SessionEngine};
//!
//! let engine = SessionEngine::new(Arc::new(MemoryStore::default()), EngineConfig::new());
//! let config = ServerConfig::new().with_bind_address("127.0.0.1:50051".parse()?);
//!
//! Server::new(engine, config).run().await?;
//! ```

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::ServerConfig;
pub use error::{ErrorResponse, Result, ServerError};
pub use routes::{
    HealthResponse, SessionIdResponse, SessionInfo, SessionUpdate, StoreHealth, UpdateResponse,
};
pub use state::AppState;

use std::future::Future;
use std::net::SocketAddr;

use axum::{Router, extract::DefaultBodyLimit};
use tessel_session::SessionEngine;
use tokio::net::TcpListener;
use tower_http::LatencyUnit;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{Level, info};

/// The Tessel HTTP server.
pub struct Server {
    /// Application state.
    state: AppState,
}

impl Server {
    /// Create a new server with the given engine and configuration.
    pub fn new(engine: SessionEngine, config: ServerConfig) -> Self {
        Self {
            state: AppState::new(engine, config),
        }
    }

    /// Create a server from a pre-built application state.
    pub fn from_state(state: AppState) -> Self {
        Self { state }
    }

    /// Build the router with all routes and middleware.
    ///
    /// With request logging on, every request gets an INFO span carrying
    /// method and path, and its status and latency are logged on completion.
    pub fn router(&self) -> Router {
        let router = Router::new()
            .merge(routes::health_routes())
            .nest("/api/v1", self.api_routes())
            .layer(DefaultBodyLimit::max(self.state.config.max_body_size));

        let router = if self.state.config.request_logging {
            router.layer(
                TraceLayer::new_for_http()
                    .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                    .on_response(
                        DefaultOnResponse::new()
                            .level(Level::INFO)
                            .latency_unit(LatencyUnit::Millis),
                    ),
            )
        } else {
            router
        };

        router.with_state(self.state.clone())
    }

    /// API routes (v1).
    fn api_routes(&self) -> Router<AppState> {
        use axum::routing::{get, post};

        Router::new()
            .route("/sessions", post(routes::generate_handler))
            .route(
                "/sessions/{id}",
                get(routes::get_session_info_handler).patch(routes::update_session_info_handler),
            )
    }

    /// Run the server on the configured address until the process exits.
    pub async fn run(self) -> Result<()> {
        let addr = self.state.config.bind_address;
        self.run_until(addr, std::future::pending()).await
    }

    /// Run the server on a specific address (useful for testing).
    pub async fn run_on(self, addr: SocketAddr) -> Result<()> {
        self.run_until(addr, std::future::pending()).await
    }

    /// Run the server on `addr` until `shutdown` resolves, then drain in-flight requests.
    pub async fn run_until<F>(self, addr: SocketAddr, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let router = self.router();

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ServerError::Internal(format!("Failed to bind: {}", e)))?;

        info!("Starting server on {}", addr);

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| ServerError::Internal(format!("Server error: {}", e)))?;

        info!("Server stopped");
        Ok(())
    }

    /// Get the configured bind address.
    pub fn bind_address(&self) -> SocketAddr {
        self.state.config.bind_address
    }

    /// Get the application state.
    pub fn state(&self) -> &AppState {
        &self.state
    }
}
