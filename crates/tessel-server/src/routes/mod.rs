//! API routes.

pub mod health;
pub mod sessions;

pub use health::{HealthResponse, StoreHealth, health_routes};
pub use sessions::{
    SessionIdResponse, SessionInfo, SessionUpdate, UpdateResponse, generate_handler,
    get_session_info_handler, update_session_info_handler,
};
