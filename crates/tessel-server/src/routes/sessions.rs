//! Session endpoints.

use axum::{
    Json,
    body::Bytes,
    extract::{Path, State},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tessel_session::Fields;

use crate::error::ServerError;
use crate::state::AppState;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Session fields, as exchanged with callers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionInfo {
    /// Field name to value.
    #[serde(default)]
    pub info: Fields,
}

/// Identifier of a newly allocated session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionIdResponse {
    /// Session ID.
    pub id: u64,
}

/// Field updates for a session. An empty value deletes the field.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionUpdate {
    /// Field name to new value.
    #[serde(default)]
    pub info: Fields,
}

/// Outcome of an update.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct UpdateResponse {
    /// Always true; failures are reported as errors.
    pub success: bool,
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/sessions - Allocate a new session.
///
/// The body is optional; its fields are accepted and ignored.
pub async fn generate_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SessionIdResponse>, ServerError> {
    let hint: SessionInfo = parse_body(&body, "session info")?;

    let id = state.engine.generate(&hint.info).await?;

    Ok(Json(SessionIdResponse { id }))
}

/// GET /api/v1/sessions/{id} - Read session fields.
///
/// Unknown or expired sessions return an empty `info`.
pub async fn get_session_info_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionInfo>, ServerError> {
    let id = parse_session_id(&session_id)?;

    let info = state.engine.get_session_info(id).await?;

    Ok(Json(SessionInfo { info }))
}

/// PATCH /api/v1/sessions/{id} - Set or delete session fields.
pub async fn update_session_info_handler(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
    body: Bytes,
) -> Result<Json<UpdateResponse>, ServerError> {
    let id = parse_session_id(&session_id)?;
    let update: SessionUpdate = parse_body(&body, "session update")?;

    state.engine.update_session_info(id, update.info).await?;

    Ok(Json(UpdateResponse { success: true }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

/// Decode a JSON body; an empty body yields the default.
fn parse_body<T: DeserializeOwned + Default>(body: &Bytes, what: &str) -> Result<T, ServerError> {
    if body.is_empty() {
        return Ok(T::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| ServerError::BadRequest(format!("Invalid {}: {}", what, e)))
}

fn parse_session_id(s: &str) -> Result<u64, ServerError> {
    s.parse::<u64>()
        .map_err(|_| ServerError::BadRequest(format!("Invalid session ID: {}", s)))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
