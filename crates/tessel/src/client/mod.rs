//! HTTP client for communicating with the Tessel server.

use std::collections::HashMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use url::Url;

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Health check response from the server.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    #[serde(default)]
    pub update_mode: Option<String>,
    #[serde(default)]
    pub store: Option<StoreHealth>,
}

/// Backing store summary reported by the server.
#[derive(Debug, Serialize, Deserialize)]
pub struct StoreHealth {
    pub backend: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub capacity: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keys_with_ttl: Option<usize>,
}

/// Session fields, as sent and received.
#[derive(Debug, Default, Serialize, Deserialize)]
struct SessionInfo {
    #[serde(default)]
    info: HashMap<String, String>,
}

/// Identifier returned by session allocation.
#[derive(Debug, Deserialize)]
struct SessionIdResponse {
    id: u64,
}

/// Update outcome.
#[derive(Debug, Deserialize)]
struct UpdateResponse {
    success: bool,
}

/// Error body returned by the server.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    code: String,
    message: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Client
// ─────────────────────────────────────────────────────────────────────────────

/// HTTP client for the Tessel server.
pub struct Client {
    base_url: Url,
    http: reqwest::Client,
}

impl Client {
    /// Create a new client for the given server URL.
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;

        Ok(Self {
            base_url,
            http: reqwest::Client::new(),
        })
    }

    /// Check server health.
    pub async fn health(&self) -> Result<HealthResponse> {
        let url = self.base_url.join("/health")?;

        let response = self.http.get(url).send().await?;

        if !response.status().is_success() {
            anyhow::bail!("Server returned error: {}", response.status());
        }

        let health: HealthResponse = response.json().await?;
        Ok(health)
    }

    /// Allocate a new session.
    pub async fn generate(&self) -> Result<u64> {
        let url = self.base_url.join("/api/v1/sessions")?;

        let response = self
            .http
            .post(url)
            .json(&SessionInfo::default())
            .send()
            .await?;
        let response = check(response).await?;

        let created: SessionIdResponse = response.json().await?;
        Ok(created.id)
    }

    /// Read a session's fields. Unknown sessions yield an empty map.
    pub async fn get_session_info(&self, id: u64) -> Result<HashMap<String, String>> {
        let url = self.base_url.join(&format!("/api/v1/sessions/{}", id))?;

        let response = self.http.get(url).send().await?;
        let response = check(response).await?;

        let info: SessionInfo = response.json().await?;
        Ok(info.info)
    }

    /// Set fields on a session; an empty value deletes the field.
    pub async fn update_session_info(&self, id: u64, info: HashMap<String, String>) -> Result<()> {
        let url = self.base_url.join(&format!("/api/v1/sessions/{}", id))?;

        let response = self
            .http
            .patch(url)
            .json(&SessionInfo { info })
            .send()
            .await?;
        let response = check(response).await?;

        let outcome: UpdateResponse = response.json().await?;
        if !outcome.success {
            anyhow::bail!("Server reported an unsuccessful update");
        }
        Ok(())
    }
}

/// Turn a non-success response into an error carrying the server's message.
async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match response.json::<ErrorResponse>().await {
        Ok(body) => anyhow::bail!("{} ({}): {}", status, body.code, body.message),
        Err(_) => anyhow::bail!("Server returned error: {}", status),
    }
}
