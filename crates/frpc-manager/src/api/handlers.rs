//! HTTP handlers.

use axum::{Json, body::Bytes, extract::State};
use serde::Serialize;
use tracing::{info, instrument};

use crate::config::{ConfigDocument, ConfigOverrides};
use crate::supervisor::{ProcessStatus, StatusWithConnection};

use super::error::{ApiError, ApiResult};
use super::state::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Health check endpoint.
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Return the persisted configuration document.
pub async fn get_config(State(state): State<AppState>) -> ApiResult<Json<ConfigDocument>> {
    Ok(Json(state.store().load().await?))
}

/// Save the configuration and regenerate the frpc files.
#[instrument(skip(state, body))]
pub async fn save_config(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ConfigDocument>> {
    let doc: ConfigDocument = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid config document: {e}")))?;
    let saved = state.store().save(doc).await?;
    state
        .generated_files()
        .write(&saved)
        .await
        .map_err(|e| ApiError::internal(format!("writing generated config: {e}")))?;
    info!(proxies = saved.proxies.len(), "Saved frpc configuration");
    Ok(Json(saved))
}

/// Start frpc, optionally merging overrides into the persisted configuration.
///
/// An empty body starts with the persisted configuration as is.
#[instrument(skip(state, body))]
pub async fn start_frpc(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ProcessStatus>> {
    let overrides = if body.iter().all(u8::is_ascii_whitespace) {
        None
    } else {
        let overrides: ConfigOverrides = serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("invalid request body: {e}")))?;
        Some(overrides)
    };
    Ok(Json(state.supervisor.start(overrides).await?))
}

#[instrument(skip(state))]
pub async fn stop_frpc(State(state): State<AppState>) -> Json<ProcessStatus> {
    Json(state.supervisor.stop().await)
}

pub async fn frpc_status(State(state): State<AppState>) -> Json<StatusWithConnection> {
    Json(state.supervisor.status_with_connection().await)
}

pub async fn clear_logs(State(state): State<AppState>) -> Json<ProcessStatus> {
    Json(state.supervisor.clear_logs().await)
}
