//! Settings API endpoint
//!
//! Sets or clears the GetSongBPM credential. The database is authoritative;
//! the TOML file is updated best-effort as a backup, and the in-memory handle
//! is swapped so the next lookup uses the new value.

use crate::{ApiError, ApiResult, AppState};
use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Request payload for setting the GetSongBPM credential
#[derive(Debug, Deserialize)]
pub struct SetApiKeyRequest {
    pub api_key: String,
}

/// Response payload for credential changes
#[derive(Debug, Serialize)]
pub struct SetApiKeyResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/settings/getsongbpm_api_key
///
/// **Request:** `{"api_key": "your-key"}`
///
/// **Errors:**
/// - 400 Bad Request: Empty or whitespace-only key
/// - 500 Internal Server Error: Database write failure
pub async fn set_getsongbpm_api_key(
    State(state): State<AppState>,
    Json(payload): Json<SetApiKeyRequest>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    if !crate::config::is_valid_key(&payload.api_key) {
        return Err(ApiError::BadRequest(
            "API key cannot be empty or whitespace-only".to_string(),
        ));
    }

    let key = payload.api_key.trim().to_string();
    persist(&state, Some(key.clone())).await?;
    state.api_key.set(Some(key)).await;

    info!("GetSongBPM API key configured via settings API");

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "GetSongBPM API key saved".to_string(),
    }))
}

/// DELETE /api/settings/getsongbpm_api_key
pub async fn clear_getsongbpm_api_key(
    State(state): State<AppState>,
) -> ApiResult<Json<SetApiKeyResponse>> {
    persist(&state, None).await?;
    state.api_key.set(None).await;

    info!("GetSongBPM API key cleared via settings API");

    Ok(Json(SetApiKeyResponse {
        success: true,
        message: "GetSongBPM API key cleared; lookups use MusicBrainz only".to_string(),
    }))
}

async fn persist(state: &AppState, key: Option<String>) -> ApiResult<()> {
    if let Some(db) = &state.db {
        let written = match &key {
            Some(key) => crate::db::settings::set_getsongbpm_api_key(db, key.clone()).await,
            None => crate::db::settings::clear_getsongbpm_api_key(db).await,
        };
        written?;
    }

    if let Some(toml_path) = &state.toml_path {
        crate::config::sync_api_key_to_toml(key, toml_path);
    }

    Ok(())
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route(
        "/api/settings/getsongbpm_api_key",
        post(set_getsongbpm_api_key).delete(clear_getsongbpm_api_key),
    )
}
