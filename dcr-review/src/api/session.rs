//! Manifest loading and session statistics

use axum::{extract::State, Json};
use dcr_common::{Session, SessionStats};
use serde::Deserialize;
use tracing::info;

use super::error::ApiError;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct LoadRequest {
    /// Manifest text
    pub csv: String,
    /// Joined onto every path when non-blank
    #[serde(default)]
    pub path_prefix: Option<String>,
}

/// POST /api/load
///
/// Parses the manifest on a blocking worker, then swaps it in as the new
/// session. A rejected manifest leaves the current session in place.
pub async fn load_manifest(
    State(state): State<AppState>,
    Json(request): Json<LoadRequest>,
) -> Result<Json<SessionStats>, ApiError> {
    let options = state.config.session_options();
    let bytes = request.csv.len();

    let session = tokio::task::spawn_blocking(move || {
        Session::load(&request.csv, request.path_prefix.as_deref(), options)
    })
    .await
    .map_err(|e| ApiError::internal(format!("Manifest parser task failed: {}", e)))??;

    let stats = session.stats();
    *state.session.write().await = session;

    info!(
        "Loaded manifest ({} bytes): {} clusters, {} images",
        bytes, stats.total_clusters, stats.total_images
    );
    Ok(Json(stats))
}

/// GET /api/stats
pub async fn get_stats(State(state): State<AppState>) -> Json<SessionStats> {
    Json(state.session.read().await.stats())
}
