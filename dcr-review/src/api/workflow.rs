//! Verification and duplicate-group endpoints

use axum::{
    extract::{Path, State},
    Json,
};
use dcr_common::workflow::{UnverifyOutcome, VerifyOutcome};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::error::ApiError;
use super::views::{ClusterView, DuplicateGroupView, SelectionResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PathsRequest {
    pub paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct VerifyResponse {
    #[serde(flatten)]
    pub outcome: VerifyOutcome,
    /// Selection after the optional auto-advance
    pub selection: SelectionResponse,
}

/// POST /api/clusters/:id/verify
///
/// With `auto_advance` enabled the selection then moves one cluster forward
/// in the active list (which, after a split, is the new remainder cluster).
pub async fn verify_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    Json(request): Json<PathsRequest>,
) -> Result<Json<VerifyResponse>, ApiError> {
    let mut session = state.session.write().await;
    let outcome = session.verify_selected(&cluster_id, &request.paths)?;

    let advanced = state.config.auto_advance && session.navigate_adjacent(1);
    debug!("Verify of {}: auto-advanced={}", cluster_id, advanced);

    Ok(Json(VerifyResponse {
        outcome,
        selection: SelectionResponse::build(&session, advanced),
    }))
}

#[derive(Debug, Serialize)]
pub struct UnverifyResponse {
    #[serde(flatten)]
    pub outcome: UnverifyOutcome,
    pub cluster: Option<ClusterView>,
}

/// POST /api/clusters/:id/unverify
pub async fn unverify_cluster(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Json<UnverifyResponse> {
    let mut session = state.session.write().await;
    let outcome = session.unverify(&cluster_id);
    let cluster = session
        .cluster(&cluster_id)
        .map(|c| ClusterView::build(&session, c));
    Json(UnverifyResponse { outcome, cluster })
}

/// POST /api/clusters/:id/duplicates
pub async fn mark_duplicates(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
    Json(request): Json<PathsRequest>,
) -> Result<Json<DuplicateGroupView>, ApiError> {
    let mut session = state.session.write().await;
    let group = session.mark_duplicates(&cluster_id, &request.paths)?;
    Ok(Json(DuplicateGroupView {
        index: group.index,
        color: group.color(),
        image_paths: group.image_paths,
    }))
}

#[derive(Debug, Serialize)]
pub struct ClearDuplicatesResponse {
    pub cluster_id: String,
    pub removed: usize,
}

/// DELETE /api/clusters/:id/duplicates
pub async fn clear_duplicates(
    State(state): State<AppState>,
    Path(cluster_id): Path<String>,
) -> Json<ClearDuplicatesResponse> {
    let mut session = state.session.write().await;
    let removed = session.clear_duplicates(&cluster_id);
    Json(ClearDuplicatesResponse {
        cluster_id,
        removed,
    })
}
