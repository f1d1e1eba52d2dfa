//! Cluster paging and selection
//!
//! Paging and selection are independent: the selected cluster is shown on
//! its own by the UI, whatever page the cursor is on.

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use tracing::debug;

use super::error::ApiError;
use super::views::{PageResponse, SelectionResponse};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    /// Page number (0-indexed); defaults to the current cursor
    pub page: Option<usize>,
}

/// GET /api/clusters?page=n
pub async fn get_clusters_page(
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Json<PageResponse> {
    let session = state.session.read().await;
    let page = query.page.unwrap_or_else(|| session.current_page());
    Json(PageResponse::build(&session, page))
}

#[derive(Debug, Deserialize)]
pub struct PageChangeRequest {
    /// Relative move (`-1` / `1`)
    pub direction: Option<i64>,
    /// Absolute page (0-indexed)
    pub page: Option<usize>,
}

/// POST /api/page
///
/// Moves the page cursor. Moves outside `[0, total_pages)` are ignored and
/// the unchanged page is returned.
pub async fn change_page(
    State(state): State<AppState>,
    Json(request): Json<PageChangeRequest>,
) -> Result<Json<PageResponse>, ApiError> {
    let mut session = state.session.write().await;

    let moved = match (request.page, request.direction) {
        (Some(page), _) => session.set_page(page),
        (None, Some(d)) if d > 0 => session.next_page(),
        (None, Some(d)) if d < 0 => session.previous_page(),
        (None, Some(_)) => false,
        (None, None) => {
            return Err(ApiError::validation("Expected \"page\" or \"direction\""));
        }
    };
    debug!("Page change {:?}: moved={}", request, moved);

    let page = session.current_page();
    Ok(Json(PageResponse::build(&session, page)))
}

/// GET /api/selection
pub async fn get_selection(State(state): State<AppState>) -> Json<SelectionResponse> {
    let session = state.session.read().await;
    Json(SelectionResponse::build(&session, false))
}

#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub cluster_id: String,
}

/// POST /api/selection
///
/// Selecting a cluster outside the active list is a no-op (`changed: false`).
pub async fn select_cluster(
    State(state): State<AppState>,
    Json(request): Json<SelectRequest>,
) -> Json<SelectionResponse> {
    let mut session = state.session.write().await;
    let changed = session.select_cluster(&request.cluster_id);
    Json(SelectionResponse::build(&session, changed))
}

/// DELETE /api/selection
pub async fn clear_selection(State(state): State<AppState>) -> Json<SelectionResponse> {
    let mut session = state.session.write().await;
    let changed = session.selected_cluster_id().is_some();
    session.clear_selection();
    Json(SelectionResponse::build(&session, changed))
}

#[derive(Debug, Deserialize)]
pub struct NavigateRequest {
    pub direction: isize,
}

/// POST /api/selection/navigate
pub async fn navigate_selection(
    State(state): State<AppState>,
    Json(request): Json<NavigateRequest>,
) -> Json<SelectionResponse> {
    let mut session = state.session.write().await;
    let changed = session.navigate_adjacent(request.direction);
    Json(SelectionResponse::build(&session, changed))
}
