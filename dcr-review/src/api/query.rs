//! Query application and filtering

use axum::{extract::State, Json};
use dcr_common::query::{FilterSummary, QuerySummary};
use serde::Deserialize;

use super::error::ApiError;
use super::views::PageResponse;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct ExpressionRequest {
    #[serde(default)]
    pub expression: String,
}

/// POST /api/query
///
/// A blank expression clears the query.
pub async fn apply_query(
    State(state): State<AppState>,
    Json(request): Json<ExpressionRequest>,
) -> Result<Json<QuerySummary>, ApiError> {
    let mut session = state.session.write().await;
    let summary = session.apply_query(&request.expression)?;
    Ok(Json(summary))
}

/// DELETE /api/query
///
/// Also drops any active filter.
pub async fn clear_query(State(state): State<AppState>) -> Json<PageResponse> {
    let mut session = state.session.write().await;
    session.clear_query();
    let page = session.current_page();
    Json(PageResponse::build(&session, page))
}

/// POST /api/filter
pub async fn filter_clusters(
    State(state): State<AppState>,
    Json(request): Json<ExpressionRequest>,
) -> Result<Json<FilterSummary>, ApiError> {
    let mut session = state.session.write().await;
    let summary = session.filter_by_query(&request.expression)?;
    Ok(Json(summary))
}

/// DELETE /api/filter
pub async fn clear_filter(State(state): State<AppState>) -> Json<PageResponse> {
    let mut session = state.session.write().await;
    session.clear_filter();
    Json(PageResponse::build(&session, 0))
}
