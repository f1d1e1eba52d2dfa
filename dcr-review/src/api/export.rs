//! CSV export download

use axum::{
    extract::State,
    http::header,
    response::{IntoResponse, Response},
};
use dcr_common::export::DEFAULT_EXPORT_FILENAME;
use tracing::info;

use crate::AppState;

/// GET /api/export
///
/// Every image of the session, filters ignored, as a CSV attachment.
pub async fn export_csv(State(state): State<AppState>) -> Response {
    let csv = state.session.read().await.export_csv();
    info!("Exported {} rows", csv.lines().count().saturating_sub(1));

    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DEFAULT_EXPORT_FILENAME),
            ),
        ],
        csv,
    )
        .into_response()
}
