//! dcr-review library - duplicate cluster review service
//!
//! Hosts one review [`Session`] behind an HTTP API and serves the browser UI
//! that drives it.

use std::sync::Arc;

use axum::Router;
use dcr_common::config::ReviewConfig;
use dcr_common::Session;
use tokio::sync::RwLock;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;

/// Largest manifest accepted by `POST /api/load`
pub const MAX_MANIFEST_BYTES: usize = 256 * 1024 * 1024;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The review session; replaced wholesale on every load
    pub session: Arc<RwLock<Session>>,
    pub config: Arc<ReviewConfig>,
}

impl AppState {
    /// State with an empty session
    pub fn new(config: ReviewConfig) -> Self {
        let session = Session::new(config.session_options());
        Self::with_session(session, config)
    }

    pub fn with_session(session: Session, config: ReviewConfig) -> Self {
        Self {
            session: Arc::new(RwLock::new(session)),
            config: Arc::new(config),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::extract::DefaultBodyLimit;
    use axum::routing::{get, post};

    let review = Router::new()
        .route(
            "/api/load",
            post(api::load_manifest).layer(DefaultBodyLimit::max(MAX_MANIFEST_BYTES)),
        )
        .route("/api/stats", get(api::get_stats))
        .route("/api/clusters", get(api::get_clusters_page))
        .route("/api/page", post(api::change_page))
        .route(
            "/api/selection",
            get(api::get_selection)
                .post(api::select_cluster)
                .delete(api::clear_selection),
        )
        .route("/api/selection/navigate", post(api::navigate_selection))
        .route("/api/query", post(api::apply_query).delete(api::clear_query))
        .route("/api/filter", post(api::filter_clusters).delete(api::clear_filter))
        .route("/api/clusters/:id/verify", post(api::verify_cluster))
        .route("/api/clusters/:id/unverify", post(api::unverify_cluster))
        .route(
            "/api/clusters/:id/duplicates",
            post(api::mark_duplicates).delete(api::clear_duplicates),
        )
        .route("/api/export", get(api::export_csv))
        .route("/images/*path", get(api::serve_image));

    let public = Router::new()
        .route("/", get(api::serve_index))
        .route("/static/app.js", get(api::serve_app_js))
        .route("/static/app.css", get(api::serve_app_css))
        .merge(api::health_routes());

    Router::new()
        .merge(review)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
