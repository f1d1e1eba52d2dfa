//! HTTP API handlers for dcr-review

pub mod clusters;
pub mod error;
pub mod export;
pub mod health;
pub mod images;
pub mod query;
pub mod session;
pub mod ui;
pub mod views;
pub mod workflow;

pub use clusters::{
    change_page, clear_selection, get_clusters_page, get_selection, navigate_selection,
    select_cluster,
};
pub use error::ApiError;
pub use export::export_csv;
pub use health::health_routes;
pub use images::serve_image;
pub use query::{apply_query, clear_filter, clear_query, filter_clusters};
pub use session::{get_stats, load_manifest};
pub use ui::{serve_app_css, serve_app_js, serve_index};
pub use workflow::{clear_duplicates, mark_duplicates, unverify_cluster, verify_cluster};
