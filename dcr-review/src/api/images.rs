//! Image file serving
//!
//! Manifest paths are served as-is: absolute paths straight from disk,
//! relative paths under the configured image root. There is no sandboxing;
//! the service is meant to run locally for one reviewer.

use std::path::{Path as FsPath, PathBuf};

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tower::ServiceExt;
use tower_http::services::ServeFile;
use tracing::{error, warn};

use crate::AppState;

/// Location on disk for a requested image path
pub fn resolve_image_path(image_root: &FsPath, requested: &str) -> PathBuf {
    let requested = FsPath::new(requested);
    if requested.is_absolute() {
        requested.to_path_buf()
    } else {
        image_root.join(requested)
    }
}

/// GET /images/*path
pub async fn serve_image(
    State(state): State<AppState>,
    Path(requested): Path<String>,
    request: Request,
) -> Response {
    let full_path = resolve_image_path(&state.config.image_root, &requested);

    let is_file = tokio::fs::metadata(&full_path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        warn!("File not found: {}", full_path.display());
        return (StatusCode::NOT_FOUND, "Image not found").into_response();
    }

    match ServeFile::new(&full_path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(e) => {
            error!("Failed to serve {}: {}", full_path.display(), e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Failed to read image").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_paths_ignore_root() {
        let resolved = resolve_image_path(FsPath::new("/srv"), "/data/a.jpg");
        assert_eq!(resolved, PathBuf::from("/data/a.jpg"));
    }

    #[test]
    fn test_relative_paths_join_root() {
        let resolved = resolve_image_path(FsPath::new("/srv"), "set1/a.jpg");
        assert_eq!(resolved, PathBuf::from("/srv/set1/a.jpg"));
    }
}
