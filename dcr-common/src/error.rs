//! Common error types for DCR

use thiserror::Error;

/// Common result type for DCR operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types shared by the review core and the review service
///
/// Every variant is recoverable at the session level: an operation that
/// returns one of these has left the session exactly as it found it.
#[derive(Error, Debug)]
pub enum Error {
    /// CSV header lacks a required column
    #[error("Schema error: {0}")]
    Schema(String),

    /// Query expression failed to parse or evaluate
    #[error("Query error: {0}")]
    Query(String),

    /// Image is already a member of a duplicate group in the cluster
    #[error("Image {path} is already in duplicate group {group} of cluster {cluster_id}")]
    Conflict {
        cluster_id: String,
        path: String,
        group: usize,
    },

    /// Rejected user selection (too few images, foreign paths, empty query)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Requested cluster does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Filtering produced an empty cluster list
    #[error("No clusters match the query: {0}")]
    NoMatches(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}
