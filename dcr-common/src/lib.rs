//! # DCR Common Library
//!
//! Core of the duplicate cluster review tool:
//! - CSV manifest ingestion into clusters
//! - Session store (pagination, selection, filtering)
//! - Query expression engine
//! - Verification and duplicate-group workflow
//! - CSV export
//! - Configuration loading

pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod model;
pub mod pagination;
pub mod query;
pub mod session;
pub mod workflow;

pub use error::{Error, Result};
pub use model::{Cluster, DuplicateGroup, FieldValue, ImageRecord};
pub use session::{Session, SessionOptions, SessionStats};
