//! Response shapes shared by the review handlers
//!
//! Views are computed from the session under its read lock; they carry
//! everything the UI needs to draw a cluster without further requests.

use std::collections::BTreeMap;

use dcr_common::{Cluster, FieldValue, ImageRecord, Session};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct ImageView {
    pub path: String,
    pub name: String,
    pub condition: Option<String>,
    pub hashed_case_id: Option<String>,
    pub matches_query: bool,
    /// Image-level status: per-image override, else the cluster's
    pub is_verified: bool,
    pub duplicate_group: Option<usize>,
    pub duplicate_color: Option<&'static str>,
    pub fields: BTreeMap<String, FieldValue>,
}

impl ImageView {
    fn build(session: &Session, cluster_id: &str, image: &ImageRecord) -> Self {
        let group = session.duplicate_group_of(cluster_id, &image.path);
        Self {
            path: image.path.clone(),
            name: image.name.clone(),
            condition: image.condition.clone(),
            hashed_case_id: image.hashed_case_id.clone(),
            matches_query: image.matches_query,
            is_verified: session.is_image_verified(cluster_id, &image.path),
            duplicate_group: group.map(|g| g.index),
            duplicate_color: group.map(|g| g.color()),
            fields: image.fields.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct DuplicateGroupView {
    pub index: usize,
    pub color: &'static str,
    pub image_paths: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct ClusterView {
    pub id: String,
    pub parent_cluster_id: Option<String>,
    pub size: usize,
    pub is_verified: bool,
    pub match_count: usize,
    pub images: Vec<ImageView>,
    pub duplicate_groups: Vec<DuplicateGroupView>,
}

impl ClusterView {
    pub fn build(session: &Session, cluster: &Cluster) -> Self {
        Self {
            id: cluster.id.clone(),
            parent_cluster_id: cluster.parent_cluster_id.clone(),
            size: cluster.len(),
            is_verified: session.is_verified(&cluster.id),
            match_count: cluster.match_count(),
            images: cluster
                .images
                .iter()
                .map(|image| ImageView::build(session, &cluster.id, image))
                .collect(),
            duplicate_groups: session
                .duplicate_groups(&cluster.id)
                .iter()
                .map(|g| DuplicateGroupView {
                    index: g.index,
                    color: g.color(),
                    image_paths: g.image_paths.clone(),
                })
                .collect(),
        }
    }
}

/// One page of the active cluster list
#[derive(Debug, Serialize)]
pub struct PageResponse {
    /// Page number (0-indexed)
    pub page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    /// Clusters in the active list
    pub total_clusters: usize,
    pub filtering: bool,
    pub current_query: Option<String>,
    pub total_matches: usize,
    pub selected_cluster_id: Option<String>,
    pub clusters: Vec<ClusterView>,
}

impl PageResponse {
    pub fn build(session: &Session, page: usize) -> Self {
        Self {
            page,
            total_pages: session.total_pages(),
            page_size: session.page_size(),
            total_clusters: session.active_len(),
            filtering: session.is_filtering(),
            current_query: session.current_query().map(str::to_string),
            total_matches: session.total_matches(),
            selected_cluster_id: session.selected_cluster_id().map(str::to_string),
            clusters: session
                .clusters_for_page(page)
                .into_iter()
                .map(|cluster| ClusterView::build(session, cluster))
                .collect(),
        }
    }
}

/// Current selection within the active list
#[derive(Debug, Serialize)]
pub struct SelectionResponse {
    /// Whether the request moved the selection
    pub changed: bool,
    /// Position in the active list; `None` when nothing (visible) is selected
    pub index: Option<usize>,
    /// Size of the active list
    pub total: usize,
    pub cluster: Option<ClusterView>,
}

impl SelectionResponse {
    pub fn build(session: &Session, changed: bool) -> Self {
        Self {
            changed,
            index: session.selected_cluster_index(),
            total: session.active_len(),
            cluster: session
                .selected_cluster()
                .map(|cluster| ClusterView::build(session, cluster)),
        }
    }
}
