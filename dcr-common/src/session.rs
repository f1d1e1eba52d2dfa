//! Review session state
//!
//! A [`Session`] owns everything about one loaded manifest: the master
//! cluster list, verification state, duplicate groups, the optional filter,
//! the page cursor and the current selection. Loading a new manifest
//! replaces the session wholesale.
//!
//! The filter stores cluster ids, not copies, so a cluster mutated through
//! the master list is seen the same way through the filtered view.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::{debug, info};
use uuid::Uuid;

use crate::ingest::{parse_manifest, Manifest};
use crate::model::{Cluster, DuplicateGroup, SYNTHETIC_ID_START};
use crate::pagination::{calculate_pagination, total_pages, DEFAULT_PAGE_SIZE};
use crate::Result;

/// Behavior switches that outlive a single load
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionOptions {
    pub page_size: usize,
    /// Unverify also folds split-off remainders back into the cluster
    pub symmetric_unverify: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            symmetric_unverify: false,
        }
    }
}

/// Session-level counters
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionStats {
    pub session_id: Uuid,
    pub total_clusters: usize,
    pub total_images: usize,
    pub rows_accepted: usize,
    pub verified_clusters: usize,
    pub duplicate_groups: usize,
    pub columns: Vec<String>,
    pub filtering: bool,
    pub active_clusters: usize,
    pub current_query: Option<String>,
    pub total_matches: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub(crate) id: Uuid,
    pub(crate) options: SessionOptions,
    pub(crate) columns: Vec<String>,
    /// Master list; order only changes by verify splits
    pub(crate) clusters: Vec<Cluster>,
    pub(crate) verified: HashSet<String>,
    /// Per-image verification overrides keyed by path
    pub(crate) image_verification: HashMap<String, bool>,
    pub(crate) duplicate_groups: HashMap<String, Vec<DuplicateGroup>>,
    /// Ids of the clusters in the filtered view, in master order
    pub(crate) filter: Option<Vec<String>>,
    pub(crate) current_page: usize,
    pub(crate) selected: Option<String>,
    pub(crate) current_query: Option<String>,
    pub(crate) total_matches: usize,
    pub(crate) next_synthetic_id: u64,
    pub(crate) rows_accepted: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(SessionOptions::default())
    }
}

impl Session {
    /// Empty session, nothing loaded
    pub fn new(options: SessionOptions) -> Self {
        Self {
            id: Uuid::new_v4(),
            options: SessionOptions {
                page_size: options.page_size.max(1),
                ..options
            },
            columns: Vec::new(),
            clusters: Vec::new(),
            verified: HashSet::new(),
            image_verification: HashMap::new(),
            duplicate_groups: HashMap::new(),
            filter: None,
            current_page: 0,
            selected: None,
            current_query: None,
            total_matches: 0,
            next_synthetic_id: SYNTHETIC_ID_START,
            rows_accepted: 0,
        }
    }

    /// Parse manifest text and build a fresh session from it
    ///
    /// A schema error leaves nothing behind; the caller's previous session,
    /// if any, is unaffected.
    pub fn load(csv: &str, path_prefix: Option<&str>, options: SessionOptions) -> Result<Self> {
        let manifest = parse_manifest(csv, path_prefix)?;
        Ok(Self::from_manifest(manifest, options))
    }

    pub fn from_manifest(manifest: Manifest, options: SessionOptions) -> Self {
        let mut session = Self::new(options);
        session.columns = manifest.columns;
        session.clusters = manifest.clusters;
        session.verified = manifest.verified;
        session.rows_accepted = manifest.rows_accepted;

        info!(
            "Session {} loaded: {} clusters, {} pre-verified",
            session.id,
            session.clusters.len(),
            session.verified.len()
        );
        session
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn page_size(&self) -> usize {
        self.options.page_size
    }

    /// Header names of the loaded manifest
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// The master cluster list, regardless of any filter
    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn cluster(&self, cluster_id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|c| c.id == cluster_id)
    }

    pub fn is_filtering(&self) -> bool {
        self.filter.is_some()
    }

    /// The filtered view when a filter is active, else the master list
    pub fn active_clusters(&self) -> Vec<&Cluster> {
        match &self.filter {
            None => self.clusters.iter().collect(),
            Some(ids) => {
                let by_id: HashMap<&str, &Cluster> =
                    self.clusters.iter().map(|c| (c.id.as_str(), c)).collect();
                ids.iter().filter_map(|id| by_id.get(id.as_str()).copied()).collect()
            }
        }
    }

    pub fn active_len(&self) -> usize {
        match &self.filter {
            None => self.clusters.len(),
            Some(ids) => ids.len(),
        }
    }

    // ---- Pagination ----

    /// Clusters on `page` of the active list; empty past the end
    pub fn clusters_for_page(&self, page: usize) -> Vec<&Cluster> {
        let active = self.active_clusters();
        let bounds = calculate_pagination(active.len(), page, self.options.page_size);
        active[bounds.start..bounds.end].to_vec()
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.active_len(), self.options.page_size)
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Jump to `page`; refused (false) when out of range
    pub fn set_page(&mut self, page: usize) -> bool {
        if page < self.total_pages() {
            self.current_page = page;
            true
        } else {
            false
        }
    }

    pub fn next_page(&mut self) -> bool {
        self.set_page(self.current_page + 1)
    }

    pub fn previous_page(&mut self) -> bool {
        match self.current_page.checked_sub(1) {
            Some(page) => self.set_page(page),
            None => false,
        }
    }

    // ---- Selection ----

    /// Whether `cluster_id` is in the active list
    pub fn is_active(&self, cluster_id: &str) -> bool {
        match &self.filter {
            None => self.cluster(cluster_id).is_some(),
            Some(ids) => ids.iter().any(|id| id == cluster_id),
        }
    }

    /// Select a cluster by id
    ///
    /// Returns false and keeps the current selection when the id is not in
    /// the active list.
    pub fn select_cluster(&mut self, cluster_id: &str) -> bool {
        if !self.is_active(cluster_id) {
            debug!("Ignoring selection of inactive cluster {}", cluster_id);
            return false;
        }
        self.selected = Some(cluster_id.to_string());
        true
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected_cluster_id(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Position of the selection in the active list
    ///
    /// `None` when nothing is selected or the selected cluster is not in the
    /// active list (for instance, filtered out).
    pub fn selected_cluster_index(&self) -> Option<usize> {
        let selected = self.selected.as_deref()?;
        match &self.filter {
            None => self.clusters.iter().position(|c| c.id == selected),
            Some(ids) => ids.iter().position(|id| id == selected),
        }
    }

    /// The selected cluster, if it is in the active list
    pub fn selected_cluster(&self) -> Option<&Cluster> {
        self.selected_cluster_index()?;
        self.selected.as_deref().and_then(|id| self.cluster(id))
    }

    /// Move the selection by `direction` positions within the active list
    ///
    /// Without a selection the walk starts from just before the first
    /// cluster, so `+1` selects the first one. Moves that would leave the
    /// list are ignored.
    pub fn navigate_adjacent(&mut self, direction: isize) -> bool {
        let current = self.selected_cluster_index().map_or(-1, |i| i as isize);
        let target = current + direction;
        if target < 0 || target as usize >= self.active_len() {
            return false;
        }
        let target = target as usize;

        let id = match &self.filter {
            None => self.clusters[target].id.clone(),
            Some(ids) => ids[target].clone(),
        };
        self.selected = Some(id);
        true
    }

    // ---- Verification and duplicate reads ----

    pub fn is_verified(&self, cluster_id: &str) -> bool {
        self.verified.contains(cluster_id)
    }

    pub fn verified_clusters(&self) -> &HashSet<String> {
        &self.verified
    }

    /// Per-image verification override, when one was recorded
    pub fn image_verification(&self, path: &str) -> Option<bool> {
        self.image_verification.get(path).copied()
    }

    /// Image-level verification: the override when present, else the
    /// cluster's status
    pub fn is_image_verified(&self, cluster_id: &str, path: &str) -> bool {
        self.image_verification(path)
            .unwrap_or_else(|| self.is_verified(cluster_id))
    }

    pub fn duplicate_groups(&self, cluster_id: &str) -> &[DuplicateGroup] {
        self.duplicate_groups
            .get(cluster_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Group in `cluster_id` that tags `path`, if any
    pub fn duplicate_group_of(&self, cluster_id: &str, path: &str) -> Option<&DuplicateGroup> {
        self.duplicate_groups(cluster_id)
            .iter()
            .find(|g| g.contains(path))
    }

    // ---- Query reads ----

    pub fn current_query(&self) -> Option<&str> {
        self.current_query.as_deref()
    }

    pub fn total_matches(&self) -> usize {
        self.total_matches
    }

    /// Matching images in one cluster; 0 for unknown ids
    pub fn cluster_match_count(&self, cluster_id: &str) -> usize {
        self.cluster(cluster_id).map_or(0, Cluster::match_count)
    }

    pub fn stats(&self) -> SessionStats {
        SessionStats {
            session_id: self.id,
            total_clusters: self.clusters.len(),
            total_images: self.clusters.iter().map(Cluster::len).sum(),
            rows_accepted: self.rows_accepted,
            verified_clusters: self.verified.len(),
            duplicate_groups: self.duplicate_groups.values().map(Vec::len).sum(),
            columns: self.columns.clone(),
            filtering: self.is_filtering(),
            active_clusters: self.active_len(),
            current_query: self.current_query.clone(),
            total_matches: self.total_matches,
            page_size: self.options.page_size,
            total_pages: self.total_pages(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn csv_with_clusters(count: usize) -> String {
        let mut csv = String::from("local_path,component\n");
        for c in 0..count {
            csv.push_str(&format!("/c{c}/a.jpg,{c}\n/c{c}/b.jpg,{c}\n"));
        }
        csv
    }

    fn session_with(count: usize, page_size: usize) -> Session {
        let options = SessionOptions {
            page_size,
            ..SessionOptions::default()
        };
        Session::load(&csv_with_clusters(count), None, options).unwrap()
    }

    #[test]
    fn test_new_session_is_empty() {
        let session = Session::default();
        assert!(session.clusters().is_empty());
        assert_eq!(session.total_pages(), 0);
        assert!(session.clusters_for_page(0).is_empty());
        assert_eq!(session.page_size(), DEFAULT_PAGE_SIZE);
    }

    #[test]
    fn test_zero_page_size_is_raised_to_one() {
        let session = Session::new(SessionOptions {
            page_size: 0,
            symmetric_unverify: false,
        });
        assert_eq!(session.page_size(), 1);
    }

    #[test]
    fn test_each_load_gets_new_id() {
        let a = session_with(1, 30);
        let b = session_with(1, 30);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_page_navigation_bounds() {
        let mut session = session_with(5, 2);
        assert_eq!(session.total_pages(), 3);
        assert!(!session.previous_page());
        assert!(session.next_page());
        assert!(session.next_page());
        assert!(!session.next_page());
        assert_eq!(session.current_page(), 2);
        assert_eq!(session.clusters_for_page(2).len(), 1);
        assert!(!session.set_page(3));
        assert!(session.set_page(0));
    }

    #[test]
    fn test_select_unknown_keeps_selection() {
        let mut session = session_with(3, 30);
        assert!(session.select_cluster("1"));
        assert!(!session.select_cluster("nope"));
        assert_eq!(session.selected_cluster_id(), Some("1"));
        assert_eq!(session.selected_cluster_index(), Some(1));
    }

    #[test]
    fn test_navigate_from_no_selection() {
        let mut session = session_with(3, 30);
        assert!(!session.navigate_adjacent(-1));
        assert!(session.navigate_adjacent(1));
        assert_eq!(session.selected_cluster_index(), Some(0));
        assert!(session.navigate_adjacent(2));
        assert!(!session.navigate_adjacent(1));
        assert_eq!(session.selected_cluster_id(), Some("2"));
    }

    #[test]
    fn test_image_verification_falls_back_to_cluster() {
        let mut session = session_with(1, 30);
        assert!(!session.is_image_verified("0", "/c0/a.jpg"));
        session.verified.insert("0".to_string());
        assert!(session.is_image_verified("0", "/c0/a.jpg"));
        session.image_verification.insert("/c0/a.jpg".to_string(), false);
        assert!(!session.is_image_verified("0", "/c0/a.jpg"));
    }

    #[test]
    fn test_stats() {
        let session = session_with(4, 3);
        let stats = session.stats();
        assert_eq!(stats.total_clusters, 4);
        assert_eq!(stats.total_images, 8);
        assert_eq!(stats.rows_accepted, 8);
        assert_eq!(stats.total_pages, 2);
        assert_eq!(stats.columns, vec!["local_path", "component"]);
        assert!(!stats.filtering);
    }
}
