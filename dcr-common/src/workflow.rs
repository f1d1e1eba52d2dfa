//! Verification and duplicate tagging
//!
//! Verifying a subset of a cluster splits it: the chosen images stay under
//! the original id and are marked verified, the rest move to a new cluster
//! placed right after it. Duplicate groups tag images inside one cluster;
//! an image belongs to at most one group per cluster.
//!
//! Every operation validates fully before mutating, so an error leaves the
//! session untouched.

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::model::{Cluster, DuplicateGroup};
use crate::session::Session;

/// Outcome of [`Session::verify_selected`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VerifyOutcome {
    pub cluster_id: String,
    pub verified_images: usize,
    /// Id of the cluster holding the unselected images, when there were any
    pub remainder_cluster_id: Option<String>,
}

/// Outcome of [`Session::unverify`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnverifyOutcome {
    pub cluster_id: String,
    /// Whether the cluster was verified before the call
    pub was_verified: bool,
    /// Remainder clusters folded back in (symmetric unverify only)
    pub restored_clusters: Vec<String>,
}

impl Session {
    /// Verify the images at `paths` in `cluster_id`
    ///
    /// Needs at least two distinct paths, all belonging to the cluster.
    /// Verifying an already-verified cluster again is allowed and splits it
    /// further.
    pub fn verify_selected(&mut self, cluster_id: &str, paths: &[String]) -> Result<VerifyOutcome> {
        let selected: HashSet<&str> = paths.iter().map(String::as_str).collect();
        if selected.len() < 2 {
            return Err(Error::Validation(
                "Select at least 2 images to verify".to_string(),
            ));
        }

        let pos = self
            .clusters
            .iter()
            .position(|c| c.id == cluster_id)
            .ok_or_else(|| Error::NotFound(format!("Cluster {}", cluster_id)))?;
        ensure_members(&self.clusters[pos], paths)?;

        let images = std::mem::take(&mut self.clusters[pos].images);
        let (chosen, remainder): (Vec<_>, Vec<_>) = images
            .into_iter()
            .partition(|img| selected.contains(img.path.as_str()));

        for image in &chosen {
            self.image_verification.insert(image.path.clone(), true);
        }
        let verified_images = chosen.len();
        self.clusters[pos].images = chosen;
        self.verified.insert(cluster_id.to_string());

        let remainder_cluster_id = if remainder.is_empty() {
            None
        } else {
            let new_id = self.allocate_synthetic_id();
            let mut split = Cluster::new(new_id.clone(), remainder);
            split.parent_cluster_id = Some(cluster_id.to_string());
            self.clusters.insert(pos + 1, split);

            // Keep the filtered view in step with the master list
            if let Some(filter) = &mut self.filter {
                if let Some(fpos) = filter.iter().position(|id| id == cluster_id) {
                    filter.insert(fpos + 1, new_id.clone());
                }
            }
            Some(new_id)
        };

        info!(
            "Verified {} images in cluster {}{}",
            verified_images,
            cluster_id,
            remainder_cluster_id
                .as_ref()
                .map(|id| format!(", remainder moved to cluster {}", id))
                .unwrap_or_default()
        );

        Ok(VerifyOutcome {
            cluster_id: cluster_id.to_string(),
            verified_images,
            remainder_cluster_id,
        })
    }

    /// Next unused synthetic id
    fn allocate_synthetic_id(&mut self) -> String {
        loop {
            let candidate = self.next_synthetic_id.to_string();
            self.next_synthetic_id += 1;
            if self.cluster(&candidate).is_none() {
                return candidate;
            }
            warn!("Synthetic cluster id {} already in use, skipping", candidate);
        }
    }

    /// Remove `cluster_id` from the verified set
    ///
    /// By default nothing else changes: per-image overrides and earlier
    /// splits stay. With `symmetric_unverify` the overrides for the
    /// cluster's images are cleared and unverified remainder clusters split
    /// off from it are merged back.
    pub fn unverify(&mut self, cluster_id: &str) -> UnverifyOutcome {
        let was_verified = self.verified.remove(cluster_id);
        let restored_clusters = if self.options.symmetric_unverify && self.cluster(cluster_id).is_some() {
            self.restore_split(cluster_id)
        } else {
            Vec::new()
        };

        info!(
            "Unverified cluster {} (was verified: {}, restored {} remainder clusters)",
            cluster_id,
            was_verified,
            restored_clusters.len()
        );

        UnverifyOutcome {
            cluster_id: cluster_id.to_string(),
            was_verified,
            restored_clusters,
        }
    }

    fn restore_split(&mut self, cluster_id: &str) -> Vec<String> {
        let children: Vec<String> = self
            .clusters
            .iter()
            .filter(|c| c.parent_cluster_id.as_deref() == Some(cluster_id))
            .filter(|c| !self.verified.contains(&c.id))
            .map(|c| c.id.clone())
            .collect();

        let mut absorbed = Vec::new();
        for child_id in &children {
            if let Some(child_pos) = self.clusters.iter().position(|c| &c.id == child_id) {
                let child = self.clusters.remove(child_pos);
                absorbed.extend(child.images);
                self.duplicate_groups.remove(child_id);
                if let Some(filter) = &mut self.filter {
                    filter.retain(|id| id != child_id);
                }
                if self.selected.as_deref() == Some(child_id.as_str()) {
                    self.selected = None;
                }
                debug!("Merged remainder cluster {} back into {}", child_id, cluster_id);
            }
        }

        if let Some(pos) = self.clusters.iter().position(|c| c.id == cluster_id) {
            let cluster = &mut self.clusters[pos];
            cluster.images.extend(absorbed);
            cluster.sort_images();
            for image in &cluster.images {
                self.image_verification.remove(&image.path);
            }
        }

        // The active list may have shrunk under the cursor
        let pages = self.total_pages();
        if self.current_page >= pages {
            self.current_page = pages.saturating_sub(1);
        }

        children
    }

    /// Tag `paths` in `cluster_id` as a new duplicate group
    ///
    /// Repeated paths count once. Needs at least two distinct paths, all in
    /// the cluster and none already in one of its groups.
    pub fn mark_duplicates(&mut self, cluster_id: &str, paths: &[String]) -> Result<DuplicateGroup> {
        let mut unique: Vec<String> = Vec::with_capacity(paths.len());
        for path in paths {
            if !unique.contains(path) {
                unique.push(path.clone());
            }
        }
        if unique.len() < 2 {
            return Err(Error::Validation(
                "Select at least 2 images to mark as duplicates".to_string(),
            ));
        }

        let cluster = self
            .cluster(cluster_id)
            .ok_or_else(|| Error::NotFound(format!("Cluster {}", cluster_id)))?;
        ensure_members(cluster, &unique)?;

        let groups = self.duplicate_groups(cluster_id);
        for path in &unique {
            if let Some(existing) = groups.iter().find(|g| g.contains(path)) {
                return Err(Error::Conflict {
                    cluster_id: cluster_id.to_string(),
                    path: path.clone(),
                    group: existing.index,
                });
            }
        }

        let group = DuplicateGroup {
            index: groups.len() + 1,
            image_paths: unique,
        };
        self.duplicate_groups
            .entry(cluster_id.to_string())
            .or_default()
            .push(group.clone());

        info!(
            "Cluster {}: duplicate group {} with {} images",
            cluster_id,
            group.index,
            group.image_paths.len()
        );
        Ok(group)
    }

    /// Drop every duplicate group of `cluster_id`; returns how many there were
    pub fn clear_duplicates(&mut self, cluster_id: &str) -> usize {
        let removed = self
            .duplicate_groups
            .remove(cluster_id)
            .map_or(0, |groups| groups.len());
        info!("Cluster {}: cleared {} duplicate groups", cluster_id, removed);
        removed
    }
}

fn ensure_members(cluster: &Cluster, paths: &[String]) -> Result<()> {
    match paths.iter().find(|p| !cluster.contains_path(p)) {
        Some(foreign) => Err(Error::Validation(format!(
            "Image {} is not in cluster {}",
            foreign, cluster.id
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionOptions;

    const CSV: &str = "local_path,component,hashed_case_id\n\
        /a.jpg,7,aaaaa\n/b.jpg,7,bbbbb\n/c.jpg,7,ccccc\n/d.jpg,7,ddddd\n\
        /x.jpg,8,xxxxx\n/y.jpg,8,yyyyy\n";

    fn paths(list: &[&str]) -> Vec<String> {
        list.iter().map(|p| p.to_string()).collect()
    }

    fn session(symmetric: bool) -> Session {
        let options = SessionOptions {
            symmetric_unverify: symmetric,
            ..SessionOptions::default()
        };
        Session::load(CSV, None, options).unwrap()
    }

    #[test]
    fn test_verify_subset_splits_cluster() {
        let mut s = session(false);
        let outcome = s.verify_selected("7", &paths(&["/a.jpg", "/c.jpg"])).unwrap();
        assert_eq!(outcome.verified_images, 2);
        assert_eq!(outcome.remainder_cluster_id.as_deref(), Some("10000"));

        let ids: Vec<&str> = s.clusters().iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, vec!["7", "10000", "8"]);
        assert_eq!(s.cluster("10000").unwrap().parent_cluster_id.as_deref(), Some("7"));
        assert!(s.is_verified("7"));
        assert!(!s.is_verified("10000"));
        assert!(s.is_image_verified("7", "/a.jpg"));
        assert!(!s.is_image_verified("10000", "/b.jpg"));
    }

    #[test]
    fn test_verify_whole_cluster_creates_no_remainder() {
        let mut s = session(false);
        let outcome = s.verify_selected("8", &paths(&["/x.jpg", "/y.jpg"])).unwrap();
        assert!(outcome.remainder_cluster_id.is_none());
        assert_eq!(s.clusters().len(), 2);
    }

    #[test]
    fn test_verify_rejections_leave_session_unchanged() {
        let mut s = session(false);
        assert!(matches!(
            s.verify_selected("7", &paths(&["/a.jpg", "/a.jpg"])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            s.verify_selected("7", &paths(&["/a.jpg", "/x.jpg"])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            s.verify_selected("99", &paths(&["/a.jpg", "/b.jpg"])),
            Err(Error::NotFound(_))
        ));
        assert_eq!(s.clusters().len(), 2);
        assert!(s.verified_clusters().is_empty());
    }

    #[test]
    fn test_synthetic_ids_skip_existing() {
        let csv = "local_path,component\n/a,10000\n/b,10000\n/c,10000\n";
        let mut s = Session::load(csv, None, SessionOptions::default()).unwrap();
        let outcome = s.verify_selected("10000", &paths(&["/a", "/b"])).unwrap();
        assert_eq!(outcome.remainder_cluster_id.as_deref(), Some("10001"));
    }

    #[test]
    fn test_asymmetric_unverify_keeps_split_and_overrides() {
        let mut s = session(false);
        s.verify_selected("7", &paths(&["/a.jpg", "/b.jpg"])).unwrap();
        let outcome = s.unverify("7");
        assert!(outcome.was_verified);
        assert!(outcome.restored_clusters.is_empty());
        assert!(!s.is_verified("7"));
        assert_eq!(s.clusters().len(), 3);
        // Override survives the cluster flag
        assert!(s.is_image_verified("7", "/a.jpg"));
    }

    #[test]
    fn test_symmetric_unverify_restores_split() {
        let mut s = session(true);
        s.verify_selected("7", &paths(&["/c.jpg", "/d.jpg"])).unwrap();
        s.mark_duplicates("10000", &paths(&["/a.jpg", "/b.jpg"])).unwrap();
        s.select_cluster("10000");

        let outcome = s.unverify("7");
        assert_eq!(outcome.restored_clusters, vec!["10000".to_string()]);
        assert_eq!(s.clusters().len(), 2);
        let order: Vec<&str> = s.cluster("7").unwrap().images.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(order, vec!["/a.jpg", "/b.jpg", "/c.jpg", "/d.jpg"]);
        assert!(!s.is_image_verified("7", "/c.jpg"));
        assert!(s.duplicate_groups("10000").is_empty());
        assert_eq!(s.selected_cluster_id(), None);
    }

    #[test]
    fn test_symmetric_unverify_keeps_verified_children() {
        let mut s = session(true);
        s.verify_selected("7", &paths(&["/a.jpg", "/b.jpg"])).unwrap();
        s.verify_selected("10000", &paths(&["/c.jpg", "/d.jpg"])).unwrap();
        let outcome = s.unverify("7");
        assert!(outcome.restored_clusters.is_empty());
        assert!(s.cluster("10000").is_some());
    }

    #[test]
    fn test_mark_duplicates_indexes_and_conflicts() {
        let mut s = session(false);
        let g1 = s.mark_duplicates("7", &paths(&["/a.jpg", "/b.jpg", "/a.jpg"])).unwrap();
        assert_eq!(g1.index, 1);
        assert_eq!(g1.image_paths, paths(&["/a.jpg", "/b.jpg"]));

        let g2 = s.mark_duplicates("7", &paths(&["/c.jpg", "/d.jpg"])).unwrap();
        assert_eq!(g2.index, 2);

        match s.mark_duplicates("7", &paths(&["/b.jpg", "/c.jpg"])) {
            Err(Error::Conflict { path, group, .. }) => {
                assert_eq!(path, "/b.jpg");
                assert_eq!(group, 1);
            }
            other => panic!("Expected conflict, got {:?}", other),
        }
        assert_eq!(s.duplicate_groups("7").len(), 2);
        assert_eq!(s.duplicate_group_of("7", "/d.jpg").map(|g| g.index), Some(2));
    }

    #[test]
    fn test_mark_duplicates_validation() {
        let mut s = session(false);
        assert!(matches!(
            s.mark_duplicates("7", &paths(&["/a.jpg"])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            s.mark_duplicates("7", &paths(&["/a.jpg", "/y.jpg"])),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            s.mark_duplicates("42", &paths(&["/a.jpg", "/b.jpg"])),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_clear_duplicates_restarts_numbering() {
        let mut s = session(false);
        s.mark_duplicates("7", &paths(&["/a.jpg", "/b.jpg"])).unwrap();
        assert_eq!(s.clear_duplicates("7"), 1);
        assert_eq!(s.clear_duplicates("7"), 0);
        let g = s.mark_duplicates("7", &paths(&["/a.jpg", "/b.jpg"])).unwrap();
        assert_eq!(g.index, 1);
    }
}
