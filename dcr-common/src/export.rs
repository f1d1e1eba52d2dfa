//! CSV export of review results
//!
//! One row per image across the master list (filters are ignored). Values
//! are written raw: the format does no quoting, so a value containing a
//! comma shifts the columns after it.

use crate::session::Session;

/// Suggested download name
pub const DEFAULT_EXPORT_FILENAME: &str = "verified_clusters.csv";

/// Fixed export header
pub const EXPORT_HEADER: [&str; 9] = [
    "local_path",
    "component",
    "is_verified",
    "duplicate_group",
    "name",
    "hashed_case_id",
    "bucket",
    "condition",
    "image_source",
];

impl Session {
    /// Render the session as export CSV (newline-terminated rows)
    pub fn export_csv(&self) -> String {
        let mut out = EXPORT_HEADER.join(",");
        out.push('\n');

        for cluster in &self.clusters {
            let cluster_verified = self.is_verified(&cluster.id);
            for image in &cluster.images {
                let duplicate_tag = self
                    .duplicate_group_of(&cluster.id, &image.path)
                    .map(|g| g.tag(&cluster.id))
                    .unwrap_or_default();

                let verified =
                    cluster_verified || self.image_verification(&image.path) == Some(true);

                let row = [
                    image.path.clone(),
                    cluster.id.clone(),
                    verified.to_string(),
                    duplicate_tag,
                    image.name.clone(),
                    image.hashed_case_id.clone().unwrap_or_default(),
                    image.field_text("bucket"),
                    image.condition.clone().unwrap_or_default(),
                    image.field_text("image_source"),
                ];
                out.push_str(&row.join(","));
                out.push('\n');
            }
        }

        out
    }
}
