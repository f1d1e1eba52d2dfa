//! Image records, clusters and duplicate groups
//!
//! An [`ImageRecord`] carries a handful of typed fields the review workflow
//! relies on, plus an open map of every CSV column so arbitrary columns stay
//! queryable.

use serde::Serialize;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

/// First id handed out to clusters created by a verify split
pub const SYNTHETIC_ID_START: u64 = 10_000;

/// Duplicate group colors, assigned round-robin by group index
pub const DUPLICATE_GROUP_PALETTE: [&str; 8] = [
    "#4CAF50", // Green
    "#9C27B0", // Purple
    "#FFC107", // Yellow
    "#1565C0", // Dark Blue
    "#FF5722", // Deep Orange
    "#00BCD4", // Cyan
    "#8BC34A", // Light Green
    "#E91E63", // Pink
];

/// Color for a 1-based duplicate group index
pub fn group_color(index: usize) -> &'static str {
    DUPLICATE_GROUP_PALETTE[index.saturating_sub(1) % DUPLICATE_GROUP_PALETTE.len()]
}

/// Render a number the way it was most likely written in the CSV
///
/// Integral values drop the fractional part (`3`, not `3.0`).
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Value of a CSV column after best-effort numeric coercion
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Number(f64),
    Text(String),
}

impl FieldValue {
    /// Coerce a raw CSV field
    ///
    /// The value is trimmed; a non-empty value that parses fully as a finite
    /// number becomes [`FieldValue::Number`], anything else stays text.
    pub fn coerce(raw: &str) -> Self {
        let trimmed = raw.trim();
        if !trimmed.is_empty() {
            if let Ok(n) = trimmed.parse::<f64>() {
                if n.is_finite() {
                    return FieldValue::Number(n);
                }
            }
        }
        FieldValue::Text(trimmed.to_string())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            FieldValue::Number(n) => Some(*n),
            FieldValue::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Number(_) => None,
            FieldValue::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Number(n) => f.write_str(&format_number(*n)),
            FieldValue::Text(s) => f.write_str(s),
        }
    }
}

/// One row of the input manifest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageRecord {
    /// Image location after path-prefix resolution
    pub path: String,
    /// Display label (the `name` column, else the final path segment)
    pub name: String,
    pub condition: Option<String>,
    /// First five characters of `hashed_case_id`; sort and display key
    pub hashed_case_id: Option<String>,
    /// Parsed `is_verified` column, when the manifest has one
    pub is_verified_seed: Option<bool>,
    /// Result of the most recent query application
    pub matches_query: bool,
    /// Every CSV column keyed by lower-cased header name
    pub fields: BTreeMap<String, FieldValue>,
}

impl ImageRecord {
    /// Record with only a path; everything else defaulted
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let name = extract_filename(&path).to_string();
        Self {
            path,
            name,
            condition: None,
            hashed_case_id: None,
            is_verified_seed: None,
            matches_query: false,
            fields: BTreeMap::new(),
        }
    }

    pub fn field(&self, column: &str) -> Option<&FieldValue> {
        self.fields.get(column)
    }

    /// Column value rendered as text, empty when the column is absent
    pub fn field_text(&self, column: &str) -> String {
        self.fields
            .get(column)
            .map(|v| v.to_string())
            .unwrap_or_default()
    }
}

/// Final `/`-separated segment of a path
pub fn extract_filename(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Ordering used inside a cluster: records with a case id first, ascending;
/// records without one keep their relative order at the end.
pub fn compare_case_ids(a: &ImageRecord, b: &ImageRecord) -> Ordering {
    match (&a.hashed_case_id, &b.hashed_case_id) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// A candidate group of near-duplicate images
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub id: String,
    pub images: Vec<ImageRecord>,
    /// Set on remainder clusters split off by a partial verification
    pub parent_cluster_id: Option<String>,
}

impl Cluster {
    pub fn new(id: impl Into<String>, images: Vec<ImageRecord>) -> Self {
        Self {
            id: id.into(),
            images,
            parent_cluster_id: None,
        }
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.images.iter().any(|img| img.path == path)
    }

    /// Number of images flagged by the current query
    pub fn match_count(&self) -> usize {
        self.images.iter().filter(|img| img.matches_query).count()
    }

    /// Stable sort by case id (see [`compare_case_ids`])
    pub fn sort_images(&mut self) {
        self.images.sort_by(compare_case_ids);
    }
}

/// Images within one cluster tagged as mutual duplicates
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateGroup {
    /// 1-based, scoped to the owning cluster
    pub index: usize,
    pub image_paths: Vec<String>,
}

impl DuplicateGroup {
    pub fn color(&self) -> &'static str {
        group_color(self.index)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.image_paths.iter().any(|p| p == path)
    }

    /// Export tag, e.g. `"42_1"`
    pub fn tag(&self, cluster_id: &str) -> String {
        format!("{}_{}", cluster_id, self.index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(path: &str, case_id: Option<&str>) -> ImageRecord {
        let mut r = ImageRecord::new(path);
        r.hashed_case_id = case_id.map(str::to_string);
        r
    }

    #[test]
    fn test_coerce_numbers_and_text() {
        assert_eq!(FieldValue::coerce(" 3 "), FieldValue::Number(3.0));
        assert_eq!(FieldValue::coerce("2.5"), FieldValue::Number(2.5));
        assert_eq!(FieldValue::coerce("1e3"), FieldValue::Number(1000.0));
        assert_eq!(FieldValue::coerce("good"), FieldValue::Text("good".to_string()));
        assert_eq!(FieldValue::coerce("12abc"), FieldValue::Text("12abc".to_string()));
    }

    #[test]
    fn test_coerce_never_turns_empty_or_nonfinite_into_numbers() {
        assert_eq!(FieldValue::coerce(""), FieldValue::Text(String::new()));
        assert_eq!(FieldValue::coerce("   "), FieldValue::Text(String::new()));
        assert_eq!(FieldValue::coerce("NaN"), FieldValue::Text("NaN".to_string()));
        assert_eq!(FieldValue::coerce("inf"), FieldValue::Text("inf".to_string()));
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(3.0), "3");
        assert_eq!(format_number(-7.0), "-7");
        assert_eq!(format_number(2.5), "2.5");
    }

    #[test]
    fn test_group_color_wraps_palette() {
        assert_eq!(group_color(1), "#4CAF50");
        assert_eq!(group_color(8), "#E91E63");
        assert_eq!(group_color(9), "#4CAF50");
        assert_eq!(group_color(10), "#9C27B0");
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(extract_filename("/data/a/b.jpg"), "b.jpg");
        assert_eq!(extract_filename("b.jpg"), "b.jpg");
        assert_eq!(extract_filename("dir/"), "");
    }

    #[test]
    fn test_sort_images_puts_missing_ids_last_and_keeps_their_order() {
        let mut cluster = Cluster::new(
            "1",
            vec![
                record("n1", None),
                record("c", Some("ccc")),
                record("n2", None),
                record("a", Some("aaa")),
                record("b", Some("bbb")),
            ],
        );
        cluster.sort_images();
        let order: Vec<&str> = cluster.images.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(order, vec!["a", "b", "c", "n1", "n2"]);
    }

    #[test]
    fn test_duplicate_group_tag_and_color() {
        let group = DuplicateGroup {
            index: 2,
            image_paths: vec!["x".to_string(), "y".to_string()],
        };
        assert_eq!(group.tag("42"), "42_2");
        assert_eq!(group.color(), "#9C27B0");
        assert!(group.contains("y"));
        assert!(!group.contains("z"));
    }
}
