//! CSV manifest ingestion
//!
//! Turns manifest text into the initial cluster list. The dialect is a
//! simplified one: fields may be wrapped in double quotes to protect commas,
//! a backslash right before a quote keeps that quote literal, and nothing
//! else is escaped. It is not RFC 4180.

use std::collections::{HashMap, HashSet};

use tracing::{debug, info};

use crate::model::{extract_filename, Cluster, FieldValue, ImageRecord};
use crate::{Error, Result};

/// Column holding the image location
pub const PATH_COLUMN: &str = "local_path";
/// Column holding the pre-computed cluster id
pub const COMPONENT_COLUMN: &str = "component";
/// Component value marking a row that belongs to no cluster
pub const UNCLUSTERED_COMPONENT: &str = "-1";

const NAME_COLUMN: &str = "name";
const CONDITION_COLUMN: &str = "condition";
const CASE_ID_COLUMN: &str = "hashed_case_id";
const VERIFIED_COLUMN: &str = "is_verified";
const IMAGE_SOURCE_COLUMN: &str = "image_source";
const LEGACY_IMAGE_SOURCE_COLUMN: &str = "image.source";

/// Case ids are truncated to this many characters
const CASE_ID_LEN: usize = 5;

/// Result of parsing a manifest, ready to seed a session
#[derive(Debug, Clone)]
pub struct Manifest {
    /// Header names in file order, trimmed and lower-cased
    pub columns: Vec<String>,
    /// Clusters of two or more images, largest first
    pub clusters: Vec<Cluster>,
    /// Clusters whose every image was marked verified in the input
    pub verified: HashSet<String>,
    /// Data rows that made it into a cluster (singletons included)
    pub rows_accepted: usize,
    /// Rows dropped as unclustered (`component == -1`)
    pub rows_unclustered: usize,
    /// Rows dropped as malformed (too few fields, empty path)
    pub rows_skipped: usize,
}

/// Split one line into fields
///
/// Quote characters are consumed; an escaped quote (`\"`) is kept verbatim,
/// backslash included.
pub fn parse_csv_line(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut prev: Option<char> = None;

    for ch in line.chars() {
        if ch == '"' && prev != Some('\\') {
            in_quotes = !in_quotes;
        } else if ch == ',' && !in_quotes {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(ch);
        }
        prev = Some(ch);
    }

    result.push(current);
    result
}

/// Join a path prefix and a path with exactly one `/` between them
pub fn join_prefix(prefix: &str, path: &str) -> String {
    format!(
        "{}/{}",
        prefix.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// `true`, `1` or `yes` in any case
pub fn parse_verified_flag(raw: &str) -> bool {
    matches!(raw.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

/// Header column positions the parser cares about
struct ColumnIndex {
    path: usize,
    component: usize,
    name: Option<usize>,
    condition: Option<usize>,
    case_id: Option<usize>,
    verified: Option<usize>,
}

impl ColumnIndex {
    fn from_headers(headers: &[String]) -> Result<Self> {
        let find = |name: &str| headers.iter().position(|h| h == name);

        let (path, component) = match (find(PATH_COLUMN), find(COMPONENT_COLUMN)) {
            (Some(p), Some(c)) => (p, c),
            _ => {
                return Err(Error::Schema(format!(
                    "CSV must contain \"{}\" and \"{}\" columns (found: {})",
                    PATH_COLUMN,
                    COMPONENT_COLUMN,
                    headers.join(", ")
                )))
            }
        };

        Ok(Self {
            path,
            component,
            name: find(NAME_COLUMN),
            condition: find(CONDITION_COLUMN),
            case_id: find(CASE_ID_COLUMN),
            verified: find(VERIFIED_COLUMN),
        })
    }
}

/// Parse manifest text into clusters
///
/// `path_prefix`, when non-blank, is joined onto every row's path, even
/// paths that are already absolute.
pub fn parse_manifest(csv: &str, path_prefix: Option<&str>) -> Result<Manifest> {
    let prefix = path_prefix.map(str::trim).filter(|p| !p.is_empty());
    let mut lines = csv.split('\n');

    let header_line = lines.next().unwrap_or("").trim_start_matches('\u{feff}');
    let columns: Vec<String> = header_line
        .split(',')
        .map(|h| h.trim().to_lowercase())
        .collect();
    let idx = ColumnIndex::from_headers(&columns)?;
    let min_fields = idx.path.max(idx.component) + 1;

    let mut order: Vec<(String, Vec<ImageRecord>)> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();
    let mut rows_accepted = 0;
    let mut rows_unclustered = 0;
    let mut rows_skipped = 0;

    for (line_no, line) in lines.enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let fields = parse_csv_line(line);
        if fields.len() < min_fields {
            debug!("Skipping line {}: {} fields, need {}", line_no + 2, fields.len(), min_fields);
            rows_skipped += 1;
            continue;
        }

        let component = fields[idx.component].trim();
        if component == UNCLUSTERED_COMPONENT {
            rows_unclustered += 1;
            continue;
        }

        let raw_path = fields[idx.path].trim();
        if raw_path.is_empty() {
            debug!("Skipping line {}: empty {}", line_no + 2, PATH_COLUMN);
            rows_skipped += 1;
            continue;
        }

        let record = build_record(&columns, &idx, &fields, raw_path, prefix);

        let slot = *positions.entry(component.to_string()).or_insert_with(|| {
            order.push((component.to_string(), Vec::new()));
            order.len() - 1
        });
        order[slot].1.push(record);
        rows_accepted += 1;
    }

    let mut clusters: Vec<Cluster> = order
        .into_iter()
        .map(|(id, images)| {
            let mut cluster = Cluster::new(id, images);
            cluster.sort_images();
            cluster
        })
        .filter(|cluster| cluster.len() > 1)
        .collect();
    // Stable: equal sizes keep first-seen order
    clusters.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut verified = HashSet::new();
    if idx.verified.is_some() {
        for cluster in &clusters {
            if cluster.images.iter().all(|img| img.is_verified_seed == Some(true)) {
                debug!("Cluster {} marked verified: every image verified in input", cluster.id);
                verified.insert(cluster.id.clone());
            }
        }
    }

    info!(
        "Parsed manifest: {} rows in {} clusters ({} unclustered, {} skipped, {} pre-verified)",
        rows_accepted,
        clusters.len(),
        rows_unclustered,
        rows_skipped,
        verified.len()
    );

    Ok(Manifest {
        columns,
        clusters,
        verified,
        rows_accepted,
        rows_unclustered,
        rows_skipped,
    })
}

fn build_record(
    columns: &[String],
    idx: &ColumnIndex,
    fields: &[String],
    raw_path: &str,
    prefix: Option<&str>,
) -> ImageRecord {
    let path = match prefix {
        Some(p) => join_prefix(p, raw_path),
        None => raw_path.to_string(),
    };
    let field = |i: Option<usize>| i.and_then(|i| fields.get(i)).map(|s| s.trim());

    let name = field(idx.name)
        .filter(|n| !n.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| extract_filename(&path).to_string());

    let mut record = ImageRecord::new(path);
    record.name = name;
    record.condition = field(idx.condition).map(str::to_string);
    record.hashed_case_id = field(idx.case_id)
        .filter(|id| !id.is_empty())
        .map(|id| id.chars().take(CASE_ID_LEN).collect());
    if idx.verified.is_some() {
        record.is_verified_seed = Some(field(idx.verified).map(parse_verified_flag).unwrap_or(false));
    }

    for (column, value) in columns.iter().zip(fields.iter()) {
        record.fields.insert(column.clone(), FieldValue::coerce(value));
    }
    if !record.fields.contains_key(IMAGE_SOURCE_COLUMN) {
        if let Some(legacy) = record.fields.get(LEGACY_IMAGE_SOURCE_COLUMN).cloned() {
            record.fields.insert(IMAGE_SOURCE_COLUMN.to_string(), legacy);
        }
    }

    record
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(manifest: &Manifest) -> Vec<&str> {
        manifest.clusters.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn test_parse_csv_line_plain() {
        assert_eq!(parse_csv_line("a,b,c"), vec!["a", "b", "c"]);
        assert_eq!(parse_csv_line("a,,c"), vec!["a", "", "c"]);
        assert_eq!(parse_csv_line(""), vec![""]);
    }

    #[test]
    fn test_parse_csv_line_quoted_commas() {
        assert_eq!(
            parse_csv_line(r#"x.jpg,"hello, world",3"#),
            vec!["x.jpg", "hello, world", "3"]
        );
    }

    #[test]
    fn test_parse_csv_line_backslash_quote_is_literal() {
        assert_eq!(parse_csv_line(r#"a\"b,c"#), vec![r#"a\"b"#, "c"]);
    }

    #[test]
    fn test_join_prefix_single_slash() {
        assert_eq!(join_prefix("/data", "img/a.jpg"), "/data/img/a.jpg");
        assert_eq!(join_prefix("/data/", "/img/a.jpg"), "/data/img/a.jpg");
        assert_eq!(join_prefix("/data//", "//img/a.jpg"), "/data/img/a.jpg");
        assert_eq!(join_prefix("/mnt", "/abs/a.jpg"), "/mnt/abs/a.jpg");
    }

    #[test]
    fn test_parse_verified_flag() {
        assert!(parse_verified_flag("TRUE"));
        assert!(parse_verified_flag("1"));
        assert!(parse_verified_flag(" Yes "));
        assert!(!parse_verified_flag("false"));
        assert!(!parse_verified_flag(""));
        assert!(!parse_verified_flag("y"));
    }

    #[test]
    fn test_missing_required_column_is_schema_error() {
        let err = parse_manifest("local_path,bucket\na.jpg,1\n", None).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));

        let err = parse_manifest("", None).unwrap_err();
        assert!(matches!(err, Error::Schema(_)));
    }

    #[test]
    fn test_header_is_trimmed_and_lowercased() {
        let csv = " Local_Path , COMPONENT \na.jpg,1\nb.jpg,1\n";
        let m = parse_manifest(csv, None).unwrap();
        assert_eq!(m.columns, vec!["local_path", "component"]);
        assert_eq!(ids(&m), vec!["1"]);
    }

    #[test]
    fn test_unclustered_and_singletons_dropped() {
        let csv = "local_path,component\na,-1\nb,-1\nc,7\nd,8\ne,8\n";
        let m = parse_manifest(csv, None).unwrap();
        assert_eq!(ids(&m), vec!["8"]);
        assert_eq!(m.rows_unclustered, 2);
        assert_eq!(m.rows_accepted, 3);
    }

    #[test]
    fn test_clusters_sorted_by_size_then_first_seen() {
        let csv = "local_path,component\n\
                   a1,A\na2,A\n\
                   b1,B\nb2,B\nb3,B\n\
                   c1,C\nc2,C\n";
        let m = parse_manifest(csv, None).unwrap();
        assert_eq!(ids(&m), vec!["B", "A", "C"]);
    }

    #[test]
    fn test_images_sorted_by_truncated_case_id() {
        let csv = "local_path,component,hashed_case_id\n\
                   n1,1,\n\
                   z,1,zzzzzz999\n\
                   a,1,aaaaa111\n\
                   n2,1,\n";
        let m = parse_manifest(csv, None).unwrap();
        let cluster = &m.clusters[0];
        let order: Vec<&str> = cluster.images.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(order, vec!["a", "z", "n1", "n2"]);
        assert_eq!(cluster.images[0].hashed_case_id.as_deref(), Some("aaaaa"));
        assert_eq!(cluster.images[2].hashed_case_id, None);
    }

    #[test]
    fn test_prefix_applied_to_relative_and_absolute_paths() {
        let csv = "local_path,component\nimg/a.jpg,1\n/abs/b.jpg,1\n";
        let m = parse_manifest(csv, Some(" /root/ ")).unwrap();
        let paths: Vec<&str> = m.clusters[0].images.iter().map(|i| i.path.as_str()).collect();
        assert_eq!(paths, vec!["/root/img/a.jpg", "/root/abs/b.jpg"]);
        // raw column keeps the unprefixed value
        assert_eq!(
            m.clusters[0].images[0].field("local_path"),
            Some(&FieldValue::Text("img/a.jpg".to_string()))
        );
    }

    #[test]
    fn test_name_defaults_to_filename() {
        let csv = "local_path,component,name\n/x/a.jpg,1,Front\n/x/b.jpg,1,\n";
        let m = parse_manifest(csv, None).unwrap();
        assert_eq!(m.clusters[0].images[0].name, "Front");
        assert_eq!(m.clusters[0].images[1].name, "b.jpg");

        let csv = "local_path,component\n/x/a.jpg,1\n/x/b.jpg,1\n";
        let m = parse_manifest(csv, None).unwrap();
        assert_eq!(m.clusters[0].images[0].name, "a.jpg");
    }

    #[test]
    fn test_columns_coerced_and_retained() {
        let csv = "local_path,component,bucket,condition,note\na,1,3,good,\"x, y\"\nb,1,x2,bad,\n";
        let m = parse_manifest(csv, None).unwrap();
        let a = &m.clusters[0].images[0];
        assert_eq!(a.field("bucket"), Some(&FieldValue::Number(3.0)));
        assert_eq!(a.field("component"), Some(&FieldValue::Number(1.0)));
        assert_eq!(a.field("note"), Some(&FieldValue::Text("x, y".to_string())));
        assert_eq!(a.condition.as_deref(), Some("good"));
        let b = &m.clusters[0].images[1];
        assert_eq!(b.field("bucket"), Some(&FieldValue::Text("x2".to_string())));
        assert_eq!(b.field("note"), Some(&FieldValue::Text(String::new())));
    }

    #[test]
    fn test_legacy_image_source_column_copied() {
        let csv = "local_path,component,image.source\na,1,scanner\nb,1,phone\n";
        let m = parse_manifest(csv, None).unwrap();
        assert_eq!(
            m.clusters[0].images[0].field("image_source"),
            Some(&FieldValue::Text("scanner".to_string()))
        );

        let csv = "local_path,component,image.source,image_source\na,1,old,new\nb,1,old,new\n";
        let m = parse_manifest(csv, None).unwrap();
        assert_eq!(
            m.clusters[0].images[0].field("image_source"),
            Some(&FieldValue::Text("new".to_string()))
        );
    }

    #[test]
    fn test_verified_seed_requires_every_image() {
        let csv = "local_path,component,is_verified\n\
                   a,1,true\nb,1,YES\n\
                   c,2,1\nd,2,false\n";
        let m = parse_manifest(csv, None).unwrap();
        assert!(m.verified.contains("1"));
        assert!(!m.verified.contains("2"));
        assert_eq!(m.clusters[0].images[0].is_verified_seed, Some(true));
    }

    #[test]
    fn test_no_verified_column_means_nothing_verified() {
        let csv = "local_path,component\na,1\nb,1\n";
        let m = parse_manifest(csv, None).unwrap();
        assert!(m.verified.is_empty());
        assert_eq!(m.clusters[0].images[0].is_verified_seed, None);
    }

    #[test]
    fn test_short_rows_and_blank_lines_skipped() {
        let csv = "bucket,local_path,component\n\n1,a\n2,b,5\n3,c,5\r\n   \n4,,5\n";
        let m = parse_manifest(csv, None).unwrap();
        assert_eq!(ids(&m), vec!["5"]);
        assert_eq!(m.clusters[0].len(), 2);
        assert_eq!(m.rows_skipped, 2);
    }

    #[test]
    fn test_short_row_keeps_only_present_columns() {
        let csv = "local_path,component,bucket\na,1\nb,1,2\n";
        let m = parse_manifest(csv, None).unwrap();
        assert!(m.clusters[0].images[0].field("bucket").is_none());
        assert_eq!(m.clusters[0].images[1].field("bucket"), Some(&FieldValue::Number(2.0)));
    }
}
