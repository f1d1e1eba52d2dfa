//! Query engine
//!
//! Compiles a boolean expression once, then evaluates it against every image
//! in the session. Image fields are exposed to the expression as bare
//! identifiers (`bucket > 1 && condition == "good"`).
//!
//! Applying a query only flags images. Filtering narrows the active cluster
//! list to clusters with at least one flagged image.

pub mod eval;
pub mod parser;

pub use eval::Value;
pub use parser::{parse, Expr};

use crate::error::{Error, Result};
use crate::model::{Cluster, ImageRecord};
use crate::session::Session;
use serde::Serialize;
use tracing::{debug, info, warn};

/// A parsed query expression
#[derive(Debug, Clone)]
pub struct Query {
    source: String,
    expr: Expr,
}

impl Query {
    pub fn compile(source: &str) -> Result<Self> {
        let expr = parse(source).map_err(Error::Query)?;
        Ok(Self {
            source: source.to_string(),
            expr,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Evaluate against one record; the result's truthiness decides the match
    pub fn matches(&self, record: &ImageRecord) -> std::result::Result<bool, String> {
        let resolve = |name: &str| resolve_identifier(record, name);
        eval::evaluate(&self.expr, &resolve).map(|value| value.is_truthy())
    }
}

/// Value bound to `name` when evaluating against `record`
///
/// CSV columns win over the built-in names, so a manifest column called
/// `name` shadows the display label.
pub fn resolve_identifier(record: &ImageRecord, name: &str) -> Option<Value> {
    if let Some(value) = record.field(name) {
        return Some(value.into());
    }
    match name {
        "path" => Some(Value::Text(record.path.clone())),
        "name" => Some(Value::Text(record.name.clone())),
        "condition" => Some(record.condition.clone().map_or(Value::Null, Value::Text)),
        "hashedCaseId" => Some(record.hashed_case_id.clone().map_or(Value::Null, Value::Text)),
        "isVerified" => record.is_verified_seed.map(Value::Bool),
        _ => None,
    }
}

/// Per-image results of evaluating a query over the whole session
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    /// Match flags aligned with the master cluster list and each cluster's images
    pub flags: Vec<Vec<bool>>,
    pub evaluated: usize,
    pub total_matches: usize,
    pub failed_images: usize,
    pub first_error: Option<String>,
}

/// Evaluate `query` against every image; images that fail count as non-matching
pub fn evaluate_all(query: &Query, clusters: &[Cluster]) -> Evaluation {
    let mut evaluation = Evaluation::default();

    for cluster in clusters {
        let mut flags = Vec::with_capacity(cluster.images.len());
        for image in &cluster.images {
            evaluation.evaluated += 1;
            let matched = match query.matches(image) {
                Ok(matched) => matched,
                Err(e) => {
                    if evaluation.first_error.is_none() {
                        warn!("Query '{}' failed on {}: {}", query.source(), image.path, e);
                        evaluation.first_error = Some(e);
                    } else {
                        debug!("Query '{}' failed on {}: {}", query.source(), image.path, e);
                    }
                    evaluation.failed_images += 1;
                    false
                }
            };
            if matched {
                evaluation.total_matches += 1;
            }
            flags.push(matched);
        }
        evaluation.flags.push(flags);
    }

    evaluation
}

/// Outcome of [`Session::apply_query`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySummary {
    /// `None` when the call cleared the query
    pub expression: Option<String>,
    pub total_matches: usize,
    /// Images whose evaluation failed and were treated as non-matching
    pub failed_images: usize,
    pub first_error: Option<String>,
}

/// Outcome of [`Session::filter_by_query`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterSummary {
    pub expression: String,
    pub matching_clusters: usize,
    pub total_matches: usize,
}

impl Session {
    /// Compile and evaluate `expression` without touching session state
    ///
    /// Fails when the expression does not parse, or when every image failed
    /// to evaluate (usually a misspelled column name).
    fn evaluate_expression(&self, expression: &str) -> Result<Evaluation> {
        let query = Query::compile(expression)?;
        let evaluation = evaluate_all(&query, &self.clusters);
        if evaluation.evaluated > 0 && evaluation.failed_images == evaluation.evaluated {
            let message = evaluation
                .first_error
                .clone()
                .unwrap_or_else(|| "evaluation failed".to_string());
            return Err(Error::Query(message));
        }
        Ok(evaluation)
    }

    fn commit_evaluation(&mut self, expression: &str, evaluation: &Evaluation) {
        for (cluster, flags) in self.clusters.iter_mut().zip(&evaluation.flags) {
            for (image, matched) in cluster.images.iter_mut().zip(flags) {
                image.matches_query = *matched;
            }
        }
        self.current_query = Some(expression.to_string());
        self.total_matches = evaluation.total_matches;
    }

    /// Flag every image against `expression`
    ///
    /// A blank expression clears the query instead. On error the previous
    /// flags and query stay in place. An active filter is left untouched.
    pub fn apply_query(&mut self, expression: &str) -> Result<QuerySummary> {
        let expression = expression.trim();
        if expression.is_empty() {
            self.clear_query();
            return Ok(QuerySummary {
                expression: None,
                total_matches: 0,
                failed_images: 0,
                first_error: None,
            });
        }

        let evaluation = self.evaluate_expression(expression)?;
        self.commit_evaluation(expression, &evaluation);

        info!(
            "Query '{}' matched {} of {} images ({} failed)",
            expression, evaluation.total_matches, evaluation.evaluated, evaluation.failed_images
        );

        Ok(QuerySummary {
            expression: Some(expression.to_string()),
            total_matches: evaluation.total_matches,
            failed_images: evaluation.failed_images,
            first_error: evaluation.first_error,
        })
    }

    /// Reset every match flag, the current query and any active filter
    pub fn clear_query(&mut self) {
        for image in self.clusters.iter_mut().flat_map(|c| c.images.iter_mut()) {
            image.matches_query = false;
        }
        self.current_query = None;
        self.total_matches = 0;
        if self.filter.take().is_some() {
            self.current_page = 0;
        }
        debug!("Query cleared");
    }

    /// Narrow the active list to clusters with at least one match
    ///
    /// Reuses the current flags when `expression` is the applied query,
    /// otherwise applies it first. When nothing matches the session is left
    /// unchanged and [`Error::NoMatches`] is returned.
    pub fn filter_by_query(&mut self, expression: &str) -> Result<FilterSummary> {
        let expression = expression.trim();
        if expression.is_empty() {
            return Err(Error::Validation("Please enter a query first".to_string()));
        }

        let pending = if self.current_query.as_deref() == Some(expression) {
            None
        } else {
            Some(self.evaluate_expression(expression)?)
        };

        let filtered: Vec<String> = match &pending {
            Some(evaluation) => self
                .clusters
                .iter()
                .zip(&evaluation.flags)
                .filter(|(_, flags)| flags.iter().any(|m| *m))
                .map(|(cluster, _)| cluster.id.clone())
                .collect(),
            None => self
                .clusters
                .iter()
                .filter(|c| c.match_count() > 0)
                .map(|c| c.id.clone())
                .collect(),
        };

        if filtered.is_empty() {
            info!("Filter '{}' matched no clusters", expression);
            return Err(Error::NoMatches(expression.to_string()));
        }

        if let Some(evaluation) = &pending {
            self.commit_evaluation(expression, evaluation);
        }

        let matching_clusters = filtered.len();
        self.filter = Some(filtered);
        self.current_page = 0;

        info!(
            "Filter '{}' kept {} of {} clusters",
            expression,
            matching_clusters,
            self.clusters.len()
        );

        Ok(FilterSummary {
            expression: expression.to_string(),
            matching_clusters,
            total_matches: self.total_matches,
        })
    }

    /// Drop the filter; match flags and the current query are kept
    pub fn clear_filter(&mut self) {
        self.filter = None;
        self.current_page = 0;
        debug!("Filter cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FieldValue;

    fn record(path: &str, bucket: f64, condition: Option<&str>) -> ImageRecord {
        let mut r = ImageRecord::new(path);
        r.fields.insert("bucket".to_string(), FieldValue::Number(bucket));
        r.condition = condition.map(str::to_string);
        if let Some(c) = condition {
            r.fields.insert("condition".to_string(), FieldValue::Text(c.to_string()));
        }
        r
    }

    #[test]
    fn test_resolve_identifier_prefers_columns() {
        let mut r = ImageRecord::new("/x/a.jpg");
        assert_eq!(resolve_identifier(&r, "name"), Some(Value::Text("a.jpg".into())));
        r.fields.insert("name".to_string(), FieldValue::Text("label".into()));
        assert_eq!(resolve_identifier(&r, "name"), Some(Value::Text("label".into())));
    }

    #[test]
    fn test_resolve_identifier_builtins() {
        let r = ImageRecord::new("/x/a.jpg");
        assert_eq!(resolve_identifier(&r, "path"), Some(Value::Text("/x/a.jpg".into())));
        assert_eq!(resolve_identifier(&r, "condition"), Some(Value::Null));
        assert_eq!(resolve_identifier(&r, "hashedCaseId"), Some(Value::Null));
        assert_eq!(resolve_identifier(&r, "isVerified"), None);
        assert_eq!(resolve_identifier(&r, "nope"), None);
    }

    #[test]
    fn test_query_matches_by_truthiness() {
        let r = record("a", 2.0, Some("good"));
        assert!(Query::compile("bucket").unwrap().matches(&r).unwrap());
        assert!(Query::compile("condition == \"good\" && bucket > 1").unwrap().matches(&r).unwrap());
        assert!(!Query::compile("bucket - 2").unwrap().matches(&r).unwrap());
    }

    #[test]
    fn test_compile_error_is_query_error() {
        assert!(matches!(Query::compile("bucket >"), Err(Error::Query(_))));
    }

    #[test]
    fn test_evaluate_all_counts_failures_as_non_matching() {
        let mut with_quality = record("b", 1.0, None);
        with_quality.fields.insert("quality".to_string(), FieldValue::Number(9.0));
        let clusters = vec![
            Cluster::new("1", vec![record("a", 1.0, None), with_quality]),
            Cluster::new("2", vec![record("c", 3.0, None)]),
        ];
        let query = Query::compile("quality > 5").unwrap();
        let evaluation = evaluate_all(&query, &clusters);
        assert_eq!(evaluation.evaluated, 3);
        assert_eq!(evaluation.failed_images, 2);
        assert_eq!(evaluation.total_matches, 1);
        assert_eq!(evaluation.flags, vec![vec![false, true], vec![false]]);
        assert!(evaluation.first_error.unwrap().contains("quality"));
    }
}
