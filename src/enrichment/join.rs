use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::enrichment::expansion::ExpandedMembership;
use crate::enrichment::utils::{is_valid_p_value, significance_score};
use crate::error::{EnrichmentError, Result};
use crate::testing::utils::{count_labels, membership_mask};

/// Per-entity output of the gene-set analysis.
#[derive(Debug, Clone, PartialEq)]
pub struct AssociationResult {
    pub entity_id: String,
    /// Missing when the source row carried no usable p-value
    pub p_value: Option<f64>,
    /// Remaining numeric columns of the row, by column name
    pub statistics: BTreeMap<String, f64>,
}

impl AssociationResult {
    pub fn new(entity_id: impl Into<String>, p_value: f64) -> Self {
        AssociationResult {
            entity_id: entity_id.into(),
            p_value: Some(p_value),
            statistics: BTreeMap::new(),
        }
    }

    pub fn without_p_value(entity_id: impl Into<String>) -> Self {
        AssociationResult {
            entity_id: entity_id.into(),
            p_value: None,
            statistics: BTreeMap::new(),
        }
    }

    pub fn with_statistic(mut self, name: &str, value: f64) -> Self {
        self.statistics.insert(name.to_string(), value);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinedRow {
    pub entity_id: String,
    pub category: String,
    pub p_value: f64,
    /// `|log10(p_value)|`
    pub score: f64,
}

/// Association results joined to category labels, most significant first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinedTable {
    rows: Vec<JoinedRow>,
}

impl JoinedTable {
    pub fn rows(&self) -> &[JoinedRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn scores(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.score).collect()
    }

    pub fn categories(&self) -> Vec<&str> {
        self.rows.iter().map(|r| r.category.as_str()).collect()
    }

    pub fn contains_entity(&self, entity_id: &str) -> bool {
        self.rows.iter().any(|r| r.entity_id == entity_id)
    }

    /// Rows per category, largest first, ties by label.
    pub fn category_counts(&self) -> Vec<(String, usize)> {
        count_labels(&self.categories())
    }

    pub fn membership_mask(&self, category: &str) -> Vec<bool> {
        membership_mask(&self.categories(), category)
    }
}

impl From<Vec<JoinedRow>> for JoinedTable {
    fn from(mut rows: Vec<JoinedRow>) -> Self {
        sort_by_score(&mut rows);
        JoinedTable { rows }
    }
}

fn sort_by_score(rows: &mut [JoinedRow]) {
    // stable, so equal scores keep their input order
    rows.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
}

/// Join expanded metadata to association results on the entity identifier.
///
/// Every association row is matched against the metadata; rows with no metadata
/// match or no p-value are dropped, and entities that only occur in the metadata
/// never appear. An entity with several categories yields one row per category.
/// Present p-values must lie in (0, 1].
pub fn join_results(
    expanded: &[ExpandedMembership],
    results: &[AssociationResult],
) -> Result<JoinedTable> {
    for result in results {
        if let Some(p) = result.p_value {
            if !is_valid_p_value(p) {
                return Err(EnrichmentError::InvalidPValue {
                    entity: result.entity_id.clone(),
                    p_value: p,
                });
            }
        }
    }

    let mut categories_by_entity: HashMap<&str, Vec<&str>> = HashMap::new();
    for row in expanded {
        categories_by_entity
            .entry(row.entity_id.as_str())
            .or_default()
            .push(row.category.as_str());
    }

    let mut rows = Vec::new();
    let mut unmatched = 0usize;
    let mut missing_p = 0usize;

    for result in results {
        let Some(categories) = categories_by_entity.get(result.entity_id.as_str()) else {
            unmatched += 1;
            continue;
        };
        let Some(p_value) = result.p_value else {
            missing_p += 1;
            continue;
        };

        let score = significance_score(p_value);
        for category in categories {
            rows.push(JoinedRow {
                entity_id: result.entity_id.clone(),
                category: category.to_string(),
                p_value,
                score,
            });
        }
    }

    log::debug!(
        "joined {} association results into {} rows ({} without metadata, {} without p-value)",
        results.len(),
        rows.len(),
        unmatched,
        missing_p
    );

    Ok(JoinedTable::from(rows))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn pair(entity: &str, category: &str) -> ExpandedMembership {
        ExpandedMembership {
            entity_id: entity.to_string(),
            category: category.to_string(),
        }
    }

    #[test]
    fn test_metadata_only_entity_is_dropped() {
        let expanded = vec![pair("d1", "X"), pair("only_meta", "X")];
        let results = vec![AssociationResult::new("d1", 0.01)];
        let table = join_results(&expanded, &results).unwrap();

        assert_eq!(table.len(), 1);
        assert!(table.contains_entity("d1"));
        assert!(!table.contains_entity("only_meta"));
    }

    #[test]
    fn test_results_without_metadata_or_p_value_are_dropped() {
        let expanded = vec![pair("d1", "X"), pair("d2", "Y")];
        let results = vec![
            AssociationResult::new("d1", 0.5),
            AssociationResult::without_p_value("d2"),
            AssociationResult::new("no_meta", 0.01),
        ];
        let table = join_results(&expanded, &results).unwrap();
        assert_eq!(table.len(), 1);
        assert_eq!(table.rows()[0].entity_id, "d1");
    }

    #[test]
    fn test_multi_category_entity_fans_out_and_sorts() {
        let expanded = vec![pair("d1", "X"), pair("d1", "Y"), pair("d2", "X")];
        let results = vec![
            AssociationResult::new("d1", 0.1),
            AssociationResult::new("d2", 0.001),
        ];
        let table = join_results(&expanded, &results).unwrap();

        assert_eq!(table.len(), 3);
        assert_eq!(table.rows()[0].entity_id, "d2");
        assert_relative_eq!(table.rows()[0].score, 3.0, epsilon = 1e-12);
        assert_eq!(table.categories(), vec!["X", "X", "Y"]);
        assert_eq!(
            table.category_counts(),
            vec![("X".to_string(), 2), ("Y".to_string(), 1)]
        );
    }

    #[test]
    fn test_invalid_p_value_aborts() {
        let expanded = vec![pair("d1", "X")];
        for bad in [0.0, -0.1, 1.5, f64::NAN] {
            let results = vec![AssociationResult::new("d1", bad)];
            let err = join_results(&expanded, &results).unwrap_err();
            assert!(matches!(err, EnrichmentError::InvalidPValue { .. }));
        }
    }
}
