use std::collections::HashSet;

/// Metadata row of one entity with its zero or more category labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryMembership {
    pub entity_id: String,
    pub categories: Option<Vec<String>>,
}

impl CategoryMembership {
    pub fn new<I, S>(entity_id: impl Into<String>, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CategoryMembership {
            entity_id: entity_id.into(),
            categories: Some(categories.into_iter().map(Into::into).collect()),
        }
    }

    /// Entity without any category label.
    pub fn unlabeled(entity_id: impl Into<String>) -> Self {
        CategoryMembership {
            entity_id: entity_id.into(),
            categories: None,
        }
    }
}

/// One (entity, category) pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ExpandedMembership {
    pub entity_id: String,
    pub category: String,
}

impl From<ExpandedMembership> for CategoryMembership {
    fn from(row: ExpandedMembership) -> Self {
        CategoryMembership {
            entity_id: row.entity_id,
            categories: Some(vec![row.category]),
        }
    }
}

/// Fan multi-valued memberships out into one row per (entity, category) pair.
///
/// Rows keep input order and labels keep their listed order. A label repeated
/// within one row is emitted once; blank labels and rows without labels
/// contribute nothing.
pub fn expand_categories(memberships: &[CategoryMembership]) -> Vec<ExpandedMembership> {
    let mut expanded = Vec::with_capacity(memberships.len());
    let mut unlabeled = 0usize;

    for membership in memberships {
        let Some(categories) = &membership.categories else {
            unlabeled += 1;
            continue;
        };

        let mut seen: HashSet<&str> = HashSet::with_capacity(categories.len());
        let before = expanded.len();
        for category in categories {
            let category = category.trim();
            if category.is_empty() || !seen.insert(category) {
                continue;
            }
            expanded.push(ExpandedMembership {
                entity_id: membership.entity_id.clone(),
                category: category.to_string(),
            });
        }
        if expanded.len() == before {
            unlabeled += 1;
        }
    }

    log::debug!(
        "expanded {} memberships into {} (entity, category) pairs, {} without labels",
        memberships.len(),
        expanded.len(),
        unlabeled
    );
    expanded
}
