//! Drug category enrichment among gene-set analysis results.
//!
//! Metadata rows carry zero or more category labels per drug. They are expanded
//! to one row per (drug, category) pair, joined to the per-drug association
//! results, and every category with enough members is tested for whether its
//! drugs rank higher than the rest.
//!
//! ## Steps
//!
//! - **Expansion** (`expand_categories`): one row per (entity, category) pair
//! - **Join** (`join_results`): attach p-values and `|log10(p)|` scores
//! - **Engine** (`run_enrichment`): one-sided Mann-Whitney U, ROC AUC, and
//!   Bonferroni or FDR correction per eligible category
//!
//! ## Quick Example
//!
//! ```rust
//! use drugsets::enrichment::{AssociationResult, CategoryMembership, EnrichmentConfig, enrich};
//!
//! let results = vec![
//!     AssociationResult::new("D1", 0.01),
//!     AssociationResult::new("D2", 0.2),
//!     AssociationResult::new("D3", 0.0001),
//! ];
//! let metadata = vec![
//!     CategoryMembership::new("D1", ["X"]),
//!     CategoryMembership::new("D2", ["Y"]),
//!     CategoryMembership::new("D3", ["X"]),
//! ];
//! let config = EnrichmentConfig::default().with_min_sample_size(2.0);
//! let enrichment = enrich(&metadata, &results, &config).unwrap();
//! assert_eq!(enrichment.all.len(), 1);
//! assert_eq!(enrichment.all[0].group, "X");
//! ```

mod engine;
mod expansion;
mod join;
pub(crate) mod utils;

pub use engine::{
    CategoryResult, DEFAULT_ALPHA, DEFAULT_MIN_SAMPLE_SIZE, EnrichmentConfig, EnrichmentResults,
    eligible_categories, enrich, run_enrichment, test_category,
};
pub use expansion::{CategoryMembership, ExpandedMembership, expand_categories};
pub use join::{AssociationResult, JoinedRow, JoinedTable, join_results};
pub use utils::significance_score;

/// Kind of drug category tested for enrichment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryKind {
    /// ATC level III therapeutic class
    Atc,
    /// Mechanism of action
    Moa,
    /// Clinical indication
    Ind,
}

impl CategoryKind {
    pub const ALL: [CategoryKind; 3] = [CategoryKind::Atc, CategoryKind::Moa, CategoryKind::Ind];

    /// Column of the drug metadata table holding this kind of label.
    pub fn metadata_column(&self) -> &'static str {
        match self {
            CategoryKind::Atc => "Therapeutic_classification_level_III_ATC",
            CategoryKind::Moa => "moa",
            CategoryKind::Ind => "indication",
        }
    }

    /// Short name used in reports and output file names.
    pub fn short_name(&self) -> &'static str {
        match self {
            CategoryKind::Atc => "atc",
            CategoryKind::Moa => "moa",
            CategoryKind::Ind => "ind",
        }
    }
}

impl std::fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.short_name())
    }
}

impl std::str::FromStr for CategoryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "atc" => Ok(CategoryKind::Atc),
            "moa" => Ok(CategoryKind::Moa),
            "ind" | "indication" => Ok(CategoryKind::Ind),
            other => Err(format!(
                "unknown drug category '{}', use 'atc', 'moa' or 'ind'",
                other
            )),
        }
    }
}
