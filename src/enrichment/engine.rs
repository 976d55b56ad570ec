use rayon::prelude::*;
use serde::Serialize;

use crate::enrichment::expansion::{CategoryMembership, expand_categories};
use crate::enrichment::join::{AssociationResult, JoinedTable, join_results};
use crate::error::{EnrichmentError, Result};
use crate::testing::correction::select_significant;
use crate::testing::inference::ScoreGroupTests;
use crate::testing::utils::membership_mask;
use crate::testing::{Alternative, CorrectionMethod, RankSumMethod};

pub const DEFAULT_MIN_SAMPLE_SIZE: f64 = 5.0;
pub const DEFAULT_ALPHA: f64 = 0.05;

/// Parameters of one enrichment run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnrichmentConfig {
    /// Categories with fewer joined rows than this are not tested. May be fractional.
    pub min_sample_size: f64,
    pub correction: CorrectionMethod,
    pub alpha: f64,
    pub rank_sum_method: RankSumMethod,
    /// Evaluate categories on the rayon pool
    pub parallel: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        EnrichmentConfig {
            min_sample_size: DEFAULT_MIN_SAMPLE_SIZE,
            correction: CorrectionMethod::Bonferroni,
            alpha: DEFAULT_ALPHA,
            rank_sum_method: RankSumMethod::Auto,
            parallel: false,
        }
    }
}

impl EnrichmentConfig {
    pub fn with_min_sample_size(mut self, min_sample_size: f64) -> Self {
        self.min_sample_size = min_sample_size;
        self
    }

    pub fn with_correction(mut self, correction: CorrectionMethod) -> Self {
        self.correction = correction;
        self
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_rank_sum_method(mut self, method: RankSumMethod) -> Self {
        self.rank_sum_method = method;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_sample_size.is_nan() {
            return Err(EnrichmentError::InvalidConfig(
                "minimum sample size is NaN".to_string(),
            ));
        }
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(EnrichmentError::InvalidConfig(format!(
                "alpha must be in (0, 1], got {}",
                self.alpha
            )));
        }
        Ok(())
    }
}

/// Test outcome for one category.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryResult {
    #[serde(rename = "GROUP")]
    pub group: String,
    /// U statistic of the category members against all other rows
    #[serde(rename = "MWU")]
    pub mwu: f64,
    #[serde(rename = "P")]
    pub p_value: f64,
    #[serde(rename = "AUC")]
    pub auc: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnrichmentResults {
    /// One row per eligible category, in eligibility order
    pub all: Vec<CategoryResult>,
    /// Rows of `all` that pass the correction
    pub significant: Vec<CategoryResult>,
    /// Adjusted p-values aligned with `all`
    pub adjusted_p_values: Vec<f64>,
    /// Raw p-value cut-off (Bonferroni only)
    pub threshold: Option<f64>,
    pub correction: CorrectionMethod,
}

impl EnrichmentResults {
    fn empty(correction: CorrectionMethod) -> Self {
        EnrichmentResults {
            all: Vec::new(),
            significant: Vec::new(),
            adjusted_p_values: Vec::new(),
            threshold: None,
            correction,
        }
    }

    /// Number of categories tested.
    pub fn n_tested(&self) -> usize {
        self.all.len()
    }

    pub fn get(&self, group: &str) -> Option<&CategoryResult> {
        self.all.iter().find(|r| r.group == group)
    }
}

/// Categories with at least `min_sample_size` rows, largest first, ties by label.
pub fn eligible_categories(table: &JoinedTable, min_sample_size: f64) -> Vec<(String, usize)> {
    table
        .category_counts()
        .into_iter()
        .filter(|(_, count)| *count as f64 >= min_sample_size)
        .collect()
}

fn score_category(
    scores: &[f64],
    labels: &[&str],
    category: &str,
    method: RankSumMethod,
) -> Result<CategoryResult> {
    let in_category = membership_mask(labels, category);
    let test = scores.mann_whitney_test(&in_category, Alternative::Greater, method)?;
    let auc = scores.roc_auc(&in_category)?;

    Ok(CategoryResult {
        group: category.to_string(),
        mwu: test.statistic,
        p_value: test.p_value,
        auc,
    })
}

/// Rank-sum test and AUC of one category against every other row of `table`.
pub fn test_category(
    table: &JoinedTable,
    category: &str,
    method: RankSumMethod,
) -> Result<CategoryResult> {
    score_category(&table.scores(), &table.categories(), category, method)
}

/// Test every eligible category of `table` and apply the configured correction.
///
/// With no eligible category both output tables are empty. The Bonferroni
/// denominator is the number of eligible categories.
pub fn run_enrichment(table: &JoinedTable, config: &EnrichmentConfig) -> Result<EnrichmentResults> {
    config.validate()?;

    let eligible = eligible_categories(table, config.min_sample_size);
    let n_categories = table.category_counts().len();
    if eligible.is_empty() {
        log::warn!(
            "no category reaches the minimum sample size of {} ({} categories in {} rows); nothing to test",
            config.min_sample_size,
            n_categories,
            table.len()
        );
        return Ok(EnrichmentResults::empty(config.correction));
    }

    log::info!(
        "testing {} of {} categories with at least {} members",
        eligible.len(),
        n_categories,
        config.min_sample_size
    );

    let scores = table.scores();
    let labels = table.categories();
    let method = config.rank_sum_method;

    let all: Vec<CategoryResult> = if config.parallel {
        eligible
            .par_iter()
            .map(|(category, _)| score_category(&scores, &labels, category, method))
            .collect::<Result<_>>()?
    } else {
        eligible
            .iter()
            .map(|(category, _)| score_category(&scores, &labels, category, method))
            .collect::<Result<_>>()?
    };

    let p_values: Vec<f64> = all.iter().map(|r| r.p_value).collect();
    let corrected = select_significant(&p_values, config.correction, config.alpha)?;

    let significant: Vec<CategoryResult> = all
        .iter()
        .zip(&corrected.significant)
        .filter(|(_, keep)| **keep)
        .map(|(row, _)| row.clone())
        .collect();

    match corrected.threshold {
        Some(threshold) => log::info!(
            "{} of {} categories significant ({} threshold {:.3e})",
            significant.len(),
            all.len(),
            config.correction.tag(),
            threshold
        ),
        None => log::info!(
            "{} of {} categories significant ({} alpha {})",
            significant.len(),
            all.len(),
            config.correction.tag(),
            config.alpha
        ),
    }

    Ok(EnrichmentResults {
        all,
        significant,
        adjusted_p_values: corrected.adjusted,
        threshold: corrected.threshold,
        correction: config.correction,
    })
}

/// Expand `memberships`, join them to `results` and run the enrichment tests.
pub fn enrich(
    memberships: &[CategoryMembership],
    results: &[AssociationResult],
    config: &EnrichmentConfig,
) -> Result<EnrichmentResults> {
    let expanded = expand_categories(memberships);
    let table = join_results(&expanded, results)?;
    run_enrichment(&table, config)
}
