//! Multiple testing correction over the p-values of all tested categories.

use anyhow::{Result, anyhow};
use std::cmp::Ordering;

use crate::testing::CorrectionMethod;

fn validate_p_values(p_values: &[f64]) -> Result<()> {
    if p_values.is_empty() {
        return Err(anyhow!("Empty p-value array"));
    }

    for (i, &p) in p_values.iter().enumerate() {
        if !(0.0..=1.0).contains(&p) {
            return Err(anyhow!("Invalid p-value at index {}: {}", i, p));
        }
    }

    Ok(())
}

/// Per-test significance cut-off of the Bonferroni procedure, `alpha / n_tests`.
pub fn bonferroni_threshold(alpha: f64, n_tests: usize) -> Result<f64> {
    if n_tests == 0 {
        return Err(anyhow!("Bonferroni threshold needs at least one test"));
    }
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(anyhow!("Alpha must be in (0, 1], got {}", alpha));
    }
    Ok(alpha / n_tests as f64)
}

/// Apply Bonferroni correction to p-values
///
/// Each p-value is multiplied by the number of tests and capped at 1.
///
/// # Example
/// ```
/// use drugsets::testing::correction::bonferroni_correction;
///
/// let adjusted = bonferroni_correction(&[0.01, 0.03, 0.5]).unwrap();
/// assert_eq!(adjusted[2], 1.0);
/// ```
pub fn bonferroni_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len() as f64;
    Ok(p_values.iter().map(|&p| (p * n).min(1.0)).collect())
}

/// Apply the Benjamini-Hochberg step-up procedure
///
/// Controls the false discovery rate. The adjusted value of the p-value at
/// ascending rank `k` is `min over j >= k of p_(j) * n / j`, capped at 1.
///
/// # Example
/// ```
/// use drugsets::testing::correction::benjamini_hochberg_correction;
///
/// let adjusted = benjamini_hochberg_correction(&[0.01, 0.02, 0.03]).unwrap();
/// assert!((adjusted[0] - 0.03).abs() < 1e-12);
/// ```
pub fn benjamini_hochberg_correction(p_values: &[f64]) -> Result<Vec<f64>> {
    validate_p_values(p_values)?;
    let n = p_values.len();

    let mut indexed_p_values: Vec<(usize, f64)> =
        p_values.iter().enumerate().map(|(i, &p)| (i, p)).collect();
    indexed_p_values.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));

    let mut adjusted_p_values = vec![0.0; n];
    let mut current_min: f64 = 1.0;

    // largest p-value first so the running minimum enforces monotonicity
    for i in (0..n).rev() {
        let (orig_idx, p_val) = indexed_p_values[i];
        let rank = i + 1;
        let adjustment = (p_val * n as f64 / rank as f64).min(1.0);
        current_min = current_min.min(adjustment);
        adjusted_p_values[orig_idx] = current_min;
    }

    Ok(adjusted_p_values)
}

/// Outcome of a correction over one family of tests.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectedPValues {
    /// Adjusted p-values, one per input p-value
    pub adjusted: Vec<f64>,
    /// Which tests pass the correction
    pub significant: Vec<bool>,
    /// Raw p-value cut-off, for methods that use one
    pub threshold: Option<f64>,
}

/// Correct `p_values` and flag the tests that remain significant at `alpha`.
///
/// Bonferroni compares raw p-values against `alpha / n` with a strict inequality.
/// FDR compares Benjamini-Hochberg adjusted p-values against `alpha`. An empty
/// family yields empty output.
pub fn select_significant(
    p_values: &[f64],
    method: CorrectionMethod,
    alpha: f64,
) -> Result<CorrectedPValues> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(anyhow!("Alpha must be in (0, 1], got {}", alpha));
    }
    if p_values.is_empty() {
        return Ok(CorrectedPValues {
            adjusted: Vec::new(),
            significant: Vec::new(),
            threshold: None,
        });
    }

    match method {
        CorrectionMethod::Bonferroni => {
            let threshold = bonferroni_threshold(alpha, p_values.len())?;
            let adjusted = bonferroni_correction(p_values)?;
            let significant = p_values.iter().map(|&p| p < threshold).collect();
            Ok(CorrectedPValues {
                adjusted,
                significant,
                threshold: Some(threshold),
            })
        }
        CorrectionMethod::Fdr => {
            let adjusted = benjamini_hochberg_correction(p_values)?;
            let significant = adjusted.iter().map(|&q| q < alpha).collect();
            Ok(CorrectedPValues {
                adjusted,
                significant,
                threshold: None,
            })
        }
    }
}
