/// Significance score of a p-value, `|log10(p)|`. Higher is more significant.
pub fn significance_score(p_value: f64) -> f64 {
    p_value.log10().abs()
}

/// Whether `p_value` is a usable probability in (0, 1].
pub(crate) fn is_valid_p_value(p_value: f64) -> bool {
    p_value > 0.0 && p_value <= 1.0
}
