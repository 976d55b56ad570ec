use single_utilities::traits::FloatOps;
use std::collections::HashMap;

pub mod correction;
pub mod effect;
pub mod inference;

pub mod utils;

/// How the rank-sum p-value is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RankSumMethod {
    /// Normal approximation with continuity and tie correction
    Asymptotic,
    /// Exact null distribution of U (no ties)
    Exact,
    /// Exact for small groups without ties, asymptotic otherwise
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alternative {
    TwoSided,
    Less,
    Greater,
}

/// Multiple testing correction applied to the per-category p-values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionMethod {
    /// Family-wise control: significant iff `p < alpha / n_tests`
    #[default]
    Bonferroni,
    /// Benjamini-Hochberg step-up: significant iff `p_adj < alpha`
    Fdr,
}

impl CorrectionMethod {
    /// Short tag used in output file names.
    pub fn tag(&self) -> &'static str {
        match self {
            CorrectionMethod::Bonferroni => "bonf",
            CorrectionMethod::Fdr => "fdr",
        }
    }
}

impl std::str::FromStr for CorrectionMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bonf" | "bonferroni" => Ok(CorrectionMethod::Bonferroni),
            "fdr" | "bh" => Ok(CorrectionMethod::Fdr),
            other => Err(format!(
                "unknown correction method '{}', use 'bonf' or 'fdr'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TestResult<T> {
    /// The test statistic value (U of the first group for rank-sum tests)
    pub statistic: T,
    /// The p-value of the test
    pub p_value: T,
    /// Effect size measurement
    pub effect_size: Option<T>,
    /// Standard error of the test statistic
    pub standard_error: Option<T>,
    /// Additional test-specific information
    pub metadata: HashMap<String, T>,
}

impl<T> TestResult<T>
where
    T: FloatOps,
{
    /// Create a new test result with minimal information
    pub fn new(statistic: T, p_value: T) -> Self {
        TestResult {
            statistic,
            p_value,
            effect_size: None,
            standard_error: None,
            metadata: HashMap::new(),
        }
    }

    /// Create a new test result with effect size
    pub fn with_effect_size(statistic: T, p_value: T, effect_size: T) -> Self {
        TestResult {
            statistic,
            p_value,
            effect_size: Some(effect_size),
            standard_error: None,
            metadata: HashMap::new(),
        }
    }

    /// Add standard error to the result
    pub fn with_standard_error(mut self, se: T) -> Self {
        self.standard_error = Some(se);
        self
    }

    /// Add additional metadata
    pub fn with_metadata(mut self, key: &str, value: T) -> Self {
        self.metadata.insert(key.to_string(), value);
        self
    }
}
