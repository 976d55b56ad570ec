use single_utilities::traits::FloatOps;
use crate::testing::{Alternative, RankSumMethod, TestResult};

pub mod nonparametric;

/// Group-versus-rest tests over a column of scores.
pub trait ScoreGroupTests<T>
where
    T: FloatOps,
{
    /// Rank-sum test of the scores flagged in `in_group` against every other score.
    fn mann_whitney_test(
        &self,
        in_group: &[bool],
        alternative: Alternative,
        method: RankSumMethod,
    ) -> anyhow::Result<TestResult<T>>;

    /// Area under the ROC curve using membership as the label and the score as the signal.
    fn roc_auc(&self, in_group: &[bool]) -> anyhow::Result<f64>;
}

impl<T> ScoreGroupTests<T> for [T]
where
    T: FloatOps,
{
    fn mann_whitney_test(
        &self,
        in_group: &[bool],
        alternative: Alternative,
        method: RankSumMethod,
    ) -> anyhow::Result<TestResult<T>> {
        nonparametric::mann_whitney_mask(self, in_group, alternative, method)
    }

    fn roc_auc(&self, in_group: &[bool]) -> anyhow::Result<f64> {
        let scores: Vec<f64> = self
            .iter()
            .map(|s| s.to_f64().unwrap_or(f64::NAN))
            .collect();
        crate::testing::effect::roc_auc_score(in_group, &scores)
    }
}
