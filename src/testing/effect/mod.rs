use anyhow::{Result, anyhow};
use std::cmp::Ordering;

/// Receiver operating characteristic curve.
///
/// Points run from the strictest threshold to the loosest. The first point is
/// always `(0, 0)` at an infinite threshold, and each following point sits at a
/// distinct score value.
#[derive(Debug, Clone, PartialEq)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

/// Build the ROC curve of `scores` as a predictor of `labels`.
///
/// Higher scores predict the positive class. Tied scores enter the curve in a
/// single step, so ties contribute a diagonal segment. When one class is absent
/// the corresponding rate is undefined and filled with NaN.
pub fn roc_curve(labels: &[bool], scores: &[f64]) -> Result<RocCurve> {
    if labels.len() != scores.len() {
        return Err(anyhow!(
            "Label and score lengths differ: {} vs {}",
            labels.len(),
            scores.len()
        ));
    }
    if scores.is_empty() {
        return Err(anyhow!("Empty score array"));
    }
    if let Some(i) = scores.iter().position(|s| s.is_nan()) {
        return Err(anyhow!("Invalid score at index {}: NaN", i));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].partial_cmp(&scores[a]).unwrap_or(Ordering::Equal));

    let mut tps = vec![0.0];
    let mut fps = vec![0.0];
    let mut thresholds = vec![f64::INFINITY];

    let (mut tp, mut fp) = (0.0, 0.0);
    for (pos, &idx) in order.iter().enumerate() {
        if labels[idx] {
            tp += 1.0;
        } else {
            fp += 1.0;
        }

        let last_of_value = order
            .get(pos + 1)
            .map_or(true, |&next| scores[next] != scores[idx]);
        if last_of_value {
            tps.push(tp);
            fps.push(fp);
            thresholds.push(scores[idx]);
        }
    }

    // 0/0 yields NaN when a class is absent
    let fpr = fps.iter().map(|&f| f / fp).collect();
    let tpr = tps.iter().map(|&t| t / tp).collect();

    Ok(RocCurve { fpr, tpr, thresholds })
}

/// Area under a curve by the trapezoidal rule. `x` must be monotonic.
pub fn auc(x: &[f64], y: &[f64]) -> Result<f64> {
    if x.len() != y.len() {
        return Err(anyhow!("x and y lengths differ: {} vs {}", x.len(), y.len()));
    }
    if x.len() < 2 {
        return Err(anyhow!(
            "At least 2 points are needed to compute area under curve, got {}",
            x.len()
        ));
    }

    let area: f64 = x
        .windows(2)
        .zip(y.windows(2))
        .map(|(xs, ys)| (xs[1] - xs[0]) * (ys[1] + ys[0]) / 2.0)
        .sum();

    // a decreasing x gives a negative area
    Ok(area.abs())
}

/// Area under the ROC curve of `scores` predicting `labels`.
///
/// Returns NaN when all labels belong to one class.
pub fn roc_auc_score(labels: &[bool], scores: &[f64]) -> Result<f64> {
    let curve = roc_curve(labels, scores)?;
    let positives = labels.iter().filter(|&&l| l).count();
    if positives == 0 || positives == labels.len() {
        log::debug!("ROC AUC undefined: only one class among {} scores", labels.len());
        return Ok(f64::NAN);
    }
    auc(&curve.fpr, &curve.tpr)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_roc_curve_points() {
        let labels = [true, false, true, false];
        let scores = [0.8, 0.4, 0.35, 0.1];
        let curve = roc_curve(&labels, &scores).unwrap();

        assert_eq!(curve.fpr, vec![0.0, 0.0, 0.5, 0.5, 1.0]);
        assert_eq!(curve.tpr, vec![0.0, 0.5, 0.5, 1.0, 1.0]);
        assert!(curve.thresholds[0].is_infinite());
        assert_relative_eq!(roc_auc_score(&labels, &scores).unwrap(), 0.75);
    }

    #[test]
    fn test_ties_count_half() {
        let labels = [true, false];
        let scores = [1.0, 1.0];
        let curve = roc_curve(&labels, &scores).unwrap();
        assert_eq!(curve.fpr.len(), 2);
        assert_relative_eq!(roc_auc_score(&labels, &scores).unwrap(), 0.5);
    }

    #[test]
    fn test_perfect_and_inverted_separation() {
        let labels = [true, true, false, false];
        assert_relative_eq!(roc_auc_score(&labels, &[4.0, 3.0, 2.0, 1.0]).unwrap(), 1.0);
        assert_relative_eq!(roc_auc_score(&labels, &[1.0, 2.0, 3.0, 4.0]).unwrap(), 0.0);
    }

    #[test]
    fn test_single_class_is_nan() {
        let auc = roc_auc_score(&[true, true], &[1.0, 2.0]).unwrap();
        assert!(auc.is_nan());
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(roc_curve(&[true], &[1.0, 2.0]).is_err());
        assert!(roc_curve(&[], &[]).is_err());
        assert!(roc_curve(&[true, false], &[f64::NAN, 1.0]).is_err());
        assert!(auc(&[0.0], &[0.0]).is_err());
    }

    #[test]
    fn test_trapezoid() {
        let area = auc(&[0.0, 0.5, 1.0], &[0.0, 1.0, 1.0]).unwrap();
        assert_relative_eq!(area, 0.75);
    }
}
