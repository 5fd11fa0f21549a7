//! Error and divergence metrics averaged over samples.
//!
//! Divergences smooth each row with `EPSILON` and renormalise it before
//! taking logs, so zero weights and rows that do not sum to one (e.g. an
//! estimate with unexplained mass) stay finite.

use mutsig_common::Result;

use crate::check_shapes;

/// Smoothing added to every entry before taking logarithms.
pub const EPSILON: f64 = 1e-6;

/// Mean absolute error over all cells.
pub fn mae(pred: &[Vec<f32>], truth: &[Vec<f32>]) -> Result<f64> {
    let k = check_shapes(pred, truth)?;
    let mut total = 0.0f64;
    for (p, t) in pred.iter().zip(truth) {
        for (a, b) in p.iter().zip(t) {
            total += (*a as f64 - *b as f64).abs();
        }
    }
    Ok(total / (pred.len() * k) as f64)
}

/// Mean absolute error per signature column.
pub fn mae_per_signature(pred: &[Vec<f32>], truth: &[Vec<f32>]) -> Result<Vec<f64>> {
    let k = check_shapes(pred, truth)?;
    let mut totals = vec![0.0f64; k];
    for (p, t) in pred.iter().zip(truth) {
        for (j, (a, b)) in p.iter().zip(t).enumerate() {
            totals[j] += (*a as f64 - *b as f64).abs();
        }
    }
    let n = pred.len() as f64;
    Ok(totals.into_iter().map(|s| s / n).collect())
}

/// Mean `KL(truth ‖ pred)` over samples.
pub fn kl_divergence(pred: &[Vec<f32>], truth: &[Vec<f32>]) -> Result<f64> {
    check_shapes(pred, truth)?;
    let mut total = 0.0f64;
    for (p, t) in pred.iter().zip(truth) {
        total += kl_row(&smooth(t), &smooth(p));
    }
    Ok(total / pred.len() as f64)
}

/// Mean Jensen–Shannon divergence (natural log, bounded by ln 2).
pub fn jensen_shannon(pred: &[Vec<f32>], truth: &[Vec<f32>]) -> Result<f64> {
    let per_row = jensen_shannon_rows(pred, truth)?;
    Ok(per_row.iter().sum::<f64>() / per_row.len() as f64)
}

/// Jensen–Shannon divergence of every row pair.
pub fn jensen_shannon_rows(pred: &[Vec<f32>], truth: &[Vec<f32>]) -> Result<Vec<f64>> {
    check_shapes(pred, truth)?;
    Ok(pred
        .iter()
        .zip(truth)
        .map(|(p, t)| {
            let (p, t) = (smooth(p), smooth(t));
            let m: Vec<f64> = p.iter().zip(&t).map(|(a, b)| 0.5 * (a + b)).collect();
            0.5 * kl_row(&p, &m) + 0.5 * kl_row(&t, &m)
        })
        .collect())
}

fn smooth(row: &[f32]) -> Vec<f64> {
    let shifted: Vec<f64> = row.iter().map(|v| (*v as f64).max(0.0) + EPSILON).collect();
    let sum: f64 = shifted.iter().sum();
    shifted.into_iter().map(|v| v / sum).collect()
}

fn kl_row(p: &[f64], q: &[f64]) -> f64 {
    p.iter().zip(q).map(|(a, b)| a * (a / b).ln()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mae() {
        let pred = vec![vec![0.5, 0.5], vec![1.0, 0.0]];
        let truth = vec![vec![1.0, 0.0], vec![1.0, 0.0]];
        assert!((mae(&pred, &truth).unwrap() - 0.25).abs() < 1e-12);
        assert_eq!(mae_per_signature(&pred, &truth).unwrap(), vec![0.25, 0.25]);
    }

    #[test]
    fn test_identical_rows_have_zero_divergence() {
        let rows = vec![vec![0.2, 0.3, 0.5], vec![0.0, 1.0, 0.0]];
        assert!(kl_divergence(&rows, &rows).unwrap().abs() < 1e-12);
        assert!(jensen_shannon(&rows, &rows).unwrap().abs() < 1e-12);
    }

    #[test]
    fn test_js_bounded_and_symmetric() {
        let a = vec![vec![1.0, 0.0]];
        let b = vec![vec![0.0, 1.0]];
        let ab = jensen_shannon(&a, &b).unwrap();
        let ba = jensen_shannon(&b, &a).unwrap();
        assert!((ab - ba).abs() < 1e-12);
        assert!(ab > 0.0 && ab <= std::f64::consts::LN_2);
    }

    #[test]
    fn test_kl_finite_with_zero_prediction() {
        let pred = vec![vec![0.0, 0.0]];
        let truth = vec![vec![0.7, 0.3]];
        let kl = kl_divergence(&pred, &truth).unwrap();
        assert!(kl.is_finite() && kl >= 0.0);
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        assert!(mae(&[vec![0.1, 0.2]], &[vec![0.1]]).is_err());
        assert!(mae(&[vec![0.1]], &[vec![0.1], vec![0.2]]).is_err());
        assert!(mae(&[], &[]).is_err());
    }
}
