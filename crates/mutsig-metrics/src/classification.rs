//! Presence/absence calls by thresholding weights.
//!
//! A signature is called present in a sample when its weight is strictly
//! greater than the threshold. Every rate whose denominator is zero is
//! reported as 0.0, never NaN.

use serde::{Deserialize, Serialize};

use mutsig_common::Result;

use crate::check_shapes;

/// Weight above which a signature counts as present.
pub const DEFAULT_THRESHOLD: f32 = 0.05;

/// Confusion counts over (sample, signature) cells.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionCounts {
    pub tp: u64,
    pub fp: u64,
    pub tn: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
}

impl ConfusionCounts {
    /// Counts over every cell of the batch.
    pub fn from_batches(pred: &[Vec<f32>], truth: &[Vec<f32>], threshold: f32) -> Result<Self> {
        check_shapes(pred, truth)?;
        let mut counts = Self::default();
        for (p, t) in pred.iter().zip(truth) {
            for (a, b) in p.iter().zip(t) {
                counts.record(*a > threshold, *b > threshold);
            }
        }
        Ok(counts)
    }

    /// Counts for each signature column separately.
    pub fn per_signature(
        pred: &[Vec<f32>],
        truth: &[Vec<f32>],
        threshold: f32,
    ) -> Result<Vec<Self>> {
        let k = check_shapes(pred, truth)?;
        let mut counts = vec![Self::default(); k];
        for (p, t) in pred.iter().zip(truth) {
            for (j, (a, b)) in p.iter().zip(t).enumerate() {
                counts[j].record(*a > threshold, *b > threshold);
            }
        }
        Ok(counts)
    }

    fn record(&mut self, predicted: bool, actual: bool) {
        match (predicted, actual) {
            (true, true) => self.tp += 1,
            (true, false) => self.fp += 1,
            (false, false) => self.tn += 1,
            (false, true) => self.fn_ += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.tp + self.fp + self.tn + self.fn_
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    /// True positive rate (recall).
    pub fn sensitivity(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    /// True negative rate.
    pub fn specificity(&self) -> f64 {
        ratio(self.tn, self.tn + self.fp)
    }

    pub fn false_positive_rate(&self) -> f64 {
        ratio(self.fp, self.fp + self.tn)
    }

    pub fn false_negative_rate(&self) -> f64 {
        ratio(self.fn_, self.fn_ + self.tp)
    }
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_and_rates() {
        let pred = vec![vec![0.6, 0.04, 0.36], vec![0.0, 0.9, 0.1]];
        let truth = vec![vec![0.5, 0.5, 0.0], vec![0.0, 1.0, 0.0]];
        let c = ConfusionCounts::from_batches(&pred, &truth, DEFAULT_THRESHOLD).unwrap();

        assert_eq!(c, ConfusionCounts { tp: 2, fp: 2, tn: 1, fn_: 1 });
        assert!((c.accuracy() - 0.5).abs() < 1e-12);
        assert!((c.precision() - 0.5).abs() < 1e-12);
        assert!((c.sensitivity() - 2.0 / 3.0).abs() < 1e-12);
        assert!((c.specificity() - 1.0 / 3.0).abs() < 1e-12);
        assert!((c.false_positive_rate() + c.specificity() - 1.0).abs() < 1e-12);
        assert!((c.false_negative_rate() + c.sensitivity() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_is_strict() {
        let c = ConfusionCounts::from_batches(&[vec![0.05]], &[vec![0.05]], 0.05).unwrap();
        assert_eq!(c.tn, 1);
    }

    #[test]
    fn test_all_zero_label_column_is_defined() {
        let pred = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let truth = vec![vec![0.0, 0.0], vec![0.0, 0.0]];
        let c = ConfusionCounts::from_batches(&pred, &truth, DEFAULT_THRESHOLD).unwrap();

        assert_eq!(c.precision(), 0.0);
        assert_eq!(c.sensitivity(), 0.0);
        assert_eq!(c.false_negative_rate(), 0.0);
        assert_eq!(c.specificity(), 1.0);
        assert_eq!(c.accuracy(), 1.0);
    }

    #[test]
    fn test_per_signature_counts_sum_to_total() {
        let pred = vec![vec![0.6, 0.0, 0.4], vec![0.1, 0.9, 0.0]];
        let truth = vec![vec![0.5, 0.5, 0.0], vec![0.0, 1.0, 0.0]];
        let per = ConfusionCounts::per_signature(&pred, &truth, DEFAULT_THRESHOLD).unwrap();
        let all = ConfusionCounts::from_batches(&pred, &truth, DEFAULT_THRESHOLD).unwrap();

        assert_eq!(per.len(), 3);
        assert_eq!(per.iter().map(|c| c.tp).sum::<u64>(), all.tp);
        assert_eq!(per.iter().map(|c| c.total()).sum::<u64>(), all.total());
    }
}
