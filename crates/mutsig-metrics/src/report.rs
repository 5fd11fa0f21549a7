//! Bundled evaluation report.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use mutsig_common::{MutsigError, Result};

use crate::classification::ConfusionCounts;
use crate::divergence::{jensen_shannon, kl_divergence, mae, mae_per_signature};

/// Every metric for one prediction/label pair of batches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    pub num_samples: usize,
    pub threshold: f32,
    pub mae: f64,
    pub mae_per_signature: Vec<f64>,
    pub kl: f64,
    pub js: f64,
    pub counts: ConfusionCounts,
    pub accuracy: f64,
    pub precision: f64,
    pub sensitivity: f64,
    pub specificity: f64,
    pub fpr: f64,
    pub fnr: f64,
}

impl MetricsReport {
    pub fn compute(pred: &[Vec<f32>], truth: &[Vec<f32>], threshold: f32) -> Result<Self> {
        let counts = ConfusionCounts::from_batches(pred, truth, threshold)?;
        Ok(Self {
            num_samples: pred.len(),
            threshold,
            mae: mae(pred, truth)?,
            mae_per_signature: mae_per_signature(pred, truth)?,
            kl: kl_divergence(pred, truth)?,
            js: jensen_shannon(pred, truth)?,
            accuracy: counts.accuracy(),
            precision: counts.precision(),
            sensitivity: counts.sensitivity(),
            specificity: counts.specificity(),
            fpr: counts.false_positive_rate(),
            fnr: counts.false_negative_rate(),
            counts,
        })
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Reports grouped by (rounded) mutation count, keyed in ascending order.
pub fn metrics_by_mutation_count(
    pred: &[Vec<f32>],
    truth: &[Vec<f32>],
    num_mut: &[f32],
    threshold: f32,
) -> Result<BTreeMap<u64, MetricsReport>> {
    if num_mut.len() != pred.len() {
        return Err(MutsigError::InvalidInput(format!(
            "{} mutation counts for {} rows",
            num_mut.len(),
            pred.len()
        )));
    }

    let mut groups: BTreeMap<u64, Vec<usize>> = BTreeMap::new();
    for (i, n) in num_mut.iter().enumerate() {
        groups.entry(n.max(0.0).round() as u64).or_default().push(i);
    }
    debug!("Evaluating {} mutation-count groups", groups.len());

    groups
        .into_iter()
        .map(|(count, rows)| {
            let p: Vec<Vec<f32>> = rows.iter().map(|&i| pred[i].clone()).collect();
            let t: Vec<Vec<f32>> = rows.iter().map(|&i| truth[i].clone()).collect();
            Ok((count, MetricsReport::compute(&p, &t, threshold)?))
        })
        .collect()
}
