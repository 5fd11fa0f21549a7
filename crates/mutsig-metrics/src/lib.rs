//! mutsig-metrics — compare predicted and true weight batches.
//!
//! Batches are row-major (`&[Vec<f32>]`, one row per sample). Every metric
//! accumulates sequentially in `f64`, so evaluating the same inputs twice is
//! bit-identical.

pub mod classification;
pub mod divergence;
pub mod report;

pub use classification::{ConfusionCounts, DEFAULT_THRESHOLD};
pub use divergence::{
    jensen_shannon, jensen_shannon_rows, kl_divergence, mae, mae_per_signature, EPSILON,
};
pub use report::{metrics_by_mutation_count, MetricsReport};

use mutsig_common::{MutsigError, Result};

/// Both batches must be non-empty with identical N×K shape.
pub(crate) fn check_shapes(pred: &[Vec<f32>], truth: &[Vec<f32>]) -> Result<usize> {
    if pred.len() != truth.len() {
        return Err(MutsigError::InvalidInput(format!(
            "prediction has {} rows, labels have {}",
            pred.len(),
            truth.len()
        )));
    }
    let Some(first) = truth.first() else {
        return Err(MutsigError::InvalidInput("empty batch".to_string()));
    };
    let k = first.len();
    for (i, (p, t)) in pred.iter().zip(truth).enumerate() {
        if p.len() != k || t.len() != k {
            return Err(MutsigError::InvalidInput(format!(
                "row {}: prediction has {} columns, label has {}, expected {}",
                i,
                p.len(),
                t.len(),
                k
            )));
        }
    }
    Ok(k)
}
