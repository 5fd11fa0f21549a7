//! Realism filter in front of the router.
//!
//! Samples the classifier scores at or below `REALISM_THRESHOLD` are dropped
//! before refinement, so the refined batch can be smaller than the input.
//! `kept_indices` records which input rows survived.

use candle_core::{Tensor, D};
use tracing::info;

use crate::classifier::RealismClassifier;
use crate::device::ensure_device;
use crate::error::{ModelError, Result};
use crate::router::CombinedCorrector;

/// Minimum realism probability (exclusive) for a sample to be refined.
pub const REALISM_THRESHOLD: f32 = 0.5;

/// A batch on its way into refinement.
pub struct RefineBatch<'a> {
    pub spectra: &'a Tensor,
    pub baseline: &'a Tensor,
    pub num_mut: &'a Tensor,
}

/// Refined survivors of the realism filter.
#[derive(Debug)]
pub struct RefinedBatch {
    /// Refined weights, survivors × K (unknown column stripped)
    pub weights: Option<Tensor>,
    pub num_mut: Vec<f32>,
    pub scores: Vec<f32>,
    /// Input row of every surviving sample, ascending
    pub kept_indices: Vec<usize>,
    pub input_len: usize,
}

impl RefinedBatch {
    pub fn dropped(&self) -> usize {
        self.input_len - self.kept_indices.len()
    }
}

/// Classify, keep realistic samples and refine them.
///
/// Spectra, baseline guesses, mutation counts and scores are filtered with
/// the same index set. `weights` is `None` when no sample survives.
pub fn refine_realistic(
    router: &CombinedCorrector,
    classifier: &dyn RealismClassifier,
    batch: &RefineBatch<'_>,
    floor: f32,
) -> Result<RefinedBatch> {
    for t in [batch.spectra, batch.baseline, batch.num_mut] {
        ensure_device(router.device(), t)?;
    }
    let (n, _) = batch.spectra.dims2()?;
    let (_, k) = batch.baseline.dims2()?;

    let scores = classifier.score(batch.spectra, batch.num_mut)?.flatten_all()?.to_vec1::<f32>()?;
    if scores.len() != n {
        return Err(ModelError::InvalidInput(format!(
            "classifier returned {} scores for {} samples",
            scores.len(),
            n
        )));
    }
    let counts = batch.num_mut.flatten_all()?.to_vec1::<f32>()?;

    let kept_indices: Vec<usize> = scores
        .iter()
        .enumerate()
        .filter(|(_, p)| **p > REALISM_THRESHOLD)
        .map(|(i, _)| i)
        .collect();
    info!(
        "Realism filter kept {} of {} samples",
        kept_indices.len(),
        n
    );

    let kept_scores: Vec<f32> = kept_indices.iter().map(|&i| scores[i]).collect();
    let kept_counts: Vec<f32> = kept_indices.iter().map(|&i| counts[i]).collect();
    if kept_indices.is_empty() {
        return Ok(RefinedBatch {
            weights: None,
            num_mut: kept_counts,
            scores: kept_scores,
            kept_indices,
            input_len: n,
        });
    }

    let idx: Vec<u32> = kept_indices.iter().map(|&i| i as u32).collect();
    let idx = Tensor::from_vec(idx, kept_indices.len(), router.device())?;
    let spectra = batch.spectra.index_select(&idx, 0)?;
    let baseline = batch.baseline.index_select(&idx, 0)?;
    let num_mut = Tensor::from_vec(kept_counts.clone(), kept_indices.len(), router.device())?;

    let refined = router.correct(&spectra, &baseline, &num_mut, floor)?;
    let width = refined.dim(D::Minus1)?;
    let weights = if width > k {
        refined.narrow(1, 0, k)?
    } else {
        refined
    };

    Ok(RefinedBatch {
        weights: Some(weights),
        num_mut: kept_counts,
        scores: kept_scores,
        kept_indices,
        input_len: n,
    })
}
