//! Sample router: split a batch by mutation count, correct each part with
//! its own model, and stitch the results back into input order.

use candle_core::{Device, Tensor};
use tracing::debug;

use crate::device::ensure_device;
use crate::error::{ModelError, Result};

/// Inputs handed to a corrector for one partition.
pub struct CorrectorInput<'a> {
    /// Normalized spectra, N×C
    pub spectra: &'a Tensor,
    /// Baseline guesses, N×K
    pub baseline: &'a Tensor,
    /// Mutation counts, N
    pub num_mut: &'a Tensor,
    /// Weights below this are zeroed
    pub floor: f32,
}

/// A pretrained model that maps a partition to refined weights (one row per
/// input row, in the same order).
pub trait Corrector: Send + Sync {
    fn correct(&self, input: &CorrectorInput<'_>) -> Result<Tensor>;
}

/// Row indices of each routing branch, ascending.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Partition {
    pub low: Vec<usize>,
    pub high: Vec<usize>,
}

impl Partition {
    /// Row `i` is low when `num_mut[i] <= cutoff`, high otherwise
    /// (including a NaN count).
    pub fn by_cutoff(num_mut: &[f32], cutoff: f32) -> Self {
        let mut partition = Self::default();
        for (i, n) in num_mut.iter().enumerate() {
            if *n <= cutoff {
                partition.low.push(i);
            } else {
                partition.high.push(i);
            }
        }
        partition
    }
}

/// Restore input order from independently corrected parts.
///
/// Each part carries the original indices of its rows. Rows are tagged with
/// those indices, concatenated, sorted by tag and checked to form exactly
/// `0..n`; any duplicate or missing index is a `MergeInvariant` error.
pub fn merge_in_order(parts: &[(&[usize], Tensor)], n: usize) -> Result<Tensor> {
    let mut tags: Vec<usize> = Vec::with_capacity(n);
    let mut rows: Vec<&Tensor> = Vec::with_capacity(parts.len());
    for (indices, output) in parts {
        let (r, _) = output.dims2()?;
        if r != indices.len() {
            return Err(ModelError::MergeInvariant(format!(
                "part has {} rows for {} indices",
                r,
                indices.len()
            )));
        }
        if r == 0 {
            continue;
        }
        tags.extend_from_slice(indices);
        rows.push(output);
    }
    if rows.is_empty() {
        return Err(ModelError::MergeInvariant("nothing to merge".to_string()));
    }

    // Position in the concatenation, sorted by original index
    let mut order: Vec<usize> = (0..tags.len()).collect();
    order.sort_by_key(|&pos| tags[pos]);

    if order.len() != n || order.iter().enumerate().any(|(i, &pos)| tags[pos] != i) {
        return Err(ModelError::MergeInvariant(format!(
            "merged indices do not cover 0..{} exactly once",
            n
        )));
    }

    let stacked = Tensor::cat(&rows, 0)?;
    let perm: Vec<u32> = order.iter().map(|&pos| pos as u32).collect();
    let perm = Tensor::from_vec(perm, n, stacked.device())?;
    Ok(stacked.index_select(&perm, 0)?)
}

/// Two correctors behind a mutation-count cutoff.
pub struct CombinedCorrector {
    low: Box<dyn Corrector>,
    high: Box<dyn Corrector>,
    cutoff: f32,
    device: Device,
}

impl CombinedCorrector {
    pub fn new(
        low: Box<dyn Corrector>,
        high: Box<dyn Corrector>,
        cutoff: f32,
        device: Device,
    ) -> Self {
        Self {
            low,
            high,
            cutoff,
            device,
        }
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Refine a batch. Returns one row per input row, in input order,
    /// detached from any gradient graph.
    pub fn correct(
        &self,
        spectra: &Tensor,
        baseline: &Tensor,
        num_mut: &Tensor,
        floor: f32,
    ) -> Result<Tensor> {
        for t in [spectra, baseline, num_mut] {
            ensure_device(&self.device, t)?;
        }
        let (n, _) = spectra.dims2()?;
        let (nb, _) = baseline.dims2()?;
        let num_mut = num_mut.flatten_all()?;
        let nm = num_mut.dims1()?;
        if nb != n || nm != n {
            return Err(ModelError::InvalidInput(format!(
                "batch sizes differ: {} spectra, {} baseline rows, {} mutation counts",
                n, nb, nm
            )));
        }
        if n == 0 {
            return Err(ModelError::InvalidInput("empty batch".to_string()));
        }

        let counts = num_mut.to_vec1::<f32>()?;
        let partition = Partition::by_cutoff(&counts, self.cutoff);
        debug!(
            "Routing {} samples: {} low, {} high (cutoff {})",
            n,
            partition.low.len(),
            partition.high.len(),
            self.cutoff
        );

        let mut parts: Vec<(&[usize], Tensor)> = Vec::with_capacity(2);
        for (indices, corrector) in [
            (partition.low.as_slice(), &self.low),
            (partition.high.as_slice(), &self.high),
        ] {
            if indices.is_empty() {
                continue;
            }
            let idx: Vec<u32> = indices.iter().map(|&i| i as u32).collect();
            let idx = Tensor::from_vec(idx, indices.len(), &self.device)?;
            let spectra = spectra.index_select(&idx, 0)?;
            let baseline = baseline.index_select(&idx, 0)?;
            let num_mut = num_mut.index_select(&idx, 0)?;

            let out = corrector.correct(&CorrectorInput {
                spectra: &spectra,
                baseline: &baseline,
                num_mut: &num_mut,
                floor,
            })?;
            parts.push((indices, out.detach()));
        }

        if let [(_, a), (_, b)] = parts.as_slice() {
            let (wa, wb) = (a.dims2()?.1, b.dims2()?.1);
            if wa != wb {
                return Err(ModelError::InvalidInput(format!(
                    "correctors disagree on output width: {} vs {}",
                    wa, wb
                )));
            }
        }

        merge_in_order(&parts, n)
    }
}
