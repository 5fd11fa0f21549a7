//! In-memory spectra datasets and shuffled mini-batches.

use std::path::Path;

use anyhow::{bail, Context, Result};
use candle_core::{Device, Tensor};
use rand::seq::SliceRandom;
use rand::Rng;

/// Rows of equally wide spectra.
#[derive(Debug, Clone)]
pub struct SpectraDataset {
    rows: Vec<Vec<f32>>,
    num_channels: usize,
}

impl SpectraDataset {
    pub fn new(rows: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = rows.first() else {
            bail!("dataset is empty");
        };
        let num_channels = first.len();
        if num_channels == 0 {
            bail!("dataset rows have no channels");
        }
        if let Some(i) = rows.iter().position(|r| r.len() != num_channels) {
            bail!(
                "row {} has {} channels, expected {}",
                i,
                rows[i].len(),
                num_channels
            );
        }
        Ok(Self { rows, num_channels })
    }

    /// Load a headerless table.
    pub fn from_file(path: &Path) -> Result<Self> {
        let rows = mutsig_io::read_table(path)
            .with_context(|| format!("reading spectra from {}", path.display()))?;
        Self::new(rows).with_context(|| format!("invalid dataset {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn rows(&self) -> &[Vec<f32>] {
        &self.rows
    }

    /// Batches per pass over the data (the last batch may be short).
    pub fn batches_per_epoch(&self, batch_size: usize) -> usize {
        self.rows.len().div_ceil(batch_size.max(1))
    }

    /// Row indices of one epoch, shuffled and chunked.
    pub fn shuffled_batches<R: Rng>(&self, rng: &mut R, batch_size: usize) -> Vec<Vec<usize>> {
        let mut order: Vec<usize> = (0..self.rows.len()).collect();
        order.shuffle(rng);
        order
            .chunks(batch_size.max(1))
            .map(|chunk| chunk.to_vec())
            .collect()
    }

    /// Selected rows as an N×C tensor.
    pub fn batch_tensor(&self, indices: &[usize], device: &Device) -> Result<Tensor> {
        let mut data = Vec::with_capacity(indices.len() * self.num_channels);
        for &i in indices {
            let Some(row) = self.rows.get(i) else {
                bail!("row {} out of range for {} rows", i, self.rows.len());
            };
            data.extend_from_slice(row);
        }
        Ok(Tensor::from_vec(data, (indices.len(), self.num_channels), device)?)
    }

    /// Every row as an N×C tensor.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        let data: Vec<f32> = self.rows.iter().flatten().copied().collect();
        Ok(Tensor::from_vec(data, (self.rows.len(), self.num_channels), device)?)
    }
}
