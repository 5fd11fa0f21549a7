//! Corrector networks that refine a baseline estimate.
//!
//! Two variants share one architecture and differ only in their inputs:
//! `Low` (trained on samples with few mutations) reads the spectrum and the
//! mutation count; `Large` also reads the baseline guess. Mutation counts
//! enter as `ln(1 + n)`.

use std::path::Path;

use candle_core::{DType, Device, Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::device::ensure_device;
use crate::error::{ModelError, Result};
use crate::mode::ExecutionMode;
use crate::router::{CombinedCorrector, Corrector, CorrectorInput};
use crate::store::{self, PersistedModel};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinetunerKind {
    Low,
    Large,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinetunerHyperparams {
    pub kind: FinetunerKind,
    pub num_channels: usize,
    pub num_signatures: usize,
    pub num_hidden_layers: usize,
    pub hidden_dim: usize,
}

impl FinetunerHyperparams {
    fn input_dim(&self) -> usize {
        match self.kind {
            FinetunerKind::Low => self.num_channels + 1,
            FinetunerKind::Large => self.num_channels + self.num_signatures + 1,
        }
    }
}

pub struct Finetuner {
    hyperparams: FinetunerHyperparams,
    hidden: Vec<Linear>,
    output: Linear,
    device: Device,
}

impl Finetuner {
    pub fn kind(&self) -> FinetunerKind {
        self.hyperparams.kind
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Refine a batch.
    ///
    /// `Train` returns the raw softmax over K signatures. `Eval` zeroes
    /// weights below `floor` and appends an unknown column
    /// `max(0, 1 − Σw)`, giving K+1 columns.
    pub fn forward(
        &self,
        spectra: &Tensor,
        baseline: Option<&Tensor>,
        num_mut: &Tensor,
        floor: f32,
        mode: ExecutionMode,
    ) -> Result<Tensor> {
        ensure_device(&self.device, spectra)?;
        ensure_device(&self.device, num_mut)?;
        let (n, c) = spectra.dims2()?;
        if c != self.hyperparams.num_channels {
            return Err(ModelError::InvalidInput(format!(
                "finetuner expects {} channels, got {}",
                self.hyperparams.num_channels, c
            )));
        }
        let log_mut = (num_mut.reshape((n, 1))? + 1.0)?.log()?;

        let x = match self.hyperparams.kind {
            FinetunerKind::Low => Tensor::cat(&[spectra, &log_mut], 1)?,
            FinetunerKind::Large => {
                let baseline = baseline.ok_or_else(|| {
                    ModelError::InvalidInput("large finetuner needs a baseline guess".to_string())
                })?;
                ensure_device(&self.device, baseline)?;
                Tensor::cat(&[spectra, baseline, &log_mut], 1)?
            }
        };

        let mut h = x;
        for layer in &self.hidden {
            h = layer.forward(&h)?.relu()?;
        }
        let weights = candle_nn::ops::softmax(&self.output.forward(&h)?, D::Minus1)?;

        match mode {
            ExecutionMode::Train => Ok(weights),
            ExecutionMode::Eval => apply_floor_with_unknown(&weights, floor),
        }
    }
}

/// Zero weights below `floor` and append `max(0, 1 − Σw)` as a last column.
pub fn apply_floor_with_unknown(weights: &Tensor, floor: f32) -> Result<Tensor> {
    let keep = weights.ge(floor)?.to_dtype(DType::F32)?;
    let kept = (weights * keep)?;
    let unknown = kept.sum_keepdim(1)?.affine(-1.0, 1.0)?.relu()?;
    Ok(Tensor::cat(&[&kept, &unknown], 1)?)
}

impl Corrector for Finetuner {
    fn correct(&self, input: &CorrectorInput<'_>) -> Result<Tensor> {
        let baseline = match self.hyperparams.kind {
            FinetunerKind::Low => None,
            FinetunerKind::Large => Some(input.baseline),
        };
        self.forward(
            input.spectra,
            baseline,
            input.num_mut,
            input.floor,
            ExecutionMode::Eval,
        )
    }
}

/// Load the low- and large-count correctors and put them behind `cutoff`.
pub fn load_combined(
    low_dir: &Path,
    large_dir: &Path,
    cutoff: f32,
    device: &Device,
) -> Result<CombinedCorrector> {
    let low = store::load::<Finetuner>(low_dir, device)?.into_model();
    let large = store::load::<Finetuner>(large_dir, device)?.into_model();
    for (model, expected, dir) in [
        (&low, FinetunerKind::Low, low_dir),
        (&large, FinetunerKind::Large, large_dir),
    ] {
        if model.kind() != expected {
            return Err(ModelError::IncompatibleMetadata {
                path: dir.join(store::METADATA_FILE),
                reason: format!("expected a {:?} finetuner, found {:?}", expected, model.kind()),
            });
        }
    }
    Ok(CombinedCorrector::new(
        Box::new(low),
        Box::new(large),
        cutoff,
        device.clone(),
    ))
}

impl PersistedModel for Finetuner {
    const KIND: &'static str = "finetuner";
    type Hyperparams = FinetunerHyperparams;

    fn build(hp: &FinetunerHyperparams, vb: VarBuilder) -> Result<Self> {
        if hp.num_channels == 0 || hp.num_signatures == 0 || hp.hidden_dim == 0 {
            return Err(ModelError::InvalidInput(
                "finetuner dimensions must be > 0".to_string(),
            ));
        }
        let mut hidden = Vec::with_capacity(hp.num_hidden_layers);
        let mut prev = hp.input_dim();
        for i in 0..hp.num_hidden_layers {
            hidden.push(linear(prev, hp.hidden_dim, vb.pp(format!("hidden{i}")))?);
            prev = hp.hidden_dim;
        }
        let output = linear(prev, hp.num_signatures, vb.pp("out"))?;

        Ok(Self {
            hyperparams: hp.clone(),
            hidden,
            output,
            device: vb.device().clone(),
        })
    }

    fn hyperparams(&self) -> &FinetunerHyperparams {
        &self.hyperparams
    }
}
