//! Realism classifier: probability that a sample looks like real data.

use candle_core::{Device, Tensor};
use candle_nn::{linear, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::device::ensure_device;
use crate::error::{ModelError, Result};
use crate::store::PersistedModel;

/// Scores a batch; one probability in `[0, 1]` per row, shape (N,).
pub trait RealismClassifier: Send + Sync {
    fn score(&self, spectra: &Tensor, num_mut: &Tensor) -> Result<Tensor>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierHyperparams {
    pub num_channels: usize,
    pub num_hidden_layers: usize,
    pub hidden_dim: usize,
}

/// MLP over `[spectrum, ln(1 + n)]` with a sigmoid output.
pub struct ClassifierNet {
    hyperparams: ClassifierHyperparams,
    hidden: Vec<Linear>,
    output: Linear,
    device: Device,
}

impl RealismClassifier for ClassifierNet {
    fn score(&self, spectra: &Tensor, num_mut: &Tensor) -> Result<Tensor> {
        ensure_device(&self.device, spectra)?;
        ensure_device(&self.device, num_mut)?;
        let (n, c) = spectra.dims2()?;
        if c != self.hyperparams.num_channels {
            return Err(ModelError::InvalidInput(format!(
                "classifier expects {} channels, got {}",
                self.hyperparams.num_channels, c
            )));
        }

        let log_mut = (num_mut.reshape((n, 1))? + 1.0)?.log()?;
        let mut h = Tensor::cat(&[spectra, &log_mut], 1)?;
        for layer in &self.hidden {
            h = layer.forward(&h)?.relu()?;
        }
        let logits = self.output.forward(&h)?;
        Ok(candle_nn::ops::sigmoid(&logits)?.reshape(n)?.detach())
    }
}

impl PersistedModel for ClassifierNet {
    const KIND: &'static str = "classifier";
    type Hyperparams = ClassifierHyperparams;

    fn build(hp: &ClassifierHyperparams, vb: VarBuilder) -> Result<Self> {
        if hp.num_channels == 0 || hp.hidden_dim == 0 {
            return Err(ModelError::InvalidInput(
                "classifier dimensions must be > 0".to_string(),
            ));
        }
        let mut hidden = Vec::with_capacity(hp.num_hidden_layers);
        let mut prev = hp.num_channels + 1;
        for i in 0..hp.num_hidden_layers {
            hidden.push(linear(prev, hp.hidden_dim, vb.pp(format!("hidden{i}")))?);
            prev = hp.hidden_dim;
        }
        let output = linear(prev, 1, vb.pp("out"))?;

        Ok(Self {
            hyperparams: hp.clone(),
            hidden,
            output,
            device: vb.device().clone(),
        })
    }

    fn hyperparams(&self) -> &ClassifierHyperparams {
        &self.hyperparams
    }
}
