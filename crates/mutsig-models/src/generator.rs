//! Variational generator over normalized spectra.
//!
//! The encoder narrows linearly from the channel count to the latent size
//! through `num_hidden_layers` ReLU layers, then splits into mean and
//! log-variance heads. The decoder mirrors the encoder and ends in a softmax,
//! so every reconstruction is a distribution over channels.

use candle_core::{Device, Tensor, D};
use candle_nn::{linear, Linear, Module, VarBuilder};
use serde::{Deserialize, Serialize};

use crate::device::ensure_device;
use crate::error::{ModelError, Result};
use crate::mode::ExecutionMode;
use crate::store::PersistedModel;

/// Parameter-name prefixes; the trainer gives each half its own optimizer.
pub const ENCODER_PREFIX: &str = "encoder";
pub const DECODER_PREFIX: &str = "decoder";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratorHyperparams {
    pub input_dim: usize,
    pub num_hidden_layers: usize,
    pub latent_dim: usize,
}

impl GeneratorHyperparams {
    /// Widths of the encoder hidden layers, input side first.
    pub fn hidden_widths(&self) -> Vec<usize> {
        let (c, l) = (self.input_dim as f64, self.latent_dim as f64);
        let steps = (self.num_hidden_layers + 1) as f64;
        (1..=self.num_hidden_layers)
            .map(|i| (c - (c - l) * i as f64 / steps).round().max(1.0) as usize)
            .collect()
    }
}

/// Result of one forward pass.
#[derive(Debug, Clone)]
pub struct GeneratorOutput {
    pub reconstruction: Tensor,
    pub mean: Tensor,
    pub log_var: Tensor,
    pub std: Tensor,
}

pub struct Generator {
    hyperparams: GeneratorHyperparams,
    encoder: Vec<Linear>,
    mean_head: Linear,
    log_var_head: Linear,
    decoder: Vec<Linear>,
    device: Device,
}

impl Generator {
    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Latent mean and log-variance of a batch (N×C).
    pub fn encode(&self, x: &Tensor) -> Result<(Tensor, Tensor)> {
        let mut h = x.clone();
        for layer in &self.encoder {
            h = layer.forward(&h)?.relu()?;
        }
        Ok((self.mean_head.forward(&h)?, self.log_var_head.forward(&h)?))
    }

    /// Map latent vectors (N×latent) to channel distributions (N×C).
    pub fn decode(&self, z: &Tensor) -> Result<Tensor> {
        let mut h = z.clone();
        let last = self.decoder.len() - 1;
        for (i, layer) in self.decoder.iter().enumerate() {
            h = layer.forward(&h)?;
            if i < last {
                h = h.relu()?;
            }
        }
        Ok(candle_nn::ops::softmax(&h, D::Minus1)?)
    }

    /// Encode, pick a latent point and decode.
    ///
    /// `Train` draws `z = mean + ε·std` (reparameterization, differentiable
    /// in mean and std); `Eval` decodes the mean itself.
    pub fn forward(&self, x: &Tensor, mode: ExecutionMode) -> Result<GeneratorOutput> {
        ensure_device(&self.device, x)?;
        let (_, c) = x.dims2()?;
        if c != self.hyperparams.input_dim {
            return Err(ModelError::InvalidInput(format!(
                "generator expects {} channels, got {}",
                self.hyperparams.input_dim, c
            )));
        }

        let (mean, log_var) = self.encode(x)?;
        let std = (&log_var * 0.5)?.exp()?;
        let z = match mode {
            ExecutionMode::Train => {
                let noise = std.randn_like(0.0, 1.0)?;
                (&mean + (noise * &std)?)?
            }
            ExecutionMode::Eval => mean.clone(),
        };
        let reconstruction = self.decode(&z)?;

        Ok(GeneratorOutput {
            reconstruction,
            mean,
            log_var,
            std,
        })
    }

    /// Synthesize `n` spectra from standard-normal latent draws.
    pub fn generate(&self, n: usize) -> Result<Tensor> {
        if n == 0 {
            return Err(ModelError::InvalidInput("cannot generate 0 samples".to_string()));
        }
        let z = Tensor::randn(0f32, 1f32, (n, self.hyperparams.latent_dim), &self.device)?;
        self.decode(&z)
    }
}

/// KL divergence of `N(mean, std²)` from `N(0, I)`, summed over latent
/// dimensions and averaged over the batch:
/// `0.5 · Σ (std² + mean² − 2·ln std − 1)`, with `2·ln std = log_var`.
pub fn latent_kl(mean: &Tensor, log_var: &Tensor) -> Result<Tensor> {
    let per_dim = ((log_var.exp()? + mean.sqr()?)? - log_var)?;
    let per_dim = (per_dim - 1.0)?;
    Ok((per_dim.sum(1)? * 0.5)?.mean(0)?)
}

impl PersistedModel for Generator {
    const KIND: &'static str = "generator";
    type Hyperparams = GeneratorHyperparams;

    fn build(hp: &GeneratorHyperparams, vb: VarBuilder) -> Result<Self> {
        if hp.input_dim == 0 || hp.latent_dim == 0 {
            return Err(ModelError::InvalidInput(
                "generator dimensions must be > 0".to_string(),
            ));
        }
        let widths = hp.hidden_widths();
        let enc_vb = vb.pp(ENCODER_PREFIX);
        let dec_vb = vb.pp(DECODER_PREFIX);

        let mut encoder = Vec::with_capacity(widths.len());
        let mut prev = hp.input_dim;
        for (i, &w) in widths.iter().enumerate() {
            encoder.push(linear(prev, w, enc_vb.pp(format!("layer{i}")))?);
            prev = w;
        }
        let mean_head = linear(prev, hp.latent_dim, enc_vb.pp("mean"))?;
        let log_var_head = linear(prev, hp.latent_dim, enc_vb.pp("log_var"))?;

        let mut decoder = Vec::with_capacity(widths.len() + 1);
        let mut prev = hp.latent_dim;
        for (i, &w) in widths.iter().rev().enumerate() {
            decoder.push(linear(prev, w, dec_vb.pp(format!("layer{i}")))?);
            prev = w;
        }
        decoder.push(linear(prev, hp.input_dim, dec_vb.pp("out"))?);

        Ok(Self {
            hyperparams: hp.clone(),
            encoder,
            mean_head,
            log_var_head,
            decoder,
            device: vb.device().clone(),
        })
    }

    fn hyperparams(&self) -> &GeneratorHyperparams {
        &self.hyperparams
    }
}
