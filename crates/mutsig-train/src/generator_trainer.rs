//! Generator training loop.
//!
//! Each step: train-mode forward on a shuffled batch, loss = reconstruction
//! MSE + scheduled weight × latent KL, one backward pass, then one Adam
//! update per half (encoder and decoder learning rates differ). An
//! evaluation-mode validation pass follows every step. Checkpoints are
//! written every `CHECKPOINT_EVERY` steps (unless overridden) and at the end.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use candle_core::{Device, Tensor, Var};
use candle_nn::{AdamW, Optimizer, ParamsAdamW, VarMap};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mutsig_common::GeneratorConfig;
use mutsig_models::store;
use mutsig_models::{
    ensure_device, latent_kl, ExecutionMode, Generator, GeneratorHyperparams, ModelHandle,
    DECODER_PREFIX, ENCODER_PREFIX,
};

use crate::data::SpectraDataset;
use crate::logger::{TrainingLogger, TrainingRecord};
use crate::schedule::RegularizationSchedule;

pub const CHECKPOINT_EVERY: usize = 500;

/// Outcome of a training run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSummary {
    pub steps: usize,
    pub epochs: usize,
    pub final_train_loss: f32,
    pub final_val_loss: f32,
    pub final_val_js: f64,
    pub checkpoints: usize,
    pub model_dir: Option<PathBuf>,
}

/// Losses of one forward pass.
struct LossParts {
    total: Tensor,
    reconstruction: f32,
    kl: f32,
}

pub struct GeneratorTrainer<'a> {
    config: &'a GeneratorConfig,
    device: Device,
    logger: &'a dyn TrainingLogger,
    checkpoint_every: usize,
}

impl<'a> GeneratorTrainer<'a> {
    pub fn new(config: &'a GeneratorConfig, device: Device, logger: &'a dyn TrainingLogger) -> Self {
        Self {
            config,
            device,
            logger,
            checkpoint_every: CHECKPOINT_EVERY,
        }
    }

    /// Steps between intermediate checkpoints.
    pub fn with_checkpoint_every(mut self, steps: usize) -> Self {
        self.checkpoint_every = steps;
        self
    }

    /// Train a fresh generator on `train`, validating on `val`.
    pub fn train(
        &self,
        train: &SpectraDataset,
        val: &SpectraDataset,
    ) -> Result<(ModelHandle<Generator>, TrainingSummary)> {
        let cfg = self.config;
        if cfg.batch_size == 0 || cfg.iterations == 0 || cfg.log_freq == 0 {
            bail!("batch size, iterations and log frequency must all be > 0");
        }
        if self.checkpoint_every == 0 {
            bail!("checkpoint interval must be > 0");
        }
        if train.num_channels() != val.num_channels() {
            bail!(
                "train has {} channels but validation has {}",
                train.num_channels(),
                val.num_channels()
            );
        }

        if let Some(seed) = cfg.seed {
            // The CPU backend has no seedable generator
            if let Err(e) = self.device.set_seed(seed) {
                debug!("Device RNG not seeded: {}", e);
            }
        }
        let mut rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let hyperparams = GeneratorHyperparams {
            input_dim: train.num_channels(),
            num_hidden_layers: cfg.num_hidden_layers,
            latent_dim: cfg.latent_dim,
        };
        let handle = ModelHandle::<Generator>::new(&hyperparams, &self.device)?;
        let model = handle.model();

        let (encoder_vars, decoder_vars) = split_parameters(handle.varmap())?;
        let mut encoder_opt = adam(encoder_vars, cfg.lr_encoder)?;
        let mut decoder_opt = adam(decoder_vars, cfg.lr_decoder)?;

        let total_steps = cfg.iterations * train.batches_per_epoch(cfg.batch_size);
        let schedule =
            RegularizationSchedule::new(cfg.lagrange_param, cfg.effective_floor(), total_steps);
        let val_x = val.to_tensor(&self.device)?;
        ensure_device(model.device(), &val_x)?;

        info!(
            "Training generator: {} samples, {} epochs, {} steps, latent {}",
            train.len(),
            cfg.iterations,
            total_steps,
            cfg.latent_dim
        );

        let mut step = 0;
        let mut checkpoints = 0;
        let mut last_train = 0.0f32;
        let mut last_val = 0.0f32;

        for epoch in 0..cfg.iterations {
            for batch in train.shuffled_batches(&mut rng, cfg.batch_size) {
                let x = train.batch_tensor(&batch, &self.device)?;
                let weight = schedule.weight_at(step);

                let train_loss = loss(model, &x, weight, ExecutionMode::Train)?;
                let grads = train_loss.total.backward()?;
                encoder_opt.step(&grads)?;
                decoder_opt.step(&grads)?;

                let val_loss = loss(model, &val_x, weight, ExecutionMode::Eval)?;
                last_train = train_loss.total.to_scalar::<f32>()?;
                last_val = val_loss.total.to_scalar::<f32>()?;

                if step % cfg.log_freq == 0 {
                    let record = TrainingRecord {
                        step,
                        epoch,
                        reg_weight: weight,
                        train_loss: last_train,
                        train_reconstruction: train_loss.reconstruction,
                        train_kl: train_loss.kl,
                        val_loss: last_val,
                        val_reconstruction: val_loss.reconstruction,
                        val_kl: val_loss.kl,
                        val_js: validation_js(model, &val_x, val)?,
                    };
                    self.logger.log(&record)?;
                }

                step += 1;
                if step % self.checkpoint_every == 0 {
                    if let Some(dir) = &cfg.model_dir {
                        checkpoint(&handle, dir, step)?;
                        checkpoints += 1;
                    }
                }
            }
        }

        if let Some(dir) = &cfg.model_dir {
            checkpoint(&handle, dir, step)?;
            checkpoints += 1;
        }

        let summary = TrainingSummary {
            steps: step,
            epochs: cfg.iterations,
            final_train_loss: last_train,
            final_val_loss: last_val,
            final_val_js: validation_js(model, &val_x, val)?,
            checkpoints,
            model_dir: cfg.model_dir.clone(),
        };
        info!(
            "Generator training finished after {} steps: train {:.5}, val {:.5}, val JS {:.5}",
            summary.steps, summary.final_train_loss, summary.final_val_loss, summary.final_val_js
        );
        Ok((handle, summary))
    }
}

fn loss(model: &Generator, x: &Tensor, weight: f64, mode: ExecutionMode) -> Result<LossParts> {
    let out = model.forward(x, mode)?;
    let reconstruction = candle_nn::loss::mse(&out.reconstruction, x)?;
    let kl = latent_kl(&out.mean, &out.log_var)?;
    let total = (&reconstruction + (&kl * weight)?)?;
    Ok(LossParts {
        reconstruction: reconstruction.to_scalar::<f32>()?,
        kl: kl.to_scalar::<f32>()?,
        total,
    })
}

fn validation_js(model: &Generator, val_x: &Tensor, val: &SpectraDataset) -> Result<f64> {
    let out = model.forward(val_x, ExecutionMode::Eval)?;
    let recon = out.reconstruction.detach().to_vec2::<f32>()?;
    Ok(mutsig_metrics::jensen_shannon(&recon, val.rows())?)
}

fn adam(vars: Vec<Var>, lr: f64) -> Result<AdamW> {
    let params = ParamsAdamW {
        lr,
        weight_decay: 0.0,
        ..Default::default()
    };
    Ok(AdamW::new(vars, params)?)
}

/// Generator parameters grouped by half.
fn split_parameters(varmap: &VarMap) -> Result<(Vec<Var>, Vec<Var>)> {
    let data = varmap
        .data()
        .lock()
        .map_err(|_| anyhow!("parameter map lock poisoned"))?;
    let encoder = format!("{ENCODER_PREFIX}.");
    let decoder = format!("{DECODER_PREFIX}.");

    let (mut enc, mut dec) = (Vec::new(), Vec::new());
    for (name, var) in data.iter() {
        if name.starts_with(&encoder) {
            enc.push(var.clone());
        } else if name.starts_with(&decoder) {
            dec.push(var.clone());
        } else {
            bail!("parameter {name} belongs to neither encoder nor decoder");
        }
    }
    debug!("{} encoder and {} decoder parameter tensors", enc.len(), dec.len());
    Ok((enc, dec))
}

fn checkpoint(handle: &ModelHandle<Generator>, dir: &Path, step: usize) -> Result<()> {
    store::save(handle, dir)
        .with_context(|| format!("saving generator checkpoint to {}", dir.display()))?;
    debug!("Checkpoint at step {} written to {:?}", step, dir);
    Ok(())
}
