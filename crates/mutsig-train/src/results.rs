//! One-row-per-run results table for hyperparameter sweeps.

use std::fs::OpenOptions;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use serde::Serialize;

use mutsig_common::GeneratorConfig;

use crate::generator_trainer::TrainingSummary;

#[derive(Debug, Serialize)]
struct RunRow {
    finished_at: String,
    iterations: usize,
    batch_size: usize,
    lr_encoder: f64,
    lr_decoder: f64,
    num_hidden_layers: usize,
    latent_dim: usize,
    lagrange_param: f64,
    lagrange_floor: f64,
    steps: usize,
    final_train_loss: f32,
    final_val_loss: f32,
    final_val_js: f64,
}

/// Append the hyperparameters and final scores of a run to `path`.
/// The header is written only when the file is new or empty.
pub fn append_run_summary(
    path: &Path,
    config: &GeneratorConfig,
    summary: &TrainingSummary,
) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let needs_header = std::fs::metadata(path).map(|m| m.len() == 0).unwrap_or(true);

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening results file {}", path.display()))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(needs_header)
        .from_writer(file);

    writer.serialize(RunRow {
        finished_at: Utc::now().to_rfc3339(),
        iterations: config.iterations,
        batch_size: config.batch_size,
        lr_encoder: config.lr_encoder,
        lr_decoder: config.lr_decoder,
        num_hidden_layers: config.num_hidden_layers,
        latent_dim: config.latent_dim,
        lagrange_param: config.lagrange_param,
        lagrange_floor: config.effective_floor(),
        steps: summary.steps,
        final_train_loss: summary.final_train_loss,
        final_val_loss: summary.final_val_loss,
        final_val_js: summary.final_val_js,
    })?;
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary() -> TrainingSummary {
        TrainingSummary {
            steps: 20,
            epochs: 2,
            final_train_loss: 0.1,
            final_val_loss: 0.2,
            final_val_js: 0.05,
            checkpoints: 1,
            model_dir: None,
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results").join("generator.csv");
        let config = GeneratorConfig::default();

        append_run_summary(&path, &config, &summary()).unwrap();
        append_run_summary(&path, &config, &summary()).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("finished_at,iterations,batch_size"));
        assert!(!lines[2].starts_with("finished_at"));
    }
}
