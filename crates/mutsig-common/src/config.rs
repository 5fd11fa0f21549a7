//! Experiment configuration.
//!
//! A flat set of named options consumed by the training / inference driver.
//! The core crates never read this themselves; the driver unpacks it and
//! passes explicit parameters per call.
//!
//! Loadable from TOML, YAML or JSON (picked by file extension).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{MutsigError, Result};

/// Complete experiment configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Where the signature matrix comes from
    #[serde(default)]
    pub signatures: SignatureSourceConfig,

    /// Baseline solver options
    #[serde(default)]
    pub baseline: BaselineConfig,

    /// Generator training options
    #[serde(default)]
    pub generator: GeneratorConfig,

    /// Router / refinement options
    #[serde(default)]
    pub refine: RefineConfig,

    /// Execution options
    #[serde(default)]
    pub execution: ExecutionConfig,
}

// ── Signatures ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignatureSourceConfig {
    /// Headed table: first column mutation type, one column per signature
    #[serde(default = "default_signature_file")]
    pub file: PathBuf,

    /// One-column table with the canonical mutation-type order
    #[serde(default = "default_mutation_type_order")]
    pub mutation_type_order: PathBuf,
}

fn default_signature_file() -> PathBuf { PathBuf::from("data/signatures.csv") }
fn default_mutation_type_order() -> PathBuf { PathBuf::from("data/mutation_type_order.csv") }

impl Default for SignatureSourceConfig {
    fn default() -> Self {
        Self {
            file: default_signature_file(),
            mutation_type_order: default_mutation_type_order(),
        }
    }
}

// ── Baseline ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineConfig {
    /// Solver method; only "nnls" is supported
    #[serde(default = "default_method")]
    pub method: String,

    /// Worker threads for batch solves
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Optional per-sample time budget in milliseconds
    #[serde(default)]
    pub time_budget_ms: Option<u64>,
}

fn default_method() -> String { "nnls".to_string() }
fn default_workers() -> usize { 8 }

impl Default for BaselineConfig {
    fn default() -> Self {
        Self {
            method: default_method(),
            workers: default_workers(),
            time_budget_ms: None,
        }
    }
}

// ── Generator ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    /// Passes through the training set
    #[serde(default = "default_iterations")]
    pub iterations: usize,

    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    #[serde(default = "default_lr_encoder")]
    pub lr_encoder: f64,

    #[serde(default = "default_lr_decoder")]
    pub lr_decoder: f64,

    #[serde(default = "default_hidden_layers")]
    pub num_hidden_layers: usize,

    #[serde(default = "default_latent_dim")]
    pub latent_dim: usize,

    /// Initial weight of the latent regularization term
    #[serde(default = "default_lagrange_param")]
    pub lagrange_param: f64,

    /// Weight held for the last 20% of training; defaults to 0.2 × lagrange_param
    #[serde(default)]
    pub lagrange_floor: Option<f64>,

    /// Report to the training logger every N steps
    #[serde(default = "default_log_freq")]
    pub log_freq: usize,

    /// Directory for checkpoints; None disables saving
    #[serde(default)]
    pub model_dir: Option<PathBuf>,

    /// Training / validation spectra (headerless tables)
    #[serde(default)]
    pub train_input: Option<PathBuf>,
    #[serde(default)]
    pub val_input: Option<PathBuf>,

    /// Append-only JSON lines file for training records
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// CSV file collecting one result row per run
    #[serde(default)]
    pub results_csv: Option<PathBuf>,

    #[serde(default)]
    pub seed: Option<u64>,
}

fn default_iterations() -> usize { 10 }
fn default_batch_size() -> usize { 500 }
fn default_lr_encoder() -> f64 { 1e-3 }
fn default_lr_decoder() -> f64 { 1e-3 }
fn default_hidden_layers() -> usize { 2 }
fn default_latent_dim() -> usize { 20 }
fn default_lagrange_param() -> f64 { 1.0 }
fn default_log_freq() -> usize { 100 }

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            iterations: default_iterations(),
            batch_size: default_batch_size(),
            lr_encoder: default_lr_encoder(),
            lr_decoder: default_lr_decoder(),
            num_hidden_layers: default_hidden_layers(),
            latent_dim: default_latent_dim(),
            lagrange_param: default_lagrange_param(),
            lagrange_floor: None,
            log_freq: default_log_freq(),
            model_dir: None,
            train_input: None,
            val_input: None,
            log_file: None,
            results_csv: None,
            seed: None,
        }
    }
}

impl GeneratorConfig {
    /// Floor of the regularization schedule.
    pub fn effective_floor(&self) -> f64 {
        self.lagrange_floor.unwrap_or(0.2 * self.lagrange_param)
    }
}

// ── Refinement ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefineConfig {
    /// Corrector trained on samples with few mutations
    #[serde(default)]
    pub low_model_dir: Option<PathBuf>,

    /// Corrector trained on samples with many mutations
    #[serde(default)]
    pub large_model_dir: Option<PathBuf>,

    /// Realism classifier used to drop unrealistic samples
    #[serde(default)]
    pub classifier_dir: Option<PathBuf>,

    /// Mutation count separating the two corrector branches
    #[serde(default = "default_cutoff")]
    pub cutoff: f32,

    /// Weights below this value are zeroed by the correctors
    #[serde(default = "default_small_weight_floor")]
    pub small_weight_floor: f32,
}

fn default_cutoff() -> f32 { 1000.0 }
fn default_small_weight_floor() -> f32 { 0.01 }

impl Default for RefineConfig {
    fn default() -> Self {
        Self {
            low_model_dir: None,
            large_model_dir: None,
            classifier_dir: None,
            cutoff: default_cutoff(),
            small_weight_floor: default_small_weight_floor(),
        }
    }
}

// ── Execution ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Compute device: "cpu", "cuda" or "metal"
    #[serde(default = "default_device")]
    pub device: String,
}

fn default_device() -> String { "cpu".to_string() }

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            device: default_device(),
        }
    }
}

// ── Helper Methods ─────────────────────────────────────────────────────────────

impl ExperimentConfig {
    /// Load from a `.toml`, `.yaml`/`.yml` or `.json` file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let config: Self = match ext.as_str() {
            "toml" => toml::from_str(&content)
                .map_err(|e| MutsigError::Config(format!("{}: {}", path.display(), e)))?,
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| MutsigError::Config(format!("{}: {}", path.display(), e)))?,
            "json" => serde_json::from_str(&content)?,
            other => {
                return Err(MutsigError::Config(format!(
                    "unsupported config format '{}' for {}",
                    other,
                    path.display()
                )))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Save to YAML file
    pub fn to_yaml(&self, path: impl AsRef<Path>) -> Result<()> {
        let content =
            serde_yaml::to_string(self).map_err(|e| MutsigError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject option combinations the driver cannot run with.
    pub fn validate(&self) -> Result<()> {
        let g = &self.generator;
        if g.iterations == 0 {
            return Err(MutsigError::Config("generator.iterations must be > 0".into()));
        }
        if g.batch_size == 0 {
            return Err(MutsigError::Config("generator.batch_size must be > 0".into()));
        }
        if g.latent_dim == 0 {
            return Err(MutsigError::Config("generator.latent_dim must be > 0".into()));
        }
        if g.lr_encoder <= 0.0 || g.lr_decoder <= 0.0 {
            return Err(MutsigError::Config("learning rates must be positive".into()));
        }
        if g.lagrange_param < 0.0 || g.effective_floor() < 0.0 {
            return Err(MutsigError::Config("regularization weights must be >= 0".into()));
        }
        if g.effective_floor() > g.lagrange_param {
            return Err(MutsigError::Config(format!(
                "generator.lagrange_floor ({}) exceeds lagrange_param ({})",
                g.effective_floor(),
                g.lagrange_param
            )));
        }
        if g.log_freq == 0 {
            return Err(MutsigError::Config("generator.log_freq must be > 0".into()));
        }
        if self.baseline.workers == 0 {
            return Err(MutsigError::Config("baseline.workers must be > 0".into()));
        }
        if !(self.refine.small_weight_floor >= 0.0 && self.refine.small_weight_floor < 1.0) {
            return Err(MutsigError::Config("refine.small_weight_floor must be in [0, 1)".into()));
        }
        Ok(())
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExperimentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.baseline.method, "nnls");
        assert_eq!(config.refine.cutoff, 1000.0);
    }

    #[test]
    fn test_default_floor_is_fifth_of_max() {
        let g = GeneratorConfig { lagrange_param: 0.5, ..Default::default() };
        assert!((g.effective_floor() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_floor_above_max_rejected() {
        let mut config = ExperimentConfig::default();
        config.generator.lagrange_floor = Some(2.0);
        assert!(matches!(config.validate(), Err(MutsigError::Config(_))));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = ExperimentConfig::default();
        config.baseline.workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_toml_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mutsig.toml");
        std::fs::write(&path, "[generator]\nlatent_dim = 8\n\n[refine]\ncutoff = 500.0\n").unwrap();

        let config = ExperimentConfig::from_file(&path).unwrap();
        assert_eq!(config.generator.latent_dim, 8);
        assert_eq!(config.generator.batch_size, 500);
        assert_eq!(config.refine.cutoff, 500.0);
        assert_eq!(config.execution.device, "cpu");
    }

    #[test]
    fn test_yaml_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mutsig.yaml");
        let mut config = ExperimentConfig::default();
        config.generator.seed = Some(7);
        config.to_yaml(&path).unwrap();

        let parsed = ExperimentConfig::from_file(&path).unwrap();
        assert_eq!(parsed.generator.seed, Some(7));
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mutsig.ini");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(ExperimentConfig::from_file(&path), Err(MutsigError::Config(_))));
    }
}
