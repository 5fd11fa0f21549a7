//! Directory-keyed model store.
//!
//! A saved model is a directory holding
//! - `model.safetensors`: every trainable tensor, by name
//! - `metadata.json`: model kind, format version and the hyperparameters
//!   needed to rebuild the architecture before the tensors are loaded
//!
//! Checkpoints written during training and models loaded by the router
//! go through the same two functions, so they are always interchangeable.

use std::path::Path;

use candle_core::{DType, Device};
use candle_nn::{VarBuilder, VarMap};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{ModelError, Result};

pub const WEIGHTS_FILE: &str = "model.safetensors";
pub const METADATA_FILE: &str = "metadata.json";
pub const FORMAT_VERSION: u32 = 1;

/// A network that can be rebuilt from its hyperparameters.
pub trait PersistedModel: Sized {
    /// Stored in the metadata; loading a directory of another kind fails.
    const KIND: &'static str;

    type Hyperparams: Serialize + DeserializeOwned + Clone;

    /// Create every parameter through `vb`.
    fn build(hyperparams: &Self::Hyperparams, vb: VarBuilder) -> Result<Self>;

    fn hyperparams(&self) -> &Self::Hyperparams;
}

#[derive(Debug, Serialize, Deserialize)]
struct Metadata {
    kind: String,
    format_version: u32,
    hyperparameters: serde_json::Value,
}

/// A model together with the variable map that owns its parameters.
pub struct ModelHandle<M> {
    model: M,
    varmap: VarMap,
    device: Device,
}

impl<M: PersistedModel> ModelHandle<M> {
    /// Freshly initialised parameters.
    pub fn new(hyperparams: &M::Hyperparams, device: &Device) -> Result<Self> {
        let varmap = VarMap::new();
        let vb = VarBuilder::from_varmap(&varmap, DType::F32, device);
        let model = M::build(hyperparams, vb)?;
        Ok(Self {
            model,
            varmap,
            device: device.clone(),
        })
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_model(self) -> M {
        self.model
    }

    pub fn varmap(&self) -> &VarMap {
        &self.varmap
    }

    pub fn device(&self) -> &Device {
        &self.device
    }
}

/// Write weights and metadata into `dir`, creating it if needed.
pub fn save<M: PersistedModel>(handle: &ModelHandle<M>, dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dir)?;

    let metadata = Metadata {
        kind: M::KIND.to_string(),
        format_version: FORMAT_VERSION,
        hyperparameters: serde_json::to_value(handle.model.hyperparams())?,
    };
    std::fs::write(dir.join(METADATA_FILE), serde_json::to_string_pretty(&metadata)?)?;

    handle
        .varmap
        .save(dir.join(WEIGHTS_FILE))
        .map_err(|e| ModelError::ModelLoad(format!("saving {}: {}", dir.display(), e)))?;

    debug!("Saved {} to {:?}", M::KIND, dir);
    Ok(())
}

/// Rebuild a model from `dir` on `device`.
pub fn load<M: PersistedModel>(dir: &Path, device: &Device) -> Result<ModelHandle<M>> {
    let metadata_path = dir.join(METADATA_FILE);
    if !metadata_path.is_file() {
        return Err(ModelError::MissingMetadata(metadata_path));
    }

    let incompatible = |reason: String| ModelError::IncompatibleMetadata {
        path: metadata_path.clone(),
        reason,
    };

    let content = std::fs::read_to_string(&metadata_path)?;
    let metadata: Metadata =
        serde_json::from_str(&content).map_err(|e| incompatible(e.to_string()))?;
    if metadata.kind != M::KIND {
        return Err(incompatible(format!(
            "expected a {} model, found {}",
            M::KIND,
            metadata.kind
        )));
    }
    if metadata.format_version != FORMAT_VERSION {
        return Err(incompatible(format!(
            "format version {} is not supported (expected {})",
            metadata.format_version, FORMAT_VERSION
        )));
    }
    let hyperparams: M::Hyperparams = serde_json::from_value(metadata.hyperparameters)
        .map_err(|e| incompatible(format!("hyperparameters: {e}")))?;

    let weights_path = dir.join(WEIGHTS_FILE);
    if !weights_path.is_file() {
        return Err(ModelError::ModelLoad(format!(
            "weights file not found: {}",
            weights_path.display()
        )));
    }

    let mut handle = ModelHandle::<M>::new(&hyperparams, device)?;
    handle
        .varmap
        .load(&weights_path)
        .map_err(|e| ModelError::ModelLoad(format!("{}: {}", weights_path.display(), e)))?;

    info!("Loaded {} from {:?}", M::KIND, dir);
    Ok(handle)
}
