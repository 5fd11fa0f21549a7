//! Error types for model construction, persistence and inference.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ModelError>;

#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Model loading failed: {0}")]
    ModelLoad(String),

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("Device mismatch: model on {expected}, tensor on {found}")]
    DeviceMismatch { expected: String, found: String },

    #[error("Missing model metadata at {0}")]
    MissingMetadata(PathBuf),

    #[error("Incompatible model metadata at {path}: {reason}")]
    IncompatibleMetadata { path: PathBuf, reason: String },

    #[error("Router merge produced an invalid ordering: {0}")]
    MergeInvariant(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<candle_core::Error> for ModelError {
    fn from(e: candle_core::Error) -> Self {
        ModelError::Inference(e.to_string())
    }
}
