//! mutsig-common — Shared types, errors, and configuration used across all mutsig crates.

pub mod config;
pub mod error;
pub mod signatures;

pub use config::{
    BaselineConfig, ExecutionConfig, ExperimentConfig, GeneratorConfig, RefineConfig,
    SignatureSourceConfig,
};
pub use error::{MutsigError, Result};
pub use signatures::{SignatureMatrix, SignatureProvider, StaticSignatures, NUM_CHANNELS};
