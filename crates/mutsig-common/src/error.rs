use thiserror::Error;

#[derive(Debug, Error)]
pub enum MutsigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Unsupported solver method '{0}' (only 'nnls' is available)")]
    UnsupportedMethod(String),

    #[error("Signature error: {0}")]
    Signature(String),

    #[error("{failed} of {total} samples failed to solve (rows {rows:?})")]
    PartialBatch {
        failed: usize,
        total: usize,
        rows: Vec<usize>,
    },
}

pub type Result<T> = std::result::Result<T, MutsigError>;
