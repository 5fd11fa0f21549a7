//! Baseline dataset creation: read spectra, solve, write guesses.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::info;

use mutsig_common::{MutsigError, Result};
use mutsig_io::{read_table, write_table};

use crate::solver::Baseline;

/// Supported baseline strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BaselineMethod {
    Nnls,
}

impl BaselineMethod {
    /// Parse a method name. Anything but `nnls` is a fatal configuration error.
    pub fn parse(name: &str) -> Result<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "nnls" => Ok(Self::Nnls),
            _ => Err(MutsigError::UnsupportedMethod(name.to_string())),
        }
    }
}

impl FromStr for BaselineMethod {
    type Err = MutsigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for BaselineMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nnls => write!(f, "nnls"),
        }
    }
}

/// What one `create_baseline_dataset` call produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaselineReport {
    pub input: PathBuf,
    pub output: PathBuf,
    pub method: BaselineMethod,
    pub rows: usize,
    /// Rows that hit the iteration cap or the time budget
    pub unconverged: usize,
    pub mean_residual: Option<f64>,
}

/// Solve every row of `input` and write the weights to `output`.
///
/// Fails without writing anything if any row could not be solved; the
/// error lists the offending rows.
pub fn create_baseline_dataset(
    input: &Path,
    output: &Path,
    baseline: &Baseline,
    method: BaselineMethod,
    workers: usize,
) -> Result<BaselineReport> {
    let spectra = read_table(input)?;
    info!(
        "Solving {} samples from {:?} with {} ({} workers)",
        spectra.len(),
        input,
        method,
        workers
    );

    let solution = match method {
        BaselineMethod::Nnls => baseline.solve_batch(&spectra, workers)?,
    };
    let weights = solution.weights_matrix()?;
    write_table(output, &weights)?;

    let report = BaselineReport {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        method,
        rows: weights.len(),
        unconverged: solution.unconverged(),
        mean_residual: solution.mean_residual(),
    };
    info!(
        "Wrote {} baseline rows to {:?} (mean residual {:?}, {} unconverged)",
        report.rows, output, report.mean_residual, report.unconverged
    );
    Ok(report)
}

/// Output path for an input table: `input` in the file name becomes
/// `baseline`, in the same directory.
pub fn baseline_output_path(input: &Path) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let renamed = if file_name.contains("input") {
        file_name.replace("input", "baseline")
    } else {
        format!("baseline_{file_name}")
    };
    input.with_file_name(renamed)
}
