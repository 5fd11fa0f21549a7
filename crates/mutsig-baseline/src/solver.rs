//! Single-sample and batched baseline solves.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, warn};

use mutsig_common::{MutsigError, Result, SignatureMatrix, SignatureProvider};

use crate::nnls::nnls;
pub use crate::nnls::SolveStatus;

/// Iteration cap is this multiple of the number of signatures.
const MAX_ITER_FACTOR: usize = 5;

/// Weight estimate for one sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Solution {
    /// Non-negative weight per signature
    pub weights: Vec<f32>,
    /// Euclidean norm of the reconstruction error
    pub residual: f64,
    pub iterations: usize,
    pub status: SolveStatus,
}

/// Why a single sample could not be solved.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SampleError {
    #[error("spectrum has {found} channels, expected {expected}")]
    LengthMismatch { expected: usize, found: usize },

    #[error("spectrum channel {channel} is not finite")]
    NonFinite { channel: usize },

    #[error("solver panicked: {0}")]
    Panicked(String),
}

/// Baseline solver over a fixed, read-only signature matrix.
///
/// Cloning is cheap: the matrix is shared through an `Arc` and the design
/// matrix is only read during solves.
#[derive(Debug, Clone)]
pub struct Baseline {
    signatures: Arc<SignatureMatrix>,
    /// C×K design matrix (signatures as columns)
    design: Arc<DMatrix<f64>>,
    max_iter: usize,
    time_budget: Option<Duration>,
}

impl Baseline {
    pub fn new(signatures: Arc<SignatureMatrix>) -> Self {
        let (k, c) = (signatures.num_signatures(), signatures.num_channels());
        let design = DMatrix::from_fn(c, k, |row, col| signatures.get(col, row));
        Self {
            signatures,
            design: Arc::new(design),
            max_iter: MAX_ITER_FACTOR * k,
            time_budget: None,
        }
    }

    pub fn from_provider(provider: &dyn SignatureProvider) -> Result<Self> {
        Ok(Self::new(provider.signatures()?))
    }

    /// Bound the wall-clock time of every single-sample solve.
    pub fn with_time_budget(mut self, budget: Duration) -> Self {
        self.time_budget = Some(budget);
        self
    }

    pub fn num_signatures(&self) -> usize {
        self.signatures.num_signatures()
    }

    pub fn signatures(&self) -> &Arc<SignatureMatrix> {
        &self.signatures
    }

    /// Solve one normalized spectrum.
    pub fn solve(&self, spectrum: &[f32]) -> std::result::Result<Solution, SampleError> {
        let expected = self.signatures.num_channels();
        if spectrum.len() != expected {
            return Err(SampleError::LengthMismatch {
                expected,
                found: spectrum.len(),
            });
        }
        if let Some(channel) = spectrum.iter().position(|v| !v.is_finite()) {
            return Err(SampleError::NonFinite { channel });
        }

        let b = DVector::from_iterator(expected, spectrum.iter().map(|&v| v as f64));
        let deadline = self.time_budget.map(|budget| Instant::now() + budget);
        let out = nnls(&self.design, &b, self.max_iter, deadline);

        if out.status != SolveStatus::Converged {
            debug!(
                "NNLS stopped early ({:?}) after {} iterations, residual {:.3e}",
                out.status, out.iterations, out.residual
            );
        }

        Ok(Solution {
            weights: out.x.iter().map(|&v| v as f32).collect(),
            residual: out.residual,
            iterations: out.iterations,
            status: out.status,
        })
    }

    /// Solve every row of `batch` on a pool of exactly `workers` threads.
    ///
    /// Results come back in input order. A failing row never aborts its
    /// siblings; it shows up as an `Err` entry in the batch.
    pub fn solve_batch(&self, batch: &[Vec<f32>], workers: usize) -> Result<BatchSolution> {
        if workers == 0 {
            return Err(MutsigError::Config("worker count must be > 0".to_string()));
        }

        let results: Vec<_> = if workers == 1 {
            batch.iter().map(|s| self.solve_guarded(s)).collect()
        } else {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .thread_name(|i| format!("mutsig-baseline-{i}"))
                .build()
                .map_err(|e| MutsigError::Config(format!("worker pool: {e}")))?;
            pool.install(|| batch.par_iter().map(|s| self.solve_guarded(s)).collect())
        };

        let solution = BatchSolution { results };
        let failed = solution.failures().len();
        if failed > 0 {
            warn!("{} of {} samples failed to solve", failed, batch.len());
        }
        Ok(solution)
    }

    fn solve_guarded(&self, spectrum: &[f32]) -> std::result::Result<Solution, SampleError> {
        panic::catch_unwind(AssertUnwindSafe(|| self.solve(spectrum))).unwrap_or_else(|payload| {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(SampleError::Panicked(reason))
        })
    }
}

/// Per-sample outcomes of a batch solve, in input order.
#[derive(Debug, Clone)]
pub struct BatchSolution {
    results: Vec<std::result::Result<Solution, SampleError>>,
}

impl BatchSolution {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn results(&self) -> &[std::result::Result<Solution, SampleError>] {
        &self.results
    }

    /// Failed rows with their reasons.
    pub fn failures(&self) -> Vec<(usize, &SampleError)> {
        self.results
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().err().map(|e| (i, e)))
            .collect()
    }

    /// Weight matrix (N×K); errs if any row failed.
    pub fn weights_matrix(&self) -> Result<Vec<Vec<f32>>> {
        let rows: Vec<usize> = self.failures().into_iter().map(|(i, _)| i).collect();
        if !rows.is_empty() {
            return Err(MutsigError::PartialBatch {
                failed: rows.len(),
                total: self.results.len(),
                rows,
            });
        }
        Ok(self
            .results
            .iter()
            .filter_map(|r| r.as_ref().ok().map(|s| s.weights.clone()))
            .collect())
    }

    /// Residual per row (None for failed rows).
    pub fn residuals(&self) -> Vec<Option<f64>> {
        self.results
            .iter()
            .map(|r| r.as_ref().ok().map(|s| s.residual))
            .collect()
    }

    /// Mean residual over successful rows.
    pub fn mean_residual(&self) -> Option<f64> {
        let ok: Vec<f64> = self.residuals().into_iter().flatten().collect();
        if ok.is_empty() {
            None
        } else {
            Some(ok.iter().sum::<f64>() / ok.len() as f64)
        }
    }

    /// Rows that stopped before convergence.
    pub fn unconverged(&self) -> usize {
        self.results
            .iter()
            .filter(|r| matches!(r, Ok(s) if s.status != SolveStatus::Converged))
            .count()
    }
}
