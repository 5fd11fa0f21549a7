//! Mutational signature matrix and the provider abstraction.
//!
//! A signature is a probability distribution over the 96 single-base
//! substitution channels. The matrix is loaded once, validated, and then
//! shared read-only (behind an `Arc`) by every solver and worker thread.

use std::sync::Arc;

use tracing::warn;

use crate::{MutsigError, Result};

/// Number of mutation-type channels in a single-base substitution spectrum.
pub const NUM_CHANNELS: usize = 96;

/// Tolerance used when checking that a signature sums to one.
const SUM_TOLERANCE: f64 = 1e-3;

/// Immutable K×C matrix of non-negative signatures, stored row-major
/// (one row per signature).
#[derive(Debug, Clone, PartialEq)]
pub struct SignatureMatrix {
    names: Vec<String>,
    num_channels: usize,
    data: Vec<f64>,
}

impl SignatureMatrix {
    /// Build a matrix from one row per signature.
    ///
    /// Rows must be non-empty, equally long, finite and non-negative.
    /// A row whose mass is off by more than 1e-3 is renormalised.
    pub fn new(names: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        if rows.is_empty() {
            return Err(MutsigError::Signature("no signatures supplied".to_string()));
        }
        if names.len() != rows.len() {
            return Err(MutsigError::Signature(format!(
                "{} names for {} signatures",
                names.len(),
                rows.len()
            )));
        }

        let num_channels = rows[0].len();
        if num_channels == 0 {
            return Err(MutsigError::Signature("signatures have no channels".to_string()));
        }

        let mut data = Vec::with_capacity(rows.len() * num_channels);
        for (name, mut row) in names.iter().zip(rows) {
            if row.len() != num_channels {
                return Err(MutsigError::Signature(format!(
                    "signature {} has {} channels, expected {}",
                    name,
                    row.len(),
                    num_channels
                )));
            }
            if let Some(bad) = row.iter().find(|v| !v.is_finite() || **v < 0.0) {
                return Err(MutsigError::Signature(format!(
                    "signature {} contains invalid entry {}",
                    name, bad
                )));
            }

            let sum: f64 = row.iter().sum();
            if sum <= 0.0 {
                return Err(MutsigError::Signature(format!("signature {} is all zeros", name)));
            }
            if (sum - 1.0).abs() > SUM_TOLERANCE {
                warn!("Signature {} sums to {:.4}, renormalising", name, sum);
                row.iter_mut().for_each(|v| *v /= sum);
            }
            data.extend(row);
        }

        Ok(Self {
            names,
            num_channels,
            data,
        })
    }

    /// Build a matrix with generated names (`SIG1`, `SIG2`, ...).
    pub fn from_rows(rows: Vec<Vec<f64>>) -> Result<Self> {
        let names = (1..=rows.len()).map(|i| format!("SIG{i}")).collect();
        Self::new(names, rows)
    }

    /// Number of signatures (K).
    pub fn num_signatures(&self) -> usize {
        self.names.len()
    }

    /// Number of channels per signature (C).
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Channel distribution of signature `k`.
    pub fn signature(&self, k: usize) -> &[f64] {
        let start = k * self.num_channels;
        &self.data[start..start + self.num_channels]
    }

    /// Entry for channel `c` of signature `k`.
    pub fn get(&self, k: usize, c: usize) -> f64 {
        self.data[k * self.num_channels + c]
    }

    /// Reconstruct a spectrum from a weight vector: `Σ_k w_k · sig_k`.
    pub fn reconstruct(&self, weights: &[f64]) -> Vec<f64> {
        let mut spectrum = vec![0.0; self.num_channels];
        for (k, w) in weights.iter().enumerate().take(self.num_signatures()) {
            for (out, s) in spectrum.iter_mut().zip(self.signature(k)) {
                *out += w * s;
            }
        }
        spectrum
    }
}

/// Source of the canonical signature matrix.
///
/// Implementations can use:
/// - tabular files on disk (`mutsig-io`)
/// - an in-memory matrix (testing)
pub trait SignatureProvider: Send + Sync {
    /// Shared handle to the validated matrix.
    fn signatures(&self) -> Result<Arc<SignatureMatrix>>;
}

// ── In-memory implementation ────────────────────────────────────────────────

/// Provider that hands out an already-built matrix.
pub struct StaticSignatures {
    matrix: Arc<SignatureMatrix>,
}

impl StaticSignatures {
    pub fn new(matrix: SignatureMatrix) -> Self {
        Self {
            matrix: Arc::new(matrix),
        }
    }
}

impl SignatureProvider for StaticSignatures {
    fn signatures(&self) -> Result<Arc<SignatureMatrix>> {
        Ok(Arc::clone(&self.matrix))
    }
}
