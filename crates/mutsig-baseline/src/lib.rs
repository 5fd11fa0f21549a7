//! mutsig-baseline — non-negative least-squares estimate of signature weights.
//!
//! The baseline solves `min ||S^T w - x||₂ s.t. w ≥ 0` for every sample
//! independently, on a bounded worker pool that shares only the read-only
//! signature matrix.

pub mod dataset;
pub mod nnls;
pub mod solver;

pub use dataset::{baseline_output_path, create_baseline_dataset, BaselineMethod, BaselineReport};
pub use solver::{Baseline, BatchSolution, SampleError, Solution, SolveStatus};
