//! Explicit execution mode passed to every forward call.

use serde::{Deserialize, Serialize};

/// Whether a forward pass is part of training or of evaluation/inference.
///
/// Models carry no mode flag of their own; each call states its mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Stochastic latent sampling, raw network outputs
    Train,
    /// Deterministic latent means, post-processed outputs
    Eval,
}
