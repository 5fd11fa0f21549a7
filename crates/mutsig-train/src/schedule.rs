//! Time-decayed weight of the latent regularization term.

use serde::{Deserialize, Serialize};

/// Share of training over which the weight decays.
pub const DECAY_FRACTION: f64 = 0.8;

/// Linear decay from `max` to `floor` over the first 80% of training, then
/// constant at `floor`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegularizationSchedule {
    pub max: f64,
    pub floor: f64,
    pub total_steps: usize,
}

impl RegularizationSchedule {
    pub fn new(max: f64, floor: f64, total_steps: usize) -> Self {
        Self {
            max,
            floor,
            total_steps,
        }
    }

    pub fn weight_at(&self, step: usize) -> f64 {
        let decay_steps = DECAY_FRACTION * self.total_steps as f64;
        if decay_steps <= 0.0 {
            return self.max;
        }
        let progress = (step as f64).min(decay_steps) / decay_steps;
        self.max - (self.max - self.floor) * progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weight_at_checkpoints() {
        let s = RegularizationSchedule::new(1.0, 0.2, 100);
        assert_eq!(s.weight_at(0), 1.0);
        assert!((s.weight_at(40) - 0.6).abs() < 1e-12);
        assert!((s.weight_at(80) - 0.2).abs() < 1e-12);
        assert!((s.weight_at(99) - 0.2).abs() < 1e-12);
    }

    #[test]
    fn test_non_increasing_then_constant() {
        let s = RegularizationSchedule::new(1.0, 0.2, 100);
        let weights: Vec<f64> = (0..100).map(|i| s.weight_at(i)).collect();
        assert!(weights.windows(2).all(|w| w[1] <= w[0]));
        assert!(weights[80..].iter().all(|w| *w == weights[80]));
    }

    #[test]
    fn test_degenerate_schedule_holds_max() {
        assert_eq!(RegularizationSchedule::new(0.5, 0.1, 0).weight_at(3), 0.5);
    }
}
