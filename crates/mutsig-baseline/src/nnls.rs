//! Lawson–Hanson active-set non-negative least squares.
//!
//! Solves `min ||A x - b||₂ subject to x ≥ 0`. Every iterate is feasible,
//! so stopping early (iteration cap or time budget) still yields a valid
//! non-negative answer.

use std::time::Instant;

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Why the solver stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveStatus {
    /// KKT conditions satisfied
    Converged,
    /// Iteration cap reached; best iterate returned
    IterationCap,
    /// Time budget exhausted; best iterate returned
    TimeBudget,
}

/// Raw solver result.
#[derive(Debug, Clone)]
pub struct NnlsOutcome {
    pub x: DVector<f64>,
    /// Euclidean norm of `A x - b`
    pub residual: f64,
    pub iterations: usize,
    pub status: SolveStatus,
}

/// Run NNLS with at most `max_iter` iterations (inner and outer combined).
pub fn nnls(
    a: &DMatrix<f64>,
    b: &DVector<f64>,
    max_iter: usize,
    deadline: Option<Instant>,
) -> NnlsOutcome {
    let (m, n) = a.shape();
    let tol = 10.0 * f64::EPSILON * a.norm() * m.max(n) as f64;

    let mut x = DVector::<f64>::zeros(n);
    let mut passive = vec![false; n];
    let mut iterations = 0;
    let mut status = SolveStatus::Converged;

    let at = a.transpose();
    let mut w = &at * (b - a * &x);

    'outer: loop {
        // Most violated KKT condition among the active (zero) set
        let candidate = (0..n)
            .filter(|&j| !passive[j] && w[j] > tol)
            .max_by(|&i, &j| w[i].partial_cmp(&w[j]).unwrap_or(std::cmp::Ordering::Equal));
        let Some(j) = candidate else { break };

        if iterations >= max_iter {
            status = SolveStatus::IterationCap;
            break;
        }
        if deadline.is_some_and(|d| Instant::now() >= d) {
            status = SolveStatus::TimeBudget;
            break;
        }
        passive[j] = true;

        loop {
            iterations += 1;
            let s = passive_least_squares(a, b, &passive);

            if (0..n).filter(|&i| passive[i]).all(|i| s[i] > tol) {
                x = s;
                break;
            }

            // Step back towards x until the first passive coordinate hits zero
            let alpha = (0..n)
                .filter(|&i| passive[i] && s[i] <= tol)
                .map(|i| {
                    let denom = x[i] - s[i];
                    if denom > 0.0 { x[i] / denom } else { 0.0 }
                })
                .fold(f64::INFINITY, f64::min);
            x += (&s - &x) * alpha;

            for i in 0..n {
                if passive[i] && x[i] <= tol {
                    passive[i] = false;
                    x[i] = 0.0;
                }
            }

            if iterations >= max_iter {
                status = SolveStatus::IterationCap;
                break 'outer;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                status = SolveStatus::TimeBudget;
                break 'outer;
            }
        }

        w = &at * (b - a * &x);
    }

    x.iter_mut().for_each(|v| *v = v.max(0.0));
    let residual = (a * &x - b).norm();

    NnlsOutcome {
        x,
        residual,
        iterations,
        status,
    }
}

/// Unconstrained least squares restricted to the passive columns; the
/// remaining coordinates are zero.
fn passive_least_squares(a: &DMatrix<f64>, b: &DVector<f64>, passive: &[bool]) -> DVector<f64> {
    let columns: Vec<usize> = (0..passive.len()).filter(|&i| passive[i]).collect();
    let ap = a.select_columns(&columns);

    let normal = ap.transpose() * &ap;
    let rhs = ap.transpose() * b;
    let z = match normal.cholesky() {
        Some(chol) => chol.solve(&rhs),
        // Rank-deficient passive set: fall back to the pseudo-inverse
        None => ap
            .svd(true, true)
            .solve(b, 1e-12)
            .unwrap_or_else(|_| DVector::zeros(columns.len())),
    };

    let mut s = DVector::<f64>::zeros(passive.len());
    for (k, &col) in columns.iter().enumerate() {
        s[col] = z[k];
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_nonnegative_solution_recovered() {
        // Columns are the signatures
        let a = DMatrix::from_row_slice(3, 2, &[0.5, 0.0, 0.5, 0.5, 0.0, 0.5]);
        let truth = DVector::from_vec(vec![0.3, 0.7]);
        let b = &a * &truth;

        let out = nnls(&a, &b, 10, None);
        assert_eq!(out.status, SolveStatus::Converged);
        assert!((out.x[0] - 0.3).abs() < 1e-9);
        assert!((out.x[1] - 0.7).abs() < 1e-9);
        assert!(out.residual < 1e-9);
    }

    #[test]
    fn test_negative_unconstrained_optimum_clamped() {
        // Unconstrained solution would put a negative weight on column 1
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]);
        let b = DVector::from_vec(vec![1.0, -1.0]);

        let out = nnls(&a, &b, 10, None);
        assert!(out.x.iter().all(|v| *v >= 0.0));
        assert!((out.x[0] - 1.0).abs() < 1e-9);
        assert_eq!(out.x[1], 0.0);
    }

    #[test]
    fn test_zero_cap_returns_feasible_iterate() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DVector::from_vec(vec![0.4, 0.6]);

        let out = nnls(&a, &b, 0, None);
        assert_eq!(out.status, SolveStatus::IterationCap);
        assert!(out.x.iter().all(|v| *v == 0.0));
        assert!((out.residual - b.norm()).abs() < 1e-12);
    }

    #[test]
    fn test_expired_deadline_reports_time_budget() {
        let a = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]);
        let b = DVector::from_vec(vec![0.4, 0.6]);

        let out = nnls(&a, &b, 10, Some(Instant::now()));
        assert_eq!(out.status, SolveStatus::TimeBudget);
    }

    #[test]
    fn test_zero_spectrum_converges_immediately() {
        let a = DMatrix::from_row_slice(2, 1, &[0.5, 0.5]);
        let b = DVector::zeros(2);

        let out = nnls(&a, &b, 5, None);
        assert_eq!(out.status, SolveStatus::Converged);
        assert_eq!(out.iterations, 0);
        assert_eq!(out.x[0], 0.0);
    }
}
