#![forbid(unsafe_code)]

//! Float comparison used by the summary checks.

use serde::Serialize;

/// Relative tolerance for solution components across backends.
pub const SOLUTION_VECTOR_RELATIVE_TOL: f64 = 1.0e-17;
/// Relative tolerance for the final objective across backends.
pub const OBJECTIVE_RELATIVE_TOL: f64 = 1.0e-17;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CrossFileTolerances {
    pub solution_vector: f64,
    pub objective: f64,
}

impl Default for CrossFileTolerances {
    fn default() -> Self {
        Self {
            solution_vector: SOLUTION_VECTOR_RELATIVE_TOL,
            objective: OBJECTIVE_RELATIVE_TOL,
        }
    }
}

/// `|a-b| / mean(|a|,|b|) < tol`, and always true when both are zero.
#[must_use]
pub fn relative_match(a: f64, b: f64, tol: f64) -> bool {
    if a == 0.0 && b == 0.0 {
        return true;
    }
    let avg = (a.abs() + b.abs()) / 2.0;
    (a - b).abs() / avg < tol
}

/// `|a-b| <= abs_tol`; the boundary itself passes.
#[must_use]
pub fn absolute_match(a: f64, b: f64, abs_tol: f64) -> bool {
    (a - b).abs() <= abs_tol
}
