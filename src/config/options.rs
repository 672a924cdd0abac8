//! Shared solver configuration.
//!
//! The driver owns one `SolverOptions` value and mirrors every change onto
//! its step and termination criterion, so the same knobs work for every
//! method variant.

use num_traits::Float;

/// Configuration of a generic iterative method.
#[derive(Clone, Debug)]
pub struct SolverOptions<R> {
    /// Upper bound on iterations; exceeding it yields a non-converged result.
    pub max_steps: u32,

    /// 0 silent, 1 final statistics, ≥2 per-iteration trace.
    pub verbosity: u32,

    /// Required relative accuracy of the termination criterion.
    pub relative_accuracy: R,

    /// Floor for vanishing-step detection.
    pub absolute_accuracy: R,

    /// Relaxed accuracy for the minimal-decrease signal (TRCG).
    pub minimal_accuracy: R,

    /// Maximal attainable accuracy ε.
    pub eps: R,

    /// Inner refinement passes of the preconditioner application.
    pub iterative_refinements: u32,
}

impl<R: Float> Default for SolverOptions<R> {
    fn default() -> Self {
        Self {
            max_steps: 1000,
            verbosity: 0,
            relative_accuracy: R::epsilon(),
            absolute_accuracy: R::epsilon(),
            minimal_accuracy: R::from(0.25).unwrap(),
            eps: R::epsilon(),
            iterative_refinements: 0,
        }
    }
}
