//! Solve statistics reported by the generic iterative method.

use num_traits::Float;
use std::time::Duration;

/// Outcome of a `solve` call.
///
/// A non-converged solve is a regular value, not an error; inspect
/// `converged` before trusting the iterate.
#[derive(Clone, Debug)]
pub struct SolveStats<R> {
    /// Whether the termination criterion (or a step-requested truncation)
    /// was satisfied within the iteration budget.
    pub converged: bool,
    /// Iterations consumed since the last restart.
    pub iterations: usize,
    /// Final error estimate relative to the initial one.
    pub reduction: R,
    /// Geometric mean reduction per iteration, reduction^(1/iterations).
    pub conv_rate: R,
    /// Wall-clock time of the iteration.
    pub elapsed: Duration,
}

impl<R: Float> Default for SolveStats<R> {
    fn default() -> Self {
        Self {
            converged: false,
            iterations: 0,
            reduction: R::one(),
            conv_rate: R::one(),
            elapsed: Duration::ZERO,
        }
    }
}
