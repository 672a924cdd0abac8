//! Termination criteria for the generic iterative method.
//!
//! A criterion observes the step through the capability traits
//! [`ResidualObservable`](crate::solver::ResidualObservable) and
//! [`CgObservable`](crate::solver::CgObservable) instead of a connect/notify
//! system: each implementation is generic over any step exposing the
//! quantities it consumes, so pairing a method with a criterion it cannot
//! feed is a compile error.

use crate::error::Error;
use crate::utils::stats::SolveStats;
use num_traits::Float;

/// Decides convergence of an iterative method.
///
/// The driver calls `init` after the step's `init`/`reset` and `check` after
/// every `compute`; `finalize` fills the solve statistics at the end.
pub trait TerminationCriterion<S: ?Sized> {
    /// Real scalar type of the error estimates.
    type Real: Float;

    /// Capture the initial state (e.g. the initial residual norm) and start
    /// the timer.
    fn init(&mut self, step: &S);

    /// Observe the step after one iteration; returns true once the required
    /// accuracy is reached. Invoking a criterion that was never initialised
    /// is a caller contract violation and fails with
    /// [`Error::Uninitialised`].
    fn check(&mut self, step: &S) -> Result<bool, Error>;

    /// Latest error estimate.
    fn error_estimate(&self) -> Self::Real;

    /// Relaxed convergence signal: the iterate is good enough for an outer
    /// Newton-type loop even if the required accuracy is not reached yet.
    /// Consumed by the truncated regularized conjugate gradient method.
    fn minimal_decrease_achieved(&self) -> bool {
        false
    }

    /// Write iterations, reduction, convergence rate and elapsed time.
    fn finalize(&self, stats: &mut SolveStats<Self::Real>);

    // Parameter mirroring: the driver forwards its configuration to every
    // criterion that declares the capability by overriding these.
    fn set_relative_accuracy(&mut self, _accuracy: Self::Real) {}
    fn set_absolute_accuracy(&mut self, _accuracy: Self::Real) {}
    fn set_minimal_accuracy(&mut self, _accuracy: Self::Real) {}
    fn set_eps(&mut self, _eps: Self::Real) {}
    fn set_verbosity(&mut self, _level: u32) {}
}

/// Marker for criteria whose [`TerminationCriterion::minimal_decrease_achieved`]
/// signal is meaningful. A TRCG solver can only be assembled against a
/// criterion carrying this capability.
pub trait MinimalDecrease {}

pub mod energy;
pub mod residual;

pub use energy::RelativeEnergyError;
pub use residual::ResidualBased;
