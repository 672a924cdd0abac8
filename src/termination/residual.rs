//! Residual-based relative error criterion.

use crate::error::Error;
use crate::solver::ResidualObservable;
use crate::termination::TerminationCriterion;
use crate::utils::stats::SolveStats;
use num_traits::Float;
use std::time::Instant;

/// Terminates once ‖r‖/‖r₀‖ drops below max(ε, relative accuracy).
pub struct ResidualBased<R> {
    relative_accuracy: R,
    eps: R,
    initial_residual_norm: R,
    latest_estimate: R,
    iteration: usize,
    started: Option<Instant>,
}

impl<R: Float> ResidualBased<R> {
    /// Construct with the required relative accuracy of the residual.
    pub fn new(relative_accuracy: R) -> Self {
        Self {
            relative_accuracy,
            ..Self::default()
        }
    }
}

impl<R: Float> Default for ResidualBased<R> {
    fn default() -> Self {
        Self {
            relative_accuracy: R::epsilon(),
            eps: R::epsilon(),
            initial_residual_norm: -R::one(),
            latest_estimate: R::one(),
            iteration: 0,
            started: None,
        }
    }
}

impl<R, S> TerminationCriterion<S> for ResidualBased<R>
where
    R: Float,
    S: ResidualObservable<R>,
{
    type Real = R;

    fn init(&mut self, step: &S) {
        self.initial_residual_norm = step.residual_norm();
        self.latest_estimate = R::one();
        self.iteration = 0;
        self.started = Some(Instant::now());
    }

    fn check(&mut self, step: &S) -> Result<bool, Error> {
        if self.initial_residual_norm < R::zero() {
            return Err(Error::Uninitialised("residual-based termination criterion"));
        }
        self.iteration += 1;
        self.latest_estimate = step.residual_norm() / self.initial_residual_norm;
        Ok(self.latest_estimate < self.eps.max(self.relative_accuracy))
    }

    fn error_estimate(&self) -> R {
        self.latest_estimate
    }

    fn finalize(&self, stats: &mut SolveStats<R>) {
        stats.iterations = self.iteration;
        stats.reduction = self.latest_estimate;
        stats.conv_rate = if self.iteration > 0 {
            self.latest_estimate
                .powf(R::one() / R::from(self.iteration).unwrap())
        } else {
            R::one()
        };
        stats.elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
    }

    fn set_relative_accuracy(&mut self, accuracy: R) {
        self.relative_accuracy = accuracy;
    }

    fn set_eps(&mut self, eps: R) {
        self.eps = eps;
    }
}
