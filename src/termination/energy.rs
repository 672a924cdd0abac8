//! Relative energy error criterion (Strakoš/Tichý 2005).
//!
//! Runs the conjugate gradient method d extra iterations (the look-ahead)
//! and estimates the relative error in the energy norm from the scaled
//! gains γ²_k = α_k·σ_k that CG produces anyway. Only locally computed
//! quantities enter the estimate, so it remains numerically stable when the
//! global orthogonality of the Krylov basis deteriorates.
//!
//! Requires the iteration to start at x = 0. More general starting values
//! are possible but must keep the estimate of the solution's energy norm
//! positive (see the paper for details).

use crate::error::Error;
use crate::solver::CgObservable;
use crate::termination::{MinimalDecrease, TerminationCriterion};
use crate::utils::stats::SolveStats;
use num_traits::Float;
use std::time::Instant;

/// Terminates once the estimated relative energy error drops below
/// max(ε, relative accuracy), or once the step length vanishes.
pub struct RelativeEnergyError<R> {
    relative_accuracy: R,
    absolute_accuracy: R,
    minimal_accuracy: R,
    eps: R,
    look_ahead: usize,
    scaled_gamma2: Vec<R>,
    energy_norm2: R,
    step_length2: R,
    started: Option<Instant>,
}

impl<R: Float> RelativeEnergyError<R> {
    /// Construct with the required relative accuracy of the energy error.
    pub fn new(relative_accuracy: R) -> Self {
        Self {
            relative_accuracy,
            ..Self::default()
        }
    }

    /// Set the number of additional iterations used to estimate the energy
    /// error (default 5 here, 25 if never called).
    pub fn set_look_ahead(&mut self, look_ahead: usize) {
        self.look_ahead = look_ahead;
    }

    /// Check whether the energy norm of the current step, ‖dx‖_A = √(dxAdx),
    /// fell below the attainable accuracy relative to the energy norm of the
    /// iterate (or below the absolute accuracy).
    pub fn vanishing_step(&self) -> bool {
        let mut acc2 = self.absolute_accuracy * self.absolute_accuracy;
        if self.energy_norm2 > acc2 {
            acc2 = acc2.min(self.eps * self.eps * self.energy_norm2);
        }
        self.step_length2 < acc2
    }

    fn squared_relative_error(&self) -> R {
        // The estimate only exists once the look-ahead window is exceeded;
        // at exactly look_ahead observations it is still unusable.
        if self.scaled_gamma2.len() <= self.look_ahead {
            return R::max_value();
        }
        let tail = &self.scaled_gamma2[self.scaled_gamma2.len() - self.look_ahead..];
        tail.iter().fold(R::zero(), |acc, &g| acc + g) / self.energy_norm2
    }
}

impl<R: Float> Default for RelativeEnergyError<R> {
    fn default() -> Self {
        Self {
            relative_accuracy: R::epsilon(),
            absolute_accuracy: R::epsilon(),
            minimal_accuracy: R::from(0.25).unwrap(),
            eps: R::epsilon(),
            look_ahead: 25,
            scaled_gamma2: Vec::new(),
            energy_norm2: R::zero(),
            step_length2: R::zero(),
            started: None,
        }
    }
}

impl<R, S> TerminationCriterion<S> for RelativeEnergyError<R>
where
    R: Float,
    S: CgObservable<R>,
{
    type Real = R;

    fn init(&mut self, _step: &S) {
        self.scaled_gamma2.clear();
        self.energy_norm2 = R::zero();
        self.step_length2 = R::zero();
        self.started = Some(Instant::now());
    }

    fn check(&mut self, step: &S) -> Result<bool, Error> {
        if self.started.is_none() {
            return Err(Error::Uninitialised(
                "relative energy error termination criterion",
            ));
        }
        let gamma2 = step.alpha() * step.preconditioned_residual_norm();
        self.scaled_gamma2.push(gamma2);
        self.energy_norm2 = self.energy_norm2 + gamma2;
        self.step_length2 = step.length().abs();

        if self.vanishing_step() {
            return Ok(true);
        }
        Ok(self.scaled_gamma2.len() > self.look_ahead
            && <Self as TerminationCriterion<S>>::error_estimate(self)
                < self.eps.max(self.relative_accuracy))
    }

    fn error_estimate(&self) -> R {
        self.squared_relative_error().sqrt()
    }

    fn minimal_decrease_achieved(&self) -> bool {
        self.squared_relative_error() < self.minimal_accuracy * self.minimal_accuracy
    }

    fn finalize(&self, stats: &mut SolveStats<R>) {
        stats.iterations = self.scaled_gamma2.len();
        stats.reduction = <Self as TerminationCriterion<S>>::error_estimate(self);
        stats.conv_rate = if stats.iterations > 0 {
            stats
                .reduction
                .powf(R::one() / R::from(stats.iterations).unwrap())
        } else {
            R::one()
        };
        stats.elapsed = self.started.map(|t| t.elapsed()).unwrap_or_default();
    }

    fn set_relative_accuracy(&mut self, accuracy: R) {
        self.relative_accuracy = accuracy;
    }

    fn set_absolute_accuracy(&mut self, accuracy: R) {
        self.absolute_accuracy = accuracy;
    }

    fn set_minimal_accuracy(&mut self, accuracy: R) {
        self.minimal_accuracy = accuracy;
    }

    fn set_eps(&mut self, eps: R) {
        self.eps = eps;
    }
}

impl<R> MinimalDecrease for RelativeEnergyError<R> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::ResidualObservable;

    struct MockStep {
        alpha: f64,
        sigma: f64,
        length: f64,
    }

    impl ResidualObservable<f64> for MockStep {
        fn residual_norm(&self) -> f64 {
            self.sigma.sqrt()
        }
    }

    impl CgObservable<f64> for MockStep {
        fn alpha(&self) -> f64 {
            self.alpha
        }
        fn length(&self) -> f64 {
            self.length
        }
        fn preconditioned_residual_norm(&self) -> f64 {
            self.sigma
        }
    }

    #[test]
    fn waits_for_look_ahead_iterations() {
        // Constant gains: after L iterations the estimate is d/L, so with
        // d = 5 the criterion can fire at iteration 6 at the earliest.
        let d = 5;
        let mut criterion = RelativeEnergyError::new(0.95);
        criterion.set_look_ahead(d);
        let step = MockStep {
            alpha: 2.0,
            sigma: 0.5,
            length: 1.0,
        };
        criterion.init(&step);
        for _ in 0..d {
            assert!(!criterion.check(&step).unwrap());
        }
        assert!(criterion.check(&step).unwrap());
        let expected = (d as f64 / (d as f64 + 1.0)).sqrt();
        assert!(
            (TerminationCriterion::<MockStep>::error_estimate(&criterion) - expected).abs()
                < 1e-14
        );
    }

    #[test]
    fn check_before_init_fails() {
        let mut criterion = RelativeEnergyError::new(1e-6);
        let step = MockStep {
            alpha: 1.0,
            sigma: 1.0,
            length: 1.0,
        };
        assert_eq!(
            criterion.check(&step),
            Err(Error::Uninitialised(
                "relative energy error termination criterion"
            ))
        );
    }

    #[test]
    fn estimate_stays_infinite_while_window_fills() {
        // At exactly look_ahead observations the window is not exceeded
        // yet: the estimate keeps its sentinel value and no minimal
        // decrease may be reported.
        let d = 3;
        let mut criterion = RelativeEnergyError::new(1e-9);
        criterion.set_look_ahead(d);
        TerminationCriterion::<MockStep>::set_minimal_accuracy(&mut criterion, 0.95);
        let step = MockStep {
            alpha: 2.0,
            sigma: 0.5,
            length: 1.0,
        };
        criterion.init(&step);
        for _ in 0..d {
            criterion.check(&step).unwrap();
        }
        assert_eq!(
            TerminationCriterion::<MockStep>::error_estimate(&criterion),
            f64::MAX.sqrt()
        );
        assert!(!TerminationCriterion::<MockStep>::minimal_decrease_achieved(
            &criterion
        ));
        // One more observation exceeds the window: estimate √(3/4) < 0.95.
        criterion.check(&step).unwrap();
        assert!(TerminationCriterion::<MockStep>::minimal_decrease_achieved(
            &criterion
        ));
    }

    #[test]
    fn vanishing_step_terminates_early() {
        let mut criterion = RelativeEnergyError::new(1e-9);
        criterion.set_look_ahead(5);
        TerminationCriterion::<MockStep>::set_absolute_accuracy(&mut criterion, 1e-5);
        // Tiny gains keep the accumulated energy below the absolute floor,
        // so the floor is not tightened to eps²·energy².
        let mut step = MockStep {
            alpha: 1e-6,
            sigma: 1e-6,
            length: 1.0,
        };
        criterion.init(&step);
        assert!(!criterion.check(&step).unwrap());
        step.length = 1e-13;
        // step_length² = 1e-13 < absolute_accuracy² = 1e-10.
        assert!(criterion.check(&step).unwrap());
    }

    #[test]
    fn minimal_decrease_follows_minimal_accuracy() {
        let mut criterion = RelativeEnergyError::new(1e-9);
        criterion.set_look_ahead(2);
        let step = MockStep {
            alpha: 1.0,
            sigma: 1.0,
            length: 1.0,
        };
        criterion.init(&step);
        // Window not filled: estimate is +inf, only an infinite minimal
        // accuracy is satisfied.
        TerminationCriterion::<MockStep>::set_minimal_accuracy(&mut criterion, f64::INFINITY);
        assert!(TerminationCriterion::<MockStep>::minimal_decrease_achieved(
            &criterion
        ));
        TerminationCriterion::<MockStep>::set_minimal_accuracy(&mut criterion, 0.0);
        assert!(!TerminationCriterion::<MockStep>::minimal_decrease_achieved(
            &criterion
        ));
        criterion.check(&step).unwrap();
        criterion.check(&step).unwrap();
        criterion.check(&step).unwrap();
        // Estimate is now 2/3 of the energy; sqrt ≈ 0.816.
        TerminationCriterion::<MockStep>::set_minimal_accuracy(&mut criterion, 0.9);
        assert!(TerminationCriterion::<MockStep>::minimal_decrease_achieved(
            &criterion
        ));
        TerminationCriterion::<MockStep>::set_minimal_accuracy(&mut criterion, 0.5);
        assert!(!TerminationCriterion::<MockStep>::minimal_decrease_achieved(
            &criterion
        ));
    }
}
