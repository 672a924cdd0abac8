//! Generic wrapper for iterative methods.
//!
//! Owns one [`Step`] and one [`TerminationCriterion`], runs the iteration
//! loop, carries out the restart protocol and mirrors the shared
//! configuration onto both components.

use crate::config::SolverOptions;
use crate::error::Error;
use crate::solver::{RealOf, Step};
use crate::termination::TerminationCriterion;
use crate::utils::stats::SolveStats;
use num_traits::{Float, One, ToPrimitive, Zero};

/// Iterative method assembled from a step implementation and a termination
/// criterion.
pub struct GenericIterativeMethod<S: Step, C> {
    step: S,
    terminate: C,
    opts: SolverOptions<RealOf<S>>,
}

impl<S, C> GenericIterativeMethod<S, C>
where
    S: Step,
    C: TerminationCriterion<S, Real = RealOf<S>>,
{
    /// Construct from a step implementation and a termination criterion.
    pub fn new(step: S, terminate: C) -> Self {
        let mut method = Self {
            step,
            terminate,
            opts: SolverOptions::default(),
        };
        method.mirror_options();
        method
    }

    /// Apply the iterative method to A·x = b, mutating x in place.
    ///
    /// A result with `converged == false` is a regular outcome; only
    /// contract violations and CG's non-convexity failure are errors.
    pub fn solve(
        &mut self,
        x: &mut S::Vector,
        b: &mut S::Vector,
    ) -> Result<SolveStats<RealOf<S>>, Error> {
        if self.opts.verbosity > 1 {
            println!("\n === {} === ", self.step.name());
        }

        // The snapshot is only kept for steps that may request a restart.
        let snapshot = if S::NEEDS_SNAPSHOT {
            Some((x.clone(), b.clone()))
        } else {
            None
        };

        self.step.init(x, b)?;
        self.terminate.init(&self.step);

        let one = RealOf::<S>::one();
        let mut last_estimate = one;
        let mut converged = false;
        let mut k: u32 = 1;
        while k <= self.opts.max_steps {
            self.step
                .note_minimal_decrease(self.terminate.minimal_decrease_achieved());
            self.step.compute(x, b)?;

            if self.terminate.check(&self.step)? {
                converged = true;
                break;
            }
            if self.step.wants_terminate() {
                converged = true;
                break;
            }
            if self.step.wants_restart() {
                let Some((x0, b0)) = &snapshot else {
                    return Err(Error::Uninitialised("restart snapshot"));
                };
                x.clone_from(x0);
                b.clone_from(b0);
                self.step.reset(x, b)?;
                self.terminate.init(&self.step);
                last_estimate = one;
                k = 1;
                continue;
            }

            let estimate = self.terminate.error_estimate();
            if self.opts.verbosity > 1 {
                self.print_iteration(k, estimate, last_estimate);
            }
            last_estimate = estimate;
            k += 1;
        }

        self.step.post_process(x);

        let mut stats = SolveStats::default();
        self.terminate.finalize(&mut stats);
        stats.converged = converged;
        if self.opts.verbosity > 0 {
            self.print_summary(&stats);
        }
        Ok(stats)
    }

    /// Set the iteration budget (must be positive).
    pub fn set_max_steps(&mut self, max_steps: u32) -> Result<(), Error> {
        if max_steps == 0 {
            return Err(Error::InvalidArgument("max_steps must be positive".into()));
        }
        self.opts.max_steps = max_steps;
        Ok(())
    }

    /// Set the verbosity level: 0 silent, 1 final statistics, ≥2 adds a
    /// per-iteration trace.
    pub fn set_verbosity(&mut self, level: u32) {
        self.opts.verbosity = level;
        self.step.set_verbosity(level);
        self.terminate.set_verbosity(level);
    }

    /// Set the required relative accuracy (≥ 0).
    pub fn set_relative_accuracy(&mut self, accuracy: RealOf<S>) -> Result<(), Error> {
        check_accuracy("relative_accuracy", accuracy)?;
        self.opts.relative_accuracy = accuracy;
        self.terminate.set_relative_accuracy(accuracy);
        Ok(())
    }

    /// Set the absolute accuracy used for vanishing-step detection (≥ 0).
    pub fn set_absolute_accuracy(&mut self, accuracy: RealOf<S>) -> Result<(), Error> {
        check_accuracy("absolute_accuracy", accuracy)?;
        self.opts.absolute_accuracy = accuracy;
        self.terminate.set_absolute_accuracy(accuracy);
        Ok(())
    }

    /// Set the relaxed accuracy of the minimal-decrease signal (≥ 0).
    pub fn set_minimal_accuracy(&mut self, accuracy: RealOf<S>) -> Result<(), Error> {
        check_accuracy("minimal_accuracy", accuracy)?;
        self.opts.minimal_accuracy = accuracy;
        self.terminate.set_minimal_accuracy(accuracy);
        Ok(())
    }

    /// Set the maximal attainable accuracy ε (> 0, default machine ε).
    pub fn set_eps(&mut self, eps: RealOf<S>) -> Result<(), Error> {
        if !(eps > RealOf::<S>::zero()) {
            return Err(Error::InvalidArgument("eps must be positive".into()));
        }
        self.opts.eps = eps;
        self.step.set_eps(eps);
        self.terminate.set_eps(eps);
        Ok(())
    }

    /// Set the number of inner preconditioner refinement passes.
    pub fn set_iterative_refinements(&mut self, refinements: u32) {
        self.opts.iterative_refinements = refinements;
        self.step.set_iterative_refinements(refinements);
    }

    /// Access the current configuration.
    pub fn options(&self) -> &SolverOptions<RealOf<S>> {
        &self.opts
    }

    /// Access the step implementation.
    pub fn step(&self) -> &S {
        &self.step
    }

    /// Access the step implementation mutably, e.g. to supply Chebyshev
    /// spectral bounds or RCG increase ratios.
    pub fn step_mut(&mut self) -> &mut S {
        &mut self.step
    }

    /// Access the termination criterion.
    pub fn termination(&self) -> &C {
        &self.terminate
    }

    /// Access the termination criterion mutably, e.g. to adjust the
    /// look-ahead of the energy estimator.
    pub fn termination_mut(&mut self) -> &mut C {
        &mut self.terminate
    }

    fn mirror_options(&mut self) {
        let o = self.opts.clone();
        self.step.set_verbosity(o.verbosity);
        self.step.set_eps(o.eps);
        self.step.set_iterative_refinements(o.iterative_refinements);
        self.terminate.set_verbosity(o.verbosity);
        self.terminate.set_eps(o.eps);
        self.terminate.set_relative_accuracy(o.relative_accuracy);
        self.terminate.set_absolute_accuracy(o.absolute_accuracy);
        self.terminate.set_minimal_accuracy(o.minimal_accuracy);
    }

    fn print_iteration(&self, k: u32, estimate: RealOf<S>, last_estimate: RealOf<S>) {
        println!(
            "{:>6}  {:>14.7e}  {:>14.7e}",
            k,
            estimate.to_f64().unwrap_or(f64::NAN),
            (estimate / last_estimate).to_f64().unwrap_or(f64::NAN)
        );
    }

    fn print_summary(&self, stats: &SolveStats<RealOf<S>>) {
        let verdict = if stats.converged { "Converged" } else { "Failed" };
        println!(
            " === {}: {} ===  iterations: {}, reduction: {:.5e}, rate: {:.5e}, elapsed: {:?}",
            self.step.name(),
            verdict,
            stats.iterations,
            stats.reduction.to_f64().unwrap_or(f64::NAN),
            stats.conv_rate.to_f64().unwrap_or(f64::NAN),
            stats.elapsed
        );
    }
}

fn check_accuracy<R: Float>(what: &str, accuracy: R) -> Result<(), Error> {
    if accuracy < R::zero() {
        return Err(Error::InvalidArgument(format!(
            "{what} must be non-negative"
        )));
    }
    Ok(())
}
