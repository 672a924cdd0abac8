//! Truncated regularized conjugate gradient step.
//!
//! Extends RCG: at a direction of non-positive curvature the step consults
//! the termination criterion's minimal-decrease signal. If the current
//! iterate already satisfies the relaxed accuracy, the iteration truncates
//! and returns it (the outer Newton-type loop is still far from the
//! solution); otherwise the RCG regularize-and-restart policy applies.
//!
//! The signal is pushed in by the driver before every `compute` via
//! [`Step::note_minimal_decrease`].

use crate::core::traits::{LinearOperator, ScalarProduct, Vector};
use crate::error::Error;
use crate::preconditioner::Preconditioner;
use crate::solver::cg::{
    apply_preconditioner, initial_state, reset_state, search_direction, step_length,
    update_iterate, update_residual, CgState,
};
use crate::solver::rcg::{adjust_residual, adjust_search_direction, raise_regularization};
use crate::solver::{CgObservable, OperatorType, ResidualObservable, Step};
use num_traits::{Float, NumCast, One, ToPrimitive, Zero};

/// One step of the truncated regularized conjugate gradient method.
pub struct TrcgStep<V: Vector, A, P, S = ()> {
    a: A,
    p: P,
    sp: S,
    state: Option<CgState<V>>,
    pdx: Option<V>,
    k: u32,
    theta: V::Real,
    dx_p_dx: V::Real,
    min_increase: V::Real,
    max_increase: V::Real,
    eps: V::Real,
    operator_type: OperatorType,
    do_restart: bool,
    do_terminate: bool,
    minimal_decrease: bool,
    iterative_refinements: u32,
}

impl<V: Vector, A, P, S> TrcgStep<V, A, P, S> {
    /// Construct from operator, preconditioner and scalar product.
    pub fn new(a: A, p: P, sp: S) -> Self {
        Self {
            a,
            p,
            sp,
            state: None,
            pdx: None,
            k: 0,
            theta: V::Real::zero(),
            dx_p_dx: V::Real::zero(),
            min_increase: <V::Real as NumCast>::from(2.0).unwrap(),
            max_increase: <V::Real as NumCast>::from(1000.0).unwrap(),
            eps: V::Real::epsilon(),
            operator_type: OperatorType::PositiveDefinite,
            do_restart: false,
            do_terminate: false,
            minimal_decrease: false,
            iterative_refinements: 0,
        }
    }

    /// Current regularization parameter θ.
    pub fn theta(&self) -> V::Real {
        self.theta
    }

    /// Definiteness of the (regularized) operator as observed so far.
    pub fn operator_type(&self) -> OperatorType {
        self.operator_type
    }

    /// True as long as no direction of non-positive curvature was met since
    /// the last restart.
    pub fn is_positive_definite(&self) -> bool {
        self.operator_type == OperatorType::PositiveDefinite
    }

    /// Set the minimal ratio θ_new/θ_old when raising the regularization
    /// parameter (default 2).
    pub fn set_minimal_increase(&mut self, min_increase: V::Real) {
        self.min_increase = min_increase;
    }

    /// Set the maximal ratio θ_new/θ_old when raising the regularization
    /// parameter (default 1000).
    pub fn set_maximal_increase(&mut self, max_increase: V::Real) {
        self.max_increase = max_increase;
    }
}

impl<V, A, P, S> Step for TrcgStep<V, A, P, S>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    S: ScalarProduct<V>,
{
    type Vector = V;

    const NEEDS_SNAPSHOT: bool = true;

    fn init(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        self.p.pre(x, b);
        let st = initial_state(&self.a, x, b);
        self.pdx = Some(st.r.clone());
        self.state = Some(st);
        self.k = 0;
        self.theta = V::Real::zero();
        self.dx_p_dx = V::Real::zero();
        self.operator_type = OperatorType::PositiveDefinite;
        self.do_restart = false;
        self.do_terminate = false;
        Ok(())
    }

    fn reset(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        let st = self.state.as_mut().ok_or(Error::Uninitialised(
            "truncated regularized conjugate gradient step",
        ))?;
        let pdx = self.pdx.as_mut().ok_or(Error::Uninitialised(
            "truncated regularized conjugate gradient step",
        ))?;
        reset_state(&self.a, x, b, st);
        pdx.clone_from(&st.r);
        self.k = 0;
        // theta is deliberately carried across the restart
        self.dx_p_dx = V::Real::zero();
        self.operator_type = OperatorType::PositiveDefinite;
        self.do_restart = false;
        self.do_terminate = false;
        Ok(())
    }

    fn compute(&mut self, x: &mut V, _b: &mut V) -> Result<(), Error> {
        let st = self.state.as_mut().ok_or(Error::Uninitialised(
            "truncated regularized conjugate gradient step",
        ))?;
        let pdx = self.pdx.as_mut().ok_or(Error::Uninitialised(
            "truncated regularized conjugate gradient step",
        ))?;
        self.k += 1;
        apply_preconditioner(&self.a, &mut self.p, &self.sp, st, self.iterative_refinements);
        search_direction(&self.a, &self.sp, st, self.k == 1);
        self.dx_p_dx = adjust_search_direction(&self.sp, st, pdx, self.theta);
        if st.dx_a_dx <= V::Real::zero() {
            if self.minimal_decrease {
                log::debug!(
                    "trcg: truncating at non-positive curvature ({:e}); minimal decrease achieved",
                    st.dx_a_dx.to_f64().unwrap_or(f64::NAN)
                );
                st.alpha = V::Real::zero();
                self.operator_type = OperatorType::Indefinite;
                self.do_terminate = true;
            } else {
                log::debug!(
                    "trcg: regularizing at non-positive curvature ({:e})",
                    st.dx_a_dx.to_f64().unwrap_or(f64::NAN)
                );
                raise_regularization(
                    &mut self.theta,
                    st.dx_a_dx,
                    self.dx_p_dx,
                    self.min_increase,
                    self.max_increase,
                    self.eps,
                );
                st.alpha = V::Real::zero();
                self.operator_type = OperatorType::Indefinite;
                self.do_restart = true;
            }
        } else {
            step_length(st);
        }
        update_iterate(st, x);
        update_residual(st);
        adjust_residual(st, pdx, self.theta);
        Ok(())
    }

    fn post_process(&mut self, x: &mut V) {
        self.p.post(x);
    }

    fn name(&self) -> &'static str {
        "Truncated Regularized Conjugate Gradients"
    }

    fn wants_restart(&self) -> bool {
        self.do_restart
    }

    fn wants_terminate(&self) -> bool {
        self.do_terminate
    }

    fn set_eps(&mut self, eps: V::Real) {
        self.eps = eps;
    }

    fn set_iterative_refinements(&mut self, n: u32) {
        self.iterative_refinements = n;
    }

    fn note_minimal_decrease(&mut self, achieved: bool) {
        self.minimal_decrease = achieved;
    }
}

impl<V, A, P, S> ResidualObservable<V::Real> for TrcgStep<V, A, P, S>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    S: ScalarProduct<V>,
{
    fn residual_norm(&self) -> V::Real {
        self.state
            .as_ref()
            .map_or(-V::Real::one(), |st| self.sp.norm(&st.r))
    }
}

impl<V, A, P, S> CgObservable<V::Real> for TrcgStep<V, A, P, S>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    S: ScalarProduct<V>,
{
    fn alpha(&self) -> V::Real {
        self.state.as_ref().map_or(-V::Real::one(), |st| st.alpha)
    }

    fn length(&self) -> V::Real {
        self.state.as_ref().map_or(-V::Real::one(), |st| st.dx_a_dx)
    }

    fn preconditioned_residual_norm(&self) -> V::Real {
        self.state.as_ref().map_or(-V::Real::one(), |st| st.sigma)
    }
}
