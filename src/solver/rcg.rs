//! Regularized conjugate gradient step.
//!
//! Replaces A by A + θ·P⁻¹ whenever a direction of non-positive curvature is
//! met, raising the regularization parameter θ and asking the driver for a
//! restart from the initial data. θ is monotone increasing over a solve; it
//! survives restarts and is only reset by a new `init`.
//!
//! The auxiliary vector Pdx follows the search-direction recurrence with r
//! in place of P·r, so Pdx is the P-preimage of dx at every iteration. This
//! gives the θ-terms (dx, Pdx) and r ← r − α·θ·Pdx without ever applying the
//! inverse preconditioner.

use crate::core::traits::{LinearOperator, ScalarProduct, Vector};
use crate::error::Error;
use crate::preconditioner::Preconditioner;
use crate::solver::cg::{
    apply_preconditioner, initial_state, reset_state, search_direction, step_length,
    update_iterate, update_residual, CgState,
};
use crate::solver::{CgObservable, OperatorType, ResidualObservable, Step};
use num_traits::{Float, NumCast, One, ToPrimitive, Zero};

/// Pdx ← β·Pdx + r (skipped on the first iteration, where Pdx = r₀ already
/// mirrors dx = P·r₀), then fold the θ-term into the curvature:
/// dxAdx ← dxAdx + θ·(dx, Pdx). Returns (dx, Pdx).
pub(crate) fn adjust_search_direction<V, S>(
    sp: &S,
    st: &mut CgState<V>,
    pdx: &mut V,
    theta: V::Real,
) -> V::Real
where
    V: Vector,
    S: ScalarProduct<V>,
{
    if let Some(beta) = st.beta {
        pdx.scale(beta);
        pdx.axpy(V::Real::one(), &st.r);
    }
    let dx_p_dx = sp.dot(&st.dx, pdx);
    st.dx_a_dx = st.dx_a_dx + theta * dx_p_dx;
    dx_p_dx
}

/// Regularized residual adjustment: r ← r − α·θ·Pdx.
pub(crate) fn adjust_residual<V: Vector>(st: &mut CgState<V>, pdx: &V, theta: V::Real) {
    let a = -(st.alpha * theta);
    st.r.axpy(a, pdx);
}

/// Raise θ after a direction of non-positive curvature, keeping the ratio
/// θ_new/θ_old within [min_increase, max_increase].
pub(crate) fn raise_regularization<R: Float>(
    theta: &mut R,
    dx_a_dx: R,
    dx_p_dx: R,
    min_increase: R,
    max_increase: R,
    eps: R,
) {
    let old = if *theta > R::zero() { *theta } else { eps };
    let raised = *theta + (R::one() - dx_a_dx) / dx_p_dx.abs();
    let clamped = raised.max(min_increase * old).min(max_increase * old);
    log::debug!(
        "rcg: raising regularization parameter from {:e} to {:e} (unclamped {:e})",
        old.to_f64().unwrap_or(f64::NAN),
        clamped.to_f64().unwrap_or(f64::NAN),
        raised.to_f64().unwrap_or(f64::NAN)
    );
    *theta = clamped;
}

/// One step of the regularized conjugate gradient method.
pub struct RcgStep<V: Vector, A, P, S = ()> {
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
    iterative_refinements: u32,
}

impl<V: Vector, A, P, S> RcgStep<V, A, P, S> {
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

impl<V, A, P, S> Step for RcgStep<V, A, P, S>
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
        Ok(())
    }

    fn reset(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        let st = self
            .state
            .as_mut()
            .ok_or(Error::Uninitialised("regularized conjugate gradient step"))?;
        let pdx = self
            .pdx
            .as_mut()
            .ok_or(Error::Uninitialised("regularized conjugate gradient step"))?;
        reset_state(&self.a, x, b, st);
        pdx.clone_from(&st.r);
        self.k = 0;
        // theta is deliberately carried across the restart
        self.dx_p_dx = V::Real::zero();
        self.operator_type = OperatorType::PositiveDefinite;
        self.do_restart = false;
        Ok(())
    }

    fn compute(&mut self, x: &mut V, _b: &mut V) -> Result<(), Error> {
        let st = self
            .state
            .as_mut()
            .ok_or(Error::Uninitialised("regularized conjugate gradient step"))?;
        let pdx = self
            .pdx
            .as_mut()
            .ok_or(Error::Uninitialised("regularized conjugate gradient step"))?;
        self.k += 1;
        apply_preconditioner(&self.a, &mut self.p, &self.sp, st, self.iterative_refinements);
        search_direction(&self.a, &self.sp, st, self.k == 1);
        self.dx_p_dx = adjust_search_direction(&self.sp, st, pdx, self.theta);
        if st.dx_a_dx <= V::Real::zero() {
            log::debug!(
                "rcg: regularizing at non-positive curvature ({:e})",
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
        "Regularized Conjugate Gradients"
    }

    fn wants_restart(&self) -> bool {
        self.do_restart
    }

    fn set_eps(&mut self, eps: V::Real) {
        self.eps = eps;
    }

    fn set_iterative_refinements(&mut self, n: u32) {
        self.iterative_refinements = n;
    }
}

impl<V, A, P, S> ResidualObservable<V::Real> for RcgStep<V, A, P, S>
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

impl<V, A, P, S> CgObservable<V::Real> for RcgStep<V, A, P, S>
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
