//! Preconditioned conjugate gradient step (Hestenes–Stiefel).
//!
//! Besides the plain CG step this module hosts the per-iteration state and
//! the phases every CG variant is assembled from: apply the preconditioner
//! (with optional iterative refinement), form the conjugate search
//! direction, scale it, update the iterate and the recurrent residual.
//! TCG, RCG and TRCG reuse these phases and only replace the handling of
//! directions of non-positive curvature.

use crate::core::traits::{LinearOperator, ScalarProduct, Vector};
use crate::error::Error;
use crate::preconditioner::Preconditioner;
use crate::solver::{CgObservable, ResidualObservable, Step};
use num_traits::{Float, One, ToPrimitive, Zero};

/// Mutable per-iteration state shared by every CG variant.
///
/// Buffers are allocated once on `init` and reused by `reset`. A negative
/// σ marks the state as fresh: the preconditioner phase computes σ from
/// scratch exactly once, afterwards the search-direction phase maintains it.
pub(crate) struct CgState<V: Vector> {
    /// Residual r = b − A·x.
    pub r: V,
    /// Preconditioned residual P·r.
    pub pr: V,
    /// Conjugate search direction.
    pub dx: V,
    /// Image A·dx.
    pub adx: V,
    /// Step length α = σ / dxAdx.
    pub alpha: V::Real,
    /// Direction-update coefficient of the current iteration; `None` on the
    /// first iteration after init/reset.
    pub beta: Option<V::Real>,
    /// σ = |(r, P·r)|, the squared preconditioned residual norm.
    pub sigma: V::Real,
    /// Curvature dxAdx = (dx, A·dx) of the current search direction.
    pub dx_a_dx: V::Real,
}

/// Allocate iteration buffers and compute the initial residual r = b − A·x.
pub(crate) fn initial_state<V, A>(a: &A, x: &V, b: &V) -> CgState<V>
where
    V: Vector,
    A: LinearOperator<V>,
{
    let one = V::Real::one();
    let mut r = b.clone();
    a.apply_scale_add(-one, x, &mut r);
    let mut pr = x.clone();
    pr.set_zero();
    let dx = pr.clone();
    let mut adx = b.clone();
    adx.set_zero();
    CgState {
        r,
        pr,
        dx,
        adx,
        alpha: -one,
        beta: None,
        sigma: -one,
        dx_a_dx: -one,
    }
}

/// Same as `initial_state`, reusing the already-allocated buffers.
pub(crate) fn reset_state<V, A>(a: &A, x: &V, b: &V, st: &mut CgState<V>)
where
    V: Vector,
    A: LinearOperator<V>,
{
    let one = V::Real::one();
    st.r.clone_from(b);
    a.apply_scale_add(-one, x, &mut st.r);
    st.pr.set_zero();
    st.dx.set_zero();
    st.adx.set_zero();
    st.alpha = -one;
    st.beta = None;
    st.sigma = -one;
    st.dx_a_dx = -one;
}

/// Apply the preconditioner, pr ← P·r, with optional refinement passes
/// pr ← pr + P·(r − A·pr). Also used by the Chebyshev semi-iteration.
pub(crate) fn refined_preconditioner_apply<V, A, P>(
    a: &A,
    p: &mut P,
    r: &V,
    pr: &mut V,
    refinements: u32,
) where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
{
    let one = V::Real::one();
    p.apply(pr, r);
    if refinements > 0 {
        let mut r2 = r.clone();
        let mut dpr = pr.clone();
        for _ in 0..refinements {
            a.apply_scale_add(-one, pr, &mut r2);
            p.apply(&mut dpr, &r2);
            pr.axpy(one, &dpr);
        }
    }
}

/// Preconditioner phase: pr ← P·r and, on the first call after init/reset,
/// σ ← |(r, pr)|.
pub(crate) fn apply_preconditioner<V, A, P, S>(
    a: &A,
    p: &mut P,
    sp: &S,
    st: &mut CgState<V>,
    refinements: u32,
) where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    S: ScalarProduct<V>,
{
    refined_preconditioner_apply(a, p, &st.r, &mut st.pr, refinements);
    if st.sigma < V::Real::zero() {
        st.sigma = sp.dot(&st.r, &st.pr).abs();
    }
}

/// Search-direction phase: dx ← pr on the first iteration, otherwise
/// dx ← β·dx + pr with β = σ_new/σ. Recomputes A·dx and the curvature.
pub(crate) fn search_direction<V, A, S>(a: &A, sp: &S, st: &mut CgState<V>, first: bool)
where
    V: Vector,
    A: LinearOperator<V>,
    S: ScalarProduct<V>,
{
    if first {
        st.dx.clone_from(&st.pr);
        st.beta = None;
    } else {
        let new_sigma = sp.dot(&st.r, &st.pr).abs();
        let beta = new_sigma / st.sigma;
        st.dx.scale(beta);
        st.dx.axpy(V::Real::one(), &st.pr);
        st.sigma = new_sigma;
        st.beta = Some(beta);
    }
    a.apply(&st.dx, &mut st.adx);
    st.dx_a_dx = sp.dot(&st.dx, &st.adx);
}

/// Scaling phase: α ← σ / dxAdx.
pub(crate) fn step_length<V: Vector>(st: &mut CgState<V>) {
    st.alpha = st.sigma / st.dx_a_dx;
}

/// x ← x + α·dx
pub(crate) fn update_iterate<V: Vector>(st: &CgState<V>, x: &mut V) {
    x.axpy(st.alpha, &st.dx);
}

/// r ← r − α·A·dx
pub(crate) fn update_residual<V: Vector>(st: &mut CgState<V>) {
    let a = -st.alpha;
    st.r.axpy(a, &st.adx);
}

/// One step of the preconditioned conjugate gradient method.
///
/// Requires a positive definite operator; a direction of non-positive
/// curvature aborts the solve with [`Error::NonConvexOperator`].
pub struct CgStep<V: Vector, A, P, S = ()> {
    a: A,
    p: P,
    sp: S,
    state: Option<CgState<V>>,
    k: u32,
    iterative_refinements: u32,
}

impl<V: Vector, A, P, S> CgStep<V, A, P, S> {
    /// Construct from operator, preconditioner and scalar product.
    pub fn new(a: A, p: P, sp: S) -> Self {
        Self {
            a,
            p,
            sp,
            state: None,
            k: 0,
            iterative_refinements: 0,
        }
    }
}

impl<V, A, P, S> Step for CgStep<V, A, P, S>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    S: ScalarProduct<V>,
{
    type Vector = V;

    fn init(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        self.p.pre(x, b);
        self.state = Some(initial_state(&self.a, x, b));
        self.k = 0;
        Ok(())
    }

    fn reset(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        let st = self
            .state
            .as_mut()
            .ok_or(Error::Uninitialised("conjugate gradient step"))?;
        reset_state(&self.a, x, b, st);
        self.k = 0;
        Ok(())
    }

    fn compute(&mut self, x: &mut V, _b: &mut V) -> Result<(), Error> {
        let st = self
            .state
            .as_mut()
            .ok_or(Error::Uninitialised("conjugate gradient step"))?;
        self.k += 1;
        apply_preconditioner(&self.a, &mut self.p, &self.sp, st, self.iterative_refinements);
        search_direction(&self.a, &self.sp, st, self.k == 1);
        if st.dx_a_dx <= V::Real::zero() {
            log::debug!(
                "cg: direction of non-positive curvature ({:e}); use TCG, RCG or TRCG for indefinite operators",
                st.dx_a_dx.to_f64().unwrap_or(f64::NAN)
            );
            return Err(Error::NonConvexOperator {
                curvature: st.dx_a_dx.to_f64().unwrap_or(f64::NAN),
            });
        }
        step_length(st);
        update_iterate(st, x);
        update_residual(st);
        Ok(())
    }

    fn post_process(&mut self, x: &mut V) {
        self.p.post(x);
    }

    fn name(&self) -> &'static str {
        "Conjugate Gradients"
    }

    fn set_iterative_refinements(&mut self, n: u32) {
        self.iterative_refinements = n;
    }
}

impl<V, A, P, S> ResidualObservable<V::Real> for CgStep<V, A, P, S>
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

impl<V, A, P, S> CgObservable<V::Real> for CgStep<V, A, P, S>
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
