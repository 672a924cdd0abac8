//! Truncated conjugate gradient step.
//!
//! Identical to CG except at directions of non-positive curvature, where the
//! iteration stops with the current iterate instead of failing. Intended for
//! trust-region-like outer loops that only need a descent direction.

use crate::core::traits::{LinearOperator, ScalarProduct, Vector};
use crate::error::Error;
use crate::preconditioner::Preconditioner;
use crate::solver::cg::{
    apply_preconditioner, initial_state, reset_state, search_direction, step_length,
    update_iterate, update_residual, CgState,
};
use crate::solver::{CgObservable, OperatorType, ResidualObservable, Step};
use num_traits::{One, ToPrimitive, Zero};

/// One step of the truncated conjugate gradient method.
pub struct TcgStep<V: Vector, A, P, S = ()> {
    a: A,
    p: P,
    sp: S,
    state: Option<CgState<V>>,
    k: u32,
    operator_type: OperatorType,
    do_terminate: bool,
    perform_blind_update: bool,
    iterative_refinements: u32,
}

impl<V: Vector, A, P, S> TcgStep<V, A, P, S> {
    /// Construct from operator, preconditioner and scalar product.
    pub fn new(a: A, p: P, sp: S) -> Self {
        Self {
            a,
            p,
            sp,
            state: None,
            k: 0,
            operator_type: OperatorType::PositiveDefinite,
            do_terminate: false,
            perform_blind_update: true,
            iterative_refinements: 0,
        }
    }

    /// Definiteness of the operator as observed so far.
    pub fn operator_type(&self) -> OperatorType {
        self.operator_type
    }

    /// True as long as no direction of non-positive curvature was met.
    pub fn is_positive_definite(&self) -> bool {
        self.operator_type == OperatorType::PositiveDefinite
    }

    /// Toggle the blind update x ← x + dx performed when non-positive
    /// curvature is met on the very first iteration (default: enabled).
    /// Without it a first-step truncation would return the unchanged x₀.
    pub fn set_perform_blind_update(&mut self, blind_update: bool) {
        self.perform_blind_update = blind_update;
    }
}

impl<V, A, P, S> Step for TcgStep<V, A, P, S>
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
        self.operator_type = OperatorType::PositiveDefinite;
        self.do_terminate = false;
        Ok(())
    }

    fn reset(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        let st = self
            .state
            .as_mut()
            .ok_or(Error::Uninitialised("truncated conjugate gradient step"))?;
        reset_state(&self.a, x, b, st);
        self.k = 0;
        self.operator_type = OperatorType::PositiveDefinite;
        self.do_terminate = false;
        Ok(())
    }

    fn compute(&mut self, x: &mut V, _b: &mut V) -> Result<(), Error> {
        let st = self
            .state
            .as_mut()
            .ok_or(Error::Uninitialised("truncated conjugate gradient step"))?;
        self.k += 1;
        apply_preconditioner(&self.a, &mut self.p, &self.sp, st, self.iterative_refinements);
        search_direction(&self.a, &self.sp, st, self.k == 1);
        if st.dx_a_dx <= V::Real::zero() {
            log::debug!(
                "tcg: truncating at non-positive curvature ({:e})",
                st.dx_a_dx.to_f64().unwrap_or(f64::NAN)
            );
            // A truncation on the first step leaves no usable iterate; the
            // blind update keeps a chance to escape the nonconvexity.
            if self.k == 1 && self.perform_blind_update {
                x.axpy(V::Real::one(), &st.dx);
            }
            st.alpha = V::Real::zero();
            self.operator_type = OperatorType::Indefinite;
            self.do_terminate = true;
        } else {
            step_length(st);
        }
        update_iterate(st, x);
        update_residual(st);
        Ok(())
    }

    fn post_process(&mut self, x: &mut V) {
        self.p.post(x);
    }

    fn name(&self) -> &'static str {
        "Truncated Conjugate Gradients"
    }

    fn wants_terminate(&self) -> bool {
        self.do_terminate
    }

    fn set_iterative_refinements(&mut self, n: u32) {
        self.iterative_refinements = n;
    }
}

impl<V, A, P, S> ResidualObservable<V::Real> for TcgStep<V, A, P, S>
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

impl<V, A, P, S> CgObservable<V::Real> for TcgStep<V, A, P, S>
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::Identity;
    use faer::Mat;

    fn indefinite2() -> Mat<f64> {
        Mat::from_fn(2, 2, |i, j| [[1.0, 0.0], [0.0, -1.0]][i][j])
    }

    #[test]
    fn truncates_with_blind_update_on_first_step() {
        let mut step = TcgStep::new(indefinite2(), Identity, ());
        let mut x = vec![0.0, 0.0];
        let mut b = vec![1.0, 1.0];
        step.init(&mut x, &mut b).unwrap();
        step.compute(&mut x, &mut b).unwrap();
        assert!(step.wants_terminate());
        assert_eq!(step.operator_type(), OperatorType::Indefinite);
        // Blind update: x = x0 + dx = (1, 1).
        assert_eq!(x, vec![1.0, 1.0]);
    }

    #[test]
    fn blind_update_can_be_disabled() {
        let mut step = TcgStep::new(indefinite2(), Identity, ());
        step.set_perform_blind_update(false);
        let mut x = vec![0.0, 0.0];
        let mut b = vec![1.0, 1.0];
        step.init(&mut x, &mut b).unwrap();
        step.compute(&mut x, &mut b).unwrap();
        assert!(step.wants_terminate());
        assert_eq!(x, vec![0.0, 0.0]);
    }

    #[test]
    fn behaves_like_cg_on_positive_definite_operator() {
        let a = Mat::from_fn(2, 2, |i, j| [[4.0, 1.0], [1.0, 3.0]][i][j]);
        let mut step = TcgStep::new(a, Identity, ());
        let mut x = vec![0.0, 0.0];
        let mut b = vec![1.0, 2.0];
        step.init(&mut x, &mut b).unwrap();
        step.compute(&mut x, &mut b).unwrap();
        assert!(!step.wants_terminate());
        assert!(step.is_positive_definite());
        let alpha = 0.25;
        assert!((step.alpha() - alpha).abs() < 1e-14);
    }
}
