//! Preconditioned Chebyshev semi-iteration.
//!
//! Three-term recurrence with explicit recomputation of the residual in
//! every step. Recomputing r = b − A·x avoids the accumulation of round-off
//! in the residual at the cost of one extra operator application per step;
//! unlike for Krylov methods this does not slow down convergence
//! (Gutknecht/Röllin 2002).
//!
//! The method needs bounds on the spectrum of the preconditioned operator:
//! set them via [`ChebyshevStep::set_spectrum`] or
//! [`ChebyshevStep::set_spectral_bounds`] before solving. For a mass matrix
//! on tetrahedral Q1 elements with one-step Jacobi preconditioning the
//! spectrum is contained in [0.5, 2.5] (Wathen 1987); see
//! [`ChebyshevStep::init_for_mass_matrix_tet_q1`].

use crate::core::traits::{LinearOperator, ScalarProduct, Vector};
use crate::error::Error;
use crate::preconditioner::Preconditioner;
use crate::solver::cg::refined_preconditioner_apply;
use crate::solver::{ResidualObservable, Step};
use num_traits::{Float, NumCast, One, Zero};

struct ChebyshevState<V> {
    /// Residual r = b − A·x, recomputed explicitly every step.
    r: V,
    /// Preconditioned residual P·r.
    pr: V,
    /// Previous iterate of the three-term recurrence.
    x_prev: V,
}

/// One step of the preconditioned Chebyshev semi-iteration.
pub struct ChebyshevStep<V: Vector, A, P, S = ()> {
    a: A,
    p: P,
    sp: S,
    center: V::Real,
    radius: V::Real,
    spectrum_set: bool,
    state: Option<ChebyshevState<V>>,
    alpha: V::Real,
    beta: V::Real,
    sigma: V::Real,
    k: u32,
    iterative_refinements: u32,
}

impl<V: Vector, A, P, S> ChebyshevStep<V, A, P, S> {
    /// Construct from operator, preconditioner and scalar product. Spectral
    /// bounds must be supplied before the first solve.
    pub fn new(a: A, p: P, sp: S) -> Self {
        Self {
            a,
            p,
            sp,
            center: V::Real::zero(),
            radius: V::Real::zero(),
            spectrum_set: false,
            state: None,
            alpha: V::Real::zero(),
            beta: V::Real::zero(),
            sigma: -V::Real::one(),
            k: 1,
            iterative_refinements: 0,
        }
    }

    /// Provide the spectrum of the preconditioned operator as centre c and
    /// half-radius ρ, i.e. spec(P·A) ⊂ [c − ρ, c + ρ].
    pub fn set_spectrum(&mut self, center: V::Real, radius: V::Real) {
        self.center = center;
        self.radius = radius;
        self.spectrum_set = true;
    }

    /// Provide the spectrum as an interval [a, b].
    pub fn set_spectral_bounds(&mut self, a: V::Real, b: V::Real) {
        let two = <V::Real as NumCast>::from(2.0).unwrap();
        self.set_spectrum((a + b) / two, (a.max(b) - a.min(b)) / two);
    }

    /// Spectral setup for a mass matrix on tetrahedral Q1 elements with a
    /// one-step Jacobi preconditioner: c = 0.5 + h, ρ = h with the half
    /// spectral diameter h (default 1, giving the Wathen interval
    /// [0.5, 2.5]). Increase h when using a block-Jacobi preconditioner.
    pub fn init_for_mass_matrix_tet_q1(&mut self, half_spectral_diameter: V::Real) {
        let half = <V::Real as NumCast>::from(0.5).unwrap();
        self.set_spectrum(half + half_spectral_diameter, half_spectral_diameter);
    }
}

impl<V, A, P, S> Step for ChebyshevStep<V, A, P, S>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    S: ScalarProduct<V>,
{
    type Vector = V;

    fn init(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        if !self.spectrum_set {
            return Err(Error::Uninitialised("chebyshev spectral bounds"));
        }
        self.p.pre(x, b);
        let one = V::Real::one();
        let mut r = b.clone();
        self.a.apply_scale_add(-one, x, &mut r);
        let mut pr = x.clone();
        pr.set_zero();
        self.p.apply(&mut pr, &r);
        self.sigma = self.sp.dot(&r, &pr);
        let mut x_prev = x.clone();
        x_prev.set_zero();
        self.state = Some(ChebyshevState { r, pr, x_prev });
        self.alpha = V::Real::zero();
        self.beta = V::Real::zero();
        self.k = 1;
        Ok(())
    }

    fn reset(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        let st = self
            .state
            .as_mut()
            .ok_or(Error::Uninitialised("chebyshev semi-iteration step"))?;
        let one = V::Real::one();
        st.r.clone_from(b);
        self.a.apply_scale_add(-one, x, &mut st.r);
        st.pr.set_zero();
        self.p.apply(&mut st.pr, &st.r);
        self.sigma = self.sp.dot(&st.r, &st.pr);
        st.x_prev.set_zero();
        self.alpha = V::Real::zero();
        self.beta = V::Real::zero();
        self.k = 1;
        Ok(())
    }

    fn compute(&mut self, x: &mut V, b: &mut V) -> Result<(), Error> {
        let st = self
            .state
            .as_mut()
            .ok_or(Error::Uninitialised("chebyshev semi-iteration step"))?;
        let one = V::Real::one();
        refined_preconditioner_apply(
            &self.a,
            &mut self.p,
            &st.r,
            &mut st.pr,
            self.iterative_refinements,
        );
        self.sigma = self.sp.dot(&st.pr, &st.r);

        // Step parameters of the three-term recurrence.
        if self.k == 1 {
            self.beta = V::Real::zero();
            self.alpha = -self.center;
        } else {
            self.beta = if self.k == 2 {
                let half = <V::Real as NumCast>::from(0.5).unwrap();
                -half * self.radius * self.radius / self.center
            } else {
                let quarter = <V::Real as NumCast>::from(0.25).unwrap();
                quarter * self.radius * self.radius / self.alpha
            };
            self.alpha = -(self.center + self.beta);
        }

        // x ← −(c·x + P·r + β·x₋₁)/α
        let x_old = x.clone();
        x.scale(self.center);
        x.axpy(one, &st.pr);
        x.axpy(self.beta, &st.x_prev);
        x.scale(-one / self.alpha);
        st.x_prev = x_old;

        // Explicit residual recomputation.
        st.r.clone_from(b);
        self.a.apply_scale_add(-one, x, &mut st.r);
        self.p.apply(&mut st.pr, &st.r);
        self.sigma = self.sp.dot(&st.r, &st.pr);

        self.k += 1;
        Ok(())
    }

    fn post_process(&mut self, x: &mut V) {
        self.p.post(x);
    }

    fn name(&self) -> &'static str {
        "Chebyshev Semi-Iteration"
    }

    fn set_iterative_refinements(&mut self, n: u32) {
        self.iterative_refinements = n;
    }
}

impl<V, A, P, S> ResidualObservable<V::Real> for ChebyshevStep<V, A, P, S>
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preconditioner::Jacobi;
    use faer::Mat;

    #[test]
    fn init_fails_without_spectrum() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let mut step = ChebyshevStep::new(a, crate::preconditioner::Identity, ());
        let mut x = vec![0.0, 0.0];
        let mut b = vec![1.0, 1.0];
        assert_eq!(
            step.init(&mut x, &mut b),
            Err(Error::Uninitialised("chebyshev spectral bounds"))
        );
    }

    #[test]
    fn spectral_bounds_convert_to_center_and_radius() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 1.0 } else { 0.0 });
        let mut step: ChebyshevStep<Vec<f64>, _, _, ()> =
            ChebyshevStep::new(a, crate::preconditioner::Identity, ());
        step.set_spectral_bounds(0.5, 2.5);
        assert_eq!(step.center, 1.5);
        assert_eq!(step.radius, 1.0);
        step.init_for_mass_matrix_tet_q1(1.0);
        assert_eq!(step.center, 1.5);
        assert_eq!(step.radius, 1.0);
    }

    #[test]
    fn zero_radius_solves_scaled_identity_in_one_step() {
        // A = 2 I, P = A⁻¹ via Jacobi: the preconditioned operator is the
        // identity, c = 1, ρ = 0, and one step is exact.
        let n = 10;
        let a = Mat::from_fn(n, n, |i, j| if i == j { 2.0 } else { 0.0 });
        let mut jacobi = Jacobi::new();
        jacobi.setup(&a).unwrap();
        let mut step = ChebyshevStep::new(a, jacobi, ());
        step.set_spectrum(1.0, 0.0);
        let mut x = vec![0.0; n];
        let mut b = vec![3.0; n];
        step.init(&mut x, &mut b).unwrap();
        step.compute(&mut x, &mut b).unwrap();
        for xi in &x {
            assert!((xi - 1.5).abs() < 1e-15);
        }
        assert!(step.residual_norm() < 1e-14);
    }
}
