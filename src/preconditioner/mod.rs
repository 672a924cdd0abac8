//! Preconditioners for the conjugate gradient family.

use crate::core::traits::Vector;

/// A preconditioner P ≈ A⁻¹ mapping residuals to corrections.
///
/// For the CG-family methods P must be symmetric positive definite. The
/// `pre`/`post` hooks are called exactly once per solve, before the first
/// and after the last iteration.
pub trait Preconditioner<V: Vector> {
    /// Apply the preconditioner: z ← P·r.
    fn apply(&mut self, z: &mut V, r: &V);

    /// Pre-processing hook, called once at the start of a solve.
    fn pre(&mut self, _x: &mut V, _b: &mut V) {}

    /// Post-processing hook, called once on the final iterate.
    fn post(&mut self, _x: &mut V) {}
}

impl<V: Vector, P: Preconditioner<V> + ?Sized> Preconditioner<V> for &mut P {
    fn apply(&mut self, z: &mut V, r: &V) {
        (**self).apply(z, r)
    }
    fn pre(&mut self, x: &mut V, b: &mut V) {
        (**self).pre(x, b)
    }
    fn post(&mut self, x: &mut V) {
        (**self).post(x)
    }
}

/// Identity preconditioner: z = r.
#[derive(Clone, Copy, Debug, Default)]
pub struct Identity;

impl<V: Vector> Preconditioner<V> for Identity {
    fn apply(&mut self, z: &mut V, r: &V) {
        z.clone_from(r);
    }
}

pub mod jacobi;

pub use jacobi::Jacobi;
