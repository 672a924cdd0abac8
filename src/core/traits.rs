//! Core linear-algebra traits for conjgrad.
//!
//! The solvers are written against these minimal capabilities instead of a
//! concrete matrix/vector library. `core::wrappers` supplies implementations
//! for `Vec<T>` and `faer::Mat<T>`; callers with their own discretisation
//! types implement the traits themselves.

use num_traits::Float;

/// In-place vector arithmetic required by the solvers.
///
/// Beyond `Clone` (used for buffer allocation and the restart snapshot) only
/// three mutating operations are needed.
pub trait Vector: Clone {
    /// Associated real scalar type.
    type Real: Float;

    /// v ← a·v
    fn scale(&mut self, a: Self::Real);

    /// v ← v + a·w
    fn axpy(&mut self, a: Self::Real, w: &Self);

    /// v ← 0
    fn set_zero(&mut self);
}

/// Linear operator A acting on a Hilbert space: y ← A·x.
pub trait LinearOperator<V: Vector> {
    /// Compute y = A·x.
    fn apply(&self, x: &V, y: &mut V);

    /// Compute y ← y + a·A·x.
    fn apply_scale_add(&self, a: V::Real, x: &V, y: &mut V);
}

/// Scalar product (and induced norm) of the underlying space.
///
/// The sequential ℓ² product is implemented for the unit type `()`, which is
/// the default scalar product of every solver factory.
pub trait ScalarProduct<V: Vector> {
    /// Compute dot(x, y).
    fn dot(&self, x: &V, y: &V) -> V::Real;

    /// Compute the induced norm ‖x‖ = √dot(x, x).
    fn norm(&self, x: &V) -> V::Real {
        self.dot(x, x).sqrt()
    }
}

/// Uniform indexing into vectors and operators (row dimension).
pub trait Indexing {
    /// Number of rows (or length for a vector).
    fn nrows(&self) -> usize;
}

impl<V: Vector, A: LinearOperator<V> + ?Sized> LinearOperator<V> for &A {
    fn apply(&self, x: &V, y: &mut V) {
        (**self).apply(x, y)
    }
    fn apply_scale_add(&self, a: V::Real, x: &V, y: &mut V) {
        (**self).apply_scale_add(a, x, y)
    }
}

impl<V: Vector, S: ScalarProduct<V> + ?Sized> ScalarProduct<V> for &S {
    fn dot(&self, x: &V, y: &V) -> V::Real {
        (**self).dot(x, y)
    }
    fn norm(&self, x: &V) -> V::Real {
        (**self).norm(x)
    }
}
