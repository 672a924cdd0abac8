// Jacobi (diagonal) preconditioner.
//
// Approximates A⁻¹ by the inverse of its diagonal, P ≈ D⁻¹. This is the
// one-step Jacobi preconditioner assumed by the Chebyshev mass-matrix
// configurator, and a convenient exact preconditioner for diagonal test
// operators.

use crate::core::traits::{Indexing, LinearOperator, Vector};
use crate::error::Error;
use crate::preconditioner::Preconditioner;
use num_traits::Float;

/// Jacobi preconditioner: P = D⁻¹.
pub struct Jacobi<T> {
    inv_diag: Vec<T>,
}

impl<T: Float> Jacobi<T> {
    /// Create an empty Jacobi preconditioner; call `setup` before use.
    pub fn new() -> Self {
        Self { inv_diag: Vec::new() }
    }

    /// Extract and invert the diagonal of `a`.
    ///
    /// The diagonal is probed through matrix-vector products with unit
    /// vectors, so any `LinearOperator` works as input.
    pub fn setup<M>(&mut self, a: &M) -> Result<(), Error>
    where
        M: LinearOperator<Vec<T>> + Indexing,
    {
        let n = a.nrows();
        let mut e = vec![T::zero(); n];
        let mut col = vec![T::zero(); n];
        self.inv_diag.clear();
        self.inv_diag.reserve(n);
        for i in 0..n {
            e.set_zero();
            e[i] = T::one();
            a.apply(&e, &mut col);
            let di = col[i];
            if di == T::zero() {
                return Err(Error::InvalidArgument(format!(
                    "zero diagonal entry at row {i}; Jacobi preconditioner undefined"
                )));
            }
            self.inv_diag.push(T::one() / di);
        }
        Ok(())
    }
}

impl<T: Float> Default for Jacobi<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Float> Preconditioner<Vec<T>> for Jacobi<T> {
    fn apply(&mut self, z: &mut Vec<T>, r: &Vec<T>) {
        assert_eq!(self.inv_diag.len(), r.len(), "Jacobi::setup not called or dimension mismatch");
        for ((zi, ri), di) in z.iter_mut().zip(r.iter()).zip(self.inv_diag.iter()) {
            *zi = *ri * *di;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use faer::Mat;

    #[test]
    fn inverts_diagonal() {
        let a = Mat::from_fn(3, 3, |i, j| if i == j { (i + 1) as f64 * 2.0 } else { 0.0 });
        let mut jacobi = Jacobi::new();
        jacobi.setup(&a).unwrap();
        let r = vec![2.0, 4.0, 6.0];
        let mut z = vec![0.0; 3];
        jacobi.apply(&mut z, &r);
        assert_eq!(z, vec![1.0, 1.0, 1.0]);
    }

    #[test]
    fn rejects_zero_diagonal() {
        let a = Mat::from_fn(2, 2, |i, j| if i != j { 1.0 } else { 0.0 });
        let mut jacobi = Jacobi::<f64>::new();
        assert!(matches!(jacobi.setup(&a), Err(Error::InvalidArgument(_))));
    }
}
