// Trait implementations for Vec<T>, the sequential l2 product and faer::Mat

use crate::core::traits::{Indexing, LinearOperator, ScalarProduct, Vector};
use faer::Mat;
use num_traits::Float;

impl<T: Float> Vector for Vec<T> {
    type Real = T;

    fn scale(&mut self, a: T) {
        for vi in self.iter_mut() {
            *vi = *vi * a;
        }
    }

    fn axpy(&mut self, a: T, w: &Self) {
        assert_eq!(self.len(), w.len());
        for (vi, wi) in self.iter_mut().zip(w.iter()) {
            *vi = *vi + a * *wi;
        }
    }

    fn set_zero(&mut self) {
        for vi in self.iter_mut() {
            *vi = T::zero();
        }
    }
}

/// Sequential ℓ² scalar product.
impl<T: Float> ScalarProduct<Vec<T>> for () {
    fn dot(&self, x: &Vec<T>, y: &Vec<T>) -> T {
        assert_eq!(x.len(), y.len());
        x.iter()
            .zip(y.iter())
            .map(|(xi, yi)| *xi * *yi)
            .fold(T::zero(), |acc, v| acc + v)
    }
}

fn row_dot<T: Float>(m: &Mat<T>, i: usize, x: &[T]) -> T {
    x.iter()
        .enumerate()
        .map(|(j, xj)| m[(i, j)] * *xj)
        .fold(T::zero(), |acc, v| acc + v)
}

impl<T: Float> LinearOperator<Vec<T>> for Mat<T> {
    fn apply(&self, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(y.len(), self.nrows());
        assert_eq!(x.len(), self.ncols());
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = row_dot(self, i, x);
        }
    }

    fn apply_scale_add(&self, a: T, x: &Vec<T>, y: &mut Vec<T>) {
        assert_eq!(y.len(), self.nrows());
        assert_eq!(x.len(), self.ncols());
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = *yi + a * row_dot(self, i, x);
        }
    }
}

impl<T> Indexing for Vec<T> {
    fn nrows(&self) -> usize {
        self.len()
    }
}

impl<T> Indexing for Mat<T> {
    fn nrows(&self) -> usize {
        self.nrows()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axpy_and_scale() {
        let mut v = vec![1.0f64, 2.0];
        let w = vec![10.0, 20.0];
        v.axpy(0.5, &w);
        assert_eq!(v, vec![6.0, 12.0]);
        v.scale(2.0);
        assert_eq!(v, vec![12.0, 24.0]);
        v.set_zero();
        assert_eq!(v, vec![0.0, 0.0]);
    }

    #[test]
    fn l2_dot_and_norm() {
        let x = vec![3.0f64, 4.0];
        assert_eq!(().dot(&x, &x), 25.0);
        assert_eq!(().norm(&x), 5.0);
    }

    #[test]
    fn mat_apply_scale_add() {
        let a = Mat::from_fn(2, 2, |i, j| if i == j { 2.0 } else { 0.0 });
        let x = vec![1.0, 2.0];
        let mut y = vec![1.0, 1.0];
        a.apply_scale_add(-1.0, &x, &mut y);
        assert_eq!(y, vec![-1.0, -3.0]);
        let mut z = vec![0.0, 0.0];
        a.apply(&x, &mut z);
        assert_eq!(z, vec![2.0, 4.0]);
    }
}
