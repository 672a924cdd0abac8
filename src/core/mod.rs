//! Core traits and built-in implementations.

pub mod traits;
pub mod wrappers;

pub use traits::{Indexing, LinearOperator, ScalarProduct, Vector};
