//! conjgrad: preconditioned conjugate gradient variants over generic
//! operator traits.
//!
//! Provides four related conjugate gradient methods for A·x = b — standard
//! CG, truncated CG (TCG), regularized CG (RCG) and truncated regularized
//! CG (TRCG) — plus a preconditioned Chebyshev semi-iteration, all driven by
//! one generic iterative method with pluggable termination criteria. The
//! truncated/regularized variants handle indefinite operators as they arise
//! in Newton-type optimization; the regularization replaces A by A + θ·P⁻¹
//! and restarts whenever a direction of non-positive curvature shows up.
//!
//! ```
//! use conjgrad::{CgStep, GenericIterativeMethod, Identity, ResidualBased};
//! use faer::Mat;
//!
//! let a = Mat::from_fn(2, 2, |i, j| [[4.0, 1.0], [1.0, 3.0]][i][j]);
//! let step = CgStep::new(a, Identity, ());
//! let mut solver = GenericIterativeMethod::new(step, ResidualBased::new(1e-12));
//! let mut x = vec![0.0, 0.0];
//! let mut b = vec![1.0, 2.0];
//! let stats = solver.solve(&mut x, &mut b).unwrap();
//! assert!(stats.converged && stats.iterations <= 2);
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod preconditioner;
pub mod solver;
pub mod termination;
pub mod utils;

// Re-exports for convenience
pub use crate::core::traits::{Indexing, LinearOperator, ScalarProduct, Vector};
pub use config::SolverOptions;
pub use error::Error;
pub use preconditioner::{Identity, Jacobi, Preconditioner};
pub use solver::{
    cg, chebyshev, rcg, tcg, trcg, trcg_with, CgObservable, CgSolver, CgStep, ChebyshevSolver,
    ChebyshevStep, GenericIterativeMethod, OperatorType, RcgSolver, RcgStep, ResidualObservable,
    Step, TcgSolver, TcgStep, TrcgSolver, TrcgStep,
};
pub use termination::{MinimalDecrease, RelativeEnergyError, ResidualBased, TerminationCriterion};
pub use utils::stats::SolveStats;
