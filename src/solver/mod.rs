//! The generic iterative method and its step family.
//!
//! A solver is the composition of a [`Step`] (the per-iteration state
//! machine of one method) with a
//! [`TerminationCriterion`](crate::termination::TerminationCriterion),
//! driven by [`GenericIterativeMethod`]. The factory functions at the bottom
//! assemble the usual pairings.

use crate::core::traits::{LinearOperator, ScalarProduct, Vector};
use crate::error::Error;
use crate::preconditioner::Preconditioner;
use crate::termination::{MinimalDecrease, RelativeEnergyError, ResidualBased, TerminationCriterion};

pub mod cg;
pub mod chebyshev;
pub mod driver;
pub mod rcg;
pub mod tcg;
pub mod trcg;

pub use cg::CgStep;
pub use chebyshev::ChebyshevStep;
pub use driver::GenericIterativeMethod;
pub use rcg::RcgStep;
pub use tcg::TcgStep;
pub use trcg::TrcgStep;

/// Real scalar type of a step's vector space.
pub type RealOf<S> = <<S as Step>::Vector as Vector>::Real;

/// Definiteness of the operator as observed by the iteration.
///
/// Even standard CG may be handed an indefinite operator; this is detectable
/// only through a direction of non-positive curvature.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperatorType {
    PositiveDefinite,
    Indefinite,
}

/// One step of an iterative method for A·x = b.
///
/// The driver calls `init` once per solve, `compute` once per iteration,
/// `reset` after restoring the initial data on a restart, and
/// `post_process` on the final iterate.
pub trait Step {
    /// Vector type of the iterate and the right hand side.
    type Vector: Vector;

    /// Prepare for a new solve: run the preconditioner's pre-hook, compute
    /// the initial residual and allocate the iteration buffers.
    fn init(&mut self, x: &mut Self::Vector, b: &mut Self::Vector) -> Result<(), Error>;

    /// Same as `init`, but reuses the already-allocated buffers.
    fn reset(&mut self, x: &mut Self::Vector, b: &mut Self::Vector) -> Result<(), Error>;

    /// Perform exactly one iteration.
    fn compute(&mut self, x: &mut Self::Vector, b: &mut Self::Vector) -> Result<(), Error>;

    /// Run the preconditioner's post-hook on the final iterate.
    fn post_process(&mut self, x: &mut Self::Vector);

    /// Method name used in reports.
    fn name(&self) -> &'static str;

    /// Whether the driver must snapshot (x₀, b₀) for a possible restart.
    /// Steps that never restart leave this false and the driver elides the
    /// copies.
    const NEEDS_SNAPSHOT: bool = false;

    /// True if the step requests a restart from the initial data.
    fn wants_restart(&self) -> bool {
        false
    }

    /// True if the step requests termination with the current iterate.
    fn wants_terminate(&self) -> bool {
        false
    }

    // Parameter mirroring: the driver forwards its configuration to every
    // step that declares the capability by overriding these.
    fn set_eps(&mut self, _eps: <Self::Vector as Vector>::Real) {}
    fn set_verbosity(&mut self, _level: u32) {}
    fn set_iterative_refinements(&mut self, _n: u32) {}

    /// Latest minimal-decrease signal of the termination criterion, pushed
    /// in by the driver before each `compute`.
    fn note_minimal_decrease(&mut self, _achieved: bool) {}
}

/// Read access to the residual norm of the most recent step, as consumed by
/// residual-based termination criteria.
pub trait ResidualObservable<R> {
    /// ‖r‖ with respect to the employed scalar product.
    fn residual_norm(&self) -> R;
}

/// Read access to the conjugate gradient quantities consumed by energy-error
/// estimators. Only the CG family implements this, so pairing e.g. the
/// Chebyshev semi-iteration with an energy criterion fails to compile.
pub trait CgObservable<R>: ResidualObservable<R> {
    /// Step length α of the most recent iteration.
    fn alpha(&self) -> R;

    /// Curvature (dx, A·dx) of the most recent search direction.
    fn length(&self) -> R;

    /// σ = |(r, P·r)|, the squared norm of the residual in the metric
    /// induced by the preconditioner.
    fn preconditioned_residual_norm(&self) -> R;
}

/// Conjugate gradient solver with the relative energy error criterion.
pub type CgSolver<V, A, P, S = ()> =
    GenericIterativeMethod<CgStep<V, A, P, S>, RelativeEnergyError<<V as Vector>::Real>>;

/// Truncated conjugate gradient solver with the relative energy error criterion.
pub type TcgSolver<V, A, P, S = ()> =
    GenericIterativeMethod<TcgStep<V, A, P, S>, RelativeEnergyError<<V as Vector>::Real>>;

/// Regularized conjugate gradient solver with the relative energy error criterion.
pub type RcgSolver<V, A, P, S = ()> =
    GenericIterativeMethod<RcgStep<V, A, P, S>, RelativeEnergyError<<V as Vector>::Real>>;

/// Truncated regularized conjugate gradient solver with the relative energy
/// error criterion.
pub type TrcgSolver<V, A, P, S = ()> =
    GenericIterativeMethod<TrcgStep<V, A, P, S>, RelativeEnergyError<<V as Vector>::Real>>;

/// Chebyshev semi-iteration with the residual-based criterion.
pub type ChebyshevSolver<V, A, P, S = ()> =
    GenericIterativeMethod<ChebyshevStep<V, A, P, S>, ResidualBased<<V as Vector>::Real>>;

/// Conjugate gradient method with the sequential ℓ² scalar product.
pub fn cg<V, A, P>(a: A, p: P) -> CgSolver<V, A, P>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    (): ScalarProduct<V>,
{
    GenericIterativeMethod::new(CgStep::new(a, p, ()), RelativeEnergyError::default())
}

/// Truncated conjugate gradient method with the sequential ℓ² scalar product.
pub fn tcg<V, A, P>(a: A, p: P) -> TcgSolver<V, A, P>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    (): ScalarProduct<V>,
{
    GenericIterativeMethod::new(TcgStep::new(a, p, ()), RelativeEnergyError::default())
}

/// Regularized conjugate gradient method with the sequential ℓ² scalar
/// product.
pub fn rcg<V, A, P>(a: A, p: P) -> RcgSolver<V, A, P>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    (): ScalarProduct<V>,
{
    GenericIterativeMethod::new(RcgStep::new(a, p, ()), RelativeEnergyError::default())
}

/// Truncated regularized conjugate gradient method with the sequential ℓ²
/// scalar product.
pub fn trcg<V, A, P>(a: A, p: P) -> TrcgSolver<V, A, P>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    (): ScalarProduct<V>,
{
    GenericIterativeMethod::new(TrcgStep::new(a, p, ()), RelativeEnergyError::default())
}

/// Truncated regularized conjugate gradient method with a custom scalar
/// product and termination criterion. The criterion must supply the
/// minimal-decrease signal, which is enforced through the
/// [`MinimalDecrease`] capability bound.
pub fn trcg_with<V, A, P, S, C>(a: A, p: P, sp: S, terminate: C) -> GenericIterativeMethod<TrcgStep<V, A, P, S>, C>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    S: ScalarProduct<V>,
    C: TerminationCriterion<TrcgStep<V, A, P, S>, Real = V::Real> + MinimalDecrease,
{
    GenericIterativeMethod::new(TrcgStep::new(a, p, sp), terminate)
}

/// Chebyshev semi-iteration with the sequential ℓ² scalar product. Spectral
/// bounds must be supplied through the step before solving.
pub fn chebyshev<V, A, P>(a: A, p: P) -> ChebyshevSolver<V, A, P>
where
    V: Vector,
    A: LinearOperator<V>,
    P: Preconditioner<V>,
    (): ScalarProduct<V>,
{
    GenericIterativeMethod::new(ChebyshevStep::new(a, p, ()), ResidualBased::default())
}
