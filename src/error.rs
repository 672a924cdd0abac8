use thiserror::Error;

// Unified error type for conjgrad.
//
// A solve that merely fails to converge is NOT an error: it is reported as
// `SolveStats { converged: false, .. }`. Errors are reserved for contract
// violations and for the one numeric condition standard CG cannot recover
// from.

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// The conjugate gradient method met a search direction of non-positive
    /// curvature (dx·A·dx ≤ 0). Standard CG cannot continue on such an
    /// operator; use TCG, RCG or TRCG instead.
    #[error("direction of non-positive curvature encountered (dxAdx = {curvature:e}); the operator is not positive definite")]
    NonConvexOperator { curvature: f64 },

    /// An operation was invoked before the configuration it requires was
    /// supplied, e.g. `compute` before `init`, or a Chebyshev solve without
    /// spectral bounds.
    #[error("{0} used before it was initialised")]
    Uninitialised(&'static str),

    /// A configuration setter received an out-of-range value.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
