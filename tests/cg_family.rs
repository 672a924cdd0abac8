//! End-to-end tests for the CG family and the Chebyshev semi-iteration.
//!
//! Small hand-picked systems with known solutions cover the truncation and
//! regularization paths; random SPD systems are checked against faer's
//! direct LU solver.

use approx::assert_abs_diff_eq;
use conjgrad::{
    cg, chebyshev, rcg, tcg, trcg, CgStep, Error, GenericIterativeMethod, Identity, Jacobi,
    LinearOperator, OperatorType, RcgStep, ResidualBased, ScalarProduct, Step,
};
use faer::linalg::solvers::SolveCore;
use faer::Mat;
use rand::Rng;

/// Random SPD matrix A = MᵀM + I and right-hand side b.
fn random_spd(n: usize) -> (Mat<f64>, Vec<f64>) {
    let mut rng = rand::thread_rng();
    let data: Vec<f64> = (0..n * n).map(|_| rng.r#gen()).collect();
    let m = Mat::from_fn(n, n, |i, j| data[j * n + i]);
    let m_t = m.transpose();
    let a = &m_t * &m + Mat::<f64>::identity(n, n);
    let b: Vec<f64> = (0..n).map(|_| rng.r#gen()).collect();
    (a, b)
}

fn diag(entries: &[f64]) -> Mat<f64> {
    let n = entries.len();
    Mat::from_fn(n, n, |i, j| if i == j { entries[i] } else { 0.0 })
}

fn direct_solve(a: &Mat<f64>, b: &[f64]) -> Vec<f64> {
    let n = b.len();
    let mut x = b.to_vec();
    let lus = faer::linalg::solvers::FullPivLu::new(a.as_ref());
    let x_mat = faer::MatMut::from_column_major_slice_mut(&mut x, n, 1);
    lus.solve_in_place_with_conj(faer::Conj::No, x_mat);
    x
}

fn true_residual_norm(a: &Mat<f64>, x: &Vec<f64>, b: &Vec<f64>) -> f64 {
    let mut r = b.clone();
    a.apply_scale_add(-1.0, x, &mut r);
    ().norm(&r)
}

/// 2×2 SPD system with a known solution, solved to machine accuracy in at
/// most two iterations.
#[test]
fn cg_solves_small_spd_system() {
    let a = Mat::from_fn(2, 2, |i, j| [[4.0, 1.0], [1.0, 3.0]][i][j]);
    let step = CgStep::new(a, Identity, ());
    let mut solver = GenericIterativeMethod::new(step, ResidualBased::new(1e-12));
    let mut x = vec![0.0, 0.0];
    let mut b = vec![1.0, 2.0];
    let stats = solver.solve(&mut x, &mut b).unwrap();
    assert!(stats.converged);
    assert!(stats.iterations <= 2);
    assert_abs_diff_eq!(x[0], 1.0 / 11.0, epsilon = 1e-10);
    assert_abs_diff_eq!(x[1], 7.0 / 11.0, epsilon = 1e-10);
}

/// On a diagonal operator of dimension n, CG converges in at most n
/// iterations to within round-off.
#[test]
fn cg_converges_in_n_steps_on_diagonal_operator() {
    let a = diag(&[1.0, 2.0, 3.0, 4.0, 5.0]);
    let step = CgStep::new(diag(&[1.0, 2.0, 3.0, 4.0, 5.0]), Identity, ());
    let mut solver = GenericIterativeMethod::new(step, ResidualBased::new(1e-13));
    let mut x = vec![0.0; 5];
    let mut b = vec![1.0; 5];
    let stats = solver.solve(&mut x, &mut b).unwrap();
    assert!(stats.converged);
    assert!(stats.iterations <= 5);
    assert!(true_residual_norm(&a, &x, &b) < 1e-12);
}

/// Random SPD system solved by CG with the residual criterion, compared
/// elementwise against a direct LU solve.
#[test]
fn cg_vs_direct_on_random_spd() {
    let n = 10;
    let (a, b) = random_spd(n);
    let step = CgStep::new(&a, Identity, ());
    let mut solver = GenericIterativeMethod::new(step, ResidualBased::new(1e-10));
    let mut x = vec![0.0; n];
    let mut rhs = b.clone();
    let stats = solver.solve(&mut x, &mut rhs).unwrap();
    assert!(stats.converged);
    let x_direct = direct_solve(&a, &b);
    for i in 0..n {
        assert_abs_diff_eq!(x[i], x_direct[i], epsilon = 1e-6);
    }
}

/// Random SPD system solved with the relative energy error criterion.
#[test]
fn cg_with_energy_criterion_on_random_spd() {
    let n = 50;
    let (a, b) = random_spd(n);
    let mut solver = cg(&a, Identity);
    solver.set_relative_accuracy(1e-6).unwrap();
    solver.termination_mut().set_look_ahead(5);
    let mut x = vec![0.0; n];
    let mut rhs = b.clone();
    let stats = solver.solve(&mut x, &mut rhs).unwrap();
    assert!(stats.converged);
    assert!(stats.iterations > 5, "look-ahead forces extra iterations");
    let x_direct = direct_solve(&a, &b);
    for i in 0..n {
        assert_abs_diff_eq!(x[i], x_direct[i], epsilon = 1e-3);
    }
}

/// Restarting a solve from its own solution terminates in at most one
/// additional iteration.
#[test]
fn cg_is_idempotent_near_the_solution() {
    let n = 20;
    let (a, b) = random_spd(n);
    let mut solver = cg(&a, Identity);
    solver.set_relative_accuracy(1e-6).unwrap();
    solver.set_absolute_accuracy(1e-2).unwrap();
    solver.termination_mut().set_look_ahead(5);
    let mut x = vec![0.0; n];
    let mut rhs = b.clone();
    let stats = solver.solve(&mut x, &mut rhs).unwrap();
    assert!(stats.converged);
    let mut rhs = b.clone();
    let stats = solver.solve(&mut x, &mut rhs).unwrap();
    assert!(stats.converged);
    assert!(stats.iterations <= 1);
}

/// With an exact preconditioner, iterative refinement must not change the
/// result.
#[test]
fn iterative_refinements_are_exact_preconditioner_invariant() {
    let entries = [1.0, 2.0, 3.0, 4.0, 5.0];
    let mut results = Vec::new();
    for refinements in [0u32, 3u32] {
        let a = diag(&entries);
        let mut jacobi = Jacobi::new();
        jacobi.setup(&a).unwrap();
        let step = CgStep::new(a, jacobi, ());
        let mut solver = GenericIterativeMethod::new(step, ResidualBased::new(1e-10));
        solver.set_iterative_refinements(refinements);
        let mut x = vec![0.0; 5];
        let mut b = vec![1.0, -2.0, 3.0, -4.0, 5.0];
        let stats = solver.solve(&mut x, &mut b).unwrap();
        assert!(stats.converged);
        results.push((stats.iterations, x));
    }
    assert_eq!(results[0].0, results[1].0);
    for (xi, xj) in results[0].1.iter().zip(results[1].1.iter()) {
        assert_abs_diff_eq!(xi, xj, epsilon = 1e-12);
    }
}

/// The energy-norm error of CG is non-increasing.
#[test]
fn cg_energy_error_is_monotone() {
    let n = 10;
    let (a, b) = random_spd(n);
    let x_star = direct_solve(&a, &b);
    let mut step = CgStep::new(&a, Identity, ());
    let mut x = vec![0.0; n];
    let mut rhs = b.clone();
    step.init(&mut x, &mut rhs).unwrap();
    let mut last = f64::INFINITY;
    for _ in 0..8 {
        step.compute(&mut x, &mut rhs).unwrap();
        let e: Vec<f64> = x.iter().zip(x_star.iter()).map(|(xi, si)| xi - si).collect();
        let mut ae = vec![0.0; n];
        a.apply(&e, &mut ae);
        let energy = ().dot(&e, &ae);
        assert!(energy <= last * (1.0 + 1e-12));
        last = energy;
    }
}

/// Standard CG must fail on an indefinite operator, TCG truncates instead.
#[test]
fn indefinite_operator_cg_fails_tcg_truncates() {
    let a = diag(&[1.0, -1.0]);

    let step = CgStep::new(diag(&[1.0, -1.0]), Identity, ());
    let mut solver = GenericIterativeMethod::new(step, ResidualBased::new(1e-12));
    let mut x = vec![0.0, 0.0];
    let mut b = vec![1.0, 1.0];
    assert!(matches!(
        solver.solve(&mut x, &mut b),
        Err(Error::NonConvexOperator { .. })
    ));

    let mut solver = tcg(a, Identity);
    let mut x = vec![0.0, 0.0];
    let mut b = vec![1.0, 1.0];
    let stats = solver.solve(&mut x, &mut b).unwrap();
    assert!(stats.converged);
    assert_eq!(stats.iterations, 1);
    assert_eq!(solver.step().operator_type(), OperatorType::Indefinite);
    // The blind update returns x0 + dx instead of the useless x0.
    assert_abs_diff_eq!(x[0], 1.0, epsilon = 1e-15);
    assert_abs_diff_eq!(x[1], 1.0, epsilon = 1e-15);
}

/// A slightly indefinite operator makes RCG raise θ and restart until the
/// regularized operator is positive definite.
#[test]
fn rcg_regularizes_and_restarts_on_indefinite_operator() {
    let step = RcgStep::new(diag(&[1.0, -0.01]), Identity, ());
    let mut solver = GenericIterativeMethod::new(step, ResidualBased::new(1e-10));
    let mut x = vec![0.0, 0.0];
    let mut b = vec![1.0, 1.0];
    let stats = solver.solve(&mut x, &mut b).unwrap();
    assert!(stats.converged);
    assert!(solver.step().theta() > 0.0);
    assert!(solver.step().is_positive_definite());
    // The converged iterate solves the regularized system (A + θ·P⁻¹)x = b.
    let theta = solver.step().theta();
    let a_reg = diag(&[1.0 + theta, -0.01 + theta]);
    assert!(true_residual_norm(&a_reg, &x, &vec![1.0, 1.0]) < 1e-8);
}

/// An infinite minimal accuracy makes TRCG truncate like TCG; a zero
/// minimal accuracy reproduces RCG.
///
/// The right-hand side leans on the negative eigenvector, so the very first
/// search direction has curvature 0.01·45 − 0.5 < 0 and the nonconvexity
/// handling runs deterministically on the first iteration.
#[test]
fn trcg_interpolates_between_tcg_and_rcg() {
    let entries = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, -0.5];
    let rhs = || {
        let mut b = vec![0.1; 10];
        b[9] = 1.0;
        b
    };

    // minimal_accuracy = ∞: every nonconvexity truncates.
    let mut solver = trcg(diag(&entries), Identity);
    solver.set_minimal_accuracy(f64::INFINITY).unwrap();
    let mut x = vec![0.0; 10];
    let mut b = rhs();
    let stats = solver.solve(&mut x, &mut b).unwrap();
    assert!(stats.converged);
    assert_eq!(stats.iterations, 1);
    assert_eq!(solver.step().operator_type(), OperatorType::Indefinite);
    assert_eq!(solver.step().theta(), 0.0, "truncation must not regularize");

    // minimal_accuracy = 0: every nonconvexity regularizes, i.e. the method
    // follows the exact same trajectory as RCG.
    let mut trcg_solver = trcg(diag(&entries), Identity);
    trcg_solver.set_minimal_accuracy(0.0).unwrap();
    trcg_solver.set_relative_accuracy(0.5).unwrap();
    trcg_solver.set_max_steps(200).unwrap();
    trcg_solver.termination_mut().set_look_ahead(3);
    let mut x_trcg = vec![0.0; 10];
    let mut b = rhs();
    trcg_solver.solve(&mut x_trcg, &mut b).unwrap();
    assert!(trcg_solver.step().theta() > 0.0);

    let mut rcg_solver = rcg(diag(&entries), Identity);
    rcg_solver.set_relative_accuracy(0.5).unwrap();
    rcg_solver.set_max_steps(200).unwrap();
    rcg_solver.termination_mut().set_look_ahead(3);
    let mut x_rcg = vec![0.0; 10];
    let mut b = rhs();
    rcg_solver.solve(&mut x_rcg, &mut b).unwrap();

    assert_abs_diff_eq!(
        trcg_solver.step().theta(),
        rcg_solver.step().theta(),
        epsilon = 1e-15
    );
    for (ti, ri) in x_trcg.iter().zip(x_rcg.iter()) {
        assert_abs_diff_eq!(ti, ri, epsilon = 1e-12);
    }
}

/// With a zero spectral radius the Chebyshev recurrence degenerates to a
/// single exact preconditioned Richardson step.
#[test]
fn chebyshev_solves_scaled_identity_in_one_step() {
    let n = 10;
    let a = diag(&vec![2.0; n]);
    let mut jacobi = Jacobi::new();
    jacobi.setup(&a).unwrap();
    let mut solver = chebyshev(a, jacobi);
    solver.step_mut().set_spectrum(1.0, 0.0);
    let mut x = vec![0.0; n];
    let mut b = vec![1.0; n];
    let stats = solver.solve(&mut x, &mut b).unwrap();
    assert!(stats.converged);
    assert_eq!(stats.iterations, 1);
    for xi in &x {
        assert_abs_diff_eq!(*xi, 0.5, epsilon = 1e-15);
    }
}

/// k Chebyshev steps reduce the residual by at most 2·r^k/(1 + r^(2k)) with
/// r = ρ/c, checked for the Q1 mass-matrix configurator on a diagonal
/// operator with spectrum inside [0.5, 2.5].
#[test]
fn chebyshev_respects_the_polynomial_error_bound() {
    let n = 10;
    let entries: Vec<f64> = (0..n).map(|i| 0.5 + 2.0 * i as f64 / (n - 1) as f64).collect();
    let a = diag(&entries);
    let mut solver = chebyshev(a, Identity);
    solver.step_mut().init_for_mass_matrix_tet_q1(1.0);
    solver.set_max_steps(8).unwrap();
    let mut x = vec![0.0; n];
    let mut b = vec![1.0; n];
    let stats = solver.solve(&mut x, &mut b).unwrap();
    assert_eq!(stats.iterations, 8);
    let r: f64 = 1.0 / 1.5;
    let bound = 2.0 * r.powi(8) / (1.0 + r.powi(16));
    assert!(
        stats.reduction <= bound * 1.05,
        "reduction {} exceeds Chebyshev bound {}",
        stats.reduction,
        bound
    );
}

/// The Chebyshev semi-iteration refuses to run without spectral bounds.
#[test]
fn chebyshev_requires_spectral_bounds() {
    let a = diag(&[1.0, 1.0]);
    let mut solver = chebyshev(a, Identity);
    let mut x = vec![0.0, 0.0];
    let mut b = vec![1.0, 1.0];
    assert!(matches!(
        solver.solve(&mut x, &mut b),
        Err(Error::Uninitialised("chebyshev spectral bounds"))
    ));
}
