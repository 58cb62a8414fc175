//! Shared solver contract and bookkeeping.
//!
//! Every strategy implements [`RowSolver`]:
//!
//! ```text
//! solve(rows, bodies) -> SolveReport
//! ```
//!
//! On entry each row's `lambda` is an initial guess (the warm start) whose
//! impulse has *not* yet been applied to the bodies. On return `lambda` holds
//! the resolved multiplier and each body's `delta_linear` / `delta_angular`
//! holds the net velocity change of all resolved impulses.
//!
//! Solvers never fail. They are anytime algorithms: a tight budget yields a
//! worse [`SolveReport::merit`], not an error.
//!
//! # Merit
//!
//! All strategies report the same merit so they can be compared: the sum of
//! squared projection residuals
//!
//! ```text
//! r_i = clamp(λ_i + (rhs_i − J_i·Δv − cfm·λ_i) / (diag_i + cfm), bounds_i) − λ_i
//! ```
//!
//! which is zero exactly when every row satisfies its complementarity
//! condition.

use nalgebra::Vector3;
use sim_types::Result;

use crate::row::{project, row_bounds};
use crate::{
    BodyState, ConstraintRow, FischerNewton, FischerNewtonConfig, NncgConfig,
    NonsmoothConjugateGradient, PgsConfig, ProjectedGaussSeidel, SubspaceConfig,
    SubspaceMinimization,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Outcome of one solve.
#[derive(Debug, Clone, PartialEq)]
pub struct SolveReport {
    /// Which strategy ran.
    pub solver: &'static str,
    /// Number of rows solved.
    pub rows: usize,
    /// Outer iterations performed.
    pub iterations: usize,
    /// Merit after applying the warm start, before iterating.
    pub initial_merit: f64,
    /// Merit on return.
    pub merit: f64,
    /// Whether `merit` fell below the strategy's tolerance.
    pub converged: bool,
    /// Iterations that fell back to a plain Gauss-Seidel sweep.
    pub fallbacks: usize,
}

impl SolveReport {
    /// Report for an empty problem.
    #[must_use]
    pub fn empty(solver: &'static str) -> Self {
        Self {
            solver,
            rows: 0,
            iterations: 0,
            initial_merit: 0.0,
            merit: 0.0,
            converged: true,
            fallbacks: 0,
        }
    }

    /// Final merit relative to the initial merit.
    #[must_use]
    pub fn convergence_ratio(&self) -> f64 {
        if self.initial_merit > 1e-30 {
            self.merit / self.initial_merit
        } else {
            0.0
        }
    }
}

/// A strategy that resolves a set of rows into multipliers and body velocity
/// deltas.
pub trait RowSolver {
    /// Short name used in reports and logs.
    fn name(&self) -> &'static str;

    /// Solve in place.
    fn solve(&mut self, rows: &mut [ConstraintRow], bodies: &mut [BodyState]) -> SolveReport;
}

/// Solver selection.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SolverStrategy {
    /// Projected Gauss-Seidel.
    Pgs(ProjectedGaussSeidel),
    /// Nonsmooth nonlinear conjugate gradient.
    Nncg(NonsmoothConjugateGradient),
    /// Gauss-Seidel with conjugate-gradient refinement on the free rows.
    Subspace(SubspaceMinimization),
    /// Fischer-Burmeister reformulation solved by inexact Newton.
    FischerNewton(FischerNewton),
}

impl Default for SolverStrategy {
    fn default() -> Self {
        Self::pgs()
    }
}

impl SolverStrategy {
    /// Default projected Gauss-Seidel.
    #[must_use]
    pub fn pgs() -> Self {
        Self::Pgs(ProjectedGaussSeidel::new(PgsConfig::default()))
    }

    /// Default nonsmooth nonlinear conjugate gradient.
    #[must_use]
    pub fn nncg() -> Self {
        Self::Nncg(NonsmoothConjugateGradient::new(NncgConfig::default()))
    }

    /// Default subspace minimization.
    #[must_use]
    pub fn subspace() -> Self {
        Self::Subspace(SubspaceMinimization::new(SubspaceConfig::default()))
    }

    /// Default Fischer-Newton.
    #[must_use]
    pub fn fischer_newton() -> Self {
        Self::FischerNewton(FischerNewton::new(FischerNewtonConfig::default()))
    }

    /// Validate the selected strategy's configuration.
    ///
    /// # Errors
    ///
    /// Returns [`sim_types::SimError::InvalidConfig`] describing the first
    /// out-of-range parameter.
    pub fn validate(&self) -> Result<()> {
        match self {
            Self::Pgs(s) => s.config().validate(),
            Self::Nncg(s) => s.config().validate(),
            Self::Subspace(s) => s.config().validate(),
            Self::FischerNewton(s) => s.config().validate(),
        }
    }

    fn inner(&mut self) -> &mut dyn RowSolver {
        match self {
            Self::Pgs(s) => s,
            Self::Nncg(s) => s,
            Self::Subspace(s) => s,
            Self::FischerNewton(s) => s,
        }
    }
}

impl RowSolver for SolverStrategy {
    fn name(&self) -> &'static str {
        match self {
            Self::Pgs(s) => s.name(),
            Self::Nncg(s) => s.name(),
            Self::Subspace(s) => s.name(),
            Self::FischerNewton(s) => s.name(),
        }
    }

    fn solve(&mut self, rows: &mut [ConstraintRow], bodies: &mut [BodyState]) -> SolveReport {
        self.inner().solve(rows, bodies)
    }
}

// ============================================================================
// Internal workspace
// ============================================================================

/// Body velocity deltas, detached from the bodies so they can be shadowed.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct DeltaBuffer {
    linear: Vec<Vector3<f64>>,
    angular: Vec<Vector3<f64>>,
}

impl DeltaBuffer {
    pub(crate) fn from_bodies(bodies: &[BodyState]) -> Self {
        Self {
            linear: bodies.iter().map(|b| b.delta_linear).collect(),
            angular: bodies.iter().map(|b| b.delta_angular).collect(),
        }
    }

    pub(crate) fn zeros(len: usize) -> Self {
        Self {
            linear: vec![Vector3::zeros(); len],
            angular: vec![Vector3::zeros(); len],
        }
    }

    /// `J·Δv` for a row.
    pub(crate) fn row_velocity(&self, row: &ConstraintRow) -> f64 {
        row.lin_a.dot(&self.linear[row.body_a])
            + row.ang_a.dot(&self.angular[row.body_a])
            + row.lin_b.dot(&self.linear[row.body_b])
            + row.ang_b.dot(&self.angular[row.body_b])
    }

    /// Add the velocity change of impulse `dl` along a row.
    pub(crate) fn apply(&mut self, row: &ConstraintRow, dl: f64) {
        self.linear[row.body_a] += row.minv_lin_a * dl;
        self.angular[row.body_a] += row.minv_ang_a * dl;
        self.linear[row.body_b] += row.minv_lin_b * dl;
        self.angular[row.body_b] += row.minv_ang_b * dl;
    }

    pub(crate) fn copy_from(&mut self, other: &Self) {
        self.linear.copy_from_slice(&other.linear);
        self.angular.copy_from_slice(&other.angular);
    }

    pub(crate) fn clear(&mut self) {
        self.linear.fill(Vector3::zeros());
        self.angular.fill(Vector3::zeros());
    }

    fn write_back(&self, bodies: &mut [BodyState]) {
        for ((body, lin), ang) in bodies.iter_mut().zip(&self.linear).zip(&self.angular) {
            if !body.is_static {
                body.delta_linear = *lin;
                body.delta_angular = *ang;
            }
        }
    }
}

/// Multipliers and deltas a solver iterates on.
#[derive(Debug, Clone)]
pub(crate) struct Workspace {
    pub(crate) lambda: Vec<f64>,
    pub(crate) deltas: DeltaBuffer,
}

impl Workspace {
    /// Take the rows' multipliers as the initial guess, projected into their
    /// bounds, and apply their impulse.
    pub(crate) fn new(rows: &[ConstraintRow], bodies: &[BodyState]) -> Self {
        let mut ws = Self {
            lambda: vec![0.0; rows.len()],
            deltas: DeltaBuffer::from_bodies(bodies),
        };
        for (i, row) in rows.iter().enumerate() {
            if row.is_degenerate() {
                continue;
            }
            let guess = project(row.lambda, row_bounds(rows, &ws.lambda, i));
            if guess != 0.0 {
                ws.lambda[i] = guess;
                ws.deltas.apply(row, guess);
            }
        }
        ws
    }

    /// Unresolved velocity of row `i`: `rhs − J·Δv − cfm·λ`.
    pub(crate) fn slack(&self, rows: &[ConstraintRow], i: usize) -> f64 {
        let row = &rows[i];
        row.rhs - self.deltas.row_velocity(row) - row.cfm * self.lambda[i]
    }

    /// Move every multiplier into its bounds, in row order, keeping the
    /// deltas consistent.
    pub(crate) fn project_all(&mut self, rows: &[ConstraintRow]) {
        for (i, row) in rows.iter().enumerate() {
            if row.is_degenerate() {
                continue;
            }
            let projected = project(self.lambda[i], row_bounds(rows, &self.lambda, i));
            let dl = projected - self.lambda[i];
            if dl != 0.0 {
                self.lambda[i] = projected;
                self.deltas.apply(row, dl);
            }
        }
    }

    pub(crate) fn finish(self, rows: &mut [ConstraintRow], bodies: &mut [BodyState]) {
        for (row, lambda) in rows.iter_mut().zip(&self.lambda) {
            row.lambda = *lambda;
        }
        self.deltas.write_back(bodies);
    }
}

/// Sum of squared projection residuals. Optionally writes each residual.
pub(crate) fn merit(rows: &[ConstraintRow], ws: &Workspace, mut residual: Option<&mut [f64]>) -> f64 {
    let mut total = 0.0;
    for (i, row) in rows.iter().enumerate() {
        let r = if row.is_degenerate() {
            0.0
        } else {
            let trial = ws.lambda[i] + ws.slack(rows, i) / row.effective_diag();
            project(trial, row_bounds(rows, &ws.lambda, i)) - ws.lambda[i]
        };
        if let Some(out) = residual.as_deref_mut() {
            out[i] = r;
        }
        total += r * r;
    }
    total
}

/// Public merit of a solved row set, evaluated on the bodies' deltas.
///
/// Useful for checking a solution independently of the strategy that
/// produced it.
#[must_use]
pub fn projection_merit(rows: &[ConstraintRow], bodies: &[BodyState]) -> f64 {
    let ws = Workspace {
        lambda: rows.iter().map(|r| r.lambda).collect(),
        deltas: DeltaBuffer::from_bodies(bodies),
    };
    merit(rows, &ws, None)
}
