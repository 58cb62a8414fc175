//! Subspace minimization: Gauss-Seidel with conjugate-gradient refinement.
//!
//! PGS is good at finding *which* rows are at a bound but slow at resolving
//! the rows that are not. This solver alternates the two:
//!
//! ```text
//! 1. A few PGS sweeps
//! 2. F = { i : lower_i < λ_i < upper_i }          (free rows)
//! 3. Solve A_FF δ = slack_F by truncated CG,
//!    A = J M⁻¹ Jᵀ + cfm, applied matrix-free
//! 4. Candidate λ' = P(λ + δ); keep it only if the merit drops
//! ```
//!
//! The system matrix is never assembled. `A·x` is evaluated by pushing `x`
//! through the rows' effective-mass blocks into a scratch delta buffer and
//! reading the row velocities back.

use tracing::trace;

use sim_types::{Result, SimError};

use crate::pgs::sweep;
use crate::row::row_bounds;
use crate::solver::{merit, DeltaBuffer, Workspace};
use crate::{BodyState, ConstraintRow, RowSolver, SolveReport};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Preconditioner for the refinement CG.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Preconditioner {
    /// No preconditioning.
    None,
    /// Jacobi (diagonal) preconditioning.
    /// Cheap, and effective when rows have very different effective masses.
    #[default]
    Jacobi,
}

/// Configuration for subspace minimization.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubspaceConfig {
    /// Maximum outer iterations (PGS phase + CG phase).
    pub max_iterations: usize,

    /// PGS sweeps per outer iteration.
    pub pgs_sweeps: usize,

    /// Maximum CG iterations per refinement.
    pub cg_iterations: usize,

    /// Merit below which the solve stops early.
    pub tolerance: f64,

    /// Preconditioner for the refinement.
    pub preconditioner: Preconditioner,
}

impl Default for SubspaceConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            pgs_sweeps: 3,
            cg_iterations: 20,
            tolerance: 1e-12,
            preconditioner: Preconditioner::Jacobi,
        }
    }
}

impl SubspaceConfig {
    /// High-accuracy configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 50,
            pgs_sweeps: 4,
            cg_iterations: 100,
            tolerance: 1e-18,
            preconditioner: Preconditioner::Jacobi,
        }
    }

    /// Fast configuration for real-time applications.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            max_iterations: 3,
            pgs_sweeps: 2,
            cg_iterations: 8,
            tolerance: 1e-8,
            preconditioner: Preconditioner::Jacobi,
        }
    }

    /// Set the maximum outer iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the preconditioner.
    #[must_use]
    pub const fn with_preconditioner(mut self, preconditioner: Preconditioner) -> Self {
        self.preconditioner = preconditioner;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the tolerance is not positive
    /// or no PGS sweeps are configured.
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) {
            return Err(SimError::invalid_config("subspace tolerance must be positive"));
        }
        if self.pgs_sweeps == 0 {
            return Err(SimError::invalid_config(
                "subspace minimization needs at least one PGS sweep",
            ));
        }
        Ok(())
    }
}

/// PGS with CG refinement of the free rows.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubspaceMinimization {
    config: SubspaceConfig,
}

/// Matrix-free `A_FF` restricted to a row subset.
struct FreeSystem<'a> {
    rows: &'a [ConstraintRow],
    free: &'a [usize],
    scratch: DeltaBuffer,
}

impl FreeSystem<'_> {
    fn apply(&mut self, x: &[f64], out: &mut [f64]) {
        self.scratch.clear();
        for (&i, &xk) in self.free.iter().zip(x) {
            self.scratch.apply(&self.rows[i], xk);
        }
        for ((&i, &xk), o) in self.free.iter().zip(x).zip(out.iter_mut()) {
            let row = &self.rows[i];
            *o = self.scratch.row_velocity(row) + row.cfm * xk;
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl SubspaceMinimization {
    /// Create a new subspace minimization solver.
    #[must_use]
    pub fn new(config: SubspaceConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &SubspaceConfig {
        &self.config
    }

    /// Get mutable configuration.
    pub fn config_mut(&mut self) -> &mut SubspaceConfig {
        &mut self.config
    }

    /// Truncated preconditioned CG on `A_FF δ = b`.
    fn refine(&self, system: &mut FreeSystem<'_>, b: &[f64]) -> Vec<f64> {
        let n = b.len();
        let inv_diag: Vec<f64> = system
            .free
            .iter()
            .map(|&i| match self.config.preconditioner {
                Preconditioner::None => 1.0,
                Preconditioner::Jacobi => 1.0 / system.rows[i].effective_diag(),
            })
            .collect();

        let mut x = vec![0.0; n];
        let mut r = b.to_vec();
        let mut z: Vec<f64> = r.iter().zip(&inv_diag).map(|(ri, d)| ri * d).collect();
        let mut p = z.clone();
        let mut ap = vec![0.0; n];
        let mut rz = dot(&r, &z);

        for _ in 0..self.config.cg_iterations {
            if dot(&r, &r) < 1e-30 {
                break;
            }
            system.apply(&p, &mut ap);
            let pap = dot(&p, &ap);
            if pap <= 1e-30 {
                break;
            }
            let alpha = rz / pap;
            for k in 0..n {
                x[k] += alpha * p[k];
                r[k] -= alpha * ap[k];
                z[k] = r[k] * inv_diag[k];
            }
            let rz_next = dot(&r, &z);
            let beta = rz_next / rz;
            rz = rz_next;
            for (pk, zk) in p.iter_mut().zip(&z) {
                *pk = zk + beta * *pk;
            }
        }
        x
    }
}

impl RowSolver for SubspaceMinimization {
    fn name(&self) -> &'static str {
        "subspace"
    }

    fn solve(&mut self, rows: &mut [ConstraintRow], bodies: &mut [BodyState]) -> SolveReport {
        if rows.is_empty() {
            return SolveReport::empty(self.name());
        }

        let mut ws = Workspace::new(rows, bodies);
        let initial_merit = merit(rows, &ws, None);
        let mut current = initial_merit;
        let mut iterations = 0;

        for _ in 0..self.config.max_iterations {
            if current < self.config.tolerance {
                break;
            }
            iterations += 1;

            for _ in 0..self.config.pgs_sweeps {
                sweep(rows, &mut ws, 1.0);
            }
            current = merit(rows, &ws, None);
            if current < self.config.tolerance {
                break;
            }

            let free: Vec<usize> = (0..rows.len())
                .filter(|&i| {
                    let (lo, hi) = row_bounds(rows, &ws.lambda, i);
                    !rows[i].is_degenerate() && lo < ws.lambda[i] && ws.lambda[i] < hi
                })
                .collect();
            if free.is_empty() {
                continue;
            }

            let b: Vec<f64> = free.iter().map(|&i| ws.slack(rows, i)).collect();
            let mut system = FreeSystem {
                rows: &*rows,
                free: &free,
                scratch: DeltaBuffer::zeros(bodies.len()),
            };
            let step = self.refine(&mut system, &b);

            let mut trial = ws.clone();
            for (&i, &dl) in free.iter().zip(&step) {
                trial.lambda[i] += dl;
                trial.deltas.apply(&rows[i], dl);
            }
            trial.project_all(rows);
            let candidate = merit(rows, &trial, None);
            if candidate < current {
                ws = trial;
                current = candidate;
            } else {
                trace!(candidate, current, free = free.len(), "subspace step rejected");
            }
        }

        ws.finish(rows, bodies);
        SolveReport {
            solver: self.name(),
            rows: rows.len(),
            iterations,
            initial_merit,
            merit: current,
            converged: current < self.config.tolerance,
            fallbacks: 0,
        }
    }
}
