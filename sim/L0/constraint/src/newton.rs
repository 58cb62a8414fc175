//! Fischer-Newton solver.
//!
//! Each row's complementarity condition is rewritten as a root-finding
//! problem with the Fischer-Burmeister function
//!
//! ```text
//! fb(a, b) = sqrt(a² + b²) − (a + b)      fb = 0  ⇔  a ≥ 0, b ≥ 0, a·b = 0
//! ```
//!
//! With `y = J·Δv + cfm·λ − rhs`, a box row `[lo, hi]` uses the nested form
//!
//! ```text
//! φ = fb(λ − lo, fb(hi − λ, −y))
//! ```
//!
//! dropping the side whose bound is infinite (a free row becomes `φ = −y`).
//! The solver drives `θ = ½ Σ φ²` to zero with an inexact Newton method:
//!
//! ```text
//! 1. Solve M d = φ with M = −∂φ/∂λ by truncated CG, where each product
//!    M·p is a finite difference of φ along p
//! 2. Armijo backtracking: accept λ + α d once θ(λ + α d) ≤ (1 − 2σα) θ(λ)
//! 3. If no step is accepted, fall back to a Gauss-Seidel sweep
//! ```
//!
//! Iterates may leave the bounds; the final multipliers are projected back
//! before returning. The reported merit is the shared projection merit, not
//! `θ`, so reports compare across strategies.

use tracing::{trace, warn};

use sim_types::{Result, SimError};

use crate::pgs::sweep;
use crate::row::row_bounds;
use crate::solver::{merit, Workspace};
use crate::{BodyState, ConstraintRow, RowSolver, SolveReport};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the Fischer-Newton solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FischerNewtonConfig {
    /// Maximum Newton iterations.
    pub max_iterations: usize,

    /// Tolerance on `θ` and on the reported merit.
    pub tolerance: f64,

    /// Maximum CG iterations per Newton step.
    pub cg_iterations: usize,

    /// Maximum step halvings per Armijo search.
    pub max_halvings: usize,

    /// Armijo sufficient-decrease parameter, in (0, ½).
    pub armijo: f64,

    /// Relative finite-difference step for directional derivatives.
    pub fd_step: f64,
}

impl Default for FischerNewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 30,
            tolerance: 1e-12,
            cg_iterations: 25,
            max_halvings: 12,
            armijo: 1e-4,
            fd_step: 1e-7,
        }
    }
}

impl FischerNewtonConfig {
    /// High-accuracy configuration.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-18,
            cg_iterations: 100,
            ..Self::default()
        }
    }

    /// Fast configuration for real-time applications.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            max_iterations: 8,
            tolerance: 1e-8,
            cg_iterations: 10,
            max_halvings: 6,
            ..Self::default()
        }
    }

    /// Set the maximum Newton iterations.
    #[must_use]
    pub const fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for a non-positive tolerance or
    /// finite-difference step, or an Armijo parameter outside (0, ½).
    pub fn validate(&self) -> Result<()> {
        if !(self.tolerance > 0.0) {
            return Err(SimError::invalid_config("Fischer-Newton tolerance must be positive"));
        }
        if !(self.fd_step > 0.0) {
            return Err(SimError::invalid_config("finite-difference step must be positive"));
        }
        if !(self.armijo > 0.0 && self.armijo < 0.5) {
            return Err(SimError::invalid_config("Armijo parameter must be in range (0, 0.5)"));
        }
        Ok(())
    }
}

/// Fischer-Burmeister function, sign chosen so that it is non-negative.
#[must_use]
pub fn fischer(a: f64, b: f64) -> f64 {
    a.hypot(b) - (a + b)
}

/// Evaluate `φ` for every row into `out`; returns `θ = ½ Σ φ²`.
fn residual(rows: &[ConstraintRow], ws: &Workspace, out: &mut [f64]) -> f64 {
    let mut theta = 0.0;
    for (i, row) in rows.iter().enumerate() {
        out[i] = if row.is_degenerate() {
            0.0
        } else {
            let lambda = ws.lambda[i];
            let y = -ws.slack(rows, i);
            let (lo, hi) = row_bounds(rows, &ws.lambda, i);
            let inner = if hi.is_finite() { fischer(hi - lambda, -y) } else { y };
            if lo.is_finite() {
                fischer(lambda - lo, inner)
            } else {
                -inner
            }
        };
        theta += 0.5 * out[i] * out[i];
    }
    theta
}

/// Move `ws` to `base + step · direction` without projecting.
fn displace(rows: &[ConstraintRow], base: &Workspace, ws: &mut Workspace, direction: &[f64], step: f64) {
    ws.lambda.copy_from_slice(&base.lambda);
    ws.deltas.copy_from(&base.deltas);
    for (i, row) in rows.iter().enumerate() {
        if row.is_degenerate() {
            continue;
        }
        let dl = step * direction[i];
        ws.lambda[i] += dl;
        ws.deltas.apply(row, dl);
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

fn max_abs(a: &[f64]) -> f64 {
    a.iter().fold(0.0, |m, x| m.max(x.abs()))
}

/// Scratch vectors reused across Newton iterations.
struct Scratch {
    probe: Workspace,
    phi_probe: Vec<f64>,
    r: Vec<f64>,
    p: Vec<f64>,
    mp: Vec<f64>,
}

/// Fischer-Burmeister reformulation solved by inexact Newton.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FischerNewton {
    config: FischerNewtonConfig,
}

impl FischerNewton {
    /// Create a new Fischer-Newton solver.
    #[must_use]
    pub fn new(config: FischerNewtonConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &FischerNewtonConfig {
        &self.config
    }

    /// Get mutable configuration.
    pub fn config_mut(&mut self) -> &mut FischerNewtonConfig {
        &mut self.config
    }

    /// `M·p ≈ −(φ(λ + h p) − φ(λ)) / h`.
    fn jacobian_product(
        &self,
        rows: &[ConstraintRow],
        ws: &Workspace,
        phi: &[f64],
        scratch: &mut Scratch,
    ) {
        let scale = max_abs(&scratch.p);
        if scale <= 0.0 {
            scratch.mp.fill(0.0);
            return;
        }
        let h = self.config.fd_step * (1.0 + max_abs(&ws.lambda)) / scale;
        displace(rows, ws, &mut scratch.probe, &scratch.p, h);
        residual(rows, &scratch.probe, &mut scratch.phi_probe);
        for ((out, probe), base) in scratch.mp.iter_mut().zip(&scratch.phi_probe).zip(phi) {
            *out = -(probe - base) / h;
        }
    }

    /// Truncated CG on `M d = φ`. Stops on non-positive curvature.
    fn newton_direction(
        &self,
        rows: &[ConstraintRow],
        ws: &Workspace,
        phi: &[f64],
        scratch: &mut Scratch,
    ) -> Vec<f64> {
        let mut d = vec![0.0; phi.len()];
        scratch.r.copy_from_slice(phi);
        scratch.p.copy_from_slice(phi);
        let mut rr = dot(&scratch.r, &scratch.r);
        let target = rr * 1e-12;

        for k in 0..self.config.cg_iterations {
            if rr <= target {
                break;
            }
            self.jacobian_product(rows, ws, phi, scratch);
            let curvature = dot(&scratch.p, &scratch.mp);
            if curvature <= 0.0 {
                if k == 0 {
                    d.copy_from_slice(phi);
                }
                break;
            }
            let alpha = rr / curvature;
            for i in 0..d.len() {
                d[i] += alpha * scratch.p[i];
                scratch.r[i] -= alpha * scratch.mp[i];
            }
            let rr_next = dot(&scratch.r, &scratch.r);
            let beta = rr_next / rr;
            rr = rr_next;
            for (p, r) in scratch.p.iter_mut().zip(&scratch.r) {
                *p = r + beta * *p;
            }
        }
        d
    }
}

impl RowSolver for FischerNewton {
    fn name(&self) -> &'static str {
        "fischer-newton"
    }

    fn solve(&mut self, rows: &mut [ConstraintRow], bodies: &mut [BodyState]) -> SolveReport {
        if rows.is_empty() {
            return SolveReport::empty(self.name());
        }

        let n = rows.len();
        let mut ws = Workspace::new(rows, bodies);
        let initial_merit = merit(rows, &ws, None);
        let mut fallbacks = 0;
        let mut iterations = 0;

        // Unresolved contacts start at λ = 0, where φ has a kink.
        sweep(rows, &mut ws, 1.0);
        let mut phi = vec![0.0; n];
        let mut theta = residual(rows, &ws, &mut phi);
        let mut trial = ws.clone();
        let mut phi_trial = vec![0.0; n];
        let mut scratch = Scratch {
            probe: ws.clone(),
            phi_probe: vec![0.0; n],
            r: vec![0.0; n],
            p: vec![0.0; n],
            mp: vec![0.0; n],
        };

        for _ in 0..self.config.max_iterations {
            if theta < self.config.tolerance {
                break;
            }
            iterations += 1;

            let direction = self.newton_direction(rows, &ws, &phi, &mut scratch);

            let mut alpha = 1.0;
            let mut accepted = None;
            for _ in 0..=self.config.max_halvings {
                displace(rows, &ws, &mut trial, &direction, alpha);
                let candidate = residual(rows, &trial, &mut phi_trial);
                if candidate <= (1.0 - 2.0 * self.config.armijo * alpha) * theta {
                    accepted = Some(candidate);
                    break;
                }
                alpha *= 0.5;
            }

            if let Some(candidate) = accepted {
                std::mem::swap(&mut ws, &mut trial);
                std::mem::swap(&mut phi, &mut phi_trial);
                theta = candidate;
            } else {
                warn!(
                    theta,
                    halvings = self.config.max_halvings,
                    "Fischer-Newton line search failed, falling back to a Gauss-Seidel sweep"
                );
                fallbacks += 1;
                sweep(rows, &mut ws, 1.0);
                theta = residual(rows, &ws, &mut phi);
            }
            trace!(iteration = iterations, theta, alpha, "Fischer-Newton iteration");
        }

        ws.project_all(rows);
        let final_merit = merit(rows, &ws, None);
        ws.finish(rows, bodies);

        SolveReport {
            solver: self.name(),
            rows: n,
            iterations,
            initial_merit,
            merit: final_merit,
            converged: final_merit < self.config.tolerance,
            fallbacks,
        }
    }
}
