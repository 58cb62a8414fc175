//! Projected Gauss-Seidel (PGS) solver.
//!
//! The baseline strategy: a fixed number of sweeps over all rows, each row
//! updated against the velocity deltas produced so far in the same sweep:
//!
//! ```text
//! a   = J_i · Δv
//! λ'  = clamp(λ_i + ω (rhs_i − a − cfm·λ_i) / (diag_i + cfm), bounds_i)
//! Δv += M⁻¹J_iᵀ (λ' − λ_i)
//! ```
//!
//! Friction rows read their coupled normal row's multiplier as already
//! updated in the current sweep. With ω = 1 this is plain Gauss-Seidel; the
//! SOR factor ω in (0, 2) trades stability for speed.
//!
//! [`PgsConfig::iterations`] bounds the sweep count, which keeps per-step
//! latency bounded. With [`PgsConfig::early_exit`] set (the default) the
//! merit is checked after every sweep and the loop stops once it drops below
//! [`PgsConfig::tolerance`]; without it every sweep runs.

use sim_types::{Result, SimError};

use crate::row::{project, row_bounds};
use crate::solver::{merit, Workspace};
use crate::{BodyState, ConstraintRow, RowSolver, SolveReport};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for the PGS solver.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PgsConfig {
    /// Number of sweeps.
    pub iterations: usize,

    /// SOR factor.
    /// - 1.0: Standard Gauss-Seidel
    /// - < 1.0: Under-relaxation (more stable)
    /// - > 1.0: Over-relaxation (faster convergence, typically 1.2-1.8)
    pub sor_factor: f64,

    /// Merit below which the report counts as converged.
    pub tolerance: f64,

    /// Stop sweeping once the merit is below `tolerance`.
    pub early_exit: bool,
}

impl Default for PgsConfig {
    fn default() -> Self {
        Self {
            iterations: 20,
            sor_factor: 1.0,
            tolerance: 1e-10,
            early_exit: true,
        }
    }
}

impl PgsConfig {
    /// High-accuracy configuration for precise simulations.
    #[must_use]
    pub fn high_accuracy() -> Self {
        Self {
            iterations: 200,
            sor_factor: 1.0,
            tolerance: 1e-16,
            early_exit: true,
        }
    }

    /// Fast configuration for real-time applications.
    #[must_use]
    pub fn realtime() -> Self {
        Self {
            iterations: 8,
            sor_factor: 1.3,
            tolerance: 1e-6,
            early_exit: false,
        }
    }

    /// Set the number of sweeps.
    #[must_use]
    pub const fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Enable or disable the per-sweep merit check.
    #[must_use]
    pub const fn with_early_exit(mut self, enabled: bool) -> Self {
        self.early_exit = enabled;
        self
    }

    /// Set the SOR factor.
    #[must_use]
    pub const fn with_sor_factor(mut self, factor: f64) -> Self {
        self.sor_factor = factor;
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the SOR factor is outside
    /// `(0, 2)` or the tolerance is not positive.
    pub fn validate(&self) -> Result<()> {
        if !(self.sor_factor > 0.0 && self.sor_factor < 2.0) {
            return Err(SimError::invalid_config("SOR factor must be in range (0, 2)"));
        }
        if !(self.tolerance > 0.0) {
            return Err(SimError::invalid_config("PGS tolerance must be positive"));
        }
        Ok(())
    }
}

/// One Gauss-Seidel sweep over all rows.
///
/// Returns the sum of squared multiplier changes.
pub(crate) fn sweep(rows: &[ConstraintRow], ws: &mut Workspace, sor: f64) -> f64 {
    let mut change = 0.0;
    for (i, row) in rows.iter().enumerate() {
        if row.is_degenerate() {
            continue;
        }
        let step = sor * ws.slack(rows, i) / row.effective_diag();
        let next = project(ws.lambda[i] + step, row_bounds(rows, &ws.lambda, i));
        let dl = next - ws.lambda[i];
        if dl != 0.0 {
            ws.lambda[i] = next;
            ws.deltas.apply(row, dl);
            change += dl * dl;
        }
    }
    change
}

/// Projected Gauss-Seidel constraint solver.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ProjectedGaussSeidel {
    config: PgsConfig,
}

impl ProjectedGaussSeidel {
    /// Create a new PGS solver.
    #[must_use]
    pub fn new(config: PgsConfig) -> Self {
        Self { config }
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &PgsConfig {
        &self.config
    }

    /// Get mutable configuration.
    pub fn config_mut(&mut self) -> &mut PgsConfig {
        &mut self.config
    }
}

impl RowSolver for ProjectedGaussSeidel {
    fn name(&self) -> &'static str {
        "pgs"
    }

    fn solve(&mut self, rows: &mut [ConstraintRow], bodies: &mut [BodyState]) -> SolveReport {
        if rows.is_empty() {
            return SolveReport::empty(self.name());
        }

        let mut ws = Workspace::new(rows, bodies);
        let initial_merit = merit(rows, &ws, None);
        let tolerance = self.config.tolerance;

        let mut iterations = 0;
        let mut current = initial_merit;
        while iterations < self.config.iterations {
            if self.config.early_exit && current < tolerance {
                break;
            }
            sweep(rows, &mut ws, self.config.sor_factor);
            iterations += 1;
            if self.config.early_exit {
                current = merit(rows, &ws, None);
            }
        }
        let final_merit = if self.config.early_exit {
            current
        } else {
            merit(rows, &ws, None)
        };
        ws.finish(rows, bodies);

        SolveReport {
            solver: self.name(),
            rows: rows.len(),
            iterations,
            initial_merit,
            merit: final_merit,
            converged: final_merit < tolerance,
            fallbacks: 0,
        }
    }
}
