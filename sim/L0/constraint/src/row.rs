//! Scalar complementarity rows.
//!
//! A [`ConstraintRow`] is one scalar equation of the step's NCP:
//!
//! ```text
//! J·Δv + cfm·λ = rhs        when lower < λ < upper
//! J·Δv + cfm·λ ≥ rhs        when λ = upper  (pushes as hard as allowed)
//! J·Δv + cfm·λ ≤ rhs        when λ = lower
//! ```
//!
//! where `rhs = target − J·v` is the velocity change the row asks for and
//! `Δv` the velocity change the solver has produced so far.
//!
//! Rows are pure data, rebuilt every step. Only `lambda` survives into the
//! next step, through the producer that emitted the row.

use nalgebra::Vector3;

use crate::BodyState;

/// Friction-cone coupling: this row's bounds are `±coefficient·|λ_row|`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coupling {
    /// Index of the coupled row. Within a producer's group this is local;
    /// once pushed into a [`RowArena`](crate::RowArena) it is global.
    pub row: usize,
    /// Friction coefficient.
    pub coefficient: f64,
}

/// One scalar constraint equation between two bodies.
#[derive(Debug, Clone, PartialEq)]
pub struct ConstraintRow {
    /// Dense solver index of body A.
    pub body_a: usize,
    /// Dense solver index of body B.
    pub body_b: usize,
    /// Linear Jacobian block on body A.
    pub lin_a: Vector3<f64>,
    /// Angular Jacobian block on body A.
    pub ang_a: Vector3<f64>,
    /// Linear Jacobian block on body B.
    pub lin_b: Vector3<f64>,
    /// Angular Jacobian block on body B.
    pub ang_b: Vector3<f64>,
    /// `M⁻¹Jᵀ` linear block on body A.
    pub minv_lin_a: Vector3<f64>,
    /// `M⁻¹Jᵀ` angular block on body A.
    pub minv_ang_a: Vector3<f64>,
    /// `M⁻¹Jᵀ` linear block on body B.
    pub minv_lin_b: Vector3<f64>,
    /// `M⁻¹Jᵀ` angular block on body B.
    pub minv_ang_b: Vector3<f64>,
    /// `J M⁻¹ Jᵀ`.
    pub diag: f64,
    /// Target relative velocity along the row (includes stabilization).
    pub target: f64,
    /// `target − J·v`, filled by [`prepare`](Self::prepare).
    pub rhs: f64,
    /// Lower bound on the accumulated multiplier.
    pub lower: f64,
    /// Upper bound on the accumulated multiplier.
    pub upper: f64,
    /// Accumulated multiplier (impulse).
    pub lambda: f64,
    /// Constraint force mixing.
    pub cfm: f64,
    /// Friction coupling to an earlier row.
    pub coupling: Option<Coupling>,
    /// Producer-local slot used to carry `lambda` across steps.
    pub slot: u8,
}

impl ConstraintRow {
    /// Create an unbounded equality row from raw Jacobian blocks.
    #[must_use]
    pub fn new(
        body_a: usize,
        body_b: usize,
        lin_a: Vector3<f64>,
        ang_a: Vector3<f64>,
        lin_b: Vector3<f64>,
        ang_b: Vector3<f64>,
    ) -> Self {
        Self {
            body_a,
            body_b,
            lin_a,
            ang_a,
            lin_b,
            ang_b,
            minv_lin_a: Vector3::zeros(),
            minv_ang_a: Vector3::zeros(),
            minv_lin_b: Vector3::zeros(),
            minv_ang_b: Vector3::zeros(),
            diag: 0.0,
            target: 0.0,
            rhs: 0.0,
            lower: f64::NEG_INFINITY,
            upper: f64::INFINITY,
            lambda: 0.0,
            cfm: 0.0,
            coupling: None,
            slot: 0,
        }
    }

    /// Row measuring the separation rate of two anchor points along
    /// `direction`.
    ///
    /// `r_a` and `r_b` are world-space lever arms from each center of mass to
    /// its anchor. `J·v` is `direction · (v_b(anchor) − v_a(anchor))`.
    #[must_use]
    pub fn linear(
        body_a: usize,
        body_b: usize,
        r_a: &Vector3<f64>,
        r_b: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> Self {
        Self::new(
            body_a,
            body_b,
            -direction,
            -r_a.cross(direction),
            *direction,
            r_b.cross(direction),
        )
    }

    /// Row measuring relative angular velocity about `axis`:
    /// `J·v = axis · (ω_b − ω_a)`.
    #[must_use]
    pub fn angular(body_a: usize, body_b: usize, axis: &Vector3<f64>) -> Self {
        Self::new(
            body_a,
            body_b,
            Vector3::zeros(),
            -axis,
            Vector3::zeros(),
            *axis,
        )
    }

    /// Set the multiplier bounds.
    #[must_use]
    pub fn with_bounds(mut self, lower: f64, upper: f64) -> Self {
        self.lower = lower;
        self.upper = upper;
        self
    }

    /// Set the target relative velocity.
    #[must_use]
    pub fn with_target(mut self, target: f64) -> Self {
        self.target = target;
        self
    }

    /// Set the warm-start slot.
    #[must_use]
    pub fn with_slot(mut self, slot: u8) -> Self {
        self.slot = slot;
        self
    }

    /// Seed the multiplier.
    #[must_use]
    pub fn with_lambda(mut self, lambda: f64) -> Self {
        self.lambda = lambda;
        self
    }

    /// Couple this row's bounds to an earlier row's multiplier.
    ///
    /// Static bounds are reset to zero so that a dropped coupling means no
    /// friction rather than unbounded friction.
    #[must_use]
    pub fn with_coupling(mut self, row: usize, coefficient: f64) -> Self {
        self.coupling = Some(Coupling { row, coefficient });
        self.lower = 0.0;
        self.upper = 0.0;
        self
    }

    /// Compute effective-mass blocks, the diagonal, and `rhs` from the
    /// bodies' current velocities.
    ///
    /// Jacobian blocks on fixed bodies are zeroed so that no impulse ever
    /// reaches them.
    pub fn prepare(&mut self, bodies: &[BodyState], cfm: f64) {
        let (a, b) = (&bodies[self.body_a], &bodies[self.body_b]);

        if a.is_static {
            self.lin_a = Vector3::zeros();
            self.ang_a = Vector3::zeros();
        }
        if b.is_static {
            self.lin_b = Vector3::zeros();
            self.ang_b = Vector3::zeros();
        }

        self.minv_lin_a = self.lin_a * a.inv_mass;
        self.minv_ang_a = a.inv_inertia * self.ang_a;
        self.minv_lin_b = self.lin_b * b.inv_mass;
        self.minv_ang_b = b.inv_inertia * self.ang_b;

        self.diag = self.lin_a.dot(&self.minv_lin_a)
            + self.ang_a.dot(&self.minv_ang_a)
            + self.lin_b.dot(&self.minv_lin_b)
            + self.ang_b.dot(&self.minv_ang_b);
        self.cfm = cfm;
        self.rhs = self.target - self.velocity(bodies);
    }

    /// `J·v` with the bodies' pre-solve velocities.
    #[must_use]
    pub fn velocity(&self, bodies: &[BodyState]) -> f64 {
        let (a, b) = (&bodies[self.body_a], &bodies[self.body_b]);
        self.lin_a.dot(&a.linear_velocity)
            + self.ang_a.dot(&a.angular_velocity)
            + self.lin_b.dot(&b.linear_velocity)
            + self.ang_b.dot(&b.angular_velocity)
    }

    /// Denominator of the scalar update.
    #[must_use]
    pub fn effective_diag(&self) -> f64 {
        self.diag + self.cfm
    }

    /// Whether neither body can move along this row.
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.effective_diag() <= f64::EPSILON
    }
}

/// Bounds of row `i` given the current multipliers.
///
/// Coupled rows read the coupled row's multiplier from `lambda` as it stands
/// now, i.e. the in-progress value of the current sweep. A coupling that
/// points at or past `i` contributes nothing.
#[must_use]
pub fn row_bounds(rows: &[ConstraintRow], lambda: &[f64], i: usize) -> (f64, f64) {
    let row = &rows[i];
    match row.coupling {
        Some(c) if c.row < i => {
            let limit = c.coefficient * lambda[c.row].abs();
            (-limit, limit)
        }
        Some(_) => (0.0, 0.0),
        None => (row.lower, row.upper),
    }
}

/// Clamp `value` into `(lower, upper)`.
#[must_use]
pub fn project(value: f64, (lower, upper): (f64, f64)) -> f64 {
    value.max(lower).min(upper)
}
