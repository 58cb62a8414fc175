//! Contact constraints.
//!
//! A narrow phase reports [`ContactPoint`]s; each becomes a
//! [`ContactConstraint`] emitting one normal row with bounds `[0, ∞)` and,
//! when the contact has friction, two tangent rows whose bounds follow the
//! normal row's multiplier (Coulomb cone, linearized as a box).
//!
//! A contact kept across steps seeds its rows from the impulses of the
//! previous solve, scaled by the warm-start factor.

use nalgebra::{Point3, Vector3};
use sim_types::{BodyId, Result, SimError};
use tracing::warn;

use crate::frame::{normalize_or, orthonormal_basis, DIRECTION_EPSILON};
use crate::{BodyPair, ConstraintProducer, ConstraintRow, RowContext, RowGroup, WarmStart};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// One contact point between two bodies, as reported by collision detection.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContactPoint {
    /// First body.
    pub body_a: BodyId,
    /// Second body.
    pub body_b: BodyId,
    /// Contact point in world frame.
    pub position: Point3<f64>,
    /// Contact normal pointing from A to B.
    pub normal: Vector3<f64>,
    /// Penetration depth (positive when overlapping).
    pub depth: f64,
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Coefficient of restitution in `[0, 1]`.
    pub restitution: f64,
}

impl ContactPoint {
    /// Create a frictionless, inelastic contact.
    #[must_use]
    pub fn new(
        body_a: BodyId,
        body_b: BodyId,
        position: Point3<f64>,
        normal: Vector3<f64>,
        depth: f64,
    ) -> Self {
        Self {
            body_a,
            body_b,
            position,
            normal,
            depth,
            friction: 0.0,
            restitution: 0.0,
        }
    }

    /// Set the friction coefficient.
    #[must_use]
    pub fn with_friction(mut self, friction: f64) -> Self {
        self.friction = friction;
        self
    }

    /// Set the restitution coefficient.
    #[must_use]
    pub fn with_restitution(mut self, restitution: f64) -> Self {
        self.restitution = restitution;
        self
    }

    /// Validate the reported values.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] for non-finite geometry, negative
    /// friction, or restitution outside `[0, 1]`.
    pub fn validate(&self) -> Result<()> {
        if !self.position.coords.iter().all(|x| x.is_finite())
            || !self.normal.iter().all(|x| x.is_finite())
            || !self.depth.is_finite()
        {
            return Err(SimError::invalid_config("contact geometry must be finite"));
        }
        if !self.friction.is_finite() || self.friction < 0.0 {
            return Err(SimError::invalid_config(format!(
                "contact friction must be finite and non-negative, got {}",
                self.friction
            )));
        }
        if !(0.0..=1.0).contains(&self.restitution) {
            return Err(SimError::invalid_config(format!(
                "contact restitution must be in [0, 1], got {}",
                self.restitution
            )));
        }
        if self.body_a == self.body_b {
            return Err(SimError::invalid_config(
                "contact must involve two distinct bodies",
            ));
        }
        Ok(())
    }
}

/// Rows for one contact point.
#[derive(Debug, Clone, PartialEq)]
pub struct ContactConstraint {
    point: ContactPoint,
    warm: WarmStart,
}

impl ContactConstraint {
    /// Build from a reported contact.
    ///
    /// A (near-)zero normal is replaced by +Z.
    ///
    /// # Errors
    ///
    /// Propagates [`ContactPoint::validate`].
    pub fn new(point: ContactPoint) -> Result<Self> {
        point.validate()?;
        let mut point = point;
        if point.normal.norm() <= DIRECTION_EPSILON {
            warn!(
                body_a = %point.body_a,
                body_b = %point.body_b,
                "degenerate contact normal, using +Z"
            );
        }
        point.normal = normalize_or(&point.normal, Vector3::z());
        Ok(Self {
            point,
            warm: WarmStart::default(),
        })
    }

    /// The contact point (normal normalized).
    #[must_use]
    pub fn point(&self) -> &ContactPoint {
        &self.point
    }

    /// Normal impulse from the last solve.
    #[must_use]
    pub fn normal_impulse(&self) -> f64 {
        self.warm.values()[0]
    }

    /// Tangent impulses from the last solve.
    #[must_use]
    pub fn friction_impulse(&self) -> [f64; 2] {
        let stored = self.warm.values();
        [stored[1], stored[2]]
    }
}

impl ConstraintProducer for ContactConstraint {
    fn bodies(&self) -> (BodyId, BodyId) {
        (self.point.body_a, self.point.body_b)
    }

    fn build_rows(&mut self, pair: BodyPair<'_>, ctx: &RowContext) -> RowGroup {
        let n = self.point.normal;
        let r_a = self.point.position - pair.a.position;
        let r_b = self.point.position - pair.b.position;

        let approach = n.dot(&(pair.b.velocity_at(&r_b) - pair.a.velocity_at(&r_a)));
        let penetration = (self.point.depth - ctx.stabilization.contact_slop).max(0.0);
        let bias = ctx.correction(-penetration);
        let bounce = if approach < -ctx.stabilization.restitution_threshold {
            -self.point.restitution * approach
        } else {
            0.0
        };

        let mut rows = RowGroup::new();
        rows.push(
            ConstraintRow::linear(pair.index_a, pair.index_b, &r_a, &r_b, &n)
                .with_bounds(0.0, f64::INFINITY)
                .with_target(bias.max(bounce))
                .with_slot(0),
        );

        if self.point.friction > 0.0 {
            let (t1, t2) = orthonormal_basis(&n);
            for (slot, tangent) in [(1_u8, t1), (2, t2)] {
                rows.push(
                    ConstraintRow::linear(pair.index_a, pair.index_b, &r_a, &r_b, &tangent)
                        .with_coupling(0, self.point.friction)
                        .with_slot(slot),
                );
            }
        }
        self.warm.seed_all(&mut rows, ctx.warm_start_scale());
        rows
    }

    fn store_impulses(&mut self, rows: &[ConstraintRow]) {
        self.warm.store(rows);
    }

    fn last_impulses(&self) -> &[f64] {
        &self.warm.values()[..3]
    }
}
