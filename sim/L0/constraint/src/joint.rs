//! Joint producers.
//!
//! Every joint stores its anchor and axes in body-local space, computed once
//! from the bodies' poses at construction, and re-expresses them in world
//! space each step to emit rows:
//!
//! | Joint                | Rows                                                         |
//! |----------------------|--------------------------------------------------------------|
//! | [`BallJoint`]        | 3 translational                                              |
//! | [`HingeJoint`]       | 3 translational + 2 angular + 0..=2 governed-axis rows       |
//! | [`UniversalJoint`]   | 3 translational + 1 orthogonality + 0..=2 per governed axis  |
//!
//! Multipliers are carried to the next step per row slot, so a joint only
//! ever warm-starts from its own previous solution.
//!
//! The translational and alignment rows also come in a position-level form
//! ([`ConstraintProducer::position_rows`]) whose targets are the displacement
//! that cancels the current error. The world solves those after moving the
//! bodies, which keeps joints assembled when the velocity-level correction
//! lags behind fast motion.

use nalgebra::{Point3, Vector3};
use sim_types::{BodyId, Result, SimError};

use crate::frame::{normalize_or, orthonormal_basis, perpendicular_component, signed_angle};
use crate::{
    AngleLimits, AxisController, AxisMotor, BodyFrame, BodyPair, BodyState, ConstraintRow,
    ContactConstraint, LimitState, RowContext, RowGroup, WarmStart,
};

/// Anything that turns current body poses into constraint rows.
pub trait ConstraintProducer {
    /// The two participating bodies.
    fn bodies(&self) -> (BodyId, BodyId);

    /// Emit this step's rows.
    ///
    /// Rows reference `pair.index_a` / `pair.index_b`; couplings are local to
    /// the returned group.
    fn build_rows(&mut self, pair: BodyPair<'_>, ctx: &RowContext) -> RowGroup;

    /// Receive the solved rows emitted by the last [`build_rows`](Self::build_rows).
    fn store_impulses(&mut self, rows: &[ConstraintRow]);

    /// Multipliers from the last solve, indexed by row slot.
    fn last_impulses(&self) -> &[f64];

    /// Equality rows at the current poses with `target = −C`, the
    /// displacement (translation and rotation vector) that removes the
    /// positional error `C` to first order.
    ///
    /// Producers without positional equalities emit nothing.
    fn position_rows(&self, _pair: BodyPair<'_>) -> RowGroup {
        RowGroup::new()
    }
}

/// A point shared by both bodies, stored in each body's local frame.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Anchor {
    local_a: Point3<f64>,
    local_b: Point3<f64>,
}

impl Anchor {
    fn new(a: &BodyFrame, b: &BodyFrame, world: &Point3<f64>) -> Self {
        Self {
            local_a: a.local_point(world),
            local_b: b.local_point(world),
        }
    }

    fn lever_arms(&self, a: &BodyState, b: &BodyState) -> (Vector3<f64>, Vector3<f64>) {
        (a.lever_arm(&self.local_a), b.lever_arm(&self.local_b))
    }

    /// World anchor on B minus world anchor on A.
    fn separation(&self, a: &BodyState, b: &BodyState) -> Vector3<f64> {
        let (r_a, r_b) = self.lever_arms(a, b);
        (b.position + r_b) - (a.position + r_a)
    }

    /// Three equality rows along world x, y, z in slots 0..3.
    fn push_rows(
        &self,
        pair: &BodyPair<'_>,
        ctx: &RowContext,
        impulse_limit: f64,
        correction_cap: f64,
        rows: &mut RowGroup,
    ) {
        self.push_rows_with(pair, impulse_limit, rows, |error| {
            ctx.correction(error).clamp(-correction_cap, correction_cap)
        });
    }

    fn push_position_rows(&self, pair: &BodyPair<'_>, rows: &mut RowGroup) {
        self.push_rows_with(pair, f64::INFINITY, rows, |error| -error);
    }

    fn push_rows_with(
        &self,
        pair: &BodyPair<'_>,
        impulse_limit: f64,
        rows: &mut RowGroup,
        target: impl Fn(f64) -> f64,
    ) {
        let (r_a, r_b) = self.lever_arms(pair.a, pair.b);
        let error = self.separation(pair.a, pair.b);
        for (slot, direction) in [(0_u8, Vector3::x()), (1, Vector3::y()), (2, Vector3::z())] {
            rows.push(
                ConstraintRow::linear(pair.index_a, pair.index_b, &r_a, &r_b, &direction)
                    .with_bounds(-impulse_limit, impulse_limit)
                    .with_target(target(error.dot(&direction)))
                    .with_slot(slot),
            );
        }
    }
}

// ============================================================================
// Ball-in-socket
// ============================================================================

/// Ball-in-socket joint: holds two anchor points coincident.
#[derive(Debug, Clone, PartialEq)]
pub struct BallJoint {
    body_a: BodyId,
    body_b: BodyId,
    anchor: Anchor,
    force_limit: f64,
    max_correction_velocity: f64,
    warm: WarmStart,
}

impl BallJoint {
    /// Create a ball joint at a world-space anchor.
    #[must_use]
    pub fn new(a: BodyFrame, b: BodyFrame, anchor: Point3<f64>) -> Self {
        Self {
            body_a: a.id,
            body_b: b.id,
            anchor: Anchor::new(&a, &b, &anchor),
            force_limit: f64::INFINITY,
            max_correction_velocity: f64::INFINITY,
            warm: WarmStart::default(),
        }
    }

    /// Limit the force each translational row may apply.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NegativeForce`] if `force` is negative.
    pub fn with_force_limit(mut self, force: f64) -> Result<Self> {
        self.force_limit = SimError::check_force("ball joint force limit", force)?;
        Ok(self)
    }

    /// Cap the drift-correction velocity, e.g. while a user drags a body.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] unless `cap` is positive.
    pub fn with_max_correction_velocity(mut self, cap: f64) -> Result<Self> {
        if cap.is_nan() || cap <= 0.0 {
            return Err(SimError::invalid_config(
                "ball joint correction cap must be positive",
            ));
        }
        self.max_correction_velocity = cap;
        Ok(self)
    }

    /// Force limit per row.
    #[must_use]
    pub fn force_limit(&self) -> f64 {
        self.force_limit
    }

    /// World-space distance between the two anchor points.
    #[must_use]
    pub fn anchor_separation(&self, a: &BodyState, b: &BodyState) -> f64 {
        self.anchor.separation(a, b).norm()
    }
}

impl ConstraintProducer for BallJoint {
    fn bodies(&self) -> (BodyId, BodyId) {
        (self.body_a, self.body_b)
    }

    fn build_rows(&mut self, pair: BodyPair<'_>, ctx: &RowContext) -> RowGroup {
        let mut rows = RowGroup::new();
        self.anchor.push_rows(
            &pair,
            ctx,
            self.force_limit * ctx.dt,
            self.max_correction_velocity,
            &mut rows,
        );
        self.warm.seed_all(&mut rows, ctx.warm_start_scale());
        rows
    }

    fn store_impulses(&mut self, rows: &[ConstraintRow]) {
        self.warm.store(rows);
    }

    fn last_impulses(&self) -> &[f64] {
        self.warm.values()
    }

    fn position_rows(&self, pair: BodyPair<'_>) -> RowGroup {
        let mut rows = RowGroup::new();
        self.anchor.push_position_rows(&pair, &mut rows);
        rows
    }
}

// ============================================================================
// Hinge
// ============================================================================

/// Hinge joint: one rotational degree of freedom about a shared axis.
#[derive(Debug, Clone, PartialEq)]
pub struct HingeJoint {
    body_a: BodyId,
    body_b: BodyId,
    anchor: Anchor,
    axis_a: Vector3<f64>,
    axis_b: Vector3<f64>,
    tangent_a: Vector3<f64>,
    tangent_b: Vector3<f64>,
    controller: AxisController,
    warm: WarmStart,
}

impl HingeJoint {
    const AXIS_SLOT: u8 = 5;

    /// Create a hinge through a world-space anchor about a world-space axis.
    ///
    /// The current relative orientation defines angle zero. A zero axis falls
    /// back to +Z.
    #[must_use]
    pub fn new(a: BodyFrame, b: BodyFrame, anchor: Point3<f64>, axis: Vector3<f64>) -> Self {
        let axis = normalize_or(&axis, Vector3::z());
        let (tangent, _) = orthonormal_basis(&axis);
        Self {
            body_a: a.id,
            body_b: b.id,
            anchor: Anchor::new(&a, &b, &anchor),
            axis_a: a.local_vector(&axis),
            axis_b: b.local_vector(&axis),
            tangent_a: a.local_vector(&tangent),
            tangent_b: b.local_vector(&tangent),
            controller: AxisController::new(),
            warm: WarmStart::default(),
        }
    }

    /// Set angle limits.
    #[must_use]
    pub fn with_limits(mut self, limits: AngleLimits) -> Self {
        self.controller.set_limits(Some(limits));
        self
    }

    /// Set a motor.
    #[must_use]
    pub fn with_motor(mut self, motor: AxisMotor) -> Self {
        self.controller.set_motor(Some(motor));
        self
    }

    /// Set axis friction torque.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NegativeForce`] if `torque` is negative.
    pub fn with_friction(mut self, torque: f64) -> Result<Self> {
        self.controller.set_friction(torque)?;
        Ok(self)
    }

    /// The governed axis.
    #[must_use]
    pub fn controller(&self) -> &AxisController {
        &self.controller
    }

    /// The governed axis, mutably (retarget motor, change limits).
    pub fn controller_mut(&mut self) -> &mut AxisController {
        &mut self.controller
    }

    /// Hinge angle at the last step (rad).
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.controller.angle()
    }

    /// Hinge rate at the last step (rad/s).
    #[must_use]
    pub fn angle_rate(&self) -> f64 {
        self.controller.rate()
    }

    /// Limit state at the last step.
    #[must_use]
    pub fn limit_state(&self) -> LimitState {
        self.controller.state()
    }

    /// Measure the hinge angle for the given poses.
    #[must_use]
    pub fn measure_angle(&self, a: &BodyState, b: &BodyState) -> f64 {
        let axis = a.world_vector(&self.axis_a);
        signed_angle(
            &axis,
            &a.world_vector(&self.tangent_a),
            &b.world_vector(&self.tangent_b),
        )
    }

    /// World-space distance between the two anchor points.
    #[must_use]
    pub fn anchor_separation(&self, a: &BodyState, b: &BodyState) -> f64 {
        self.anchor.separation(a, b).norm()
    }

    /// Two angular rows in slots 3 and 4 holding the axes parallel.
    ///
    /// Returns the world axis on body A.
    fn push_alignment_rows(
        &self,
        pair: &BodyPair<'_>,
        rows: &mut RowGroup,
        target: impl Fn(f64) -> f64,
    ) -> Vector3<f64> {
        let a1 = pair.a.world_vector(&self.axis_a);
        let a2 = pair.b.world_vector(&self.axis_b);
        let misalignment = a1.cross(&a2);
        let (p, q) = orthonormal_basis(&a1);
        for (slot, direction) in [(3_u8, p), (4, q)] {
            rows.push(
                ConstraintRow::angular(pair.index_a, pair.index_b, &direction)
                    .with_target(target(direction.dot(&misalignment)))
                    .with_slot(slot),
            );
        }
        a1
    }
}

impl ConstraintProducer for HingeJoint {
    fn bodies(&self) -> (BodyId, BodyId) {
        (self.body_a, self.body_b)
    }

    fn build_rows(&mut self, pair: BodyPair<'_>, ctx: &RowContext) -> RowGroup {
        let mut rows = RowGroup::new();
        self.anchor
            .push_rows(&pair, ctx, f64::INFINITY, f64::INFINITY, &mut rows);

        let a1 = self.push_alignment_rows(&pair, &mut rows, |error| ctx.correction(error));

        let angle = self.measure_angle(pair.a, pair.b);
        let rate = a1.dot(&(pair.b.angular_velocity - pair.a.angular_velocity));
        if self
            .controller
            .measure(angle, rate, ctx.stabilization.limit_shell)
        {
            self.warm.reset_slots(Self::AXIS_SLOT..Self::AXIS_SLOT + 2);
        }
        let template = ConstraintRow::angular(pair.index_a, pair.index_b, &a1);
        rows.extend(self.controller.rows(&template, ctx, Self::AXIS_SLOT));

        self.warm.seed_all(&mut rows, ctx.warm_start_scale());
        rows
    }

    fn store_impulses(&mut self, rows: &[ConstraintRow]) {
        self.warm.store(rows);
    }

    fn last_impulses(&self) -> &[f64] {
        self.warm.values()
    }

    fn position_rows(&self, pair: BodyPair<'_>) -> RowGroup {
        let mut rows = RowGroup::new();
        self.anchor.push_position_rows(&pair, &mut rows);
        self.push_alignment_rows(&pair, &mut rows, |error| -error);
        rows
    }
}

// ============================================================================
// Universal
// ============================================================================

/// Universal (Cardan) joint: two rotational degrees of freedom about axes
/// fixed in each body, kept mutually perpendicular.
#[derive(Debug, Clone, PartialEq)]
pub struct UniversalJoint {
    body_a: BodyId,
    body_b: BodyId,
    anchor: Anchor,
    /// First axis, fixed in A.
    axis1_a: Vector3<f64>,
    /// Second axis, fixed in B.
    axis2_b: Vector3<f64>,
    /// Zero-angle reference for axis 1, fixed in A.
    reference1_a: Vector3<f64>,
    /// Zero-angle reference for axis 2, fixed in B.
    reference2_b: Vector3<f64>,
    axes: [AxisController; 2],
    warm: WarmStart,
}

impl UniversalJoint {
    const AXIS_SLOTS: [u8; 2] = [4, 6];

    /// Create a universal joint.
    ///
    /// `axis1` is attached to A and `axis2` to B, both given in world space.
    /// `axis2` is orthogonalized against `axis1`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if the axes are (nearly) parallel.
    pub fn new(
        a: BodyFrame,
        b: BodyFrame,
        anchor: Point3<f64>,
        axis1: Vector3<f64>,
        axis2: Vector3<f64>,
    ) -> Result<Self> {
        let axis1 = normalize_or(&axis1, Vector3::z());
        let axis2 = normalize_or(&axis2, Vector3::x());
        if axis1.cross(&axis2).norm() < 1e-6 {
            return Err(SimError::invalid_config(
                "universal joint axes must not be parallel",
            ));
        }
        let axis2 = perpendicular_component(&axis2, &axis1);

        Ok(Self {
            body_a: a.id,
            body_b: b.id,
            anchor: Anchor::new(&a, &b, &anchor),
            axis1_a: a.local_vector(&axis1),
            axis2_b: b.local_vector(&axis2),
            reference1_a: a.local_vector(&axis2),
            reference2_b: b.local_vector(&axis1),
            axes: [AxisController::new(), AxisController::new()],
            warm: WarmStart::default(),
        })
    }

    /// Replace the controller of axis `index` (0 or 1).
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if `index > 1`.
    pub fn with_axis(mut self, index: usize, controller: AxisController) -> Result<Self> {
        *self.axis_mut(index)? = controller;
        Ok(self)
    }

    /// Controller of axis `index`.
    #[must_use]
    pub fn axis(&self, index: usize) -> Option<&AxisController> {
        self.axes.get(index)
    }

    /// Controller of axis `index`, mutably.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidConfig`] if `index > 1`.
    pub fn axis_mut(&mut self, index: usize) -> Result<&mut AxisController> {
        self.axes
            .get_mut(index)
            .ok_or_else(|| SimError::invalid_config(format!("universal joint has no axis {index}")))
    }

    /// Measured angles about both axes (rad).
    #[must_use]
    pub fn angles(&self) -> [f64; 2] {
        [self.axes[0].angle(), self.axes[1].angle()]
    }

    /// World-space distance between the two anchor points.
    #[must_use]
    pub fn anchor_separation(&self, a: &BodyState, b: &BodyState) -> f64 {
        self.anchor.separation(a, b).norm()
    }

    /// The row in slot 3 holding the two axes perpendicular.
    ///
    /// Returns both world axes.
    fn push_orthogonality_row(
        &self,
        pair: &BodyPair<'_>,
        rows: &mut RowGroup,
        target: impl Fn(f64) -> f64,
    ) -> (Vector3<f64>, Vector3<f64>) {
        let a1 = pair.a.world_vector(&self.axis1_a);
        let a2 = pair.b.world_vector(&self.axis2_b);
        let u = a1.cross(&a2);
        rows.push(
            ConstraintRow::new(pair.index_a, pair.index_b, Vector3::zeros(), u, Vector3::zeros(), -u)
                .with_target(target(a1.dot(&a2)))
                .with_slot(3),
        );
        (a1, a2)
    }
}

impl ConstraintProducer for UniversalJoint {
    fn bodies(&self) -> (BodyId, BodyId) {
        (self.body_a, self.body_b)
    }

    fn build_rows(&mut self, pair: BodyPair<'_>, ctx: &RowContext) -> RowGroup {
        let mut rows = RowGroup::new();
        self.anchor
            .push_rows(&pair, ctx, f64::INFINITY, f64::INFINITY, &mut rows);

        let (a1, a2) = self.push_orthogonality_row(&pair, &mut rows, |error| ctx.correction(error));

        let relative_omega = pair.b.angular_velocity - pair.a.angular_velocity;
        let measurements = [
            (
                a1,
                signed_angle(&a1, &pair.a.world_vector(&self.reference1_a), &a2),
            ),
            (
                a2,
                signed_angle(&a2, &a1, &pair.b.world_vector(&self.reference2_b)),
            ),
        ];

        for ((controller, slot), (axis, angle)) in self
            .axes
            .iter_mut()
            .zip(Self::AXIS_SLOTS)
            .zip(measurements)
        {
            let rate = axis.dot(&relative_omega);
            if controller.measure(angle, rate, ctx.stabilization.limit_shell) {
                self.warm.reset_slots(slot..slot + 2);
            }
            let template = ConstraintRow::angular(pair.index_a, pair.index_b, &axis);
            rows.extend(controller.rows(&template, ctx, slot));
        }

        self.warm.seed_all(&mut rows, ctx.warm_start_scale());
        rows
    }

    fn store_impulses(&mut self, rows: &[ConstraintRow]) {
        self.warm.store(rows);
    }

    fn last_impulses(&self) -> &[f64] {
        self.warm.values()
    }

    fn position_rows(&self, pair: BodyPair<'_>) -> RowGroup {
        let mut rows = RowGroup::new();
        self.anchor.push_position_rows(&pair, &mut rows);
        self.push_orthogonality_row(&pair, &mut rows, |error| -error);
        rows
    }
}

// ============================================================================
// Registered constraints
// ============================================================================

/// Every producer kind the world can hold.
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Ball-in-socket joint.
    Ball(BallJoint),
    /// Hinge joint.
    Hinge(HingeJoint),
    /// Universal joint.
    Universal(UniversalJoint),
    /// Persistent contact.
    Contact(ContactConstraint),
}

impl Constraint {
    /// Short name of the variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ball(_) => "ball",
            Self::Hinge(_) => "hinge",
            Self::Universal(_) => "universal",
            Self::Contact(_) => "contact",
        }
    }

    /// The hinge, if this is one.
    #[must_use]
    pub fn as_hinge(&self) -> Option<&HingeJoint> {
        match self {
            Self::Hinge(h) => Some(h),
            _ => None,
        }
    }

    /// The hinge, mutably, if this is one.
    pub fn as_hinge_mut(&mut self) -> Option<&mut HingeJoint> {
        match self {
            Self::Hinge(h) => Some(h),
            _ => None,
        }
    }

    /// The universal joint, if this is one.
    #[must_use]
    pub fn as_universal(&self) -> Option<&UniversalJoint> {
        match self {
            Self::Universal(u) => Some(u),
            _ => None,
        }
    }

    /// The universal joint, mutably, if this is one.
    pub fn as_universal_mut(&mut self) -> Option<&mut UniversalJoint> {
        match self {
            Self::Universal(u) => Some(u),
            _ => None,
        }
    }

    /// Whether the constraint involves `body`.
    #[must_use]
    pub fn references(&self, body: BodyId) -> bool {
        let (a, b) = self.bodies();
        a == body || b == body
    }

    fn producer(&self) -> &dyn ConstraintProducer {
        match self {
            Self::Ball(j) => j,
            Self::Hinge(j) => j,
            Self::Universal(j) => j,
            Self::Contact(c) => c,
        }
    }

    fn producer_mut(&mut self) -> &mut dyn ConstraintProducer {
        match self {
            Self::Ball(j) => j,
            Self::Hinge(j) => j,
            Self::Universal(j) => j,
            Self::Contact(c) => c,
        }
    }
}

impl ConstraintProducer for Constraint {
    fn bodies(&self) -> (BodyId, BodyId) {
        self.producer().bodies()
    }

    fn build_rows(&mut self, pair: BodyPair<'_>, ctx: &RowContext) -> RowGroup {
        self.producer_mut().build_rows(pair, ctx)
    }

    fn store_impulses(&mut self, rows: &[ConstraintRow]) {
        self.producer_mut().store_impulses(rows);
    }

    fn last_impulses(&self) -> &[f64] {
        self.producer().last_impulses()
    }

    fn position_rows(&self, pair: BodyPair<'_>) -> RowGroup {
        self.producer().position_rows(pair)
    }
}

impl From<BallJoint> for Constraint {
    fn from(joint: BallJoint) -> Self {
        Self::Ball(joint)
    }
}

impl From<HingeJoint> for Constraint {
    fn from(joint: HingeJoint) -> Self {
        Self::Hinge(joint)
    }
}

impl From<UniversalJoint> for Constraint {
    fn from(joint: UniversalJoint) -> Self {
        Self::Universal(joint)
    }
}

impl From<ContactConstraint> for Constraint {
    fn from(contact: ContactConstraint) -> Self {
        Self::Contact(contact)
    }
}
