//! Solver-side view of bodies.
//!
//! The world copies each live body into a dense [`BodyState`] slice at the
//! start of every step. Producers read poses from it; solvers accumulate
//! velocity deltas into it. Because the slice is rebuilt every step, the
//! delta scratch always starts at zero.

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use sim_types::{BodyId, Pose, StabilizationConfig};

/// Body state needed for constraint assembly and solving.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyState {
    /// Center of mass in world frame.
    pub position: Point3<f64>,
    /// Orientation.
    pub rotation: UnitQuaternion<f64>,
    /// Linear velocity.
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity.
    pub angular_velocity: Vector3<f64>,
    /// Inverse mass (0 for fixed bodies).
    pub inv_mass: f64,
    /// Inverse inertia tensor in world frame.
    pub inv_inertia: Matrix3<f64>,
    /// Whether this body is fixed in place.
    pub is_static: bool,
    /// Accumulated change in linear velocity from resolved impulses.
    pub delta_linear: Vector3<f64>,
    /// Accumulated change in angular velocity from resolved impulses.
    pub delta_angular: Vector3<f64>,
}

impl BodyState {
    /// Create a fixed body state.
    #[must_use]
    pub fn fixed(position: Point3<f64>) -> Self {
        Self {
            position,
            rotation: UnitQuaternion::identity(),
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            inv_mass: 0.0,
            inv_inertia: Matrix3::zeros(),
            is_static: true,
            delta_linear: Vector3::zeros(),
            delta_angular: Vector3::zeros(),
        }
    }

    /// Create a dynamic body state at rest.
    ///
    /// `inv_inertia` must already be in world frame.
    #[must_use]
    pub fn dynamic(pose: Pose, inv_mass: f64, inv_inertia: Matrix3<f64>) -> Self {
        Self {
            position: pose.position,
            rotation: pose.rotation,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            inv_mass,
            inv_inertia,
            is_static: false,
            delta_linear: Vector3::zeros(),
            delta_angular: Vector3::zeros(),
        }
    }

    /// Set the velocities.
    #[must_use]
    pub fn with_velocity(mut self, linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        self.linear_velocity = linear;
        self.angular_velocity = angular;
        self
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> Pose {
        Pose::from_position_rotation(self.position, self.rotation)
    }

    /// World-space offset of a body-local point from the center of mass.
    #[must_use]
    pub fn lever_arm(&self, local: &Point3<f64>) -> Vector3<f64> {
        self.rotation * local.coords
    }

    /// Transform a body-local direction into world frame.
    #[must_use]
    pub fn world_vector(&self, local: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * local
    }

    /// Velocity of a point at world offset `r` from the center of mass,
    /// before any solver deltas.
    #[must_use]
    pub fn velocity_at(&self, r: &Vector3<f64>) -> Vector3<f64> {
        self.linear_velocity + self.angular_velocity.cross(r)
    }

    /// Zero the delta scratch.
    pub fn clear_deltas(&mut self) {
        self.delta_linear = Vector3::zeros();
        self.delta_angular = Vector3::zeros();
    }
}

/// Identity and pose of a body at the moment a joint is built.
///
/// Joints convert world-space anchors and axes into body-local space once,
/// using these poses.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyFrame {
    /// The body.
    pub id: BodyId,
    /// Its pose (center of mass and orientation).
    pub pose: Pose,
}

impl BodyFrame {
    /// Create a body frame.
    #[must_use]
    pub const fn new(id: BodyId, pose: Pose) -> Self {
        Self { id, pose }
    }

    /// Express a world point relative to this body's center of mass, in
    /// body-local coordinates.
    #[must_use]
    pub fn local_point(&self, world: &Point3<f64>) -> Point3<f64> {
        self.pose.inverse_transform_point(world)
    }

    /// Express a world direction in body-local coordinates.
    #[must_use]
    pub fn local_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.pose.inverse_transform_vector(world)
    }
}

/// The two bodies a producer is attached to, resolved for this step.
#[derive(Debug, Clone, Copy)]
pub struct BodyPair<'a> {
    /// Dense solver index of body A.
    pub index_a: usize,
    /// Dense solver index of body B.
    pub index_b: usize,
    /// State of body A.
    pub a: &'a BodyState,
    /// State of body B.
    pub b: &'a BodyState,
}

impl<'a> BodyPair<'a> {
    /// Resolve two dense indices against a body slice.
    ///
    /// Returns `None` if either index is out of range.
    #[must_use]
    pub fn resolve(bodies: &'a [BodyState], index_a: usize, index_b: usize) -> Option<Self> {
        Some(Self {
            index_a,
            index_b,
            a: bodies.get(index_a)?,
            b: bodies.get(index_b)?,
        })
    }
}

/// Per-step inputs shared by all producers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RowContext {
    /// Timestep (s).
    pub dt: f64,
    /// Stabilization settings.
    pub stabilization: StabilizationConfig,
}

impl RowContext {
    /// Create a row context.
    #[must_use]
    pub const fn new(dt: f64, stabilization: StabilizationConfig) -> Self {
        Self { dt, stabilization }
    }

    /// Baumgarte target velocity for a positional error.
    #[must_use]
    pub fn correction(&self, error: f64) -> f64 {
        self.stabilization.correction(error, self.dt)
    }

    /// Scale applied to stored multipliers when seeding a new step.
    #[must_use]
    pub fn warm_start_scale(&self) -> f64 {
        self.stabilization.warm_start_scale()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fixed_body_has_zero_inverse_mass() {
        let body = BodyState::fixed(Point3::new(1.0, 2.0, 3.0));
        assert!(body.is_static);
        assert_eq!(body.inv_mass, 0.0);
        assert_eq!(body.inv_inertia, Matrix3::zeros());
    }

    #[test]
    fn test_lever_arm_rotates_with_body() {
        let pose = Pose::from_position_rotation(
            Point3::new(1.0, 0.0, 0.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2),
        );
        let body = BodyState::dynamic(pose, 1.0, Matrix3::identity());
        let r = body.lever_arm(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(r, Vector3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_body_frame_local_point() {
        let frame = BodyFrame::new(
            BodyId::new(0),
            Pose::from_position(Point3::new(0.0, -1.0, 0.0)),
        );
        let local = frame.local_point(&Point3::origin());
        assert_relative_eq!(local, Point3::new(0.0, 1.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_body_pair_resolve() {
        let bodies = vec![BodyState::fixed(Point3::origin()); 2];
        assert!(BodyPair::resolve(&bodies, 0, 1).is_some());
        assert!(BodyPair::resolve(&bodies, 0, 2).is_none());
    }
}
