//! Rigid bodies.
//!
//! A [`RigidBody`] is positioned by its center of mass. Its state is advanced
//! in two halves around the constraint solve:
//!
//! ```text
//! integrate_velocity:  v += m⁻¹ F dt,  ω += I⁻¹(world) τ dt
//! (solver deltas applied to v, ω)
//! integrate_position:  x += v dt,      q += ½ (ω, 0) ⊗ q dt, renormalized
//! ```

use nalgebra::{Matrix3, Point3, UnitQuaternion, Vector3};
use sim_constraint::BodyState;
use sim_types::{MassProperties, MassPropertySource, Pose, Result, Twist};

use crate::integrators::{clamp_velocities, integrate_rotation, world_inverse_inertia};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// A rigid body in the simulation world.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidBody {
    /// Optional name for lookup and debugging.
    pub name: Option<String>,
    /// Center of mass in world frame.
    pub position: Point3<f64>,
    /// Orientation of the body frame.
    pub orientation: UnitQuaternion<f64>,
    /// Linear velocity of the center of mass.
    pub linear_velocity: Vector3<f64>,
    /// Angular velocity in world frame.
    pub angular_velocity: Vector3<f64>,
    mass: f64,
    inv_mass: f64,
    inertia: Matrix3<f64>,
    inv_inertia_body: Matrix3<f64>,
    inv_inertia_world: Matrix3<f64>,
    fixed: bool,
    force: Vector3<f64>,
    torque: Vector3<f64>,
}

impl RigidBody {
    /// Create a dynamic body whose center of mass sits at `pose`.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidMassProperties`](sim_types::SimError::InvalidMassProperties)
    /// for a non-positive or non-finite mass, or a singular inertia tensor.
    pub fn new(pose: Pose, mass_props: MassProperties) -> Result<Self> {
        mass_props.validate_dynamic()?;
        let inv_inertia_body = mass_props.inverse_inertia().ok_or_else(|| {
            sim_types::SimError::invalid_mass("inertia tensor is singular")
        })?;

        Ok(Self {
            name: None,
            position: pose.position,
            orientation: pose.rotation,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            mass: mass_props.mass,
            inv_mass: mass_props.inverse_mass(),
            inertia: mass_props.inertia,
            inv_inertia_body,
            inv_inertia_world: world_inverse_inertia(&pose.rotation, &inv_inertia_body),
            fixed: false,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        })
    }

    /// Create a dynamic body from anything that reports mass properties.
    ///
    /// `origin` is the pose of the shape's origin; the body's center of mass
    /// is placed at the source's center-of-mass offset from it.
    ///
    /// # Errors
    ///
    /// Same as [`RigidBody::new`].
    pub fn from_source(origin: Pose, source: &impl MassPropertySource) -> Result<Self> {
        let props = source.mass_properties();
        let com = origin.transform_point(&Point3::from(props.center_of_mass));
        Self::new(Pose::from_position_rotation(com, origin.rotation), props)
    }

    /// Create a fixed (immovable) body.
    #[must_use]
    pub fn fixed(pose: Pose) -> Self {
        Self {
            name: None,
            position: pose.position,
            orientation: pose.rotation,
            linear_velocity: Vector3::zeros(),
            angular_velocity: Vector3::zeros(),
            mass: f64::INFINITY,
            inv_mass: 0.0,
            inertia: Matrix3::zeros(),
            inv_inertia_body: Matrix3::zeros(),
            inv_inertia_world: Matrix3::zeros(),
            fixed: true,
            force: Vector3::zeros(),
            torque: Vector3::zeros(),
        }
    }

    /// Set the body name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set initial velocities. Ignored for fixed bodies.
    #[must_use]
    pub fn with_velocity(mut self, linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        if !self.fixed {
            self.linear_velocity = linear;
            self.angular_velocity = angular;
        }
        self
    }

    /// Whether the body is fixed.
    #[must_use]
    pub fn is_fixed(&self) -> bool {
        self.fixed
    }

    /// Mass in kg (infinite for fixed bodies).
    #[must_use]
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Inverse mass (zero for fixed bodies).
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        self.inv_mass
    }

    /// Body-space inertia tensor about the center of mass.
    #[must_use]
    pub fn inertia(&self) -> &Matrix3<f64> {
        &self.inertia
    }

    /// World-space inverse inertia, as of the last update.
    #[must_use]
    pub fn world_inverse_inertia(&self) -> &Matrix3<f64> {
        &self.inv_inertia_world
    }

    /// Current pose.
    #[must_use]
    pub fn pose(&self) -> Pose {
        Pose::from_position_rotation(self.position, self.orientation)
    }

    /// Current velocities.
    #[must_use]
    pub fn twist(&self) -> Twist {
        Twist::new(self.linear_velocity, self.angular_velocity)
    }

    /// Velocity of a world-space point rigidly attached to the body.
    #[must_use]
    pub fn velocity_at(&self, point: &Point3<f64>) -> Vector3<f64> {
        self.twist().velocity_at_point(&(point - self.position))
    }

    /// Accumulated force for this step.
    #[must_use]
    pub fn accumulated_force(&self) -> Vector3<f64> {
        self.force
    }

    /// Accumulated torque for this step.
    #[must_use]
    pub fn accumulated_torque(&self) -> Vector3<f64> {
        self.torque
    }

    /// Apply a force at a world-space point.
    ///
    /// Accumulates the force and the torque `(point − com) × force`; the
    /// velocity changes at the next integration.
    pub fn apply_force(&mut self, point: Point3<f64>, force: Vector3<f64>) {
        if !self.fixed {
            self.force += force;
            self.torque += (point - self.position).cross(&force);
        }
    }

    /// Apply a force at the center of mass.
    pub fn apply_force_at_com(&mut self, force: Vector3<f64>) {
        if !self.fixed {
            self.force += force;
        }
    }

    /// Apply a torque.
    pub fn apply_torque(&mut self, torque: Vector3<f64>) {
        if !self.fixed {
            self.torque += torque;
        }
    }

    /// Clear accumulated forces and torques.
    pub fn clear_forces(&mut self) {
        self.force = Vector3::zeros();
        self.torque = Vector3::zeros();
    }

    /// Advance velocities by the accumulated force and torque.
    pub fn integrate_velocity(&mut self, dt: f64) {
        if self.fixed {
            return;
        }
        self.linear_velocity += self.force * (self.inv_mass * dt);
        self.angular_velocity += self.inv_inertia_world * self.torque * dt;
    }

    /// Advance the pose by the current velocities and refresh the world
    /// inverse inertia.
    pub fn integrate_position(&mut self, dt: f64) {
        if self.fixed {
            return;
        }
        self.position += self.linear_velocity * dt;
        self.orientation = integrate_rotation(&self.orientation, &self.angular_velocity, dt);
        self.update_world_inertia();
    }

    /// [`integrate_velocity`](Self::integrate_velocity) then
    /// [`integrate_position`](Self::integrate_position).
    pub fn integrate(&mut self, dt: f64) {
        self.integrate_velocity(dt);
        self.integrate_position(dt);
    }

    /// Recompute the world-space inverse inertia from the orientation.
    pub fn update_world_inertia(&mut self) {
        if !self.fixed {
            self.inv_inertia_world = world_inverse_inertia(&self.orientation, &self.inv_inertia_body);
        }
    }

    /// Clamp speeds to the given maxima.
    pub fn clamp_velocities(&mut self, max_linear: f64, max_angular: f64) {
        let clamped = clamp_velocities(&self.twist(), max_linear, max_angular);
        self.linear_velocity = clamped.linear;
        self.angular_velocity = clamped.angular;
    }

    /// Kinetic energy (zero for fixed bodies).
    #[must_use]
    pub fn kinetic_energy(&self) -> f64 {
        if self.fixed {
            return 0.0;
        }
        let r = self.orientation.to_rotation_matrix().into_inner();
        let world_inertia = r * self.inertia * r.transpose();
        self.twist().kinetic_energy(self.mass, &world_inertia)
    }

    /// Whether pose and velocities are all finite.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        self.pose().is_finite() && self.twist().is_finite()
    }

    /// Snapshot for the solver.
    #[must_use]
    pub fn solver_state(&self) -> BodyState {
        if self.fixed {
            BodyState {
                rotation: self.orientation,
                ..BodyState::fixed(self.position)
            }
        } else {
            BodyState::dynamic(self.pose(), self.inv_mass, self.inv_inertia_world)
                .with_velocity(self.linear_velocity, self.angular_velocity)
        }
    }

    /// Add the solver's velocity deltas.
    pub fn apply_deltas(&mut self, state: &BodyState) {
        if !self.fixed {
            self.linear_velocity += state.delta_linear;
            self.angular_velocity += state.delta_angular;
        }
    }

    /// Move the pose by a solved displacement, reading the state's deltas
    /// as a translation and a rotation vector. Velocities are untouched.
    pub fn apply_displacement(&mut self, state: &BodyState) {
        if self.fixed {
            return;
        }
        self.position += state.delta_linear;
        self.orientation = integrate_rotation(&self.orientation, &state.delta_angular, 1.0);
        self.update_world_inertia();
    }
}
