//! Pose, velocity and mass data a rigid body is built from.
//!
//! Mass properties arrive through [`MassPropertySource`] so a shape library
//! can plug in its own integrator; [`Shape`] covers the closed-form solids.

use nalgebra::{Isometry3, Matrix3, Point3, Translation3, UnitQuaternion, Vector3};

use crate::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Position of the center of mass and orientation of a body.
///
/// # Example
///
/// ```
/// use sim_types::Pose;
/// use nalgebra::Point3;
///
/// let pose = Pose::from_position(Point3::new(1.0, 2.0, 3.0));
/// let world = pose.transform_point(&Point3::new(1.0, 0.0, 0.0));
/// assert_eq!(world, Point3::new(2.0, 2.0, 3.0));
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Pose {
    /// Center of mass in world coordinates.
    pub position: Point3<f64>,
    /// Body-to-world rotation.
    pub rotation: UnitQuaternion<f64>,
}

impl Default for Pose {
    fn default() -> Self {
        Self::identity()
    }
}

impl Pose {
    /// At the origin, unrotated.
    #[must_use]
    pub fn identity() -> Self {
        Self::from_position(Point3::origin())
    }

    /// At `position`, unrotated.
    #[must_use]
    pub fn from_position(position: Point3<f64>) -> Self {
        Self::from_position_rotation(position, UnitQuaternion::identity())
    }

    /// At `position` with `rotation`.
    #[must_use]
    pub const fn from_position_rotation(
        position: Point3<f64>,
        rotation: UnitQuaternion<f64>,
    ) -> Self {
        Self { position, rotation }
    }

    /// The pose as a rigid transform.
    #[must_use]
    pub fn isometry(&self) -> Isometry3<f64> {
        Isometry3::from_parts(Translation3::from(self.position.coords), self.rotation)
    }

    /// Body-local point to world.
    #[must_use]
    pub fn transform_point(&self, local: &Point3<f64>) -> Point3<f64> {
        self.isometry() * local
    }

    /// World point to body-local.
    #[must_use]
    pub fn inverse_transform_point(&self, world: &Point3<f64>) -> Point3<f64> {
        self.isometry().inverse_transform_point(world)
    }

    /// World direction to body-local.
    #[must_use]
    pub fn inverse_transform_vector(&self, world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse_transform_vector(world)
    }

    /// No NaN or infinity in position or rotation.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        all_finite(self.position.coords.iter()) && all_finite(self.rotation.coords.iter())
    }
}

/// Velocity of a body's center of mass plus its spin, both in world frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Twist {
    /// Linear velocity (m/s).
    pub linear: Vector3<f64>,
    /// Angular velocity (rad/s).
    pub angular: Vector3<f64>,
}

impl Twist {
    /// Combine linear and angular parts.
    #[must_use]
    pub const fn new(linear: Vector3<f64>, angular: Vector3<f64>) -> Self {
        Self { linear, angular }
    }

    /// Velocity of the material point at `offset` from the center of mass.
    #[must_use]
    pub fn velocity_at_point(&self, offset: &Vector3<f64>) -> Vector3<f64> {
        self.linear + self.angular.cross(offset)
    }

    /// `½ m v² + ½ ωᵀ I ω` with `inertia` in world frame.
    #[must_use]
    pub fn kinetic_energy(&self, mass: f64, inertia: &Matrix3<f64>) -> f64 {
        let spin = self.angular.dot(&(inertia * self.angular));
        0.5 * (mass * self.linear.norm_squared() + spin)
    }

    /// No NaN or infinity in either part.
    #[must_use]
    pub fn is_finite(&self) -> bool {
        all_finite(self.linear.iter()) && all_finite(self.angular.iter())
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|x| x.is_finite())
}

/// Mass, center of mass and inertia of a solid.
///
/// The inertia tensor is taken about the center of mass in body-local axes
/// and may be anisotropic.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MassProperties {
    /// Total mass (kg).
    pub mass: f64,
    /// Center of mass relative to the shape origin, local frame.
    pub center_of_mass: Vector3<f64>,
    /// Inertia tensor about the center of mass (kg·m²).
    pub inertia: Matrix3<f64>,
}

impl MassProperties {
    /// Arbitrary mass properties.
    #[must_use]
    pub const fn new(mass: f64, center_of_mass: Vector3<f64>, inertia: Matrix3<f64>) -> Self {
        Self {
            mass,
            center_of_mass,
            inertia,
        }
    }

    /// Centered solid with principal moments along the local axes.
    #[must_use]
    pub fn principal(mass: f64, moments: Vector3<f64>) -> Self {
        Self::new(mass, Vector3::zeros(), Matrix3::from_diagonal(&moments))
    }

    /// Uniform solid sphere, `I = 2/5 m r²`.
    #[must_use]
    pub fn sphere(mass: f64, radius: f64) -> Self {
        Self::principal(mass, Vector3::repeat(0.4 * mass * radius * radius))
    }

    /// Uniform solid box given by its half extents.
    #[must_use]
    pub fn box_shape(mass: f64, half_extents: Vector3<f64>) -> Self {
        // Full extents squared: (2h)² = 4h².
        let sq = half_extents.component_mul(&half_extents) * 4.0;
        let k = mass / 12.0;
        Self::principal(
            mass,
            Vector3::new(k * (sq.y + sq.z), k * (sq.x + sq.z), k * (sq.x + sq.y)),
        )
    }

    /// Uniform solid cylinder along local Z.
    ///
    /// `Ixx = Iyy = m (3r² + h²) / 12`, `Izz = m r² / 2`.
    #[must_use]
    pub fn cylinder(mass: f64, radius: f64, half_height: f64) -> Self {
        let height = 2.0 * half_height;
        let transverse = mass * (3.0 * radius * radius + height * height) / 12.0;
        let axial = 0.5 * mass * radius * radius;
        Self::principal(mass, Vector3::new(transverse, transverse, axial))
    }

    /// `1/m`, or 0 for infinite or non-positive mass.
    #[must_use]
    pub fn inverse_mass(&self) -> f64 {
        if self.mass > 0.0 && self.mass.is_finite() {
            self.mass.recip()
        } else {
            0.0
        }
    }

    /// Inverse of the inertia tensor, `None` when singular.
    #[must_use]
    pub fn inverse_inertia(&self) -> Option<Matrix3<f64>> {
        self.inertia.try_inverse()
    }

    /// Check the properties can drive an integrated (non-fixed) body.
    ///
    /// Fixed bodies skip this; their mass properties are never read.
    ///
    /// # Errors
    ///
    /// [`SimError::InvalidMassProperties`] for a non-finite or non-positive
    /// mass, a non-finite center of mass, or an inertia tensor that is not
    /// finite and positive definite.
    pub fn validate_dynamic(&self) -> Result<()> {
        if !(self.mass.is_finite() && self.mass > 0.0) {
            return Err(SimError::invalid_mass(format!(
                "non-fixed body requires finite positive mass, got {}",
                self.mass
            )));
        }
        if !all_finite(self.center_of_mass.iter()) {
            return Err(SimError::invalid_mass("center of mass must be finite"));
        }
        if !all_finite(self.inertia.iter()) {
            return Err(SimError::invalid_mass("inertia tensor must be finite"));
        }
        let smallest = self.inertia.symmetric_eigenvalues().min();
        if smallest <= 1e-12 {
            return Err(SimError::invalid_mass(format!(
                "inertia tensor must be positive definite, smallest moment {smallest}"
            )));
        }
        Ok(())
    }
}

/// Anything that can report the mass properties of a solid.
///
/// Read once when a body is created; later shape edits do not propagate.
pub trait MassPropertySource {
    /// Mass properties about the center of mass, local frame.
    fn mass_properties(&self) -> MassProperties;
}

impl MassPropertySource for MassProperties {
    fn mass_properties(&self) -> MassProperties {
        *self
    }
}

/// Solids with closed-form mass properties.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Shape {
    /// Solid sphere.
    Sphere {
        /// Mass (kg).
        mass: f64,
        /// Radius (m).
        radius: f64,
    },
    /// Solid box.
    Box {
        /// Mass (kg).
        mass: f64,
        /// Half extents along local x, y, z (m).
        half_extents: Vector3<f64>,
    },
    /// Solid cylinder along local Z.
    Cylinder {
        /// Mass (kg).
        mass: f64,
        /// Radius (m).
        radius: f64,
        /// Half height (m).
        half_height: f64,
    },
}

impl MassPropertySource for Shape {
    fn mass_properties(&self) -> MassProperties {
        match *self {
            Self::Sphere { mass, radius } => MassProperties::sphere(mass, radius),
            Self::Box { mass, half_extents } => MassProperties::box_shape(mass, half_extents),
            Self::Cylinder {
                mass,
                radius,
                half_height,
            } => MassProperties::cylinder(mass, radius, half_height),
        }
    }
}
