//! Uniform force fields applied to every body.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

const STANDARD: f64 = 9.81;

/// Uniform gravitational acceleration.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Gravity {
    /// Acceleration due to gravity (m/s²).
    pub acceleration: Vector3<f64>,
}

impl Default for Gravity {
    fn default() -> Self {
        Self::earth()
    }
}

impl Gravity {
    /// Standard gravity along world −Z (9.81 m/s²).
    #[must_use]
    pub fn earth() -> Self {
        Self::custom(Vector3::new(0.0, 0.0, -STANDARD))
    }

    /// Standard gravity for scenes authored with +Y up.
    #[must_use]
    pub fn earth_y_up() -> Self {
        Self::custom(Vector3::new(0.0, -STANDARD, 0.0))
    }

    /// No field.
    #[must_use]
    pub fn zero() -> Self {
        Self::custom(Vector3::zeros())
    }

    /// Any constant acceleration.
    #[must_use]
    pub const fn custom(acceleration: Vector3<f64>) -> Self {
        Self { acceleration }
    }

    /// Weight of a body of `mass`.
    #[must_use]
    pub fn force_on_mass(&self, mass: f64) -> Vector3<f64> {
        self.acceleration * mass
    }

    /// Whether the field is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.acceleration == Vector3::zeros()
    }
}
