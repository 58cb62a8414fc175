//! Joint motors for active control.

use sim_types::{Result, SimError};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// How a motor chooses its target velocity.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum MotorMode {
    /// Track a fixed angular velocity (rad/s).
    Velocity {
        /// Target velocity.
        target: f64,
    },
    /// Servo toward an angle; target velocity is `gain · (target − angle)`.
    Position {
        /// Target angle (rad).
        target: f64,
        /// Proportional gain (1/s).
        gain: f64,
    },
}

/// A velocity motor on a single joint axis.
///
/// The motor is realized as a constraint row whose multiplier is bounded by
/// `±max_force · dt`, so it never delivers more than its rated torque.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisMotor {
    mode: MotorMode,
    max_force: f64,
}

impl AxisMotor {
    /// Create a velocity-controlled motor.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NegativeForce`] if `max_force` is negative.
    pub fn velocity(target_velocity: f64, max_force: f64) -> Result<Self> {
        Ok(Self {
            mode: MotorMode::Velocity {
                target: target_velocity,
            },
            max_force: SimError::check_force("motor force", max_force)?,
        })
    }

    /// Create a position servo.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NegativeForce`] if `max_force` is negative, or
    /// [`SimError::InvalidConfig`] if `gain` is negative or not finite.
    pub fn position(target_angle: f64, gain: f64, max_force: f64) -> Result<Self> {
        if !gain.is_finite() || gain < 0.0 {
            return Err(SimError::invalid_config(format!(
                "motor gain must be finite and non-negative, got {gain}"
            )));
        }
        Ok(Self {
            mode: MotorMode::Position {
                target: target_angle,
                gain,
            },
            max_force: SimError::check_force("motor force", max_force)?,
        })
    }

    /// Get the control mode.
    #[must_use]
    pub fn mode(&self) -> MotorMode {
        self.mode
    }

    /// Get the maximum force/torque.
    #[must_use]
    pub fn max_force(&self) -> f64 {
        self.max_force
    }

    /// Largest impulse the motor may deliver in one step.
    #[must_use]
    pub fn impulse_limit(&self, dt: f64) -> f64 {
        self.max_force * dt
    }

    /// Retarget a velocity motor, or switch a servo into velocity mode.
    pub fn set_target_velocity(&mut self, target: f64) {
        self.mode = MotorMode::Velocity { target };
    }

    /// Velocity the motor asks for at the given joint angle.
    #[must_use]
    pub fn target_velocity(&self, angle: f64) -> f64 {
        match self.mode {
            MotorMode::Velocity { target } => target,
            MotorMode::Position { target, gain } => gain * (target - angle),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_velocity_motor() {
        let motor = AxisMotor::velocity(2.0, 10.0).unwrap();
        assert_relative_eq!(motor.target_velocity(1.0), 2.0);
        assert_relative_eq!(motor.impulse_limit(0.01), 0.1);
    }

    #[test]
    fn test_position_motor() {
        let motor = AxisMotor::position(1.0, 5.0, 10.0).unwrap();
        assert_relative_eq!(motor.target_velocity(0.5), 2.5);
        assert_relative_eq!(motor.target_velocity(1.0), 0.0);
    }

    #[test]
    fn test_negative_force_rejected() {
        assert!(matches!(
            AxisMotor::velocity(1.0, -1.0),
            Err(SimError::NegativeForce { .. })
        ));
        assert!(AxisMotor::position(0.0, -1.0, 1.0).is_err());
    }

    #[test]
    fn test_retarget() {
        let mut motor = AxisMotor::position(1.0, 5.0, 10.0).unwrap();
        motor.set_target_velocity(-3.0);
        assert_eq!(motor.mode(), MotorMode::Velocity { target: -3.0 });
    }
}
