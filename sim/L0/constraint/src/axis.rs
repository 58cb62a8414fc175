//! Limit/motor/friction state machine for one free joint axis.
//!
//! Hinges own one [`AxisController`], universal joints two. Each step the
//! joint measures the axis angle and rate, calls [`AxisController::measure`],
//! then asks [`AxisController::rows`] for zero, one, or two rows:
//!
//! | State              | Rows                                                   |
//! |--------------------|--------------------------------------------------------|
//! | `Clamped`          | bilateral row pulling θ to the midpoint                |
//! | `AtUpper`          | limit row `[-∞, 0]`; motor row `[-F·dt, 0]` if driving away |
//! | `AtLower`          | limit row `[0, ∞]`; motor row `[0, F·dt]` if driving away   |
//! | `Free` + motor     | motor row `±F·dt`, target = motor velocity             |
//! | `Free` + friction  | friction row `±f·dt`, target 0                         |
//! | `Free`             | none                                                   |

use sim_types::{Result, SimError};
use smallvec::SmallVec;

use crate::{AngleLimits, AxisMotor, ConstraintRow, LimitState, RowContext};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Rows emitted by one axis in one step.
pub type AxisRows = SmallVec<[ConstraintRow; 2]>;

/// Controller for a single rotational degree of freedom.
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct AxisController {
    limits: Option<AngleLimits>,
    motor: Option<AxisMotor>,
    friction: f64,
    angle: f64,
    rate: f64,
    state: LimitState,
}

impl AxisController {
    /// A free axis with no limits, motor, or friction.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set limits.
    #[must_use]
    pub fn with_limits(mut self, limits: AngleLimits) -> Self {
        self.limits = Some(limits);
        self
    }

    /// Set a motor.
    #[must_use]
    pub fn with_motor(mut self, motor: AxisMotor) -> Self {
        self.motor = Some(motor);
        self
    }

    /// Set the maximum friction torque.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NegativeForce`] if `torque` is negative.
    pub fn with_friction(mut self, torque: f64) -> Result<Self> {
        self.set_friction(torque)?;
        Ok(self)
    }

    /// Replace or remove the limits.
    pub fn set_limits(&mut self, limits: Option<AngleLimits>) {
        self.limits = limits;
    }

    /// Replace or remove the motor.
    pub fn set_motor(&mut self, motor: Option<AxisMotor>) {
        self.motor = motor;
    }

    /// Set the maximum friction torque.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::NegativeForce`] if `torque` is negative.
    pub fn set_friction(&mut self, torque: f64) -> Result<()> {
        self.friction = SimError::check_force("joint friction", torque)?;
        Ok(())
    }

    /// Get the limits.
    #[must_use]
    pub fn limits(&self) -> Option<&AngleLimits> {
        self.limits.as_ref()
    }

    /// Get the motor.
    #[must_use]
    pub fn motor(&self) -> Option<&AxisMotor> {
        self.motor.as_ref()
    }

    /// Mutable access to the motor.
    pub fn motor_mut(&mut self) -> Option<&mut AxisMotor> {
        self.motor.as_mut()
    }

    /// Get the friction torque.
    #[must_use]
    pub fn friction(&self) -> f64 {
        self.friction
    }

    /// Angle measured at the last step (rad).
    #[must_use]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Rate measured at the last step (rad/s).
    #[must_use]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    /// Limit state from the last measurement.
    #[must_use]
    pub fn state(&self) -> LimitState {
        self.state
    }

    /// Record the current angle and rate and update the limit state.
    ///
    /// Returns `true` if the state changed.
    pub fn measure(&mut self, angle: f64, rate: f64, shell: f64) -> bool {
        self.angle = angle;
        self.rate = rate;
        let next = self
            .limits
            .map_or(LimitState::Free, |limits| limits.state(angle, shell));
        let changed = next != self.state;
        self.state = next;
        changed
    }

    /// Rows for this axis given an angular row template about the axis.
    ///
    /// The primary row uses `slot`, the auxiliary motor row `slot + 1`.
    #[must_use]
    pub fn rows(&self, template: &ConstraintRow, ctx: &RowContext, slot: u8) -> AxisRows {
        let mut rows = AxisRows::new();
        let primary = template.clone().with_slot(slot);
        let motor_velocity = self.motor.map(|m| m.target_velocity(self.angle));
        let motor_impulse = self.motor.map_or(0.0, |m| m.impulse_limit(ctx.dt));

        match (self.state, self.limits) {
            (LimitState::Clamped, Some(limits)) => {
                rows.push(primary.with_target(ctx.correction(self.angle - limits.midpoint())));
            }
            (LimitState::AtUpper, Some(limits)) => {
                rows.push(
                    primary
                        .with_bounds(f64::NEG_INFINITY, 0.0)
                        .with_target(ctx.correction(self.angle - limits.upper())),
                );
                if let Some(v) = motor_velocity.filter(|v| *v < 0.0) {
                    rows.push(
                        template
                            .clone()
                            .with_slot(slot + 1)
                            .with_bounds(-motor_impulse, 0.0)
                            .with_target(v),
                    );
                }
            }
            (LimitState::AtLower, Some(limits)) => {
                rows.push(
                    primary
                        .with_bounds(0.0, f64::INFINITY)
                        .with_target(ctx.correction(self.angle - limits.lower())),
                );
                if let Some(v) = motor_velocity.filter(|v| *v > 0.0) {
                    rows.push(
                        template
                            .clone()
                            .with_slot(slot + 1)
                            .with_bounds(0.0, motor_impulse)
                            .with_target(v),
                    );
                }
            }
            _ => {
                if let Some(v) = motor_velocity {
                    rows.push(
                        primary
                            .with_bounds(-motor_impulse, motor_impulse)
                            .with_target(v),
                    );
                } else if self.friction > 0.0 {
                    let limit = self.friction * ctx.dt;
                    rows.push(primary.with_bounds(-limit, limit).with_target(0.0));
                }
            }
        }

        rows
    }
}
