//! Numerical integration primitives for rigid body state.
//!
//! The world uses semi-implicit (symplectic) Euler: velocities are advanced
//! first, corrected by the constraint solver, and the corrected velocities
//! then advance the pose.
//!
//! ```text
//! v(t+dt) = v(t) + a(t) * dt            (+ solver deltas)
//! x(t+dt) = x(t) + v(t+dt) * dt
//! q(t+dt) = normalize(q + ½ (ω, 0) ⊗ q dt)
//! ```

use nalgebra::{Matrix3, Quaternion, UnitQuaternion, Vector3};
use sim_types::Twist;

/// Integrate an orientation by a world-frame angular velocity.
///
/// First-order quaternion update followed by renormalization, so the
/// result is always a unit quaternion.
#[must_use]
pub fn integrate_rotation(
    rotation: &UnitQuaternion<f64>,
    omega: &Vector3<f64>,
    dt: f64,
) -> UnitQuaternion<f64> {
    if omega.norm_squared() < 1e-24 {
        return *rotation;
    }
    let q = rotation.into_inner();
    let spin = Quaternion::from_imag(*omega) * q * (0.5 * dt);
    UnitQuaternion::new_normalize(q + spin)
}

/// World-space inverse inertia `R I⁻¹ Rᵀ`.
#[must_use]
pub fn world_inverse_inertia(
    rotation: &UnitQuaternion<f64>,
    inv_inertia_body: &Matrix3<f64>,
) -> Matrix3<f64> {
    let r = rotation.to_rotation_matrix().into_inner();
    r * inv_inertia_body * r.transpose()
}

/// Clamp velocities to maximum values.
#[must_use]
pub fn clamp_velocities(twist: &Twist, max_linear: f64, max_angular: f64) -> Twist {
    let linear = if twist.linear.norm() > max_linear {
        twist.linear.normalize() * max_linear
    } else {
        twist.linear
    };

    let angular = if twist.angular.norm() > max_angular {
        twist.angular.normalize() * max_angular
    } else {
        twist.angular
    };

    Twist::new(linear, angular)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::float_cmp)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f64::consts::PI;

    #[test]
    fn test_rotation_integration() {
        let mut q = UnitQuaternion::identity();
        let omega = Vector3::new(0.0, 0.0, PI);
        for _ in 0..1000 {
            q = integrate_rotation(&q, &omega, 0.001);
        }
        // Half a turn about z.
        let x = q * Vector3::x();
        assert_relative_eq!(x, -Vector3::x(), epsilon = 1e-3);
    }

    #[test]
    fn test_rotation_uses_world_frame() {
        // Tilt the body 90° about x, then spin about world z.
        let tilted = UnitQuaternion::from_axis_angle(&Vector3::x_axis(), PI / 2.0);
        let q = integrate_rotation(&tilted, &Vector3::new(0.0, 0.0, 1.0), 1e-3);
        let delta = q * tilted.inverse();
        assert_relative_eq!(delta.axis().unwrap().into_inner(), Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_zero_rotation_is_identity() {
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.7);
        assert_eq!(integrate_rotation(&q, &Vector3::zeros(), 0.1), q);
    }

    #[test]
    fn test_large_step_stays_unit() {
        let q = integrate_rotation(&UnitQuaternion::identity(), &Vector3::new(50.0, -20.0, 10.0), 0.1);
        assert_relative_eq!(q.quaternion().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_world_inverse_inertia() {
        let inv = Matrix3::from_diagonal(&Vector3::new(1.0, 2.0, 3.0));
        assert_eq!(world_inverse_inertia(&UnitQuaternion::identity(), &inv), inv);

        let quarter = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0);
        let world = world_inverse_inertia(&quarter, &inv);
        assert_relative_eq!(world[(0, 0)], 2.0, epsilon = 1e-12);
        assert_relative_eq!(world[(1, 1)], 1.0, epsilon = 1e-12);
        assert_relative_eq!(world[(2, 2)], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_clamp_velocities() {
        let twist = Twist::new(Vector3::new(100.0, 0.0, 0.0), Vector3::new(0.0, 50.0, 0.0));
        let clamped = clamp_velocities(&twist, 10.0, 5.0);

        assert_relative_eq!(clamped.linear.norm(), 10.0, epsilon = 1e-10);
        assert_relative_eq!(clamped.angular.norm(), 5.0, epsilon = 1e-10);
    }

    #[test]
    fn test_clamp_velocities_under_limit() {
        let twist = Twist::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 1.0, 0.0));
        let clamped = clamp_velocities(&twist, 10.0, 5.0);
        assert_eq!(clamped, twist);
    }

    #[test]
    fn test_unlimited_clamp_is_noop() {
        let twist = Twist::new(Vector3::new(1e6, 0.0, 0.0), Vector3::new(0.0, 1e6, 0.0));
        assert_eq!(clamp_velocities(&twist, f64::INFINITY, f64::INFINITY), twist);
    }
}
