//! Hinge joint scenarios: motors, limits, friction and readback.

use nalgebra::{Point3, UnitQuaternion, Vector3};
use sim_constraint::{AngleLimits, AxisMotor, HingeJoint, LimitState, MotorMode};
use sim_core::{BodyId, ConstraintId, RigidBody, World};
use sim_types::{Gravity, MassProperties, Pose, SimulationConfig};

use super::scenes::anchor_gap;

/// A fixed base and a box-shaped door hinged about world Z at the origin.
fn door(
    config: SimulationConfig,
    build: impl FnOnce(HingeJoint) -> HingeJoint,
) -> (World, BodyId, ConstraintId) {
    let mut world = World::new(config);
    let base = world.add_fixed_body(Pose::identity());
    let door = world.add_body(
        RigidBody::new(
            Pose::from_position(Point3::new(0.5, 0.0, 0.0)),
            MassProperties::box_shape(2.0, Vector3::new(0.5, 0.05, 0.5)),
        )
        .expect("door mass properties are valid"),
    );
    let hinge = HingeJoint::new(
        world.body_frame(base).expect("base"),
        world.body_frame(door).expect("door"),
        Point3::origin(),
        Vector3::z(),
    );
    let id = world.add_constraint(build(hinge)).expect("hinge bodies exist");
    (world, door, id)
}

fn hinge(world: &World, id: ConstraintId) -> &HingeJoint {
    world
        .constraint(id)
        .and_then(|c| c.as_hinge())
        .expect("constraint is a hinge")
}

/// Test: a velocity motor drives the axis rate to its target and the door
/// does not wobble off-axis.
#[test]
fn velocity_motor_reaches_target() {
    let config = SimulationConfig::default().zero_gravity();
    let motor = AxisMotor::velocity(1.5, 50.0).expect("valid motor");
    let (mut world, door, id) = door(config, |h| h.with_motor(motor));

    for _ in 0..240 {
        world.tick().expect("tick should succeed");
    }

    let omega = world.body(door).expect("door").angular_velocity;
    assert!((omega.z - 1.5).abs() < 1e-3, "axis rate {}", omega.z);
    assert!(omega.xy().norm() < 1e-4, "off-axis rate {omega}");
    assert!((hinge(&world, id).angle_rate() - 1.5).abs() < 1e-3);
    assert!(anchor_gap(&world, id) < 1e-3);
}

/// Test: a weak motor is torque limited.
#[test]
fn motor_respects_force_limit() {
    let config = SimulationConfig::default().zero_gravity();
    let motor = AxisMotor::velocity(10.0, 0.5).expect("valid motor");
    let (mut world, door, _) = door(config, |h| h.with_motor(motor));
    let dt = world.timestep();

    world.tick().expect("tick should succeed");

    // Door inertia about the hinge axis: box about its center plus m d².
    let inertia = 2.0 * (0.5_f64.powi(2) * 4.0 + 0.05_f64.powi(2) * 4.0) / 12.0 + 2.0 * 0.25;
    let omega = world.body(door).expect("door").angular_velocity.z;
    assert!(
        omega <= 0.5 * dt / inertia * 1.05,
        "one step of a 0.5 N·m motor spun the door to {omega}"
    );
    assert!(omega > 0.0);
}

/// Test: gravity pulls a hinged arm into its limit, and the angle never
/// passes the limit by more than the shell.
#[test]
fn limit_holds_against_gravity() {
    // Gravity along +Y swings the door from angle 0 towards +π/2.
    let config =
        SimulationConfig::default().gravity(Gravity::custom(Vector3::new(0.0, 9.81, 0.0)));
    let limits = AngleLimits::new(-0.3, 0.6).expect("valid limits");
    let (mut world, _, id) = door(config, |h| h.with_limits(limits));
    let shell = world.config().stabilization.limit_shell;

    let mut max_angle = f64::NEG_INFINITY;
    for _ in 0..480 {
        world.tick().expect("tick should succeed");
        max_angle = max_angle.max(hinge(&world, id).angle());
    }

    assert!(max_angle <= 0.6 + shell + 1e-3, "angle reached {max_angle}");
    assert!(max_angle > 0.55, "door never reached its limit: {max_angle}");
    assert_eq!(hinge(&world, id).limit_state(), LimitState::AtUpper);
}

/// Test: a motor driving into a limit stops there.
#[test]
fn motor_stops_at_limit() {
    let config = SimulationConfig::default().zero_gravity();
    let limits = AngleLimits::new(-0.5, 0.4).expect("valid limits");
    let motor = AxisMotor::velocity(-2.0, 100.0).expect("valid motor");
    let (mut world, door, id) = door(config, |h| h.with_limits(limits).with_motor(motor));
    let shell = world.config().stabilization.limit_shell;

    for _ in 0..480 {
        world.tick().expect("tick should succeed");
        let angle = hinge(&world, id).angle();
        assert!(angle >= -0.5 - shell - 1e-3, "angle passed lower limit: {angle}");
    }

    assert_eq!(hinge(&world, id).limit_state(), LimitState::AtLower);
    let omega = world.body(door).expect("door").angular_velocity.z;
    assert!(omega.abs() < 1e-2, "door still turning at {omega}");
}

/// Test: a position servo settles at its target angle.
#[test]
fn position_servo_settles() {
    let config = SimulationConfig::default().zero_gravity();
    let servo = AxisMotor::position(0.8, 5.0, 100.0).expect("valid servo");
    let (mut world, _, id) = door(config, |h| h.with_motor(servo));

    for _ in 0..960 {
        world.tick().expect("tick should succeed");
    }

    let joint = hinge(&world, id);
    assert!((joint.angle() - 0.8).abs() < 1e-2, "servo angle {}", joint.angle());
    assert!(matches!(
        joint.controller().motor().map(AxisMotor::mode),
        Some(MotorMode::Position { .. })
    ));
}

/// Test: joint friction brings a spinning door to rest.
#[test]
fn friction_stops_spin() {
    let config = SimulationConfig::default().zero_gravity();
    let (mut world, door, _) = door(config, |h| h.with_friction(2.0).expect("valid friction"));
    {
        let body = world.body_mut(door).expect("door");
        body.angular_velocity = Vector3::new(0.0, 0.0, 3.0);
        body.linear_velocity = Vector3::new(0.0, 1.5, 0.0);
    }

    for _ in 0..720 {
        world.tick().expect("tick should succeed");
    }

    let omega = world.body(door).expect("door").angular_velocity;
    assert!(omega.norm() < 1e-6, "door still spinning: {omega}");
}

/// Test: a motor can be retuned on a live joint.
#[test]
fn motor_retarget_between_ticks() {
    let config = SimulationConfig::default().zero_gravity();
    let motor = AxisMotor::velocity(1.0, 50.0).expect("valid motor");
    let (mut world, door, id) = door(config, |h| h.with_motor(motor));

    for _ in 0..120 {
        world.tick().expect("tick should succeed");
    }
    assert!((world.body(door).expect("door").angular_velocity.z - 1.0).abs() < 1e-3);

    world
        .constraint_mut(id)
        .and_then(|c| c.as_hinge_mut())
        .and_then(|h| h.controller_mut().motor_mut())
        .expect("hinge has a motor")
        .set_target_velocity(-0.5);

    for _ in 0..120 {
        world.tick().expect("tick should succeed");
    }
    assert!((world.body(door).expect("door").angular_velocity.z + 0.5).abs() < 1e-3);
}

/// Test: the measured angle follows a body rotated by hand.
#[test]
fn angle_readback_tracks_pose() {
    let config = SimulationConfig::default().zero_gravity();
    let (mut world, door, id) = door(config, |h| h);

    let turn = UnitQuaternion::from_axis_angle(&Vector3::z_axis(), 0.3);
    {
        let body = world.body_mut(door).expect("door");
        body.orientation = turn;
        body.position = turn * Point3::new(0.5, 0.0, 0.0);
        body.update_world_inertia();
    }
    world.tick().expect("tick should succeed");

    assert!((hinge(&world, id).angle() - 0.3).abs() < 1e-9);
    assert_eq!(hinge(&world, id).limit_state(), LimitState::Free);
}
