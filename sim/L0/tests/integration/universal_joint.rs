//! Universal joint scenarios.

use nalgebra::{Point3, Vector3};
use sim_constraint::{AngleLimits, AxisController, AxisMotor, UniversalJoint};
use sim_core::{BodyId, ConstraintId, RigidBody, World};
use sim_types::{MassProperties, Pose, SimulationConfig};

use super::scenes::anchor_gap;

/// A drive shaft along X joined to a fixed housing by a Cardan joint whose
/// first axis is Y (on the housing) and second axis Z (on the shaft).
fn cardan(
    config: SimulationConfig,
    build: impl FnOnce(UniversalJoint) -> UniversalJoint,
) -> (World, BodyId, ConstraintId) {
    let mut world = World::new(config);
    let housing = world.add_fixed_body(Pose::identity());
    let shaft = world.add_body(
        RigidBody::new(
            Pose::from_position(Point3::new(0.5, 0.0, 0.0)),
            MassProperties::box_shape(1.0, Vector3::new(0.5, 0.1, 0.1)),
        )
        .expect("shaft mass properties are valid"),
    );
    let joint = UniversalJoint::new(
        world.body_frame(housing).expect("housing"),
        world.body_frame(shaft).expect("shaft"),
        Point3::origin(),
        Vector3::y(),
        Vector3::z(),
    )
    .expect("axes are perpendicular");
    let id = world.add_constraint(build(joint)).expect("joint bodies exist");
    (world, shaft, id)
}

fn universal(world: &World, id: ConstraintId) -> &UniversalJoint {
    world
        .constraint(id)
        .and_then(|c| c.as_universal())
        .expect("constraint is a universal joint")
}

/// Test: spin about the shaft's own axis (the blocked third rotation) is
/// removed while the anchor holds.
#[test]
fn twist_is_blocked() {
    let config = SimulationConfig::default().zero_gravity();
    let (mut world, shaft, id) = cardan(config, |j| j);
    world.body_mut(shaft).expect("shaft").angular_velocity = Vector3::new(5.0, 0.0, 0.0);

    for _ in 0..120 {
        world.tick().expect("tick should succeed");
    }

    let omega = world.body(shaft).expect("shaft").angular_velocity;
    assert!(omega.x.abs() < 1e-6, "twist rate {}", omega.x);
    assert!(anchor_gap(&world, id) < 1e-4);
}

/// Test: yaw about the second axis is free and the anchor holds.
#[test]
fn free_axes_rotate() {
    let config = SimulationConfig::default().zero_gravity();
    let (mut world, shaft, id) = cardan(config, |j| j);
    {
        let body = world.body_mut(shaft).expect("shaft");
        // Yaw about Z swings the shaft tip along +Y.
        body.angular_velocity = Vector3::new(0.0, 0.0, 1.0);
        body.linear_velocity = Vector3::new(0.0, 0.5, 0.0);
    }

    for _ in 0..60 {
        world.tick().expect("tick should succeed");
    }

    let [first, second] = universal(&world, id).angles();
    assert!(second > 0.2, "second axis angle {second}");
    assert!(first.abs() < 1e-3, "first axis angle {first}");
    assert!(anchor_gap(&world, id) < 1e-3);

    let omega = world.body(shaft).expect("shaft").angular_velocity;
    assert!((omega.z - 1.0).abs() < 1e-3, "free yaw slowed to {}", omega.z);
}

/// Test: each axis has its own controller; a motor on one axis does not
/// drive the other.
#[test]
fn independent_axis_motors() {
    let config = SimulationConfig::default().zero_gravity();
    let motor = AxisMotor::velocity(0.8, 20.0).expect("valid motor");
    let (mut world, _, id) = cardan(config, |j| {
        j.with_axis(0, AxisController::new().with_motor(motor))
            .expect("axis 0 exists")
    });

    for _ in 0..120 {
        world.tick().expect("tick should succeed");
    }

    let joint = universal(&world, id);
    let rate = joint.axis(0).expect("axis 0").rate();
    assert!((rate - 0.8).abs() < 1e-3, "axis 0 rate {rate}");
    let other = joint.axis(1).expect("axis 1").rate();
    assert!(other.abs() < 1e-3, "axis 1 rate {other}");
}

/// Test: a limited axis stops the shaft.
#[test]
fn axis_limit_stops_swing() {
    let config = SimulationConfig::default().zero_gravity();
    let limits = AngleLimits::new(-0.2, 0.2).expect("valid limits");
    let (mut world, shaft, id) = cardan(config, |j| {
        j.with_axis(1, AxisController::new().with_limits(limits))
            .expect("axis 1 exists")
    });
    {
        let body = world.body_mut(shaft).expect("shaft");
        body.angular_velocity = Vector3::new(0.0, 0.0, 2.0);
        body.linear_velocity = Vector3::new(0.0, 1.0, 0.0);
    }
    let shell = world.config().stabilization.limit_shell;

    for _ in 0..240 {
        world.tick().expect("tick should succeed");
        let [_, angle] = universal(&world, id).angles();
        assert!(angle <= 0.2 + shell + 1e-3, "axis 1 passed its limit: {angle}");
    }
}

/// Test: out-of-range axis indices are rejected.
#[test]
fn axis_index_is_checked() {
    let config = SimulationConfig::default().zero_gravity();
    let (mut world, _, id) = cardan(config, |j| j);
    let joint = world
        .constraint_mut(id)
        .and_then(|c| c.as_universal_mut())
        .expect("universal joint");

    assert!(joint.axis(2).is_none());
    assert!(joint.axis_mut(2).unwrap_err().is_config_error());
    assert!(joint.axis_mut(1).is_ok());
}

/// Test: parallel axes cannot form a universal joint.
#[test]
fn parallel_axes_rejected() {
    let mut world = World::default();
    let a = world.add_fixed_body(Pose::identity());
    let b = world.add_fixed_body(Pose::from_position(Point3::new(1.0, 0.0, 0.0)));
    let result = UniversalJoint::new(
        world.body_frame(a).expect("a"),
        world.body_frame(b).expect("b"),
        Point3::origin(),
        Vector3::x(),
        Vector3::x() * 2.0,
    );
    assert!(result.unwrap_err().is_config_error());
}
