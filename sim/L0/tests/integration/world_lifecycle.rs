//! Building, editing and stepping a world over its lifetime.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use sim_core::{RigidBody, SimError, World};
use sim_types::{Gravity, MassProperties, Pose, SimulationConfig};

use super::scenes::{ball_joint, ground_plane, sphere};

/// Test: bodies can be found by name, and a removed body's name is free.
#[test]
fn named_bodies() {
    let mut world = World::default();
    let wheel = world.add_body(
        RigidBody::new(Pose::identity(), MassProperties::sphere(1.0, 0.3))
            .expect("valid mass")
            .with_name("wheel"),
    );

    let (found, body) = world.body_by_name("wheel").expect("named body");
    assert_eq!(found, wheel);
    assert_eq!(body.name.as_deref(), Some("wheel"));
    assert!(world.body_by_name("axle").is_none());

    world.remove_body(wheel).expect("unconstrained body");
    assert!(world.body_by_name("wheel").is_none());
}

/// Test: cutting a pendulum loose mid-swing lets the bob fly off on its own.
#[test]
fn cascade_removal_mid_run() {
    let mut world = World::new(SimulationConfig::with_timestep(0.005));
    let pivot = world.add_fixed_body(Pose::identity());
    let bob = sphere(&mut world, Point3::new(1.0, 0.0, 0.0), 1.0, 0.5);
    let joint = ball_joint(&mut world, pivot, bob, Point3::origin());

    world.run(50).expect("swing should succeed");
    let err = world.remove_body(pivot).unwrap_err();
    assert_eq!(
        err,
        SimError::BodyInUse {
            body: pivot.raw(),
            constraints: 1
        }
    );

    let (_, removed) = world.remove_body_cascade(pivot).expect("pivot exists");
    assert_eq!(removed, vec![joint]);
    assert!(world.constraint(joint).is_none());
    assert_eq!(world.constraint_count(), 0);

    let before = world.body(bob).expect("bob").linear_velocity;
    world.tick().expect("tick should succeed");
    let after = world.body(bob).expect("bob").linear_velocity;
    let dt = world.timestep();
    assert!((after - before - Vector3::new(0.0, 0.0, -9.81 * dt)).norm() < 1e-12);
    assert_eq!(world.last_solve_report().expect("a solve ran").rows, 0);
}

/// Test: removing just the joint leaves both bodies in place.
#[test]
fn remove_constraint_frees_bodies() {
    let mut world = World::default();
    let pivot = world.add_fixed_body(Pose::identity());
    let bob = sphere(&mut world, Point3::new(0.0, 0.0, -1.0), 1.0, 0.5);
    let joint = ball_joint(&mut world, pivot, bob, Point3::origin());

    assert!(world.remove_constraint(joint).is_ok());
    assert!(matches!(
        world.remove_constraint(joint),
        Err(SimError::InvalidConstraintId(_))
    ));
    assert!(world.constraint_impulse(joint).is_none());
    assert!(world.remove_body(pivot).is_ok());
    assert_eq!(world.body_count(), 1);
}

/// Test: the clock advances by the configured timestep, even after it
/// changes, and can be reset.
#[test]
fn clock_follows_timestep() {
    let mut world = World::new(SimulationConfig::with_timestep(0.01));
    sphere(&mut world, Point3::origin(), 1.0, 0.5);

    world.run(10).expect("run should succeed");
    assert_relative_eq!(world.time(), 0.1, epsilon = 1e-12);

    world.set_timestep(0.002).expect("valid timestep");
    world.run(50).expect("run should succeed");
    assert_relative_eq!(world.time(), 0.2, epsilon = 1e-12);
    assert_eq!(world.step_count(), 60);

    assert_eq!(world.set_timestep(0.0), Err(SimError::InvalidTimestep(0.0)));
    assert_relative_eq!(world.timestep(), 0.002);

    world.reset_time();
    assert_eq!(world.step_count(), 0);
    assert_relative_eq!(world.time(), 0.0);
}

/// Test: a body corrupted between ticks stops the run before any state
/// changes.
#[test]
fn corrupted_state_stops_run() {
    let mut world = World::default();
    let good = sphere(&mut world, Point3::new(0.0, 0.0, 5.0), 1.0, 0.5);
    let bad = sphere(&mut world, Point3::new(2.0, 0.0, 5.0), 1.0, 0.5);

    world.run(5).expect("run should succeed");
    world.body_mut(bad).expect("bad").angular_velocity = Vector3::new(f64::INFINITY, 0.0, 0.0);
    let snapshot = world.body(good).expect("good").position;

    let err = world.run(5).unwrap_err();
    assert!(err.is_diverged(), "{err}");
    assert_eq!(world.step_count(), 5);
    assert_eq!(world.body(good).expect("good").position, snapshot);
}

/// Test: gravity can be changed on a live world.
#[test]
fn config_swap_changes_gravity() {
    let mut world = World::default();
    let ball = sphere(&mut world, Point3::origin(), 1.0, 0.5);

    let config = SimulationConfig::default().gravity(Gravity::custom(Vector3::new(2.0, 0.0, 0.0)));
    world.set_config(config).expect("valid config");
    world.tick().expect("tick should succeed");

    let v = world.body(ball).expect("ball").linear_velocity;
    assert!((v - Vector3::new(2.0 * world.timestep(), 0.0, 0.0)).norm() < 1e-12);

    let mut broken = SimulationConfig::default();
    broken.timestep = f64::NAN;
    assert!(world.set_config(broken).is_err());
}

/// Test: energy and center of mass reflect a settled scene.
#[test]
fn diagnostics_on_settled_scene() {
    let mut world = World::default();
    let ground = world.add_fixed_body(Pose::identity());
    sphere(&mut world, Point3::new(-1.0, 0.0, 0.5), 1.0, 0.5);
    sphere(&mut world, Point3::new(1.0, 0.0, 0.5), 3.0, 0.5);
    world.set_contact_generator(ground_plane(ground, 0.5, 0.5, 0.0));

    world.run(120).expect("run should succeed");

    assert!(world.total_kinetic_energy() < 1e-12);
    let com = world.center_of_mass().expect("dynamic bodies");
    assert!((com - Point3::new(0.5, 0.0, 0.5)).norm() < 1e-6, "{com}");
    assert_eq!(world.contacts().len(), 2);
    assert!(world.validate().is_ok());
}
