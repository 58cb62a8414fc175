//! Ball-in-socket joint scenarios.

use nalgebra::{Point3, Vector3};
use sim_core::World;
use sim_types::{Gravity, Pose, SimulationConfig, StabilizationConfig};

use super::scenes::{anchor_gap, ball_joint, sphere};

fn y_up_world(dt: f64) -> World {
    World::new(SimulationConfig::with_timestep(dt).gravity(Gravity::custom(Vector3::new(
        0.0, -9.8, 0.0,
    ))))
}

/// Test: a unit-mass sphere released from a fixed sphere swings without
/// stretching the joint, from a small swing up to a horizontal release.
#[test]
fn pendulum_keeps_its_length() {
    for degrees in [25.0_f64, 45.0, 60.0, 90.0] {
        let mut world = y_up_world(0.01);
        let anchor = world.add_fixed_body(Pose::identity());
        let angle = degrees.to_radians();
        let bob = sphere(
            &mut world,
            Point3::new(angle.sin(), -angle.cos(), 0.0),
            1.0,
            0.5,
        );
        ball_joint(&mut world, anchor, bob, Point3::origin());

        let initial = world.body(bob).expect("bob").position.coords.norm();
        let mut min_x = f64::INFINITY;

        for step in 0..100 {
            world.tick().expect("tick should succeed");
            let position = world.body(bob).expect("bob").position;
            let distance = position.coords.norm();
            assert!(
                (distance - initial).abs() < 1e-3,
                "{degrees}° release, step {step}: distance {distance} drifted from {initial}"
            );
            min_x = min_x.min(position.x);
        }

        // It swings through the bottom and out the other side.
        assert!(
            min_x < -0.1,
            "{degrees}° release did not swing, min x = {min_x}"
        );
    }
}

/// Test: without position projection the same horizontal release is held
/// only by the velocity-level correction, and the joint visibly stretches.
#[test]
fn horizontal_release_needs_projection() {
    let stretch = |stabilization: StabilizationConfig| {
        let config = SimulationConfig::with_timestep(0.01)
            .gravity(Gravity::custom(Vector3::new(0.0, -9.8, 0.0)))
            .stabilization(stabilization);
        let mut world = World::new(config);
        let anchor = world.add_fixed_body(Pose::identity());
        let bob = sphere(&mut world, Point3::new(1.0, 0.0, 0.0), 1.0, 0.5);
        ball_joint(&mut world, anchor, bob, Point3::origin());

        let mut worst = 0.0_f64;
        for _ in 0..100 {
            world.tick().expect("tick should succeed");
            let distance = world.body(bob).expect("bob").position.coords.norm();
            worst = worst.max((distance - 1.0).abs());
        }
        worst
    };

    let projected = stretch(StabilizationConfig::default());
    let velocity_only = stretch(StabilizationConfig::default().with_position_projection(0, 1e-6));
    assert!(projected < 1e-5, "projected stretch {projected}");
    assert!(velocity_only > 1e-3, "velocity-only stretch {velocity_only}");
}

/// Test: the anchor points of a three-link chain stay together while it
/// falls into a hanging configuration.
#[test]
fn chain_stays_assembled() {
    let mut world = y_up_world(1.0 / 240.0);
    let ceiling = world.add_fixed_body(Pose::identity());

    let mut previous = ceiling;
    let mut joints = Vec::new();
    for i in 1..=3 {
        let link = sphere(&mut world, Point3::new(0.5 * f64::from(i), 0.0, 0.0), 1.0, 0.25);
        let anchor = Point3::new(0.5 * f64::from(i) - 0.25, 0.0, 0.0);
        joints.push(ball_joint(&mut world, previous, link, anchor));
        previous = link;
    }

    let mut lowest_tip = 0.0_f64;
    for _ in 0..480 {
        world.tick().expect("tick should succeed");
        lowest_tip = lowest_tip.min(world.body(previous).expect("tip").position.y);
    }

    for id in joints {
        let gap = anchor_gap(&world, id);
        assert!(gap < 1e-2, "{id}: anchors separated by {gap}");
    }
    assert!(lowest_tip < -0.75, "chain should swing down, lowest tip {lowest_tip}");
}

/// Test: a joint between two free bodies conserves linear momentum.
#[test]
fn free_pair_conserves_momentum() {
    let mut world = World::new(SimulationConfig::default().zero_gravity());
    let a = sphere(&mut world, Point3::new(-0.5, 0.0, 0.0), 1.0, 0.1);
    let b = sphere(&mut world, Point3::new(0.5, 0.0, 0.0), 3.0, 0.1);
    world.body_mut(a).expect("a").linear_velocity = Vector3::new(0.0, 2.0, 0.0);
    ball_joint(&mut world, a, b, Point3::origin());

    let momentum = |world: &World| {
        world
            .bodies()
            .map(|(_, body)| body.linear_velocity * body.mass())
            .sum::<Vector3<f64>>()
    };
    let before = momentum(&world);

    for _ in 0..200 {
        world.tick().expect("tick should succeed");
    }

    let after = momentum(&world);
    assert!((after - before).norm() < 1e-9, "momentum {before} -> {after}");
}

/// Test: joint impulses are reported after a solve.
#[test]
fn impulses_are_read_back() {
    let mut world = y_up_world(0.01);
    let anchor = world.add_fixed_body(Pose::identity());
    let bob = sphere(&mut world, Point3::new(0.0, -1.0, 0.0), 2.0, 0.1);
    let joint = ball_joint(&mut world, anchor, bob, Point3::origin());

    world.tick().expect("tick should succeed");

    // Holding 2 kg against gravity for one step: |λ| = m g dt along y.
    let impulses = world.constraint_impulse(joint).expect("joint exists");
    let total: f64 = impulses.iter().map(|l| l * l).sum::<f64>().sqrt();
    assert!((total - 2.0 * 9.8 * 0.01).abs() < 1e-6, "impulse {total}");
}
