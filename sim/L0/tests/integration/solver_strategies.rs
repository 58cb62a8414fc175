//! The same scenes solved by every strategy.

use nalgebra::{Point3, Vector3};
use sim_constraint::{AxisMotor, HingeJoint, RowSolver, SolverStrategy};
use sim_core::{RigidBody, World};
use sim_types::{MassProperties, Pose, SimulationConfig};

use super::scenes::{anchor_gap, ball_joint, ground_plane, sphere};

fn strategies() -> [SolverStrategy; 4] {
    [
        SolverStrategy::pgs(),
        SolverStrategy::nncg(),
        SolverStrategy::subspace(),
        SolverStrategy::fischer_newton(),
    ]
}

/// Test: a sphere resting on the ground gets the same support impulse from
/// every strategy, and each report carries the strategy's name.
#[test]
fn resting_contact_parity() {
    for strategy in strategies() {
        let name = strategy.name();
        let mut world = World::new(SimulationConfig::default());
        world.set_solver(strategy).expect("default strategies are valid");
        let ground = world.add_fixed_body(Pose::identity());
        let ball = sphere(&mut world, Point3::new(0.0, 0.0, 0.5), 3.0, 0.5);
        world.set_contact_generator(ground_plane(ground, 0.5, 0.8, 0.0));

        for _ in 0..60 {
            world.tick().expect("tick should succeed");
        }

        let weight = 3.0 * 9.81 * world.timestep();
        let normal = world.contacts()[0].normal_impulse();
        assert!((normal - weight).abs() < 1e-5, "{name}: support impulse {normal}");
        assert!(
            world.body(ball).expect("ball").linear_velocity.norm() < 1e-5,
            "{name}: resting ball moved"
        );

        let report = world.last_solve_report().expect("a solve ran");
        assert_eq!(report.solver, name);
        assert_eq!(report.rows, 3, "{name}: normal plus two friction rows");
        assert!(report.converged, "{name}: {report:?}");
        assert!(report.merit <= report.initial_merit + 1e-15);
    }
}

/// Test: a double pendulum stays assembled under every strategy.
#[test]
fn double_pendulum_stays_assembled() {
    for strategy in strategies() {
        let name = strategy.name();
        let mut world = World::new(SimulationConfig::default());
        world.set_solver(strategy).expect("default strategies are valid");
        let pivot = world.add_fixed_body(Pose::identity());
        let upper = sphere(&mut world, Point3::new(0.0, 1.0, 0.0), 1.0, 0.5);
        let lower = sphere(&mut world, Point3::new(0.0, 2.0, 0.0), 1.0, 0.5);
        let joints = [
            ball_joint(&mut world, pivot, upper, Point3::origin()),
            ball_joint(&mut world, upper, lower, Point3::new(0.0, 1.5, 0.0)),
        ];

        let mut lowest = 0.0_f64;
        for _ in 0..240 {
            world.tick().expect("tick should succeed");
            lowest = lowest.min(world.body(lower).expect("lower").position.z);
        }

        for id in joints {
            let gap = anchor_gap(&world, id);
            assert!(gap < 1e-2, "{name}: {id} gap {gap}");
        }
        assert!(lowest < -0.5, "{name}: lower link did not fall, z = {lowest}");
        assert_eq!(world.last_solve_report().expect("a solve ran").rows, 6);
    }
}

/// Test: every strategy drives a hinge motor to the same rate.
#[test]
fn hinge_motor_parity() {
    let rates: Vec<f64> = strategies()
        .into_iter()
        .map(|strategy| {
            let mut world = World::new(SimulationConfig::default().zero_gravity());
            world.set_solver(strategy).expect("default strategies are valid");
            let base = world.add_fixed_body(Pose::identity());
            let wheel = world.add_body(
                RigidBody::new(
                    Pose::from_position(Point3::new(0.0, 0.0, 0.2)),
                    MassProperties::cylinder(2.0, 0.4, 0.05),
                )
                .expect("wheel mass properties are valid"),
            );
            let hinge = HingeJoint::new(
                world.body_frame(base).expect("base"),
                world.body_frame(wheel).expect("wheel"),
                Point3::new(0.0, 0.0, 0.2),
                Vector3::z(),
            )
            .with_motor(AxisMotor::velocity(3.0, 20.0).expect("valid motor"));
            world.add_constraint(hinge).expect("hinge bodies exist");

            for _ in 0..120 {
                world.tick().expect("tick should succeed");
            }
            world.body(wheel).expect("wheel").angular_velocity.z
        })
        .collect();

    for rate in &rates {
        assert!((rate - 3.0).abs() < 1e-3, "rates {rates:?}");
    }
}

/// Test: the strategy can be swapped between ticks without disturbing a
/// settled scene.
#[test]
fn switching_strategy_mid_run() {
    let mut world = World::new(SimulationConfig::default());
    let ground = world.add_fixed_body(Pose::identity());
    let ball = sphere(&mut world, Point3::new(0.0, 0.0, 0.5), 1.0, 0.5);
    world.set_contact_generator(ground_plane(ground, 0.5, 0.5, 0.0));

    for strategy in strategies().into_iter().cycle().take(8) {
        let name = strategy.name();
        world.set_solver(strategy).expect("default strategies are valid");
        for _ in 0..10 {
            world.tick().expect("tick should succeed");
        }
        assert_eq!(world.solver().name(), name);
        let z = world.body(ball).expect("ball").position.z;
        assert!((z - 0.5).abs() < 1e-5, "after {name}: z = {z}");
    }
    assert_eq!(world.step_count(), 80);
}
