//! Contact scenarios: resting, bouncing, friction, and persistent contacts.

use nalgebra::{Point3, Vector3};
use sim_constraint::{ContactConstraint, ContactPoint};
use sim_core::{BodyId, StaticContacts, World};
use sim_types::{Pose, SimulationConfig};

use super::scenes::{ground_plane, sphere};

const RADIUS: f64 = 0.5;

fn ground_world(config: SimulationConfig) -> (World, BodyId) {
    let mut world = World::new(config);
    let ground = world.add_fixed_body(Pose::identity());
    (world, ground)
}

/// Test: a dropped sphere comes to rest on the ground.
#[test]
fn sphere_comes_to_rest() {
    let (mut world, ground) = ground_world(SimulationConfig::default());
    let ball = sphere(&mut world, Point3::new(0.0, 0.0, 1.0), 1.0, RADIUS);
    world.set_contact_generator(ground_plane(ground, RADIUS, 0.5, 0.0));

    for _ in 0..480 {
        world.tick().expect("tick should succeed");
    }

    let body = world.body(ball).expect("ball");
    assert!(
        (body.position.z - RADIUS).abs() < 2e-2,
        "resting height {}",
        body.position.z
    );
    assert!(body.linear_velocity.norm() < 1e-3, "still moving: {}", body.linear_velocity);
    assert_eq!(world.contacts().len(), 1);
    let normal = world.contacts()[0].normal_impulse();
    let weight = 9.81 * world.timestep();
    assert!((normal - weight).abs() < 1e-6, "support impulse {normal}");
}

/// Test: restitution sends a fast ball back up; without it the ball stays
/// down.
#[test]
fn restitution_bounces() {
    let peak_after_impact = |restitution: f64| {
        let (mut world, ground) = ground_world(SimulationConfig::default());
        let ball = sphere(&mut world, Point3::new(0.0, 0.0, 2.0), 1.0, RADIUS);
        world.set_contact_generator(ground_plane(ground, RADIUS, 0.0, restitution));

        let mut bounced = false;
        let mut peak = f64::NEG_INFINITY;
        for _ in 0..480 {
            world.tick().expect("tick should succeed");
            let body = world.body(ball).expect("ball");
            bounced |= !world.contacts().is_empty();
            if bounced {
                peak = peak.max(body.position.z);
            }
        }
        assert!(bounced, "ball never reached the ground");
        peak
    };

    let lively = peak_after_impact(0.9);
    assert!(lively > 1.2, "elastic ball only rose to {lively}");

    let dead = peak_after_impact(0.0);
    assert!(dead < RADIUS + 0.05, "inelastic ball rose to {dead}");
}

/// Test: friction turns sliding into rolling; a frictionless sphere keeps
/// sliding.
#[test]
fn friction_turns_sliding_into_rolling() {
    let slide = |friction: f64| {
        let (mut world, ground) = ground_world(SimulationConfig::default());
        let ball = sphere(&mut world, Point3::new(0.0, 0.0, RADIUS), 1.0, RADIUS);
        world.body_mut(ball).expect("ball").linear_velocity = Vector3::new(3.0, 0.0, 0.0);
        world.set_contact_generator(ground_plane(ground, RADIUS, friction, 0.0));

        for _ in 0..240 {
            world.tick().expect("tick should succeed");
        }
        let body = world.body(ball).expect("ball");
        (body.linear_velocity, body.angular_velocity)
    };

    let (v, omega) = slide(0.0);
    assert!((v.x - 3.0).abs() < 1e-9, "frictionless sphere slowed to {}", v.x);
    assert!(omega.norm() < 1e-9);

    // A solid sphere that starts sliding ends up rolling at 5/7 of its speed.
    let (v, omega) = slide(0.5);
    assert!((v.x - 3.0 * 5.0 / 7.0).abs() < 1e-2, "rolling speed {}", v.x);
    let slip = v.x - omega.y * RADIUS;
    assert!(slip.abs() < 1e-3, "contact still slipping at {slip}");
}

/// Test: contacts never pull bodies together.
#[test]
fn contact_does_not_pull() {
    let (mut world, ground) = ground_world(SimulationConfig::default().zero_gravity());
    let ball = sphere(&mut world, Point3::new(0.0, 0.0, RADIUS), 1.0, RADIUS);
    world.body_mut(ball).expect("ball").linear_velocity = Vector3::new(0.0, 0.0, 1.0);
    world.set_contact_generator(StaticContacts::new(vec![ContactPoint::new(
        ground,
        ball,
        Point3::origin(),
        Vector3::z(),
        0.0,
    )]));

    world.tick().expect("tick should succeed");

    assert!((world.body(ball).expect("ball").linear_velocity.z - 1.0).abs() < 1e-12);
    assert!(world.contacts()[0].normal_impulse().abs() < 1e-12);
}

/// Test: a contact registered as a constraint persists across ticks and
/// reports its support impulse.
#[test]
fn persistent_contact_constraint() {
    let (mut world, ground) = ground_world(SimulationConfig::default());
    let ball = sphere(&mut world, Point3::new(0.0, 0.0, RADIUS), 2.0, RADIUS);
    let point = ContactPoint::new(ground, ball, Point3::origin(), Vector3::z(), 0.0);
    let id = world
        .add_constraint(ContactConstraint::new(point).expect("valid contact"))
        .expect("contact bodies exist");

    for _ in 0..120 {
        world.tick().expect("tick should succeed");
    }

    let body = world.body(ball).expect("ball");
    assert!((body.position.z - RADIUS).abs() < 1e-9, "ball sank to {}", body.position.z);
    let impulses = world.constraint_impulse(id).expect("contact exists");
    assert!((impulses[0] - 2.0 * 9.81 * world.timestep()).abs() < 1e-9);
    assert!(world.contacts().is_empty());
}

/// Test: swapping the generator out stops new contacts from appearing.
#[test]
fn generator_can_be_removed() {
    let (mut world, ground) = ground_world(SimulationConfig::default());
    let ball = sphere(&mut world, Point3::new(0.0, 0.0, RADIUS), 1.0, RADIUS);
    world.set_contact_generator(ground_plane(ground, RADIUS, 0.0, 0.0));
    world.tick().expect("tick should succeed");
    assert_eq!(world.contacts().len(), 1);

    assert!(world.clear_contact_generator().is_some());
    assert!(world.contacts().is_empty());

    for _ in 0..60 {
        world.tick().expect("tick should succeed");
    }
    let z = world.body(ball).expect("ball").position.z;
    assert!(z < RADIUS - 0.2, "ball should fall through the ground, z = {z}");
}
