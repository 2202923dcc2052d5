//! World Tests - Whole-Pipeline Scenarios
//!
//! Bouncing, head-on collisions, friction, conservation, the collision
//! listener, pausing and determinism across broad-phase strategies, all run
//! through `World` with its fixed 1 ms sub-step.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use rigid_fiz_engine::config::{BroadPhaseConfig, WorldConfig};
use rigid_fiz_engine::physics::{BodyDesc, BodyId, Contact, RigidBody, World};

const DT: f32 = 0.001;

/// Static slab whose top face is at y = 0.
fn add_floor(world: &mut World, friction: f32) -> BodyId {
    world.add_box(
        Vec3::new(100.0, 1.0, 100.0),
        BodyDesc::fixed(Vec3::new(0.0, -1.0, 0.0)).with_material(0.5, friction),
    )
}

fn position(world: &World, id: BodyId) -> Vec3 {
    world.body(id).map(|b| b.position()).unwrap_or(Vec3::NAN)
}

fn velocity(world: &World, id: BodyId) -> Vec3 {
    world.body(id).map(|b| b.velocity()).unwrap_or(Vec3::NAN)
}

// ============================================================================
// Bouncing ball
// ============================================================================

#[test]
fn test_ball_bounce_restitution() {
    let mut world = World::new(WorldConfig::default());
    let floor = add_floor(&mut world, 0.5);
    let ball = world.add_sphere(
        10.0,
        BodyDesc::dynamic(Vec3::new(0.0, 100.0, 0.0), 1.0).with_material(0.5, 0.5),
    );

    let drop_height = 90.0;
    let mut apexes = Vec::new();
    let mut rebounds = Vec::new();
    let mut previous_vy = 0.0;

    for _ in 0..10_000 {
        world.substep(DT);
        let vy = velocity(&world, ball).y;
        if previous_vy < -1.0 && vy > 0.0 {
            rebounds.push(vy / -previous_vy);
        }
        if previous_vy > 0.0 && vy <= 0.0 {
            // Height of the bottom of the ball above the floor
            apexes.push(position(&world, ball).y - 10.0);
        }
        previous_vy = vy;
    }

    assert!(apexes.len() >= 2, "expected two bounces, got apexes {:?}", apexes);
    for ratio in &rebounds[..2] {
        assert!((ratio - 0.5).abs() < 0.025, "rebound speed ratio {} should be 0.5", ratio);
    }

    // Rebound speed halves, so each apex is e² = 1/4 of the previous one
    let first = apexes[0] / drop_height;
    let second = apexes[1] / apexes[0];
    assert!((first - 0.25).abs() < 0.0125, "first apex ratio {} (apex {})", first, apexes[0]);
    assert!((second - 0.25).abs() < 0.0125, "second apex ratio {} (apex {})", second, apexes[1]);

    assert_eq!(position(&world, floor), Vec3::new(0.0, -1.0, 0.0));
    assert_eq!(velocity(&world, floor), Vec3::ZERO);
}

// ============================================================================
// Head-on collisions
// ============================================================================

#[test]
fn test_equal_boxes_swap_velocities() {
    let mut world = World::new(WorldConfig::zero_gravity());
    let left = world.add_box(
        Vec3::splat(5.0),
        BodyDesc::dynamic(Vec3::new(-5.5, 0.0, 0.0), 1.0)
            .with_velocity(Vec3::new(10.0, 0.0, 0.0))
            .with_material(1.0, 0.0),
    );
    let right = world.add_box(
        Vec3::splat(5.0),
        BodyDesc::dynamic(Vec3::new(5.5, 0.0, 0.0), 1.0)
            .with_velocity(Vec3::new(-10.0, 0.0, 0.0))
            .with_material(1.0, 0.0),
    );

    let mut contacts = 0;
    for _ in 0..200 {
        world.substep(DT);
        contacts += world.last_step_stats().contacts;
    }

    assert_eq!(contacts, 1, "a single impact expected");
    let (vl, vr) = (velocity(&world, left), velocity(&world, right));
    assert!((vl - Vec3::new(-10.0, 0.0, 0.0)).length() < 1e-3, "left velocity {:?}", vl);
    assert!((vr - Vec3::new(10.0, 0.0, 0.0)).length() < 1e-3, "right velocity {:?}", vr);
    for id in [left, right] {
        let spin = world.body(id).map(|b| b.angular_velocity()).unwrap_or(Vec3::NAN);
        assert!(spin.length() < 1e-4, "face-on impact should not spin: {:?}", spin);
    }
}

#[test]
fn test_elastic_spheres_conserve_energy_and_momentum() {
    let mut world = World::new(WorldConfig::zero_gravity());
    let moving = world.add_sphere(
        1.0,
        BodyDesc::dynamic(Vec3::new(-3.0, 0.0, 0.0), 2.0)
            .with_velocity(Vec3::new(4.0, 0.0, 0.0))
            .with_material(1.0, 0.0),
    );
    let resting = world.add_sphere(
        1.0,
        BodyDesc::dynamic(Vec3::new(3.0, 0.0, 0.0), 2.0).with_material(1.0, 0.0),
    );

    let energy_before = world.kinetic_energy();
    for _ in 0..2000 {
        world.substep(DT);
    }

    let (v_moving, v_resting) = (velocity(&world, moving), velocity(&world, resting));
    assert!(v_moving.length() < 1e-3, "first sphere should stop, v = {:?}", v_moving);
    assert!((v_resting.x - 4.0).abs() < 1e-3, "second sphere should take v = 4, got {:?}", v_resting);

    let momentum = 2.0 * (v_moving + v_resting);
    assert!((momentum.x - 8.0).abs() < 1e-3);
    let energy_after = world.kinetic_energy();
    assert!(
        (energy_after - energy_before).abs() / energy_before < 1e-3,
        "energy {} -> {}",
        energy_before,
        energy_after
    );
}

// ============================================================================
// Friction
// ============================================================================

#[test]
fn test_friction_stops_sliding_box() {
    let mut world = World::new(WorldConfig::default());
    add_floor(&mut world, 1.0);
    let slab = world.add_box(
        Vec3::new(1.0, 0.25, 1.0),
        BodyDesc::dynamic(Vec3::new(0.0, 0.25, 0.0), 1.0)
            .with_velocity(Vec3::new(2.0, 0.0, 0.0))
            .with_material(0.0, 1.0),
    );

    let mut stopped_at = None;
    for step in 0..3000 {
        world.substep(DT);
        let v = velocity(&world, slab);
        if stopped_at.is_none() && Vec3::new(v.x, 0.0, v.z).length() < 0.1 {
            stopped_at = Some(step);
        }
    }

    let stopped_at = stopped_at.expect("the box never stopped sliding");
    assert!(stopped_at < 1000, "took {} steps to stop", stopped_at);

    let v = velocity(&world, slab);
    assert!(Vec3::new(v.x, 0.0, v.z).length() < 0.1, "still sliding at {:?}", v);
    let p = position(&world, slab);
    // v² / (2 μ g) ≈ 0.2 m
    assert!(p.x > 0.05 && p.x < 1.0, "slid to x = {}", p.x);
    assert!((p.y - 0.25).abs() < 0.05, "box should rest on the floor, y = {}", p.y);
}

#[test]
fn test_frictionless_box_keeps_sliding() {
    let mut world = World::new(WorldConfig::default());
    add_floor(&mut world, 0.0);
    let slab = world.add_box(
        Vec3::new(1.0, 0.25, 1.0),
        BodyDesc::dynamic(Vec3::new(0.0, 0.25, 0.0), 1.0)
            .with_velocity(Vec3::new(2.0, 0.0, 0.0))
            .with_material(0.0, 0.0),
    );

    for _ in 0..500 {
        world.substep(DT);
    }
    let v = velocity(&world, slab);
    assert!((v.x - 2.0).abs() < 0.05, "no friction, yet v = {:?}", v);
}

// ============================================================================
// Listener, pause, stats
// ============================================================================

#[test]
fn test_listener_sees_each_resolved_contact() {
    let mut world = World::new(WorldConfig::default());
    let floor = add_floor(&mut world, 0.5);
    let ball = world.add_sphere(0.5, BodyDesc::dynamic(Vec3::new(0.0, 1.0, 0.0), 1.0));

    let events: Rc<RefCell<Vec<(BodyId, BodyId, Contact)>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&events);
    world.set_collision_listener(move |a: &RigidBody, b: &RigidBody, contact: &Contact| {
        sink.borrow_mut().push((a.id(), b.id(), *contact));
    });

    let mut resolved = 0;
    for _ in 0..60 {
        world.step(1.0 / 60.0);
        resolved += world.last_step_stats().contacts;
        assert_eq!(world.last_step_stats().skipped_contacts, 0);
    }

    let events = events.borrow();
    assert!(!events.is_empty(), "the ball should have hit the floor");
    assert_eq!(events.len(), resolved);
    for (a, b, contact) in events.iter() {
        assert_eq!((*a, *b), (floor, ball), "pairs arrive in id order");
        // Normal points from the ball (b) towards the floor (a)
        assert!(contact.normal.y < -0.99, "normal {:?}", contact.normal);
        assert!(contact.depth > 0.0);
    }
}

#[test]
fn test_pause_freezes_state() {
    let mut world = World::new(WorldConfig::default());
    add_floor(&mut world, 0.5);
    let ball = world.add_sphere(0.5, BodyDesc::dynamic(Vec3::new(0.0, 5.0, 0.0), 1.0));

    world.step(0.1);
    let before = position(&world, ball);

    world.pause();
    for _ in 0..10 {
        assert_eq!(world.step(1.0 / 60.0), 0);
    }
    assert_eq!(position(&world, ball), before, "paused world must not move");
    assert_eq!(world.body(ball).map(|b| b.is_static()), Some(false));

    world.resume();
    assert!(world.step(1.0 / 60.0) > 0);
    assert!(position(&world, ball).y < before.y);
}

#[test]
fn test_static_bodies_never_collide_with_each_other() {
    let mut world = World::new(WorldConfig::default());
    world.add_box(Vec3::ONE, BodyDesc::fixed(Vec3::ZERO));
    world.add_box(Vec3::ONE, BodyDesc::fixed(Vec3::new(0.5, 0.0, 0.0)));
    world.step(0.01);
    let stats = world.last_step_stats();
    assert_eq!(stats.candidate_pairs, 0);
    assert_eq!(stats.contacts, 0);
}

#[test]
fn test_static_body_stays_put_through_body_mut() {
    let mut world = World::new(WorldConfig::default());
    let floor = add_floor(&mut world, 0.5);
    if let Some(body) = world.body_mut(floor) {
        body.set_velocity(Vec3::new(0.0, 5.0, 0.0));
        body.set_angular_velocity(Vec3::X);
    }
    world.step(0.1);
    assert_eq!(velocity(&world, floor), Vec3::ZERO);
    assert_eq!(position(&world, floor), Vec3::new(0.0, -1.0, 0.0));
}

// ============================================================================
// Determinism
// ============================================================================

fn run_pile(broad_phase: BroadPhaseConfig) -> Vec<Vec3> {
    let mut world = World::new(WorldConfig::default().with_broad_phase(broad_phase));
    add_floor(&mut world, 0.6);
    for i in 0..6 {
        let x = (i % 3) as f32 * 1.1 - 1.1;
        let y = 0.6 + (i / 3) as f32 * 1.3;
        world.add_box(Vec3::splat(0.5), BodyDesc::dynamic(Vec3::new(x, y, 0.0), 1.0));
    }
    for i in 0..4 {
        world.add_sphere(
            0.4,
            BodyDesc::dynamic(Vec3::new(-4.0, 1.0 + i as f32, 0.2 * i as f32), 1.0)
                .with_velocity(Vec3::new(6.0, 0.0, 0.0)),
        );
    }

    for _ in 0..30 {
        world.step(1.0 / 60.0);
    }
    world.bodies().iter().map(|b| b.position()).collect()
}

#[test]
fn test_broad_phases_give_identical_simulations() {
    let tree = run_pile(BroadPhaseConfig::AabbTree { margin: 1.0 });
    let sweep = run_pile(BroadPhaseConfig::SweepAndPrune);
    let grid = run_pile(BroadPhaseConfig::SpatialHash { cell_size: 2.0 });

    assert!(tree.iter().all(|p| p.is_finite()));
    assert_eq!(tree, sweep, "sweep and prune diverged from the tree");
    assert_eq!(tree, grid, "spatial hash diverged from the tree");
}
