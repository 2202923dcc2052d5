//! Headless Physics Demo
//!
//! Run with: `cargo run --bin fiz_demo -- [config.json]`
//!
//! Builds a small scene (static floor, a stack of boxes, a few balls thrown
//! at it), simulates two seconds at 60 frames per second and logs where
//! everything ends up. Set `RUST_LOG=rigid_fiz_engine=debug` for more detail.

use std::path::Path;

use glam::{Quat, Vec3};
use rigid_fiz_engine::physics::{BodyDesc, BodyId, Contact, RigidBody, World};
use rigid_fiz_engine::{WorldConfig, init_logging};
use tracing::{debug, info, warn};

// ============================================================================
// SCENE
// ============================================================================

const FRAME_TIME: f32 = 1.0 / 60.0;
const FRAMES: u32 = 120;

/// Loads the config named on the command line, or the defaults.
fn load_config() -> WorldConfig {
    let Some(path) = std::env::args().nth(1) else {
        return WorldConfig::default();
    };
    match WorldConfig::load(Path::new(&path)) {
        Ok(config) => {
            info!("loaded config from {}", path);
            config
        }
        Err(e) => {
            warn!("could not load {}: {}; using defaults", path, e);
            WorldConfig::default()
        }
    }
}

fn build_scene(world: &mut World) -> Vec<BodyId> {
    let mut tracked = Vec::new();

    world.add_box(
        Vec3::new(20.0, 0.5, 20.0),
        BodyDesc::fixed(Vec3::new(0.0, -0.5, 0.0)).with_material(0.2, 0.8),
    );

    // Stack of crates, slightly twisted so they do not land flat
    for level in 0..4 {
        let y = 0.5 + level as f32 * 1.05;
        let twist = Quat::from_rotation_y(level as f32 * 0.15);
        tracked.push(world.add_box(
            Vec3::splat(0.5),
            BodyDesc::dynamic(Vec3::new(0.0, y, 0.0), 2.0)
                .with_orientation(twist)
                .with_material(0.1, 0.6),
        ));
    }

    // Balls thrown at the stack
    for i in 0..3 {
        let z = -1.0 + i as f32;
        tracked.push(world.add_sphere(
            0.3,
            BodyDesc::dynamic(Vec3::new(-6.0, 2.0 + i as f32, z), 1.0)
                .with_velocity(Vec3::new(8.0, 2.0, -z))
                .with_material(0.6, 0.3),
        ));
    }

    // A heavy ball dropped from above, mass from density
    tracked.push(world.add_sphere(
        0.5,
        BodyDesc::dynamic(Vec3::new(0.3, 8.0, 0.2), 0.0)
            .with_density(2500.0)
            .with_velocity(Vec3::new(0.0, -1.0, 0.0))
            .with_angular_velocity(Vec3::new(0.0, 3.0, 0.0))
            .with_material(0.3, 0.5),
    ));

    tracked
}

// ============================================================================
// MAIN
// ============================================================================

fn main() {
    init_logging();
    info!("=== Rigid Fiz Demo ===");

    let mut world = World::new(load_config());
    let tracked = build_scene(&mut world);
    info!("{} bodies, broad phase: {}", world.len(), world.broad_phase().name());

    let mut contacts = 0;
    world.set_collision_listener(move |a: &RigidBody, b: &RigidBody, _: &Contact| {
        contacts += 1;
        if contacts % 500 == 0 {
            debug!("{} contacts so far (latest {} / {})", contacts, a.id(), b.id());
        }
    });

    for frame in 0..FRAMES {
        let substeps = world.step(FRAME_TIME);
        if frame % 30 == 0 {
            let stats = world.last_step_stats();
            info!(
                "frame {:3}: {} substeps, {} pairs, {} contacts",
                frame, substeps, stats.candidate_pairs, stats.contacts
            );
        }
    }

    for id in tracked {
        if let Some(body) = world.body(id) {
            info!(
                "body {}: position {:.3}, velocity {:.3}",
                id, body.position(), body.velocity()
            );
        }
    }
    info!(
        "simulated {:.2} s, kinetic energy {:.3} J",
        world.elapsed(),
        world.kinetic_energy()
    );
}
