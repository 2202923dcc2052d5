//! Rigid Fiz Engine Library
//!
//! A small real-time rigid-body physics engine: spheres and oriented boxes,
//! a dynamic bounding volume hierarchy for the broad phase, separating-axis
//! box tests, and a sequential impulse solver with restitution and Coulomb
//! friction.
//!
//! # Modules
//!
//! - [`physics`] - Bodies, collision detection, contact solver and the world loop
//! - [`config`] - World configuration with JSON loading
//! - [`logging`] - `tracing` subscriber setup for host binaries
//!
//! # Example
//!
//! ```ignore
//! use rigid_fiz_engine::{BodyDesc, World, WorldConfig};
//! use glam::Vec3;
//!
//! let mut world = World::new(WorldConfig::default());
//!
//! // Static floor and a falling ball
//! world.add_box(Vec3::new(50.0, 1.0, 50.0), BodyDesc::fixed(Vec3::ZERO));
//! let ball = world.add_sphere(1.0, BodyDesc::dynamic(Vec3::new(0.0, 10.0, 0.0), 1.0));
//!
//! // Feed frame deltas; the world runs fixed 1 ms sub-steps internally
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0);
//! }
//! let position = world.body(ball).map(|b| b.position());
//! ```

pub mod config;
pub mod logging;
pub mod physics;

// Re-export the types most hosts need at crate level for convenience
pub use config::{BroadPhaseConfig, ConfigError, WorldConfig};
pub use logging::init_logging;
pub use physics::{BodyDesc, BodyId, Contact, RigidBody, Shape, World};
