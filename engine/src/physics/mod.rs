//! Rigid-body physics
//!
//! Spheres and oriented boxes moving under gravity, colliding and bouncing
//! off each other with restitution and friction.
//!
//! # Unit System
//!
//! **1 unit = 1 meter** (SI units throughout)
//!
//! - Distances in meters
//! - Velocities in m/s
//! - Accelerations in m/s²
//! - Mass in kg
//!
//! # Submodules
//!
//! - [`types`] - Core mathematical types (Vec3, Quat, Mat3) re-exported from glam, plus `Aabb`
//! - [`shape`] - Body shapes and their world-space colliders (sphere, OBB)
//! - [`collision`] - Narrow phase: exact tests producing a `Contact`
//! - [`broad_phase`] - Pair culling (AABB tree, sweep and prune, spatial hash)
//! - [`solver`] - Impulse-based contact resolution
//! - [`body`] - Rigid bodies and their construction parameters
//! - [`world`] - Body storage and the fixed-step simulation loop
//!
//! # Pipeline
//!
//! ```text
//! integrate -> refresh bounds -> broad phase -> narrow phase -> solver
//! ```

pub mod body;
pub mod broad_phase;
pub mod collision;
pub mod shape;
pub mod solver;
pub mod types;
pub mod world;

// Re-export commonly used types at the physics module level
pub use body::{BodyDesc, BodyId, RigidBody};
pub use broad_phase::{AabbTree, BroadPhase, SpatialHash, SweepAndPrune, TreeError};
pub use collision::{Contact, collide};
pub use shape::{Collider, Obb, Shape, SphereCollider};
pub use solver::resolve;
pub use types::{Aabb, Mat3, Quat, Vec3};
pub use world::{BodyTransform, CollisionListener, Gravity, StepStats, World};
