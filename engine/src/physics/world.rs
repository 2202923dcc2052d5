//! The simulation world
//!
//! [`World`] owns every body plus the broad phase and advances them in fixed
//! sub-steps. One sub-step:
//!
//! 1. apply gravity and integrate every dynamic body,
//! 2. refresh colliders and bounds, push the bounds to the broad phase,
//! 3. collect candidate pairs (each unordered pair once, in id order),
//! 4. run the narrow phase on each pair and resolve real contacts,
//! 5. notify the collision listener for every resolved contact.
//!
//! [`World::step`] feeds a frame delta into an accumulator and runs as many
//! sub-steps as it holds, so the simulation is independent of frame rate.
//!
//! # Example
//!
//! ```ignore
//! use rigid_fiz_engine::physics::{BodyDesc, World};
//! use rigid_fiz_engine::config::WorldConfig;
//! use glam::Vec3;
//!
//! let mut world = World::new(WorldConfig::default());
//! world.add_box(Vec3::new(50.0, 1.0, 50.0), BodyDesc::fixed(Vec3::ZERO));
//! let ball = world.add_sphere(1.0, BodyDesc::dynamic(Vec3::new(0.0, 10.0, 0.0), 1.0));
//!
//! world.step(1.0 / 60.0);
//! println!("{:?}", world.body(ball).map(|b| b.position()));
//! ```

use std::fmt;

use bytemuck::{Pod, Zeroable};
use glam::{Quat, Vec3};

use super::body::{BodyDesc, BodyId, RigidBody};
use super::broad_phase::BroadPhase;
use super::collision::{Contact, collide};
use super::shape::Shape;
use super::solver::resolve_with_epsilon;
use crate::config::{ConfigError, WorldConfig};

/// Fraction of a time step the accumulator may run short and still step.
/// Absorbs f32 rounding when frame deltas are exact multiples of the step.
const ACCUMULATOR_SLACK: f32 = 1e-3;

/// Gravitational field acting on every dynamic body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Gravity {
    /// Same acceleration everywhere (m/s²)
    Uniform(Vec3),
    /// Acceleration of `strength` pointing at `center`
    Radial { center: Vec3, strength: f32 },
}

impl Default for Gravity {
    fn default() -> Self {
        Gravity::Uniform(Vec3::new(0.0, -9.8, 0.0))
    }
}

impl Gravity {
    /// Acceleration felt by a body at `position`.
    pub fn acceleration_at(&self, position: Vec3) -> Vec3 {
        match *self {
            Gravity::Uniform(g) => g,
            Gravity::Radial { center, strength } => {
                let to_center = center - position;
                let distance = to_center.length();
                if distance < 1e-6 {
                    return Vec3::ZERO;
                }
                to_center * (strength / distance)
            }
        }
    }
}

/// Receives every contact the solver resolved.
///
/// Closures taking `(&RigidBody, &RigidBody, &Contact)` implement this
/// trait directly.
pub trait CollisionListener {
    /// Called after `a` and `b` were pushed apart. `contact` is the contact
    /// as detected, with the normal pointing from `b` towards `a`.
    fn on_collision(&mut self, a: &RigidBody, b: &RigidBody, contact: &Contact);
}

impl<F> CollisionListener for F
where
    F: FnMut(&RigidBody, &RigidBody, &Contact),
{
    fn on_collision(&mut self, a: &RigidBody, b: &RigidBody, contact: &Contact) {
        self(a, b, contact)
    }
}

/// Counters for the last [`World::step`] (or [`World::substep`]) call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Physics sub-steps simulated
    pub substeps: u32,
    /// Pairs reported by the broad phase, summed over sub-steps
    pub candidate_pairs: usize,
    /// Contacts resolved
    pub contacts: usize,
    /// Contacts detected but rejected by the solver (invalid data)
    pub skipped_contacts: usize,
}

/// Render-facing transform of one body, laid out for GPU upload.
///
/// `position.xyz, pad, orientation.xyzw`
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct BodyTransform {
    pub position: [f32; 3],
    pub _padding: f32,
    pub orientation: [f32; 4],
}

static_assertions::assert_eq_size!(BodyTransform, [u8; 32]);

impl BodyTransform {
    pub fn new(position: Vec3, orientation: Quat) -> Self {
        Self {
            position: position.to_array(),
            _padding: 0.0,
            orientation: orientation.to_array(),
        }
    }

    pub fn position(&self) -> Vec3 {
        Vec3::from_array(self.position)
    }

    pub fn orientation(&self) -> Quat {
        Quat::from_array(self.orientation)
    }
}

/// Borrows two distinct bodies mutably.
fn pair_mut(bodies: &mut [RigidBody], a: usize, b: usize) -> Option<(&mut RigidBody, &mut RigidBody)> {
    if a == b || a >= bodies.len() || b >= bodies.len() {
        return None;
    }
    if a < b {
        let (head, tail) = bodies.split_at_mut(b);
        Some((&mut head[a], &mut tail[0]))
    } else {
        let (head, tail) = bodies.split_at_mut(a);
        Some((&mut tail[0], &mut head[b]))
    }
}

/// A set of rigid bodies advanced together.
pub struct World {
    config: WorldConfig,
    bodies: Vec<RigidBody>,
    broad_phase: BroadPhase,
    gravity: Gravity,
    accumulator: f32,
    elapsed: f64,
    paused: bool,
    listener: Option<Box<dyn CollisionListener>>,
    stats: StepStats,
    pairs: Vec<(BodyId, BodyId)>,
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("bodies", &self.bodies.len())
            .field("broad_phase", &self.broad_phase.name())
            .field("gravity", &self.gravity)
            .field("paused", &self.paused)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new(WorldConfig::default())
    }
}

impl World {
    /// Creates an empty world. Invalid config fields are replaced by their
    /// defaults with a warning.
    pub fn new(config: WorldConfig) -> Self {
        Self::build(config.sanitized())
    }

    /// Creates an empty world, rejecting an invalid config.
    pub fn try_new(config: WorldConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: WorldConfig) -> Self {
        Self {
            broad_phase: BroadPhase::from_config(&config.broad_phase),
            gravity: Gravity::Uniform(config.gravity),
            config,
            bodies: Vec::new(),
            accumulator: 0.0,
            elapsed: 0.0,
            paused: false,
            listener: None,
            stats: StepStats::default(),
            pairs: Vec::new(),
        }
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Bodies
    // ------------------------------------------------------------------

    /// Adds a body and returns its id.
    pub fn add_body(&mut self, shape: Shape, desc: BodyDesc) -> BodyId {
        let id = BodyId::new(self.bodies.len() as u32);
        let body = RigidBody::new(id, shape, &desc, self.config.aabb_margin);
        self.broad_phase.insert(id, body.aabb());
        tracing::debug!(
            "added body {} ({:?}, static: {}) at {}",
            id,
            body.shape(),
            body.is_static(),
            body.position()
        );
        self.bodies.push(body);
        id
    }

    pub fn add_sphere(&mut self, radius: f32, desc: BodyDesc) -> BodyId {
        self.add_body(Shape::Sphere { radius }, desc)
    }

    pub fn add_box(&mut self, half_extents: Vec3, desc: BodyDesc) -> BodyId {
        self.add_body(Shape::OrientedBox { half_extents }, desc)
    }

    pub fn body(&self, id: BodyId) -> Option<&RigidBody> {
        self.bodies.get(id.index())
    }

    /// Mutable access to a body. Changes to its transform reach the broad
    /// phase at the start of the next sub-step.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut RigidBody> {
        self.bodies.get_mut(id.index())
    }

    pub fn bodies(&self) -> &[RigidBody] {
        &self.bodies
    }

    pub fn len(&self) -> usize {
        self.bodies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bodies.is_empty()
    }

    pub fn broad_phase(&self) -> &BroadPhase {
        &self.broad_phase
    }

    /// Total kinetic energy of all bodies.
    pub fn kinetic_energy(&self) -> f32 {
        self.bodies.iter().map(RigidBody::kinetic_energy).sum()
    }

    /// Replaces the contents of `out` with one transform per body, in id
    /// order. `bytemuck::cast_slice(&out)` gives the raw bytes.
    pub fn write_transforms(&self, out: &mut Vec<BodyTransform>) {
        out.clear();
        out.extend(
            self.bodies
                .iter()
                .map(|b| BodyTransform::new(b.position(), b.orientation())),
        );
    }

    // ------------------------------------------------------------------
    // Gravity
    // ------------------------------------------------------------------

    pub fn gravity(&self) -> Gravity {
        self.gravity
    }

    /// Switches to uniform gravity.
    pub fn set_gravity(&mut self, gravity: Vec3) {
        tracing::debug!("gravity set to {}", gravity);
        self.gravity = Gravity::Uniform(gravity);
    }

    /// Switches to gravity pulling towards `center` with `strength` m/s².
    pub fn set_radial_gravity(&mut self, center: Vec3, strength: f32) {
        tracing::debug!("radial gravity towards {} ({} m/s²)", center, strength);
        self.gravity = Gravity::Radial { center, strength };
    }

    // ------------------------------------------------------------------
    // Running state
    // ------------------------------------------------------------------

    pub fn pause(&mut self) {
        if !self.paused {
            tracing::debug!("simulation paused");
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        if self.paused {
            tracing::debug!("simulation resumed");
            self.paused = false;
        }
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Simulated time so far (seconds).
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Installs the hook called for every resolved contact.
    pub fn set_collision_listener(&mut self, listener: impl CollisionListener + 'static) {
        self.listener = Some(Box::new(listener));
    }

    pub fn clear_collision_listener(&mut self) {
        self.listener = None;
    }

    /// Counters from the last `step` or `substep` call.
    pub fn last_step_stats(&self) -> StepStats {
        self.stats
    }

    // ------------------------------------------------------------------
    // Stepping
    // ------------------------------------------------------------------

    /// Advances the simulation by a frame of `frame_dt` seconds.
    ///
    /// The delta is clamped to `[0, max_frame_time]` and added to the
    /// accumulator, which is then drained in fixed sub-steps. While paused
    /// the accumulated time is dropped without simulating. Returns the number of
    /// sub-steps simulated.
    pub fn step(&mut self, frame_dt: f32) -> u32 {
        let frame_dt = if frame_dt.is_finite() {
            frame_dt.max(0.0).min(self.config.max_frame_time)
        } else {
            0.0
        };
        self.accumulator += frame_dt;

        let dt = self.config.fixed_time_step;
        let mut stats = StepStats::default();

        if self.paused {
            self.accumulator = 0.0;
            self.stats = stats;
            return 0;
        }

        while self.accumulator + dt * ACCUMULATOR_SLACK >= dt {
            self.accumulator -= dt;
            self.run_substep(dt, &mut stats);
        }
        self.accumulator = self.accumulator.max(0.0);

        self.stats = stats;
        stats.substeps
    }

    /// Runs exactly one physics sub-step of `dt` seconds, paused or not.
    pub fn substep(&mut self, dt: f32) {
        let mut stats = StepStats::default();
        self.run_substep(dt, &mut stats);
        self.stats = stats;
    }

    fn run_substep(&mut self, dt: f32, stats: &mut StepStats) {
        for body in &mut self.bodies {
            if !body.is_static() {
                let acceleration = self.gravity.acceleration_at(body.position());
                body.integrate(acceleration, dt);
            }
            body.refresh();
            self.broad_phase.update(body.id(), body.aabb());
        }

        self.broad_phase.collect_pairs(&mut self.pairs);

        let epsilon = self.config.contact_epsilon;
        let mut candidates = 0;
        let mut contacts = 0;
        let mut skipped = 0;

        for &(id_a, id_b) in &self.pairs {
            let Some((a, b)) = pair_mut(&mut self.bodies, id_a.index(), id_b.index()) else {
                continue;
            };
            if a.is_static() && b.is_static() {
                continue;
            }
            candidates += 1;

            let Some(contact) = collide(a.collider(), b.collider()) else {
                continue;
            };
            if contact.depth <= epsilon {
                continue;
            }

            if resolve_with_epsilon(a, b, &contact, epsilon) {
                contacts += 1;
                if let Some(listener) = self.listener.as_mut() {
                    listener.on_collision(a, b, &contact);
                }
            } else {
                skipped += 1;
            }
        }

        tracing::trace!(
            "substep: {} candidate pairs, {} contacts, {} skipped",
            candidates,
            contacts,
            skipped
        );

        self.elapsed += f64::from(dt);
        stats.substeps += 1;
        stats.candidate_pairs += candidates;
        stats.contacts += contacts;
        stats.skipped_contacts += skipped;
    }
}
