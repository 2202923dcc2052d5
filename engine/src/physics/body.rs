//! Rigid bodies and their construction parameters
//!
//! A [`RigidBody`] owns its transform, velocities, mass properties, material
//! and the world-space collider/bounds derived from its [`Shape`]. Bodies are
//! created from a [`BodyDesc`] which is sanitised on the way in: out of range
//! materials are clamped with a warning instead of failing.

use std::fmt;

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::shape::{Collider, Shape};
use super::types::Aabb;

/// Smallest mass a dynamic body may have.
pub const MIN_DYNAMIC_MASS: f32 = 0.001;

/// Handle of a body inside a [`World`](super::world::World).
///
/// Ids are dense indices in insertion order and are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(u32);

impl BodyId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BodyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Everything needed to create a body besides its shape.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BodyDesc {
    /// Initial world position (meters)
    pub position: Vec3,
    /// Initial orientation
    pub orientation: Quat,
    /// Initial linear velocity (m/s)
    pub velocity: Vec3,
    /// Initial angular velocity (rad/s, world frame)
    pub angular_velocity: Vec3,
    /// Mass in kg. Ignored when `density` is set or the body is static.
    pub mass: f32,
    /// If set, mass is `density * volume`
    pub density: Option<f32>,
    /// Bounciness in [0, 1]
    pub restitution: f32,
    /// Coulomb friction coefficient in [0, 1]
    pub friction: f32,
    /// Static bodies have infinite mass and never move
    pub is_static: bool,
}

impl Default for BodyDesc {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass: 1.0,
            density: None,
            restitution: 0.5,
            friction: 0.5,
            is_static: false,
        }
    }
}

impl BodyDesc {
    /// Descriptor for an immovable body at `position`.
    pub fn fixed(position: Vec3) -> Self {
        Self {
            position,
            is_static: true,
            ..Default::default()
        }
    }

    /// Descriptor for a dynamic body of `mass` at `position`.
    pub fn dynamic(position: Vec3, mass: f32) -> Self {
        Self {
            position,
            mass,
            ..Default::default()
        }
    }

    pub fn with_velocity(mut self, velocity: Vec3) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, angular_velocity: Vec3) -> Self {
        self.angular_velocity = angular_velocity;
        self
    }

    pub fn with_orientation(mut self, orientation: Quat) -> Self {
        self.orientation = orientation;
        self
    }

    pub fn with_material(mut self, restitution: f32, friction: f32) -> Self {
        self.restitution = restitution;
        self.friction = friction;
        self
    }

    pub fn with_density(mut self, density: f32) -> Self {
        self.density = Some(density);
        self
    }
}

/// Clamps a material coefficient into [0, 1], warning when it had to.
fn clamp_unit(name: &str, value: f32) -> f32 {
    if !(0.0..=1.0).contains(&value) {
        let clamped = if value.is_nan() { 0.0 } else { value.max(0.0).min(1.0) };
        tracing::warn!("{} {} outside [0, 1], clamped to {}", name, value, clamped);
        return clamped;
    }
    value
}

/// Replaces non-positive or non-finite shape dimensions with a tiny size.
fn sanitize_shape(shape: Shape) -> Shape {
    const MIN_SIZE: f32 = 1e-3;
    match shape {
        Shape::Sphere { radius } if !(radius.is_finite() && radius > 0.0) => {
            tracing::warn!("sphere radius {} is not positive, using {}", radius, MIN_SIZE);
            Shape::Sphere { radius: MIN_SIZE }
        }
        Shape::OrientedBox { half_extents }
            if !(half_extents.is_finite() && half_extents.cmpgt(Vec3::ZERO).all()) =>
        {
            let fix = |v: f32| if v.is_finite() && v > 0.0 { v } else { MIN_SIZE };
            let fixed = Vec3::new(fix(half_extents.x), fix(half_extents.y), fix(half_extents.z));
            tracing::warn!("box half extents {} not positive, using {}", half_extents, fixed);
            Shape::OrientedBox { half_extents: fixed }
        }
        other => other,
    }
}

/// A simulated body.
#[derive(Debug, Clone, PartialEq)]
pub struct RigidBody {
    id: BodyId,
    shape: Shape,
    /// Center of mass in world space
    position: Vec3,
    orientation: Quat,
    velocity: Vec3,
    /// Angular velocity in the world frame (rad/s)
    angular_velocity: Vec3,
    inverse_mass: f32,
    /// Body-local inverse inertia tensor
    inverse_inertia: Mat3,
    restitution: f32,
    friction: f32,
    is_static: bool,
    aabb_margin: f32,
    collider: Collider,
    aabb: Aabb,
}

impl RigidBody {
    /// Builds a body, clamping invalid parameters.
    ///
    /// `aabb_margin` fattens the world bounds reported to the broad phase.
    pub fn new(id: BodyId, shape: Shape, desc: &BodyDesc, aabb_margin: f32) -> Self {
        let shape = sanitize_shape(shape);
        let restitution = clamp_unit("restitution", desc.restitution);
        let friction = clamp_unit("friction", desc.friction);

        let (inverse_mass, inverse_inertia) = if desc.is_static {
            (0.0, Mat3::ZERO)
        } else {
            let mass = Self::dynamic_mass(&shape, desc);
            let inertia = shape.principal_inertia(mass);
            (1.0 / mass, Mat3::from_diagonal(inertia.recip()))
        };

        let orientation = if desc.orientation.is_finite() && desc.orientation.length_squared() > 0.0 {
            desc.orientation.normalize()
        } else {
            tracing::warn!("body {} has an invalid orientation, using identity", id);
            Quat::IDENTITY
        };

        let collider = shape.collider(desc.position, orientation);
        let aabb = collider.aabb().expanded(aabb_margin);

        Self {
            id,
            shape,
            position: desc.position,
            orientation,
            velocity: if desc.is_static { Vec3::ZERO } else { desc.velocity },
            angular_velocity: if desc.is_static { Vec3::ZERO } else { desc.angular_velocity },
            inverse_mass,
            inverse_inertia,
            restitution,
            friction,
            is_static: desc.is_static,
            aabb_margin,
            collider,
            aabb,
        }
    }

    fn dynamic_mass(shape: &Shape, desc: &BodyDesc) -> f32 {
        let mass = match desc.density {
            Some(density) => {
                let density = if density < 0.0 || density.is_nan() {
                    tracing::warn!("density {} is negative, clamped to 0", density);
                    0.0
                } else {
                    density
                };
                density * shape.volume()
            }
            None => desc.mass,
        };

        if !(mass.is_finite() && mass >= MIN_DYNAMIC_MASS) {
            tracing::warn!("dynamic body mass {} too small, using {}", mass, MIN_DYNAMIC_MASS);
            return MIN_DYNAMIC_MASS;
        }
        mass
    }

    pub fn id(&self) -> BodyId {
        self.id
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Center of mass in world space.
    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn orientation(&self) -> Quat {
        self.orientation
    }

    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    /// Angular velocity in the world frame (rad/s).
    pub fn angular_velocity(&self) -> Vec3 {
        self.angular_velocity
    }

    pub fn inverse_mass(&self) -> f32 {
        self.inverse_mass
    }

    /// Mass in kg, infinite for static bodies.
    pub fn mass(&self) -> f32 {
        if self.inverse_mass > 0.0 {
            1.0 / self.inverse_mass
        } else {
            f32::INFINITY
        }
    }

    /// Inverse inertia tensor in body space.
    pub fn inverse_inertia(&self) -> Mat3 {
        self.inverse_inertia
    }

    /// Inverse inertia tensor rotated into world space: `R * I⁻¹ * Rᵀ`.
    pub fn inverse_inertia_world(&self) -> Mat3 {
        let rotation = Mat3::from_quat(self.orientation);
        rotation * self.inverse_inertia * rotation.transpose()
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// World-space collider as of the last refresh.
    pub fn collider(&self) -> &Collider {
        &self.collider
    }

    /// Fattened world bounds as of the last refresh.
    pub fn aabb(&self) -> Aabb {
        self.aabb
    }

    /// Velocity of the material point at world position `point`.
    pub fn velocity_at(&self, point: Vec3) -> Vec3 {
        self.velocity + self.angular_velocity.cross(point - self.position)
    }

    /// Kinetic energy (linear plus rotational).
    pub fn kinetic_energy(&self) -> f32 {
        if self.is_static {
            return 0.0;
        }
        let linear = 0.5 * self.mass() * self.velocity.length_squared();
        let inertia = self.inverse_inertia_world().inverse();
        let angular = 0.5 * self.angular_velocity.dot(inertia * self.angular_velocity);
        linear + angular
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.refresh();
    }

    pub fn set_orientation(&mut self, orientation: Quat) {
        self.orientation = orientation.normalize();
        self.refresh();
    }

    /// Sets the linear velocity. Ignored for static bodies.
    pub fn set_velocity(&mut self, velocity: Vec3) {
        if !self.is_static {
            self.velocity = velocity;
        }
    }

    /// Sets the angular velocity. Ignored for static bodies.
    pub fn set_angular_velocity(&mut self, angular_velocity: Vec3) {
        if !self.is_static {
            self.angular_velocity = angular_velocity;
        }
    }

    /// Applies an impulse at a world-space point.
    pub fn apply_impulse(&mut self, impulse: Vec3, point: Vec3) {
        if self.is_static {
            return;
        }
        self.velocity += impulse * self.inverse_mass;
        let arm = point - self.position;
        self.angular_velocity += self.inverse_inertia_world() * arm.cross(impulse);
    }

    /// Advances position and orientation by `dt` under `acceleration`.
    ///
    /// Semi-implicit Euler: velocity first, then position.
    pub fn integrate(&mut self, acceleration: Vec3, dt: f32) {
        if self.is_static {
            return;
        }
        self.velocity += acceleration * dt;
        self.position += self.velocity * dt;

        let spin = self.angular_velocity * dt;
        let angle = spin.length();
        if angle > 0.0 {
            let delta = Quat::from_axis_angle(spin / angle, angle);
            self.orientation = (delta * self.orientation).normalize();
        }
    }

    /// Recomputes the world collider and fattened bounds from the transform.
    pub fn refresh(&mut self) {
        self.collider = self.shape.collider(self.position, self.orientation);
        self.aabb = self.collider.aabb().expanded(self.aabb_margin);
    }
}
