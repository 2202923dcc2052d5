//! Collision shapes and their world-space colliders
//!
//! A body owns a [`Shape`] (the local description supplied at creation) and a
//! [`Collider`] (the shape placed in the world by the body's transform). The
//! collider is rebuilt from scratch every time the body moves: box vertices,
//! face planes and axes are derived from the transform, never patched
//! incrementally.
//!
//! # Ray-Box Intersection
//!
//! Oriented boxes answer ray queries by moving the ray into the box's local
//! frame and running the slab method against the axis-aligned half-extents.

use glam::{Mat3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::types::Aabb;

/// Local collision geometry of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    /// Sphere centered on the body origin
    Sphere { radius: f32 },
    /// Box centered on the body origin, aligned to the body axes
    OrientedBox { half_extents: Vec3 },
}

impl Shape {
    /// Enclosed volume (used to derive mass from density).
    pub fn volume(&self) -> f32 {
        match *self {
            Shape::Sphere { radius } => 4.0 / 3.0 * std::f32::consts::PI * radius.powi(3),
            Shape::OrientedBox { half_extents } => 8.0 * half_extents.x * half_extents.y * half_extents.z,
        }
    }

    /// Diagonal of the body-local inertia tensor for a solid body of `mass`.
    ///
    /// Sphere: `0.4 * m * r²` per axis.
    /// Box with full sizes w, h, d: `m/12 * (h² + d², w² + d², w² + h²)`.
    pub fn principal_inertia(&self, mass: f32) -> Vec3 {
        match *self {
            Shape::Sphere { radius } => Vec3::splat(0.4 * mass * radius * radius),
            Shape::OrientedBox { half_extents } => {
                let size = half_extents * 2.0;
                let (w2, h2, d2) = (size.x * size.x, size.y * size.y, size.z * size.z);
                Vec3::new(h2 + d2, w2 + d2, w2 + h2) * (mass / 12.0)
            }
        }
    }

    /// Places the shape in the world.
    pub fn collider(&self, position: Vec3, orientation: Quat) -> Collider {
        match *self {
            Shape::Sphere { radius } => Collider::Sphere(SphereCollider {
                center: position,
                radius,
            }),
            Shape::OrientedBox { half_extents } => {
                Collider::Box(Obb::new(position, half_extents, orientation))
            }
        }
    }
}

/// A shape placed in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Collider {
    Sphere(SphereCollider),
    Box(Obb),
}

impl Collider {
    /// Tight world-space bounds.
    pub fn aabb(&self) -> Aabb {
        match self {
            Collider::Sphere(sphere) => {
                Aabb::from_center_half_extents(sphere.center, Vec3::splat(sphere.radius))
            }
            Collider::Box(obb) => obb.aabb(),
        }
    }

    pub fn center(&self) -> Vec3 {
        match self {
            Collider::Sphere(sphere) => sphere.center,
            Collider::Box(obb) => obb.center,
        }
    }
}

/// World-space sphere.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereCollider {
    pub center: Vec3,
    pub radius: f32,
}

/// Plane stored as `normal · x = offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    pub fn from_normal_and_point(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            offset: normal.dot(point),
        }
    }

    /// Signed distance, positive on the side the normal points to.
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.offset
    }
}

/// One box edge expressed as a ray segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Edge {
    pub origin: Vec3,
    /// Unit direction from `origin` towards the other end
    pub direction: Vec3,
    pub length: f32,
}

impl Edge {
    pub fn end(&self) -> Vec3 {
        self.origin + self.direction * self.length
    }
}

/// Local vertex signs. Edges below index into this ordering.
const VERTEX_SIGNS: [Vec3; 8] = [
    Vec3::new(-1.0, -1.0, -1.0),
    Vec3::new(-1.0, 1.0, -1.0),
    Vec3::new(1.0, 1.0, -1.0),
    Vec3::new(1.0, -1.0, -1.0),
    Vec3::new(-1.0, -1.0, 1.0),
    Vec3::new(-1.0, 1.0, 1.0),
    Vec3::new(1.0, 1.0, 1.0),
    Vec3::new(1.0, -1.0, 1.0),
];

/// The 12 edges as (from, to) vertex indices: four corners, three edges each.
const EDGE_INDICES: [(usize, usize); 12] = [
    (1, 0),
    (1, 2),
    (1, 5),
    (3, 0),
    (3, 2),
    (3, 7),
    (4, 0),
    (4, 5),
    (4, 7),
    (6, 2),
    (6, 5),
    (6, 7),
];

/// Oriented bounding box in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Obb {
    pub center: Vec3,
    pub half_extents: Vec3,
    /// Columns are the box's local X, Y, Z axes in world space
    pub rotation: Mat3,
    /// World-space corners, cached at construction
    pub vertices: [Vec3; 8],
    /// Outward face planes in the order +X, -X, +Y, -Y, +Z, -Z
    pub faces: [Plane; 6],
}

impl Obb {
    pub fn new(center: Vec3, half_extents: Vec3, orientation: Quat) -> Self {
        let rotation = Mat3::from_quat(orientation);
        let vertices = VERTEX_SIGNS.map(|sign| center + rotation * (sign * half_extents));
        let faces = std::array::from_fn(|i| {
            let axis = rotation.col(i / 2);
            let outward = if i % 2 == 0 { axis } else { -axis };
            Plane::from_normal_and_point(outward, center + outward * half_extents[i / 2])
        });
        Self {
            center,
            half_extents,
            rotation,
            vertices,
            faces,
        }
    }

    /// The three local axes in world space.
    pub fn axes(&self) -> [Vec3; 3] {
        [self.rotation.x_axis, self.rotation.y_axis, self.rotation.z_axis]
    }

    pub fn edges(&self) -> [Edge; 12] {
        EDGE_INDICES.map(|(from, to)| {
            let delta = self.vertices[to] - self.vertices[from];
            let length = delta.length();
            Edge {
                origin: self.vertices[from],
                direction: delta / length,
                length,
            }
        })
    }

    /// World point expressed in box-local coordinates.
    pub fn to_local(&self, point: Vec3) -> Vec3 {
        self.rotation.transpose() * (point - self.center)
    }

    pub fn to_world(&self, local: Vec3) -> Vec3 {
        self.center + self.rotation * local
    }

    /// Inclusive point containment test.
    pub fn contains_point(&self, point: Vec3) -> bool {
        let local = self.to_local(point).abs();
        local.cmple(self.half_extents).all()
    }

    /// Closest point of the (solid) box to `point`.
    pub fn clamp_point(&self, point: Vec3) -> Vec3 {
        let local = self.to_local(point).clamp(-self.half_extents, self.half_extents);
        self.to_world(local)
    }

    /// First point where the ray meets the box surface.
    ///
    /// Rays starting inside the box report their exit point.
    pub fn intersect_ray(&self, origin: Vec3, direction: Vec3) -> Option<Vec3> {
        let local_origin = self.to_local(origin);
        let local_dir = self.rotation.transpose() * direction;
        let t = ray_aabb_intersect(local_origin, local_dir, -self.half_extents, self.half_extents)?;
        Some(origin + direction * t)
    }

    /// Interval covered by the box when projected on `axis`.
    pub fn project(&self, axis: Vec3) -> (f32, f32) {
        let mut min = f32::INFINITY;
        let mut max = f32::NEG_INFINITY;
        for vertex in &self.vertices {
            let d = vertex.dot(axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min, max)
    }

    /// Tight world-space bounds: `|R| * h` around the center.
    pub fn aabb(&self) -> Aabb {
        let r = self.rotation;
        let abs = Mat3::from_cols(r.x_axis.abs(), r.y_axis.abs(), r.z_axis.abs());
        Aabb::from_center_half_extents(self.center, abs * self.half_extents)
    }
}

/// Performs ray-AABB (Axis-Aligned Bounding Box) intersection test using the slab method.
///
/// The slab method works by finding the intersection of the ray with each pair of
/// axis-aligned planes that make up the AABB. If the ray enters and exits the AABB
/// at valid times (t_enter <= t_exit and t_exit >= 0), there is an intersection.
///
/// # Returns
///
/// * `Some(t)` - Distance along the ray (in units of `ray_dir`) to the hit, or to
///   the exit point when the ray starts inside
/// * `None` - No intersection or intersection is behind the ray origin
pub fn ray_aabb_intersect(ray_origin: Vec3, ray_dir: Vec3, aabb_min: Vec3, aabb_max: Vec3) -> Option<f32> {
    let mut t_min = f32::NEG_INFINITY;
    let mut t_max = f32::INFINITY;

    for axis in 0..3 {
        let origin = ray_origin[axis];
        let dir = ray_dir[axis];
        let (lo, hi) = (aabb_min[axis], aabb_max[axis]);

        if dir.abs() < 1e-10 {
            // Parallel to this slab: either always inside it or never
            if origin < lo || origin > hi {
                return None;
            }
            continue;
        }

        let inv = 1.0 / dir;
        let t1 = (lo - origin) * inv;
        let t2 = (hi - origin) * inv;
        t_min = t_min.max(t1.min(t2));
        t_max = t_max.min(t1.max(t2));
    }

    if t_max >= t_min && t_max >= 0.0 {
        if t_min >= 0.0 { Some(t_min) } else { Some(t_max) }
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ray_hits_aabb_from_front() {
        let t = ray_aabb_intersect(Vec3::new(0.0, 0.0, -5.0), Vec3::Z, Vec3::splat(-1.0), Vec3::ONE);
        let t = t.expect("ray should hit");
        assert!((t - 4.0).abs() < 0.001, "Expected t=4.0, got t={}", t);
    }

    #[test]
    fn test_ray_misses_aabb() {
        let t = ray_aabb_intersect(Vec3::new(0.0, 5.0, -5.0), Vec3::Z, Vec3::splat(-1.0), Vec3::ONE);
        assert!(t.is_none());
    }

    #[test]
    fn test_ray_starts_inside_aabb() {
        let t = ray_aabb_intersect(Vec3::ZERO, Vec3::Z, Vec3::splat(-1.0), Vec3::ONE).unwrap();
        // Should hit the exit face at z=1
        assert!((t - 1.0).abs() < 0.001, "Expected t=1.0, got t={}", t);
    }

    #[test]
    fn test_ray_aabb_behind_origin() {
        let t = ray_aabb_intersect(Vec3::new(0.0, 0.0, 5.0), Vec3::Z, Vec3::splat(-1.0), Vec3::ONE);
        assert!(t.is_none());
    }

    #[test]
    fn test_obb_vertices_axis_aligned() {
        let obb = Obb::new(Vec3::new(1.0, 2.0, 3.0), Vec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        assert_eq!(obb.vertices[0], Vec3::ZERO);
        assert_eq!(obb.vertices[6], Vec3::new(2.0, 4.0, 6.0));
        for v in &obb.vertices {
            assert!(obb.contains_point(*v), "corner {:?} must be contained", v);
        }
    }

    #[test]
    fn test_obb_edges_have_box_lengths() {
        let obb = Obb::new(Vec3::ZERO, Vec3::new(1.0, 2.0, 3.0), Quat::from_rotation_y(0.3));
        let mut lengths: Vec<f32> = obb.edges().iter().map(|e| e.length).collect();
        lengths.sort_by(|a, b| a.total_cmp(b));
        for (i, expected) in [2.0, 4.0, 6.0].iter().enumerate() {
            for l in &lengths[i * 4..i * 4 + 4] {
                assert!((l - expected).abs() < 1e-4, "edge length {} vs {}", l, expected);
            }
        }
    }

    #[test]
    fn test_obb_faces_point_outward() {
        let obb = Obb::new(Vec3::new(5.0, 0.0, 0.0), Vec3::ONE, Quat::from_rotation_z(0.7));
        for face in obb.faces {
            assert!(face.distance_to_point(obb.center) < 0.0);
            assert!((face.distance_to_point(obb.center) + 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_obb_rotated_contains_and_clamp() {
        let obb = Obb::new(Vec3::ZERO, Vec3::new(2.0, 0.5, 0.5), Quat::from_rotation_z(std::f32::consts::FRAC_PI_2));
        // Long axis now lies along world Y
        assert!(obb.contains_point(Vec3::new(0.0, 1.9, 0.0)));
        assert!(!obb.contains_point(Vec3::new(1.9, 0.0, 0.0)));
        let clamped = obb.clamp_point(Vec3::new(0.0, 10.0, 0.0));
        assert!((clamped - Vec3::new(0.0, 2.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_obb_intersect_ray_rotated() {
        let obb = Obb::new(Vec3::ZERO, Vec3::ONE, Quat::from_rotation_y(std::f32::consts::FRAC_PI_4));
        let hit = obb.intersect_ray(Vec3::new(-5.0, 0.0, 0.0), Vec3::X).unwrap();
        // The corner of a 45° rotated unit box reaches sqrt(2) along X
        assert!((hit.x + std::f32::consts::SQRT_2).abs() < 1e-4, "hit {:?}", hit);
    }

    #[test]
    fn test_obb_aabb_rotated() {
        let obb = Obb::new(Vec3::ZERO, Vec3::ONE, Quat::from_rotation_z(std::f32::consts::FRAC_PI_4));
        let aabb = obb.aabb();
        let expected = std::f32::consts::SQRT_2;
        assert!((aabb.max.x - expected).abs() < 1e-5);
        assert!((aabb.max.y - expected).abs() < 1e-5);
        assert!((aabb.max.z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_principal_inertia() {
        let sphere = Shape::Sphere { radius: 2.0 };
        assert_eq!(sphere.principal_inertia(5.0), Vec3::splat(8.0));

        let cube = Shape::OrientedBox { half_extents: Vec3::splat(0.5) };
        let i = cube.principal_inertia(12.0);
        assert!((i - Vec3::splat(2.0)).length() < 1e-6);

        let slab = Shape::OrientedBox { half_extents: Vec3::new(1.0, 0.5, 1.5) };
        let i = slab.principal_inertia(12.0);
        // w=2, h=1, d=3
        assert_eq!(i, Vec3::new(1.0 + 9.0, 4.0 + 9.0, 4.0 + 1.0));
    }
}
