//! Narrow-phase collision detection
//!
//! Exact tests between two world-space colliders. Every test either reports
//! "no collision" or a single [`Contact`]: a world-space point, a unit normal
//! pointing from the second collider towards the first, and a penetration
//! depth.
//!
//! # Box-Box
//!
//! Oriented boxes use the separating-axis test over 15 candidate axes (three
//! face axes per box plus the nine pairwise cross products). The axis with
//! the smallest overlap becomes the contact normal and that overlap the
//! depth. The contact point is then classified:
//!
//! - **vertex** case: corners of one box lie inside the other; the point is
//!   the middle of those corners (one corner, the midpoint of two, or the
//!   midpoint of the farthest pair).
//! - **edge** case: no corner is inside; the point is the average of the
//!   segments where box edges pass through the other box.
//!
//! # Example
//!
//! ```ignore
//! use rigid_fiz_engine::physics::{Shape, collide};
//! use glam::{Quat, Vec3};
//!
//! let a = Shape::Sphere { radius: 1.0 }.collider(Vec3::ZERO, Quat::IDENTITY);
//! let b = Shape::Sphere { radius: 1.0 }.collider(Vec3::new(1.5, 0.0, 0.0), Quat::IDENTITY);
//!
//! if let Some(contact) = collide(&a, &b) {
//!     println!("depth {} along {:?}", contact.depth, contact.normal);
//! }
//! ```

use glam::Vec3;

use super::shape::{Collider, Obb, SphereCollider};

/// Contacts this shallow count as touching, not colliding.
pub const CONTACT_EPSILON: f32 = 1e-10;

/// Cross products shorter than this (squared) come from parallel axes.
const PARALLEL_AXIS_EPSILON: f32 = 1e-6;

/// Result of a narrow-phase test between two colliders.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Contact {
    /// World-space contact position
    pub point: Vec3,
    /// Unit normal pointing from the second collider towards the first
    pub normal: Vec3,
    /// Penetration depth along `normal` (positive = penetrating)
    pub depth: f32,
}

impl Contact {
    pub fn new(point: Vec3, normal: Vec3, depth: f32) -> Self {
        Self {
            point,
            normal,
            depth,
        }
    }

    /// The same contact seen from the other collider.
    pub fn flipped(&self) -> Self {
        Self {
            point: self.point,
            normal: -self.normal,
            depth: self.depth,
        }
    }

    /// True if every component is finite.
    pub fn is_finite(&self) -> bool {
        self.point.is_finite() && self.normal.is_finite() && self.depth.is_finite()
    }
}

/// Tests two colliders and generates a contact if they penetrate.
///
/// The returned normal points from `b` towards `a`.
pub fn collide(a: &Collider, b: &Collider) -> Option<Contact> {
    let contact = match (a, b) {
        (Collider::Sphere(sa), Collider::Sphere(sb)) => sphere_sphere(sa, sb),
        (Collider::Sphere(sphere), Collider::Box(obb)) => sphere_box(sphere, obb),
        (Collider::Box(obb), Collider::Sphere(sphere)) => sphere_box(sphere, obb).map(|c| c.flipped()),
        (Collider::Box(oa), Collider::Box(ob)) => box_box(oa, ob),
    }?;

    if contact.depth <= CONTACT_EPSILON {
        return None;
    }
    Some(contact)
}

/// Sphere against sphere. The normal points from `b` towards `a`.
pub fn sphere_sphere(a: &SphereCollider, b: &SphereCollider) -> Option<Contact> {
    let delta = a.center - b.center;
    let distance = delta.length();
    let radii = a.radius + b.radius;
    if distance >= radii {
        return None;
    }

    let normal = delta.try_normalize().unwrap_or_else(|| concentric_normal(a.radius, b.radius));
    let point = b.center + normal * (distance * b.radius / radii);
    Some(Contact::new(point, normal, radii - distance))
}

/// Push direction for spheres sharing a center: the larger one goes up, so
/// swapping the arguments flips the normal. Identical spheres get `+Y` both
/// ways.
fn concentric_normal(radius_a: f32, radius_b: f32) -> Vec3 {
    if radius_a < radius_b { Vec3::NEG_Y } else { Vec3::Y }
}

/// Sphere against box. The normal points from the box towards the sphere.
pub fn sphere_box(sphere: &SphereCollider, obb: &Obb) -> Option<Contact> {
    let closest = obb.clamp_point(sphere.center);
    let delta = sphere.center - closest;
    let distance = delta.length();

    if distance > 1e-6 {
        if distance >= sphere.radius {
            return None;
        }
        return Some(Contact::new(closest, delta / distance, sphere.radius - distance));
    }

    // Center inside the box: push out through the nearest face, where the
    // signed distance is closest to zero
    let mut nearest = obb.faces[0];
    let mut nearest_distance = nearest.distance_to_point(sphere.center);
    for face in &obb.faces[1..] {
        let distance = face.distance_to_point(sphere.center);
        if distance > nearest_distance {
            nearest = *face;
            nearest_distance = distance;
        }
    }
    let room = -nearest_distance;
    let point = sphere.center + nearest.normal * room;
    Some(Contact::new(point, nearest.normal, sphere.radius + room))
}

/// Box against box. The normal points from `b` towards `a`.
pub fn box_box(a: &Obb, b: &Obb) -> Option<Contact> {
    let (axis, depth) = min_overlap_axis(a, b)?;
    if depth <= CONTACT_EPSILON {
        return None;
    }

    let normal = if axis.dot(a.center - b.center) < 0.0 { -axis } else { axis };

    let point = vertex_contact_point(a, b)
        .or_else(|| edge_contact_point(a, b))
        .unwrap_or_else(|| {
            tracing::debug!("box-box overlap without vertex or edge crossings; using closest points");
            (a.clamp_point(b.center) + b.clamp_point(a.center)) * 0.5
        });

    Some(Contact::new(point, normal, depth))
}

/// Separating-axis search. Returns the axis of least overlap and the overlap
/// length, or `None` if some axis separates the boxes.
pub fn min_overlap_axis(a: &Obb, b: &Obb) -> Option<(Vec3, f32)> {
    let axes_a = a.axes();
    let axes_b = b.axes();

    let mut best_axis = Vec3::ZERO;
    let mut best_depth = f32::INFINITY;

    let mut test = |axis: Vec3| -> bool {
        let (min_a, max_a) = a.project(axis);
        let (min_b, max_b) = b.project(axis);
        let overlap = (max_a - min_b).min(max_b - min_a);
        if overlap < 0.0 {
            return false;
        }
        if overlap < best_depth {
            best_depth = overlap;
            best_axis = axis;
        }
        true
    };

    for axis in axes_a.iter().chain(axes_b.iter()) {
        if !test(*axis) {
            return None;
        }
    }
    for axis_a in &axes_a {
        for axis_b in &axes_b {
            let cross = axis_a.cross(*axis_b);
            let len_sq = cross.length_squared();
            if len_sq < PARALLEL_AXIS_EPSILON {
                continue;
            }
            if !test(cross / len_sq.sqrt()) {
                return None;
            }
        }
    }

    Some((best_axis, best_depth))
}

/// Corners of `of` lying inside `inside`, packed at the front of the array.
fn contained_vertices(of: &Obb, inside: &Obb) -> ([Vec3; 8], usize) {
    let mut found = [Vec3::ZERO; 8];
    let mut count = 0;
    for vertex in &of.vertices {
        if inside.contains_point(*vertex) {
            found[count] = *vertex;
            count += 1;
        }
    }
    (found, count)
}

/// Middle of a cluster of contained corners.
fn vertex_cluster_point(points: &[Vec3]) -> Vec3 {
    match points {
        [p] => *p,
        [p, q] => (*p + *q) * 0.5,
        _ => {
            let mut best = (points[0], points[1]);
            let mut best_dist = f32::NEG_INFINITY;
            for (i, p) in points.iter().enumerate() {
                for q in &points[i + 1..] {
                    let dist = p.distance_squared(*q);
                    if dist > best_dist {
                        best_dist = dist;
                        best = (*p, *q);
                    }
                }
            }
            (best.0 + best.1) * 0.5
        }
    }
}

/// Vertex case: corners of `a` inside `b` take precedence over corners of `b`
/// inside `a`.
fn vertex_contact_point(a: &Obb, b: &Obb) -> Option<Vec3> {
    let (in_b, count_a) = contained_vertices(a, b);
    if count_a > 0 {
        return Some(vertex_cluster_point(&in_b[..count_a]));
    }
    let (in_a, count_b) = contained_vertices(b, a);
    if count_b > 0 {
        return Some(vertex_cluster_point(&in_a[..count_b]));
    }
    None
}

/// Sum of the midpoints of every edge of `of` that passes through `against`,
/// and how many edges did.
fn edge_crossings(of: &Obb, against: &Obb) -> (Vec3, usize) {
    let mut sum = Vec3::ZERO;
    let mut count = 0;
    for edge in of.edges() {
        let Some(entry) = against.intersect_ray(edge.origin, edge.direction) else {
            continue;
        };
        if edge.origin.distance(entry) > edge.length {
            continue;
        }
        // Walking the edge backwards finds where it leaves the box
        let Some(exit) = against.intersect_ray(edge.end(), -edge.direction) else {
            continue;
        };
        sum += (entry + exit) * 0.5;
        count += 1;
    }
    (sum, count)
}

/// Edge case: average crossing midpoint of the box with fewer crossing edges.
fn edge_contact_point(a: &Obb, b: &Obb) -> Option<Vec3> {
    let (sum_a, count_a) = edge_crossings(a, b);
    let (sum_b, count_b) = edge_crossings(b, a);

    let (sum, count) = match (count_a, count_b) {
        (0, 0) => return None,
        (0, _) => (sum_b, count_b),
        (_, 0) => (sum_a, count_a),
        _ if count_a > count_b => (sum_b, count_b),
        _ => (sum_a, count_a),
    };
    Some(sum / count as f32)
}
