//! Contact resolution (sequential impulse, one contact at a time)
//!
//! [`resolve`] turns a single [`Contact`] between two bodies into:
//!
//! 1. a normal impulse with restitution (average of both bodies),
//! 2. a Coulomb friction impulse along the sliding direction, box-clamped
//!    to `friction * j`,
//! 3. a positional correction that removes the penetration, split evenly
//!    between two dynamic bodies and given entirely to the dynamic one
//!    otherwise.
//!
//! Static bodies have zero inverse mass and inertia and are never touched.

use glam::Vec3;

use super::body::RigidBody;
use super::collision::{CONTACT_EPSILON, Contact};

/// Tangential speeds below this are treated as no sliding.
const MIN_TANGENT_SPEED: f32 = 1e-6;

/// Resolves `contact` between `a` and `b` using the default touching
/// threshold. See [`resolve_with_epsilon`].
pub fn resolve(a: &mut RigidBody, b: &mut RigidBody, contact: &Contact) -> bool {
    resolve_with_epsilon(a, b, contact, CONTACT_EPSILON)
}

/// Resolves `contact` between `a` and `b`.
///
/// The contact normal must point from `b` towards `a`. Returns `false`
/// without touching either body if the contact is not finite, not deeper
/// than `epsilon`, or both bodies are static.
pub fn resolve_with_epsilon(a: &mut RigidBody, b: &mut RigidBody, contact: &Contact, epsilon: f32) -> bool {
    if !contact.is_finite() {
        tracing::warn!(
            "skipping invalid contact between {} and {}: {:?}",
            a.id(),
            b.id(),
            contact
        );
        return false;
    }
    if contact.depth <= epsilon || (a.is_static() && b.is_static()) {
        return false;
    }
    let normal = contact.normal.normalize_or_zero();
    if normal == Vec3::ZERO {
        tracing::warn!("skipping contact between {} and {} with zero normal", a.id(), b.id());
        return false;
    }

    let j = apply_normal_impulse(a, b, contact.point, normal);
    if j > 0.0 {
        apply_friction_impulse(a, b, contact.point, normal, j);
    }
    correct_position(a, b, normal, contact.depth);
    true
}

/// Relative velocity of `a` against `b` at `point`.
fn relative_velocity(a: &RigidBody, b: &RigidBody, point: Vec3) -> Vec3 {
    a.velocity_at(point) - b.velocity_at(point)
}

/// Angular part of the effective mass along `direction` for one body:
/// `direction · ((I⁻¹ (r × direction)) × r)`.
fn angular_term(body: &RigidBody, point: Vec3, direction: Vec3) -> f32 {
    if body.is_static() {
        return 0.0;
    }
    let r = point - body.position();
    let rotated = body.inverse_inertia_world() * r.cross(direction);
    direction.dot(rotated.cross(r))
}

fn apply_impulse_pair(a: &mut RigidBody, b: &mut RigidBody, impulse: Vec3, point: Vec3) {
    a.apply_impulse(impulse, point);
    b.apply_impulse(-impulse, point);
}

/// Applies the restitution impulse along `normal` and returns its magnitude.
///
/// Contacts that are already separating get no impulse.
fn apply_normal_impulse(a: &mut RigidBody, b: &mut RigidBody, point: Vec3, normal: Vec3) -> f32 {
    let approach = relative_velocity(a, b, point).dot(normal);
    if approach > 0.0 {
        return 0.0;
    }

    let restitution = (a.restitution() + b.restitution()) * 0.5;
    let denominator = a.inverse_mass()
        + b.inverse_mass()
        + angular_term(a, point, normal)
        + angular_term(b, point, normal);
    if denominator <= 0.0 {
        return 0.0;
    }

    let j = -(1.0 + restitution) * approach / denominator;
    apply_impulse_pair(a, b, normal * j, point);
    j
}

fn apply_friction_impulse(a: &mut RigidBody, b: &mut RigidBody, point: Vec3, normal: Vec3, j: f32) {
    let relative = relative_velocity(a, b, point);
    let sliding = relative - normal * relative.dot(normal);
    let speed = sliding.length();
    if speed < MIN_TANGENT_SPEED {
        return;
    }
    let tangent = sliding / speed;

    let denominator = a.inverse_mass()
        + b.inverse_mass()
        + angular_term(a, point, tangent)
        + angular_term(b, point, tangent);
    if denominator <= 0.0 {
        return;
    }

    let friction = (a.friction() + b.friction()) * 0.5;
    let limit = friction * j;
    let jt = (-speed / denominator).max(-limit).min(limit);
    apply_impulse_pair(a, b, tangent * jt, point);
}

/// Pushes the bodies apart along `normal` by `depth`.
fn correct_position(a: &mut RigidBody, b: &mut RigidBody, normal: Vec3, depth: f32) {
    let (share_a, share_b) = match (a.is_static(), b.is_static()) {
        (false, false) => (0.5, 0.5),
        (false, true) => (1.0, 0.0),
        (true, false) => (0.0, 1.0),
        (true, true) => return,
    };
    if share_a > 0.0 {
        a.set_position(a.position() + normal * (depth * share_a));
    }
    if share_b > 0.0 {
        b.set_position(b.position() - normal * (depth * share_b));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::body::{BodyDesc, BodyId};
    use crate::physics::collision::collide;
    use crate::physics::shape::Shape;

    fn ball(id: u32, desc: BodyDesc) -> RigidBody {
        RigidBody::new(BodyId::new(id), Shape::Sphere { radius: 1.0 }, &desc, 0.0)
    }

    fn contact_between(a: &RigidBody, b: &RigidBody) -> Contact {
        collide(a.collider(), b.collider()).expect("bodies should touch")
    }

    #[test]
    fn test_elastic_head_on_exchange() {
        let mut a = ball(0, BodyDesc::dynamic(Vec3::new(-0.9, 0.0, 0.0), 1.0)
            .with_velocity(Vec3::new(3.0, 0.0, 0.0))
            .with_material(1.0, 0.0));
        let mut b = ball(1, BodyDesc::dynamic(Vec3::new(0.9, 0.0, 0.0), 1.0)
            .with_velocity(Vec3::new(-1.0, 0.0, 0.0))
            .with_material(1.0, 0.0));

        let contact = contact_between(&a, &b);
        assert!(resolve(&mut a, &mut b, &contact));

        assert!((a.velocity().x + 1.0).abs() < 1e-5, "a should take b's velocity, got {}", a.velocity().x);
        assert!((b.velocity().x - 3.0).abs() < 1e-5, "b should take a's velocity, got {}", b.velocity().x);
        assert!(a.angular_velocity().length() < 1e-6);
    }

    #[test]
    fn test_positional_correction_separates() {
        let mut a = ball(0, BodyDesc::dynamic(Vec3::new(0.0, 1.5, 0.0), 1.0));
        let mut b = ball(1, BodyDesc::dynamic(Vec3::ZERO, 1.0));
        let contact = contact_between(&a, &b);
        resolve(&mut a, &mut b, &contact);

        let separation = (a.position() - b.position()).dot(contact.normal) - 2.0;
        assert!(separation >= -1e-5, "still penetrating by {}", -separation);
        // Even split between two dynamic bodies
        assert!((a.position().y - 1.75).abs() < 1e-5);
        assert!((b.position().y + 0.25).abs() < 1e-5);
    }

    #[test]
    fn test_static_body_untouched() {
        let mut ball_body = ball(0, BodyDesc::dynamic(Vec3::new(0.0, 1.8, 0.0), 1.0)
            .with_velocity(Vec3::new(0.0, -4.0, 0.0)));
        let floor_shape = Shape::OrientedBox {
            half_extents: Vec3::new(10.0, 1.0, 10.0),
        };
        let mut floor = RigidBody::new(BodyId::new(1), floor_shape, &BodyDesc::fixed(Vec3::ZERO), 0.0);

        let contact = contact_between(&ball_body, &floor);
        assert!(resolve(&mut ball_body, &mut floor, &contact));

        assert_eq!(floor.position(), Vec3::ZERO);
        assert_eq!(floor.velocity(), Vec3::ZERO);
        assert_eq!(floor.angular_velocity(), Vec3::ZERO);
        assert!(ball_body.velocity().y > 0.0, "ball should bounce, vy = {}", ball_body.velocity().y);
        assert!((ball_body.position().y - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_invalid_contact_is_noop() {
        let mut a = ball(0, BodyDesc::dynamic(Vec3::ZERO, 1.0).with_velocity(Vec3::X));
        let mut b = ball(1, BodyDesc::dynamic(Vec3::new(1.0, 0.0, 0.0), 1.0));
        let before = (a.clone(), b.clone());

        let bad = Contact::new(Vec3::ZERO, Vec3::X, f32::NAN);
        assert!(!resolve(&mut a, &mut b, &bad));
        let infinite = Contact::new(Vec3::ZERO, Vec3::X, f32::INFINITY);
        assert!(!resolve(&mut a, &mut b, &infinite));
        let touching = Contact::new(Vec3::ZERO, Vec3::X, 1e-12);
        assert!(!resolve(&mut a, &mut b, &touching));

        assert_eq!(before, (a, b));
    }

    #[test]
    fn test_separating_contact_only_corrects_position() {
        let mut a = ball(0, BodyDesc::dynamic(Vec3::new(0.0, 1.5, 0.0), 1.0)
            .with_velocity(Vec3::new(0.0, 2.0, 0.0)));
        let mut b = ball(1, BodyDesc::dynamic(Vec3::ZERO, 1.0));
        let contact = contact_between(&a, &b);
        resolve(&mut a, &mut b, &contact);
        assert_eq!(a.velocity(), Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(b.velocity(), Vec3::ZERO);
    }

    #[test]
    fn test_friction_bounded_by_normal_impulse() {
        let floor_shape = Shape::OrientedBox {
            half_extents: Vec3::new(10.0, 1.0, 10.0),
        };
        let mut floor = RigidBody::new(
            BodyId::new(1),
            floor_shape,
            &BodyDesc::fixed(Vec3::ZERO).with_material(0.0, 1.0),
            0.0,
        );
        let mut slider = ball(0, BodyDesc::dynamic(Vec3::new(0.0, 1.99, 0.0), 1.0)
            .with_velocity(Vec3::new(5.0, -1.0, 0.0))
            .with_material(0.0, 1.0));

        let contact = contact_between(&slider, &floor);
        resolve(&mut slider, &mut floor, &contact);

        // Normal impulse is 1.0; friction can remove at most that much momentum
        assert!(slider.velocity().x < 5.0);
        assert!(slider.velocity().x >= 4.0 - 1e-4, "friction exceeded the Coulomb bound: {}", slider.velocity().x);
        assert!(slider.velocity().y.abs() < 1e-5);
    }
}
