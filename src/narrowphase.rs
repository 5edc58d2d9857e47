use glam::Vec2;

use crate::api::NarrowphaseApi;
use crate::types::*;

/// Exact geometric tests applied to broadphase candidates.
pub struct Narrowphase;

impl Narrowphase {
    /// Surface distance from `p` to `shape`: zero inside rects and circles,
    /// plain Euclidean distance for points.
    pub fn surface_distance(p: Vec2, shape: &Shape) -> f32 {
        match *shape {
            Shape::Rect { .. } => Self::distance_point_aabb(p, &shape.aabb()),
            Shape::Circle { center, radius } => Self::distance_point_circle(p, center, radius),
            Shape::Point { position } => p.distance(position),
        }
    }

    /// Parameter interval of `origin .. origin + dir` inside `aabb` (closed),
    /// clipped to [0,1].
    pub fn clip_segment(origin: Vec2, dir: Vec2, aabb: &Aabb) -> Option<(f32, f32)> {
        let (min, max) = (aabb.min(), aabb.max());
        let mut t0 = 0.0f32;
        let mut t1 = 1.0f32;
        for axis in 0..2 {
            let (o, d) = (origin[axis], dir[axis]);
            if d == 0.0 {
                if o < min[axis] || o > max[axis] {
                    return None;
                }
                continue;
            }
            let (a, b) = ((min[axis] - o) / d, (max[axis] - o) / d);
            t0 = t0.max(a.min(b));
            t1 = t1.min(a.max(b));
            if t0 > t1 {
                return None;
            }
        }
        Some((t0, t1))
    }
}

impl NarrowphaseApi for Narrowphase {
    fn ray_aabb(origin: Vec2, dir: Vec2, aabb: &Aabb) -> Option<RayHit> {
        // Slab method with normal tracking; returns earliest t >= 0
        let (min, max) = (aabb.min(), aabb.max());
        let mut tmin = f32::NEG_INFINITY;
        let mut tmax = f32::INFINITY;
        let mut n_enter = Vec2::ZERO;

        for axis in 0..2 {
            let (o, d, lo, hi) = (origin[axis], dir[axis], min[axis], max[axis]);
            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t1 = (lo - o) * inv;
            let mut t2 = (hi - o) * inv;
            let mut n = -1.0;
            if t1 > t2 {
                core::mem::swap(&mut t1, &mut t2);
                n = 1.0;
            }
            if t1 > tmin {
                tmin = t1;
                n_enter = Vec2::ZERO;
                n_enter[axis] = n;
            }
            tmax = tmax.min(t2);
            if tmin > tmax {
                return None;
            }
        }

        // Box entirely behind the origin
        if tmax < 0.0 {
            return None;
        }
        // Origin inside: immediate hit
        if tmin < 0.0 {
            return Some(RayHit { toi: 0.0, normal: Vec2::ZERO, contact: origin });
        }
        Some(RayHit { toi: tmin, normal: n_enter, contact: origin + dir * tmin })
    }

    fn ray_circle(origin: Vec2, dir: Vec2, center: Vec2, r: f32) -> Option<RayHit> {
        // Solve ||origin + t*dir - center||^2 = r^2 for t >= 0
        let m = origin - center;
        let c = m.length_squared() - r * r;
        if c <= 0.0 {
            return Some(RayHit { toi: 0.0, normal: Vec2::ZERO, contact: origin });
        }
        let a = dir.length_squared();
        if a == 0.0 {
            return None;
        }
        let b = 2.0 * m.dot(dir);
        let disc = b * b - 4.0 * a * c;
        if disc < 0.0 {
            return None;
        }
        // Origin is outside, so both roots share a sign; the smaller one is the entry.
        let t = (-b - disc.sqrt()) / (2.0 * a);
        if t < 0.0 {
            return None;
        }
        let contact = origin + dir * t;
        let normal = (contact - center).normalize_or_zero();
        Some(RayHit { toi: t, normal, contact })
    }

    fn ray_point(origin: Vec2, dir: Vec2, p: Vec2, tolerance: f32) -> Option<RayHit> {
        if origin.distance_squared(p) <= tolerance * tolerance {
            return Some(RayHit { toi: 0.0, normal: Vec2::ZERO, contact: p });
        }
        let a = dir.length_squared();
        if a == 0.0 {
            return None;
        }
        let t = (p - origin).dot(dir) / a;
        if t < 0.0 {
            return None;
        }
        let closest = origin + dir * t;
        if closest.distance_squared(p) > tolerance * tolerance {
            return None;
        }
        Some(RayHit { toi: t, normal: -dir.normalize_or_zero(), contact: p })
    }

    fn overlap_point_aabb(p: Vec2, aabb: &Aabb) -> bool {
        aabb.contains_point(p)
    }

    fn overlap_point_circle(p: Vec2, c: Vec2, r: f32) -> bool {
        (p - c).length_squared() <= r * r
    }

    fn overlap_circle_aabb(c: Vec2, r: f32, aabb: &Aabb) -> bool {
        let closest = c.clamp(aabb.min(), aabb.max());
        (closest - c).length_squared() <= r * r
    }

    fn overlap_circle_circle(c0: Vec2, r0: f32, c1: Vec2, r1: f32) -> bool {
        let rsum = r0 + r1;
        (c0 - c1).length_squared() <= rsum * rsum
    }

    fn distance_point_aabb(p: Vec2, aabb: &Aabb) -> f32 {
        let closest = p.clamp(aabb.min(), aabb.max());
        p.distance(closest)
    }

    fn distance_point_circle(p: Vec2, c: Vec2, r: f32) -> f32 {
        (p.distance(c) - r).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> Aabb {
        Aabb::new(-1.0, -1.0, 1.0, 1.0)
    }

    #[test]
    fn test_overlap_point_aabb() {
        let b = Aabb::from_center_half(Vec2::ZERO, Vec2::new(1.0, 2.0));
        assert!(Narrowphase::overlap_point_aabb(Vec2::new(0.0, 0.0), &b));
        assert!(Narrowphase::overlap_point_aabb(Vec2::new(1.0, 2.0), &b));
        assert!(!Narrowphase::overlap_point_aabb(Vec2::new(1.1, 0.0), &b));
    }

    #[test]
    fn test_overlap_point_circle() {
        let c = Vec2::new(1.0, -1.0);
        assert!(Narrowphase::overlap_point_circle(Vec2::new(1.0, -1.0), c, 2.0));
        assert!(Narrowphase::overlap_point_circle(Vec2::new(3.0, -1.0), c, 2.0));
        assert!(!Narrowphase::overlap_point_circle(Vec2::new(3.1, -1.0), c, 2.0));
    }

    #[test]
    fn test_overlap_circle_aabb_corner() {
        // Corner at (1,1); circle centered diagonally outside
        let c = Vec2::new(2.0, 2.0);
        assert!(!Narrowphase::overlap_circle_aabb(c, 1.0, &unit_box()));
        assert!(Narrowphase::overlap_circle_aabb(c, 1.5, &unit_box()));
    }

    #[test]
    fn test_overlap_circle_circle_tangent() {
        assert!(Narrowphase::overlap_circle_circle(Vec2::ZERO, 1.0, Vec2::new(2.0, 0.0), 1.0));
        assert!(!Narrowphase::overlap_circle_circle(Vec2::ZERO, 1.0, Vec2::new(2.1, 0.0), 1.0));
    }

    #[test]
    fn test_distances_clamp_inside_to_zero() {
        assert_eq!(Narrowphase::distance_point_aabb(Vec2::new(0.5, 0.5), &unit_box()), 0.0);
        assert!((Narrowphase::distance_point_aabb(Vec2::new(4.0, 5.0), &unit_box()) - 5.0).abs() < 1e-5);
        assert_eq!(Narrowphase::distance_point_circle(Vec2::new(0.5, 0.0), Vec2::ZERO, 1.0), 0.0);
        assert!((Narrowphase::distance_point_circle(Vec2::new(3.0, 0.0), Vec2::ZERO, 1.0) - 2.0).abs() < 1e-5);
    }

    #[test]
    fn test_surface_distance_point_shape() {
        let p = Shape::point(Vec2::new(3.0, 4.0));
        assert!((Narrowphase::surface_distance(Vec2::ZERO, &p) - 5.0).abs() < 1e-5);
    }

    // --- Rays --------------------------------------------------------------

    #[test]
    fn test_ray_aabb_hit() {
        let hit = Narrowphase::ray_aabb(Vec2::new(-5.0, 0.0), Vec2::new(1.0, 0.0), &unit_box()).unwrap();
        assert!((hit.toi - 4.0).abs() < 1e-5);
        assert!((hit.normal.x + 1.0).abs() < 1e-5);
        assert!((hit.contact.x + 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_aabb_parallel_miss() {
        let hit = Narrowphase::ray_aabb(Vec2::new(-5.0, 2.0), Vec2::new(1.0, 0.0), &unit_box());
        assert!(hit.is_none());
    }

    #[test]
    fn test_ray_aabb_behind_origin() {
        let hit = Narrowphase::ray_aabb(Vec2::new(5.0, 0.0), Vec2::new(1.0, 0.0), &unit_box());
        assert!(hit.is_none());
    }

    #[test]
    fn test_ray_aabb_origin_inside() {
        let hit = Narrowphase::ray_aabb(Vec2::ZERO, Vec2::new(1.0, 0.0), &unit_box()).unwrap();
        assert_eq!(hit.toi, 0.0);
        assert_eq!(hit.normal, Vec2::ZERO);
    }

    #[test]
    fn test_ray_circle_hit_and_inside() {
        let hit = Narrowphase::ray_circle(Vec2::new(-3.0, 0.0), Vec2::new(1.0, 0.0), Vec2::ZERO, 1.0).unwrap();
        assert!((hit.contact.x + 1.0).abs() < 1e-5);
        assert!((hit.normal.x + 1.0).abs() < 1e-5);
        let inside = Narrowphase::ray_circle(Vec2::new(0.5, 0.0), Vec2::new(1.0, 0.0), Vec2::ZERO, 1.0).unwrap();
        assert_eq!(inside.toi, 0.0);
        let behind = Narrowphase::ray_circle(Vec2::new(3.0, 0.0), Vec2::new(1.0, 0.0), Vec2::ZERO, 1.0);
        assert!(behind.is_none());
    }

    #[test]
    fn test_clip_segment() {
        let (t0, t1) = Narrowphase::clip_segment(Vec2::new(-3.0, 0.0), Vec2::new(4.0, 0.0), &unit_box()).unwrap();
        assert!((t0 - 0.5).abs() < 1e-6);
        assert_eq!(t1, 1.0);
        assert!(Narrowphase::clip_segment(Vec2::new(-3.0, 0.0), Vec2::new(1.0, 0.0), &unit_box()).is_none());
        assert!(Narrowphase::clip_segment(Vec2::new(0.0, 3.0), Vec2::new(5.0, 0.0), &unit_box()).is_none());
    }

    #[test]
    fn test_ray_point_tolerance() {
        let dir = Vec2::new(10.0, 0.0);
        let hit = Narrowphase::ray_point(Vec2::ZERO, dir, Vec2::new(4.0, 0.0), 1e-4).unwrap();
        assert!((hit.toi - 0.4).abs() < 1e-5);
        assert!(Narrowphase::ray_point(Vec2::ZERO, dir, Vec2::new(4.0, 0.01), 1e-4).is_none());
        assert!(Narrowphase::ray_point(Vec2::ZERO, dir, Vec2::new(-4.0, 0.0), 1e-4).is_none());
    }
}
