//! Ray casting against the virtual screen

use glam::{Mat4, Vec2, Vec3};

use crate::screen::VirtualScreen;

/// Determinants below this are treated as a ray parallel to the triangle.
const PARALLEL_EPSILON: f32 = 1e-7;
/// Slack on the barycentric bounds so rays through shared edges still hit.
const EDGE_EPSILON: f32 = 1e-6;

/// A ray; `direction` need not be normalized.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction }
    }

    /// Aim ray of a device: origin at the transform's translation, pointing
    /// down its local -Z axis.
    pub fn from_transform(transform: &Mat4) -> Self {
        Self {
            origin: transform.transform_point3(Vec3::ZERO),
            direction: transform.transform_vector3(Vec3::NEG_Z),
        }
    }

    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// Result of a trace. Invalid unless a triangle was hit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub ray: Ray,
    pub uv: Vec2,
    pub hit_point: Vec3,
    pub is_valid: bool,
}

impl RayHit {
    pub fn invalid(ray: Ray) -> Self {
        Self {
            ray,
            uv: Vec2::ZERO,
            hit_point: Vec3::ZERO,
            is_valid: false,
        }
    }
}

impl Default for RayHit {
    fn default() -> Self {
        Self::invalid(Ray::new(Vec3::ZERO, Vec3::NEG_Z))
    }
}

/// Möller–Trumbore test. Returns `(a, b, t)` where `a` and `b` weight the
/// second and third vertex.
fn intersect_triangle(ray: &Ray, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<(f32, f32, f32)> {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;
    let pvec = ray.direction.cross(edge2);
    let det = edge1.dot(pvec);
    if det.abs() < PARALLEL_EPSILON {
        return None;
    }
    let inv_det = 1.0 / det;

    let tvec = ray.origin - v0;
    let a = tvec.dot(pvec) * inv_det;
    if !(-EDGE_EPSILON..=1.0 + EDGE_EPSILON).contains(&a) {
        return None;
    }

    let qvec = tvec.cross(edge1);
    let b = ray.direction.dot(qvec) * inv_det;
    if b < -EDGE_EPSILON || a + b > 1.0 + EDGE_EPSILON {
        return None;
    }

    let t = edge2.dot(qvec) * inv_det;
    if t <= 0.0 {
        return None;
    }
    Some((a, b, t))
}

/// Walks the screen strip in order and returns the first triangle hit.
pub fn trace(ray: Ray, screen: &VirtualScreen) -> RayHit {
    let vertices = &screen.vertices;
    let uvs = &screen.uvs;
    if vertices.len() < 3 || uvs.len() != vertices.len() {
        return RayHit::invalid(ray);
    }

    for i in 0..vertices.len() - 2 {
        let Some((a, b, t)) = intersect_triangle(&ray, vertices[i], vertices[i + 1], vertices[i + 2])
        else {
            continue;
        };
        let uv = uvs[i] * (1.0 - a - b) + uvs[i + 1] * a + uvs[i + 2] * b;
        return RayHit {
            ray,
            uv,
            hit_point: ray.at(t),
            is_valid: true,
        };
    }
    RayHit::invalid(ray)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::screen::{ScreenParams, HALF_STEPS};

    fn flat_screen() -> VirtualScreen {
        VirtualScreen::new(&ScreenParams {
            distance: 2.0,
            height: 1.0,
            size: 1.0,
            curvature: 0.0,
            aspect_ratio: 2.0,
        })
    }

    #[test]
    fn ray_through_centre_bottom_vertex_hits_it() {
        let screen = flat_screen();
        let centre = 2 * HALF_STEPS as usize;
        let target = screen.vertices[centre];
        let hit = trace(Ray::new(Vec3::ZERO, target), &screen);

        assert!(hit.is_valid);
        assert!(hit.uv.abs_diff_eq(Vec2::new(0.5, 0.0), 1e-4), "uv = {}", hit.uv);
        assert!(hit.hit_point.abs_diff_eq(target, 1e-4));
    }

    #[test]
    fn ray_through_centre_top_vertex_hits_it() {
        let screen = flat_screen();
        let centre = 2 * HALF_STEPS as usize + 1;
        let target = screen.vertices[centre];
        let origin = Vec3::new(0.0, 1.0, 0.0);
        let hit = trace(Ray::new(origin, target - origin), &screen);

        assert!(hit.is_valid);
        assert!(hit.uv.abs_diff_eq(Vec2::new(0.5, 1.0), 1e-4), "uv = {}", hit.uv);
        assert!(hit.hit_point.abs_diff_eq(target, 1e-4));
    }

    #[test]
    fn ray_through_middle_interpolates_uv() {
        let screen = flat_screen();
        let origin = Vec3::new(0.5, 1.0, 0.0);
        let hit = trace(Ray::new(origin, Vec3::new(0.0, 0.0, -3.0)), &screen);

        assert!(hit.is_valid);
        assert!(hit.uv.abs_diff_eq(Vec2::new(0.75, 0.5), 1e-4), "uv = {}", hit.uv);
        assert!(hit.hit_point.abs_diff_eq(Vec3::new(0.5, 1.0, -2.0), 1e-4));
    }

    #[test]
    fn ray_pointing_away_misses() {
        let screen = flat_screen();
        let hit = trace(Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::Z), &screen);
        assert!(!hit.is_valid);
    }

    #[test]
    fn ray_beside_the_screen_misses() {
        let screen = flat_screen();
        let hit = trace(Ray::new(Vec3::new(5.0, 1.0, 0.0), Vec3::NEG_Z), &screen);
        assert!(!hit.is_valid);
    }

    #[test]
    fn parallel_ray_misses() {
        let screen = flat_screen();
        let hit = trace(Ray::new(Vec3::new(-5.0, 1.0, -2.0), Vec3::X), &screen);
        assert!(!hit.is_valid);
    }

    #[test]
    fn curved_screen_hit_lies_on_the_arc() {
        let screen = VirtualScreen::new(&ScreenParams {
            distance: 2.0,
            height: 0.0,
            size: 1.0,
            curvature: 1.0,
            aspect_ratio: 1.0,
        });
        let dir = Vec3::new(0.3, 0.1, -1.0);
        let hit = trace(Ray::new(Vec3::ZERO, dir), &screen);
        assert!(hit.is_valid);
        let r = Vec2::new(hit.hit_point.x, hit.hit_point.z).length();
        assert!((r - 2.0).abs() < 1e-3, "radius = {r}");
        assert!(hit.uv.x > 0.5);
    }

    #[test]
    fn aim_ray_follows_transform() {
        let transform = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0))
            * Mat4::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let ray = Ray::from_transform(&transform);
        assert!(ray.origin.abs_diff_eq(Vec3::new(1.0, 2.0, 3.0), 1e-6));
        assert!(ray.direction.abs_diff_eq(Vec3::NEG_X, 1e-6));
    }
}
