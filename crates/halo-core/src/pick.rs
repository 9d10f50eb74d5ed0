//! CPU ray picking against renderable geometry.
//!
//! A normalized pointer coordinate is unprojected through the camera into a
//! world-space [`Ray`]. Each candidate is tested in its own local space: the
//! ray is carried through the inverse world transform, so geometry is never
//! transformed on the CPU. Triangle geometry uses exact intersection, line
//! geometry a perpendicular-distance tolerance.

use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::camera::{Camera, ProjectionMode};
use crate::geometry::Geometry;
use crate::renderable::{FaceSide, Renderable, RenderableId};

/// Default distance under which a ray counts as touching a line segment.
pub const DEFAULT_LINE_PRECISION: f32 = 0.005;

/// Relative distance under which two hits are considered tied.
const TIE_EPSILON: f32 = 1e-5;

/// A half-line with a unit direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    /// Start point.
    pub origin: Vec3,
    /// Unit direction.
    pub direction: Vec3,
}

/// Closest approach between a ray and a segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentProximity {
    /// Squared distance between the two closest points.
    pub distance_sq: f32,
    /// Ray parameter of the closest point on the ray.
    pub ray_t: f32,
    /// Closest point on the ray.
    pub point_on_ray: Vec3,
    /// Closest point on the segment.
    pub point_on_segment: Vec3,
}

impl Ray {
    /// Creates a ray, normalizing `direction`.
    #[must_use]
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// Returns the point at parameter `t`.
    #[must_use]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }

    /// Builds the pick ray for a pointer in normalized device coordinates.
    ///
    /// Perspective rays start at the camera position; orthographic rays start
    /// on the near plane and run along the view direction. Returns `None` if
    /// the camera matrices cannot be inverted at this pointer.
    #[must_use]
    pub fn from_camera(pointer: Vec2, camera: &Camera) -> Option<Self> {
        if !pointer.is_finite() {
            return None;
        }

        let inv_view_proj = camera.view_projection_matrix().inverse();
        let unproject = |depth: f32| {
            let p = inv_view_proj * Vec4::new(pointer.x, pointer.y, depth, 1.0);
            (p.w.abs() >= 1e-6).then(|| p.truncate() / p.w)
        };

        // wgpu-style NDC depth [0, 1]
        let far = unproject(1.0)?;
        let origin = match camera.projection_mode {
            ProjectionMode::Perspective => camera.position,
            ProjectionMode::Orthographic => unproject(0.0)?,
        };

        let direction = (far - origin).normalize_or_zero();
        if direction.length_squared() < 1e-12 || !origin.is_finite() {
            return None;
        }

        Some(Self { origin, direction })
    }

    /// Carries the ray through `matrix`, renormalizing the direction.
    #[must_use]
    pub fn transformed(&self, matrix: &Mat4) -> Option<Self> {
        let origin = matrix.transform_point3(self.origin);
        let direction = matrix.transform_vector3(self.direction).normalize_or_zero();
        (direction.length_squared() > 1e-12 && origin.is_finite())
            .then_some(Self { origin, direction })
    }

    /// Möller–Trumbore intersection. Returns the ray parameter of the hit.
    #[must_use]
    pub fn intersect_triangle(&self, v0: Vec3, v1: Vec3, v2: Vec3, side: FaceSide) -> Option<f32> {
        let eps = 1e-9;
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;
        let h = self.direction.cross(edge2);
        // a > 0 when the counter-clockwise face looks at the ray origin
        let a = edge1.dot(h);
        let culled = match side {
            FaceSide::Front => a < eps,
            FaceSide::Back => a > -eps,
            FaceSide::Double => a.abs() < eps,
        };
        if culled {
            return None;
        }
        let f = 1.0 / a;
        let s = self.origin - v0;
        let u = f * s.dot(h);
        if !(0.0..=1.0).contains(&u) {
            return None;
        }
        let q = s.cross(edge1);
        let v = f * self.direction.dot(q);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }
        let t = f * edge2.dot(q);
        if t > 1e-6 {
            Some(t)
        } else {
            None
        }
    }

    /// Finds the closest points between this ray (`t >= 0`) and segment `a`-`b`.
    #[must_use]
    pub fn closest_to_segment(&self, a: Vec3, b: Vec3) -> SegmentProximity {
        let d = self.direction;
        let v = b - a;
        let w = self.origin - a;
        let c = v.dot(v);
        let dv = d.dot(v);
        let dw = d.dot(w);
        let vw = v.dot(w);

        let evaluate = |s: f32, t: f32| {
            let point_on_ray = self.at(t);
            let point_on_segment = a + v * s;
            SegmentProximity {
                distance_sq: point_on_ray.distance_squared(point_on_segment),
                ray_t: t,
                point_on_ray,
                point_on_segment,
            }
        };

        if c < 1e-12 {
            return evaluate(0.0, (-dw).max(0.0));
        }

        let denom = c - dv * dv;
        if denom > 1e-9 * c {
            let s = (vw - dw * dv) / denom;
            let t = s * dv - dw;
            if (0.0..=1.0).contains(&s) && t >= 0.0 {
                return evaluate(s, t);
            }
        }

        // The minimum lies on the boundary of s in [0, 1], t >= 0.
        [
            evaluate(0.0, (-dw).max(0.0)),
            evaluate(1.0, (dv - dw).max(0.0)),
            evaluate((vw / c).clamp(0.0, 1.0), 0.0),
        ]
        .into_iter()
        .fold(None, |best: Option<SegmentProximity>, candidate| match best {
            Some(b) if b.distance_sq <= candidate.distance_sq => Some(b),
            _ => Some(candidate),
        })
        .unwrap_or_else(|| evaluate(0.0, 0.0))
    }
}

/// The element of a renderable that a ray hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitElement {
    /// Triangle index of a mesh.
    Face(usize),
    /// Segment index of a polyline.
    Segment(usize),
}

/// Nearest intersection of a pick ray.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Identity of the renderable that was hit.
    pub id: RenderableId,
    /// World-space distance from the ray origin.
    pub distance: f32,
    /// World-space hit point.
    pub point: Vec3,
    /// The face or segment that was hit.
    pub element: HitElement,
}

impl RayHit {
    fn is_closer_than(&self, other: &RayHit) -> bool {
        self.distance + TIE_EPSILON * other.distance.max(1.0) < other.distance
    }
}

/// Finds the renderable under the pointer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayPicker {
    line_precision: f32,
}

impl Default for RayPicker {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_PRECISION)
    }
}

impl RayPicker {
    /// Creates a picker with the given line tolerance (local scene units).
    #[must_use]
    pub fn new(line_precision: f32) -> Self {
        Self {
            line_precision: line_precision.max(0.0),
        }
    }

    /// The line tolerance.
    #[must_use]
    pub fn line_precision(&self) -> f32 {
        self.line_precision
    }

    /// Casts the pointer ray and returns the nearest hit.
    #[must_use]
    pub fn cast(&self, pointer: Vec2, camera: &Camera, candidates: &[Renderable]) -> Option<RayHit> {
        let ray = Ray::from_camera(pointer, camera)?;
        self.intersect(&ray, candidates)
    }

    /// Returns the nearest hit of `ray` among `candidates`.
    ///
    /// Hits within floating-point tolerance of each other resolve to the
    /// earliest candidate in the list.
    #[must_use]
    pub fn intersect(&self, ray: &Ray, candidates: &[Renderable]) -> Option<RayHit> {
        let mut best: Option<RayHit> = None;
        for renderable in candidates {
            let Some(hit) = self.intersect_renderable(ray, renderable) else {
                continue;
            };
            if best.as_ref().is_none_or(|b| hit.is_closer_than(b)) {
                best = Some(hit);
            }
        }
        best
    }

    /// Tests a single renderable.
    #[must_use]
    pub fn intersect_renderable(&self, ray: &Ray, renderable: &Renderable) -> Option<RayHit> {
        if !renderable.pickable || renderable.geometry.is_empty() {
            return None;
        }

        let transform = renderable.transform;
        if transform.determinant().abs() < 1e-12 {
            return None;
        }
        let local = ray.transformed(&transform.inverse())?;

        let margin = if renderable.geometry.is_lines() {
            self.line_precision
        } else {
            0.0
        };
        let bounds = renderable.geometry.bounds()?.expanded(margin);
        if !bounds.intersects_ray(&local) {
            return None;
        }

        let to_world_hit = |local_point: Vec3, element: HitElement| {
            let point = transform.transform_point3(local_point);
            RayHit {
                id: renderable.id,
                distance: ray.origin.distance(point),
                point,
                element,
            }
        };

        let mut best: Option<RayHit> = None;
        match renderable.geometry.as_ref() {
            Geometry::Mesh(mesh) => {
                for index in 0..mesh.triangles().len() {
                    let [v0, v1, v2] = mesh.triangle(index);
                    let Some(t) = local.intersect_triangle(v0, v1, v2, renderable.side) else {
                        continue;
                    };
                    let hit = to_world_hit(local.at(t), HitElement::Face(index));
                    if best.as_ref().is_none_or(|b| hit.distance < b.distance) {
                        best = Some(hit);
                    }
                }
            }
            Geometry::Lines(lines) => {
                let precision_sq = self.line_precision * self.line_precision;
                for (index, start, end) in lines.iter_segments() {
                    let proximity = local.closest_to_segment(start, end);
                    if proximity.distance_sq > precision_sq {
                        continue;
                    }
                    let mut hit =
                        to_world_hit(proximity.point_on_ray, HitElement::Segment(index));
                    hit.point = transform.transform_point3(proximity.point_on_segment);
                    if best.as_ref().is_none_or(|b| hit.distance < b.distance) {
                        best = Some(hit);
                    }
                }
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use proptest::prelude::*;

    use super::*;
    use crate::geometry::{Polyline, TriangleMesh};

    fn cube(id: u64, at: Vec3) -> Renderable {
        Renderable::new(RenderableId(id), Geometry::from(TriangleMesh::cuboid(1.0))).at(at)
    }

    fn horizontal_line(id: u64, y: f32) -> Renderable {
        let points = vec![Vec3::new(-1.0, y, 0.0), Vec3::new(1.0, y, 0.0)];
        Renderable::new(RenderableId(id), Geometry::from(Polyline::strip(points)))
    }

    fn down_z(x: f32, y: f32) -> Ray {
        Ray::new(Vec3::new(x, y, 10.0), Vec3::NEG_Z)
    }

    #[test]
    fn test_triangle_front_face_only() {
        let ray = down_z(0.2, 0.2);
        let (a, b, c) = (Vec3::ZERO, Vec3::X, Vec3::Y);
        assert!(ray.intersect_triangle(a, b, c, FaceSide::Front).is_some());
        // Reversed winding faces away from the ray.
        assert!(ray.intersect_triangle(a, c, b, FaceSide::Front).is_none());
        assert!(ray.intersect_triangle(a, c, b, FaceSide::Back).is_some());
        assert!(ray.intersect_triangle(a, c, b, FaceSide::Double).is_some());
    }

    #[test]
    fn test_triangle_behind_origin_is_ignored() {
        let ray = Ray::new(Vec3::new(0.2, 0.2, -1.0), Vec3::NEG_Z);
        assert!(ray
            .intersect_triangle(Vec3::ZERO, Vec3::X, Vec3::Y, FaceSide::Double)
            .is_none());
    }

    #[test]
    fn test_segment_proximity_interior() {
        let ray = down_z(0.3, 0.5);
        let p = ray.closest_to_segment(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!((p.distance_sq - 0.25).abs() < 1e-5);
        assert!((p.ray_t - 10.0).abs() < 1e-4);
        assert!((p.point_on_segment - Vec3::new(0.3, 0.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn test_segment_proximity_clamps_to_endpoint() {
        let ray = down_z(3.0, 0.0);
        let p = ray.closest_to_segment(Vec3::new(-1.0, 0.0, 0.0), Vec3::new(1.0, 0.0, 0.0));
        assert!((p.distance_sq - 4.0).abs() < 1e-4);
        assert_eq!(p.point_on_segment, Vec3::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn test_segment_parallel_to_ray() {
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::X);
        let p = ray.closest_to_segment(Vec3::new(2.0, 0.0, 0.0), Vec3::new(4.0, 0.0, 0.0));
        assert!((p.distance_sq - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_line_pick_tolerance() {
        let picker = RayPicker::default();
        let line = [horizontal_line(1, 0.0)];
        assert!(picker.intersect(&down_z(0.0, 0.004), &line).is_some());
        assert!(picker.intersect(&down_z(0.0, 0.005), &line).is_some());
        assert!(picker.intersect(&down_z(0.0, 0.01), &line).is_none());
    }

    #[test]
    fn test_line_pick_reports_segment() {
        let points = vec![
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
        ];
        let line = [Renderable::new(
            RenderableId(9),
            Geometry::from(Polyline::strip(points)),
        )];
        let hit = RayPicker::default()
            .intersect(&down_z(0.5, 0.5), &line)
            .unwrap();
        assert_eq!(hit.element, HitElement::Segment(1));
        assert!((hit.distance - 10.0).abs() < 1e-3);
    }

    #[test]
    fn test_nearest_line_wins() {
        let near = horizontal_line(1, 0.0).at(Vec3::new(0.0, 0.0, 2.0));
        let far = horizontal_line(2, 0.0);
        let hit = RayPicker::default()
            .intersect(&down_z(0.0, 0.0), &[far, near])
            .unwrap();
        assert_eq!(hit.id, RenderableId(1));
    }

    #[test]
    fn test_nearest_mesh_wins() {
        let scene = [cube(1, Vec3::new(0.0, 0.0, -3.0)), cube(2, Vec3::ZERO)];
        let hit = RayPicker::default().intersect(&down_z(0.0, 0.0), &scene).unwrap();
        assert_eq!(hit.id, RenderableId(2));
        assert!((hit.distance - 9.5).abs() < 1e-4);
        assert!((hit.point - Vec3::new(0.0, 0.0, 0.5)).length() < 1e-4);
    }

    #[test]
    fn test_tie_goes_to_earliest_candidate() {
        let geometry = Arc::new(Geometry::from(TriangleMesh::cuboid(1.0)));
        let scene = [
            Renderable::new(RenderableId(7), geometry.clone()),
            Renderable::new(RenderableId(3), geometry),
        ];
        let hit = RayPicker::default().intersect(&down_z(0.1, 0.1), &scene).unwrap();
        assert_eq!(hit.id, RenderableId(7));
    }

    #[test]
    fn test_skips_non_pickable_and_empty() {
        let empty = Renderable::new(RenderableId(1), Geometry::from(Polyline::strip(vec![])));
        let hidden = cube(2, Vec3::ZERO).non_pickable();
        let picker = RayPicker::default();
        assert!(picker.intersect(&down_z(0.0, 0.0), &[empty, hidden]).is_none());
        assert!(picker.intersect(&down_z(0.0, 0.0), &[]).is_none());
    }

    #[test]
    fn test_scaled_transform_reports_world_distance() {
        let scene = [cube(1, Vec3::ZERO).with_transform(Mat4::from_scale(Vec3::splat(4.0)))];
        let hit = RayPicker::default().intersect(&down_z(0.0, 0.0), &scene).unwrap();
        assert!((hit.distance - 8.0).abs() < 1e-3);
    }

    #[test]
    fn test_line_tolerance_is_local() {
        // Scaling the line by 10 scales the 0.004 world offset down to 0.0004 locally.
        let scene = [horizontal_line(1, 0.0).with_transform(Mat4::from_scale(Vec3::splat(10.0)))];
        let picker = RayPicker::default();
        assert!(picker.intersect(&down_z(0.0, 0.04), &scene).is_some());
        assert!(picker.intersect(&down_z(0.0, 0.1), &scene).is_none());
    }

    #[test]
    fn test_singular_transform_is_skipped() {
        let scene = [cube(1, Vec3::ZERO).with_transform(Mat4::from_scale(Vec3::new(1.0, 0.0, 1.0)))];
        assert!(RayPicker::default().intersect(&down_z(0.0, 0.0), &scene).is_none());
    }

    #[test]
    fn test_camera_center_ray_hits_middle_object() {
        let camera = Camera::perspective(60.0, 1.5, 0.1, 1000.0)
            .with_position(Vec3::new(0.0, 0.0, 400.0));
        let scene = [
            cube(1, Vec3::new(-200.0, 0.0, 0.0)),
            cube(2, Vec3::ZERO).with_transform(Mat4::from_scale(Vec3::splat(80.0))),
            cube(3, Vec3::new(200.0, 0.0, 0.0)),
        ];
        let hit = RayPicker::default()
            .cast(Vec2::ZERO, &camera, &scene)
            .unwrap();
        assert_eq!(hit.id, RenderableId(2));
        assert!((hit.distance - 360.0).abs() < 0.1);
    }

    #[test]
    fn test_perspective_ray_starts_at_camera() {
        let camera = Camera::new(1.0).with_position(Vec3::new(1.0, 2.0, 3.0));
        let ray = Ray::from_camera(Vec2::new(0.5, -0.5), &camera).unwrap();
        assert_eq!(ray.origin, camera.position);
        assert!((ray.direction.length() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_orthographic_rays_are_parallel() {
        let mut camera = Camera::new(1.0).with_position(Vec3::new(0.0, 0.0, 5.0));
        camera.projection_mode = ProjectionMode::Orthographic;
        camera.ortho_scale = 2.0;
        let a = Ray::from_camera(Vec2::new(-0.5, 0.0), &camera).unwrap();
        let b = Ray::from_camera(Vec2::new(0.5, 0.5), &camera).unwrap();
        assert!((a.direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((b.direction - Vec3::NEG_Z).length() < 1e-4);
        assert!((a.origin.x + 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_finite_pointer() {
        let camera = Camera::default();
        assert!(Ray::from_camera(Vec2::new(f32::NAN, 0.0), &camera).is_none());
    }

    proptest! {
        #[test]
        fn prop_ray_through_cube_center_hits_it(x in -50.0f32..50.0, y in -50.0f32..50.0, z in -20.0f32..5.0) {
            let scene = [cube(1, Vec3::new(x, y, z))];
            let ray = Ray::new(Vec3::new(x, y, 10.0), Vec3::NEG_Z);
            let hit = RayPicker::default().intersect(&ray, &scene);
            prop_assert!(hit.is_some());
            let hit = hit.unwrap();
            prop_assert!((hit.distance - (10.0 - z - 0.5)).abs() < 1e-3);
        }

        #[test]
        fn prop_line_tolerance_boundary(offset in 0.0f32..0.0045, far_offset in 0.0055f32..1.0) {
            let line = [horizontal_line(1, 0.0)];
            let picker = RayPicker::default();
            prop_assert!(picker.intersect(&down_z(0.1, offset), &line).is_some());
            prop_assert!(picker.intersect(&down_z(0.1, far_offset), &line).is_none());
        }
    }
}
