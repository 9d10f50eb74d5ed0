//! Pickable geometry: triangle meshes and polylines.
//!
//! Geometry is immutable once built and shared between the scene, the overlay
//! scenes and the GPU cache through `Arc<Geometry>`.

use std::f32::consts::{PI, TAU};

use glam::Vec3;

use crate::error::{HaloError, Result};
use crate::pick::Ray;

/// Geometry carried by a renderable.
#[derive(Debug, Clone)]
pub enum Geometry {
    /// Solid triangle geometry, intersected exactly.
    Mesh(TriangleMesh),
    /// Line geometry, intersected with a distance tolerance.
    Lines(Polyline),
}

impl Geometry {
    /// Returns the local-space bounds, or `None` for empty geometry.
    #[must_use]
    pub fn bounds(&self) -> Option<Aabb> {
        match self {
            Geometry::Mesh(mesh) => Aabb::from_points(mesh.positions.iter().copied()),
            Geometry::Lines(lines) => Aabb::from_points(lines.points.iter().copied()),
        }
    }

    /// Returns true if there is nothing to draw or pick.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Geometry::Mesh(mesh) => mesh.triangles.is_empty(),
            Geometry::Lines(lines) => lines.segment_count() == 0,
        }
    }

    /// Returns true for line geometry.
    #[must_use]
    pub fn is_lines(&self) -> bool {
        matches!(self, Geometry::Lines(_))
    }
}

impl From<TriangleMesh> for Geometry {
    fn from(mesh: TriangleMesh) -> Self {
        Geometry::Mesh(mesh)
    }
}

impl From<Polyline> for Geometry {
    fn from(lines: Polyline) -> Self {
        Geometry::Lines(lines)
    }
}

/// An indexed triangle mesh with per-vertex normals.
#[derive(Debug, Clone)]
pub struct TriangleMesh {
    positions: Vec<Vec3>,
    normals: Vec<Vec3>,
    triangles: Vec<[u32; 3]>,
}

impl TriangleMesh {
    /// Creates a mesh and computes smooth, area-weighted vertex normals.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::IndexOutOfBounds`] if a triangle references a missing vertex.
    pub fn new(positions: Vec<Vec3>, triangles: Vec<[u32; 3]>) -> Result<Self> {
        validate_triangles(&triangles, positions.len())?;
        let normals = compute_vertex_normals(&positions, &triangles);
        Ok(Self {
            positions,
            normals,
            triangles,
        })
    }

    /// Creates a mesh with explicit per-vertex normals.
    ///
    /// # Errors
    ///
    /// Returns an error if the normal count differs from the vertex count or
    /// a triangle references a missing vertex.
    pub fn with_normals(
        positions: Vec<Vec3>,
        normals: Vec<Vec3>,
        triangles: Vec<[u32; 3]>,
    ) -> Result<Self> {
        if normals.len() != positions.len() {
            return Err(HaloError::InvalidGeometry(format!(
                "{} normals for {} vertices",
                normals.len(),
                positions.len()
            )));
        }
        validate_triangles(&triangles, positions.len())?;
        Ok(Self {
            positions,
            normals,
            triangles,
        })
    }

    /// Vertex positions in object space.
    #[must_use]
    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Per-vertex normals in object space.
    #[must_use]
    pub fn normals(&self) -> &[Vec3] {
        &self.normals
    }

    /// Triangle vertex indices.
    #[must_use]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Returns the three corners of triangle `index`.
    #[must_use]
    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// An axis-aligned cube centered at the origin.
    ///
    /// Each face has its own four vertices with flat normals, so the offset
    /// silhouette of a cube opens gaps at its corners.
    #[must_use]
    pub fn cuboid(size: f32) -> Self {
        let h = size * 0.5;
        // (normal, u, v) with u x v == normal
        let faces = [
            (Vec3::X, Vec3::Y, Vec3::Z),
            (Vec3::NEG_X, Vec3::Z, Vec3::Y),
            (Vec3::Y, Vec3::Z, Vec3::X),
            (Vec3::NEG_Y, Vec3::X, Vec3::Z),
            (Vec3::Z, Vec3::X, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y, Vec3::X),
        ];

        let mut positions = Vec::with_capacity(24);
        let mut normals = Vec::with_capacity(24);
        let mut triangles = Vec::with_capacity(12);
        for (normal, u, v) in faces {
            let base = positions.len() as u32;
            let center = normal * h;
            positions.push(center - u * h - v * h);
            positions.push(center + u * h - v * h);
            positions.push(center + u * h + v * h);
            positions.push(center - u * h + v * h);
            normals.extend([normal; 4]);
            triangles.push([base, base + 1, base + 2]);
            triangles.push([base, base + 2, base + 3]);
        }

        Self {
            positions,
            normals,
            triangles,
        }
    }

    /// A UV sphere centered at the origin.
    #[must_use]
    pub fn uv_sphere(radius: f32, width_segments: u32, height_segments: u32) -> Self {
        let width_segments = width_segments.max(3);
        let height_segments = height_segments.max(2);

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        let mut grid = Vec::with_capacity(height_segments as usize + 1);

        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            let theta = v * PI;
            let mut row = Vec::with_capacity(width_segments as usize + 1);
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let phi = u * TAU;
                let position = Vec3::new(
                    -radius * phi.cos() * theta.sin(),
                    radius * theta.cos(),
                    radius * phi.sin() * theta.sin(),
                );
                row.push(positions.len() as u32);
                normals.push(position.normalize_or_zero());
                positions.push(position);
            }
            grid.push(row);
        }

        let mut triangles = Vec::new();
        for iy in 0..height_segments as usize {
            for ix in 0..width_segments as usize {
                let a = grid[iy][ix + 1];
                let b = grid[iy][ix];
                let c = grid[iy + 1][ix];
                let d = grid[iy + 1][ix + 1];
                if iy != 0 {
                    triangles.push([a, b, d]);
                }
                if iy != height_segments as usize - 1 {
                    triangles.push([b, c, d]);
                }
            }
        }

        Self {
            positions,
            normals,
            triangles,
        }
    }

    /// A (p, q) torus knot centered at the origin.
    #[must_use]
    pub fn torus_knot(
        radius: f32,
        tube: f32,
        tubular_segments: u32,
        radial_segments: u32,
        p: u32,
        q: u32,
    ) -> Self {
        let tubular_segments = tubular_segments.max(3);
        let radial_segments = radial_segments.max(3);
        let p = p.max(1) as f32;
        let q = q as f32;

        let curve = |u: f32| {
            let quo_over_p = q / p * u;
            let cs = quo_over_p.cos();
            Vec3::new(
                radius * (2.0 + cs) * 0.5 * u.cos(),
                radius * (2.0 + cs) * 0.5 * u.sin(),
                radius * quo_over_p.sin() * 0.5,
            )
        };

        let mut positions = Vec::new();
        let mut normals = Vec::new();
        for i in 0..=tubular_segments {
            let u = i as f32 / tubular_segments as f32 * p * TAU;
            let p1 = curve(u);
            let p2 = curve(u + 0.01);
            let tangent = p2 - p1;
            let n = p2 + p1;
            let binormal = tangent.cross(n);
            let normal = binormal.cross(tangent).normalize_or_zero();
            let binormal = binormal.normalize_or_zero();

            for j in 0..=radial_segments {
                let v = j as f32 / radial_segments as f32 * TAU;
                let cx = -tube * v.cos();
                let cy = tube * v.sin();
                let position = p1 + normal * cx + binormal * cy;
                normals.push((position - p1).normalize_or_zero());
                positions.push(position);
            }
        }

        let mut triangles = Vec::new();
        let stride = radial_segments + 1;
        for j in 1..=tubular_segments {
            for i in 1..=radial_segments {
                let a = stride * (j - 1) + (i - 1);
                let b = stride * j + (i - 1);
                let c = stride * j + i;
                let d = stride * (j - 1) + i;
                triangles.push([a, b, d]);
                triangles.push([b, c, d]);
            }
        }

        Self {
            positions,
            normals,
            triangles,
        }
    }
}

fn validate_triangles(triangles: &[[u32; 3]], len: usize) -> Result<()> {
    for tri in triangles {
        for &index in tri {
            if index as usize >= len {
                return Err(HaloError::IndexOutOfBounds { index, len });
            }
        }
    }
    Ok(())
}

fn compute_vertex_normals(positions: &[Vec3], triangles: &[[u32; 3]]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for &[a, b, c] in triangles {
        let (a, b, c) = (a as usize, b as usize, c as usize);
        // Unnormalized cross product weights each face by its area.
        let face = (positions[b] - positions[a]).cross(positions[c] - positions[a]);
        normals[a] += face;
        normals[b] += face;
        normals[c] += face;
    }
    for normal in &mut normals {
        *normal = normal.normalize_or_zero();
    }
    normals
}

/// How consecutive polyline points are joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineMode {
    /// Every point connects to the next one.
    #[default]
    Strip,
    /// Points are taken in independent pairs.
    Segments,
}

/// Line geometry without a surface.
#[derive(Debug, Clone)]
pub struct Polyline {
    points: Vec<Vec3>,
    mode: LineMode,
}

impl Polyline {
    /// Creates a connected line strip.
    #[must_use]
    pub fn strip(points: Vec<Vec3>) -> Self {
        Self {
            points,
            mode: LineMode::Strip,
        }
    }

    /// Creates independent segments from consecutive point pairs.
    /// A trailing unpaired point is ignored.
    #[must_use]
    pub fn segments(points: Vec<Vec3>) -> Self {
        Self {
            points,
            mode: LineMode::Segments,
        }
    }

    /// The line points in object space.
    #[must_use]
    pub fn points(&self) -> &[Vec3] {
        &self.points
    }

    /// The join mode.
    #[must_use]
    pub fn mode(&self) -> LineMode {
        self.mode
    }

    /// Number of drawable segments.
    #[must_use]
    pub fn segment_count(&self) -> usize {
        let n = self.points.len();
        match self.mode {
            LineMode::Strip => n.saturating_sub(1),
            LineMode::Segments => n / 2,
        }
    }

    /// Iterates over `(segment_index, start, end)`.
    pub fn iter_segments(&self) -> impl Iterator<Item = (usize, Vec3, Vec3)> + '_ {
        let step = match self.mode {
            LineMode::Strip => 1,
            LineMode::Segments => 2,
        };
        (0..self.segment_count()).map(move |i| {
            let start = i * step;
            (i, self.points[start], self.points[start + 1])
        })
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Vec3,
    /// Maximum corner.
    pub max: Vec3,
}

impl Aabb {
    /// Computes the bounds of a point set, or `None` if it is empty.
    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let (min, max) = iter.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        Some(Self { min, max })
    }

    /// Returns the box grown by `margin` on every side.
    #[must_use]
    pub fn expanded(&self, margin: f32) -> Self {
        Self {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    /// Box center.
    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// The eight corners; bit 0, 1 and 2 of the index select max x, y and z.
    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        std::array::from_fn(|i| {
            Vec3::select(
                glam::BVec3::new(i & 1 != 0, i & 2 != 0, i & 4 != 0),
                self.max,
                self.min,
            )
        })
    }

    /// The twelve box edges as line segments, for drawing box helpers.
    #[must_use]
    pub fn edges(&self) -> Polyline {
        let corners = self.corners();
        let points = (0..8usize)
            .flat_map(|i| {
                [1, 2, 4]
                    .into_iter()
                    .filter(move |bit| i & bit == 0)
                    .flat_map(move |bit| [corners[i], corners[i | bit]])
            })
            .collect();
        Polyline::segments(points)
    }

    /// Slab test against a ray, considering only `t >= 0`.
    #[must_use]
    pub fn intersects_ray(&self, ray: &Ray) -> bool {
        let mut t_near = 0.0_f32;
        let mut t_far = f32::INFINITY;
        for axis in 0..3 {
            let origin = ray.origin[axis];
            let direction = ray.direction[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if direction.abs() < 1e-12 {
                // Parallel to this slab: inside or never.
                if origin < lo || origin > hi {
                    return false;
                }
                continue;
            }
            let t0 = (lo - origin) / direction;
            let t1 = (hi - origin) / direction;
            t_near = t_near.max(t0.min(t1));
            t_far = t_far.min(t0.max(t1));
            if t_far < t_near {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_rejects_out_of_bounds_index() {
        let result = TriangleMesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 3]]);
        assert!(matches!(
            result,
            Err(HaloError::IndexOutOfBounds { index: 3, len: 3 })
        ));
    }

    #[test]
    fn test_with_normals_length_mismatch() {
        let result =
            TriangleMesh::with_normals(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![Vec3::Z], vec![]);
        assert!(matches!(result, Err(HaloError::InvalidGeometry(_))));
    }

    #[test]
    fn test_computed_normals_follow_winding() {
        let mesh =
            TriangleMesh::new(vec![Vec3::ZERO, Vec3::X, Vec3::Y], vec![[0, 1, 2]]).unwrap();
        for n in mesh.normals() {
            assert!((*n - Vec3::Z).length() < 1e-6);
        }
    }

    #[test]
    fn test_cuboid_faces_point_outward() {
        let cube = TriangleMesh::cuboid(2.0);
        assert_eq!(cube.positions().len(), 24);
        assert_eq!(cube.triangles().len(), 12);
        for i in 0..cube.triangles().len() {
            let [a, b, c] = cube.triangle(i);
            let face_normal = (b - a).cross(c - a).normalize();
            let centroid = (a + b + c) / 3.0;
            assert!(face_normal.dot(centroid) > 0.0, "triangle {i} faces inward");
        }
    }

    #[test]
    fn test_uv_sphere_radius_and_winding() {
        let sphere = TriangleMesh::uv_sphere(2.0, 16, 12);
        for p in sphere.positions() {
            assert!((p.length() - 2.0).abs() < 1e-4);
        }
        for i in 0..sphere.triangles().len() {
            let [a, b, c] = sphere.triangle(i);
            let face = (b - a).cross(c - a);
            if face.length_squared() > 1e-10 {
                assert!(face.dot(a + b + c) > 0.0, "triangle {i} faces inward");
            }
        }
    }

    #[test]
    fn test_torus_knot_counts() {
        let knot = TriangleMesh::torus_knot(60.0, 12.0, 96, 12, 2, 3);
        assert_eq!(knot.positions().len(), 97 * 13);
        assert_eq!(knot.triangles().len(), 96 * 12 * 2);
        assert_eq!(knot.normals().len(), knot.positions().len());
    }

    #[test]
    fn test_strip_and_segment_counts() {
        let points = vec![Vec3::ZERO, Vec3::X, Vec3::Y, Vec3::Z, Vec3::ONE];
        assert_eq!(Polyline::strip(points.clone()).segment_count(), 4);
        let pairs = Polyline::segments(points);
        assert_eq!(pairs.segment_count(), 2);
        let segs: Vec<_> = pairs.iter_segments().collect();
        assert_eq!(segs[1], (1, Vec3::Y, Vec3::Z));
    }

    #[test]
    fn test_empty_geometry_has_no_bounds() {
        let geometry = Geometry::from(Polyline::strip(vec![]));
        assert!(geometry.bounds().is_none());
        assert!(geometry.is_empty());
    }

    #[test]
    fn test_aabb_ray_slab() {
        let aabb = Aabb::from_points([Vec3::splat(-1.0), Vec3::splat(1.0)]).unwrap();
        let hit = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z);
        let miss = Ray::new(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z);
        let behind = Ray::new(Vec3::new(0.0, 0.0, 5.0), Vec3::Z);
        assert!(aabb.intersects_ray(&hit));
        assert!(!aabb.intersects_ray(&miss));
        assert!(!aabb.intersects_ray(&behind));
        assert!(aabb.expanded(2.5).intersects_ray(&miss));
    }

    #[test]
    fn test_aabb_edges() {
        let aabb = Aabb {
            min: Vec3::new(-1.0, -2.0, -3.0),
            max: Vec3::new(1.0, 2.0, 3.0),
        };
        let edges = aabb.edges();
        assert_eq!(edges.mode(), LineMode::Segments);
        assert_eq!(edges.segment_count(), 12);
        for (_, a, b) in edges.iter_segments() {
            // Each edge runs along exactly one axis
            let changed = (b - a).to_array().iter().filter(|d| d.abs() > 0.0).count();
            assert_eq!(changed, 1);
            assert!(aabb.corners().contains(&a));
            assert!(aabb.corners().contains(&b));
        }
        assert_eq!(Aabb::from_points(edges.points().iter().copied()), Some(aabb));
    }
}
