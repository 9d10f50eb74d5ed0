//! Renderables handed to the pipeline by the surrounding scene.

use std::fmt;
use std::sync::Arc;

use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::Geometry;

/// Stable identity of a renderable across frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RenderableId(pub u64);

impl fmt::Display for RenderableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Which triangle faces can be hit by a pick ray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FaceSide {
    /// Counter-clockwise faces only.
    #[default]
    Front,
    /// Clockwise faces only.
    Back,
    /// Both windings.
    Double,
}

/// Surface appearance for the normal scene pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceMaterial {
    /// Base color (linear RGB).
    pub color: Vec3,
    /// Whether directional lighting is applied.
    pub lit: bool,
}

impl SurfaceMaterial {
    /// A lit material.
    #[must_use]
    pub fn lit(color: Vec3) -> Self {
        Self { color, lit: true }
    }

    /// An unlit, flat material.
    #[must_use]
    pub fn flat(color: Vec3) -> Self {
        Self { color, lit: false }
    }

    /// Converts a `0xRRGGBB` value to a lit material.
    #[must_use]
    pub fn from_hex(rgb: u32) -> Self {
        Self::lit(hex_to_rgb(rgb))
    }
}

impl Default for SurfaceMaterial {
    fn default() -> Self {
        Self::lit(Vec3::new(0.25, 0.5, 1.0))
    }
}

/// Converts a `0xRRGGBB` value to linear-ish RGB in `[0, 1]`.
#[must_use]
pub fn hex_to_rgb(rgb: u32) -> Vec3 {
    Vec3::new(
        ((rgb >> 16) & 0xFF) as f32 / 255.0,
        ((rgb >> 8) & 0xFF) as f32 / 255.0,
        (rgb & 0xFF) as f32 / 255.0,
    )
}

/// One pickable object of the scene.
#[derive(Debug, Clone)]
pub struct Renderable {
    /// Stable identity.
    pub id: RenderableId,
    /// Shared geometry.
    pub geometry: Arc<Geometry>,
    /// Object-to-world transform.
    pub transform: Mat4,
    /// Appearance in the normal pass.
    pub material: SurfaceMaterial,
    /// Faces eligible for picking.
    pub side: FaceSide,
    /// Whether the ray picker considers this renderable.
    pub pickable: bool,
}

impl Renderable {
    /// Creates a pickable renderable with an identity transform.
    pub fn new(id: RenderableId, geometry: impl Into<Arc<Geometry>>) -> Self {
        Self {
            id,
            geometry: geometry.into(),
            transform: Mat4::IDENTITY,
            material: SurfaceMaterial::default(),
            side: FaceSide::default(),
            pickable: true,
        }
    }

    /// Sets the world transform.
    #[must_use]
    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// Places the renderable at `translation`.
    #[must_use]
    pub fn at(self, translation: Vec3) -> Self {
        self.with_transform(Mat4::from_translation(translation))
    }

    /// Sets the surface material.
    #[must_use]
    pub fn with_material(mut self, material: SurfaceMaterial) -> Self {
        self.material = material;
        self
    }

    /// Sets the faces eligible for picking.
    #[must_use]
    pub fn with_side(mut self, side: FaceSide) -> Self {
        self.side = side;
        self
    }

    /// Excludes the renderable from picking.
    #[must_use]
    pub fn non_pickable(mut self) -> Self {
        self.pickable = false;
        self
    }

    /// A box drawn around this renderable's bounds, sharing its transform.
    /// The helper is never picked. `None` for empty geometry.
    #[must_use]
    pub fn bounds_helper(&self, id: RenderableId, color: Vec3) -> Option<Renderable> {
        let bounds = self.geometry.bounds()?;
        Some(
            Renderable::new(id, Geometry::Lines(bounds.edges()))
                .with_transform(self.transform)
                .with_material(SurfaceMaterial::flat(color))
                .non_pickable(),
        )
    }
}

/// Looks up a renderable by identity.
#[must_use]
pub fn find_renderable(renderables: &[Renderable], id: RenderableId) -> Option<&Renderable> {
    renderables.iter().find(|r| r.id == id)
}
