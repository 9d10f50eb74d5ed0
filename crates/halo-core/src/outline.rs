//! Outline and mask materials.
//!
//! The outline is an enlarged silhouette: every vertex is pushed along its own
//! object-space normal before the world/view/projection transform and filled
//! with a flat, unlit color. Geometry with split normals (a cube's hard edges)
//! opens small gaps at the corners of the silhouette.

use glam::{Mat4, Vec3};

/// Default offset along the normal.
pub const DEFAULT_OUTLINE_OFFSET: f32 = 1.618;

/// Default outline color (cyan).
pub const DEFAULT_OUTLINE_COLOR: Vec3 = Vec3::new(0.0, 1.0, 1.0);

/// Immutable description of the outline fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OutlineMaterial {
    offset: f32,
    color: Vec3,
}

impl Default for OutlineMaterial {
    fn default() -> Self {
        Self::new(DEFAULT_OUTLINE_OFFSET, DEFAULT_OUTLINE_COLOR)
    }
}

impl OutlineMaterial {
    /// Creates an outline material. Non-finite offsets are treated as zero.
    #[must_use]
    pub fn new(offset: f32, color: Vec3) -> Self {
        Self {
            offset: if offset.is_finite() { offset } else { 0.0 },
            color: color.clamp(Vec3::ZERO, Vec3::ONE),
        }
    }

    /// Distance along the vertex normal, in object units.
    #[must_use]
    pub fn offset(&self) -> f32 {
        self.offset
    }

    /// Flat fill color.
    #[must_use]
    pub fn color(&self) -> Vec3 {
        self.color
    }

    /// Object-space position of a displaced outline vertex.
    #[must_use]
    pub fn displace(&self, position: Vec3, normal: Vec3) -> Vec3 {
        position + normal * self.offset
    }

    /// Packs the material with a model matrix for the outline shader.
    #[must_use]
    pub fn uniforms(&self, model: Mat4) -> OutlineUniforms {
        OutlineUniforms {
            model: model.to_cols_array_2d(),
            color: self.color.extend(1.0).to_array(),
            offset: self.offset,
            line_width: 0.0,
            _padding: [0.0; 2],
        }
    }
}

/// GPU layout of the outline/mask draw uniforms.
#[repr(C)]
#[allow(clippy::pub_underscore_fields)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
pub struct OutlineUniforms {
    pub model: [[f32; 4]; 4],
    pub color: [f32; 4],
    pub offset: f32,
    /// Pixel width when the entry is line geometry.
    pub line_width: f32,
    pub _padding: [f32; 2],
}

/// Flat black fill used for the stencil mask copy. Only its coverage matters.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct MaskMaterial;

impl MaskMaterial {
    /// Fill color of the mask copy.
    pub const COLOR: Vec3 = Vec3::ZERO;

    /// Mask uniforms: no displacement, black fill.
    #[must_use]
    pub fn uniforms(&self, model: Mat4) -> OutlineUniforms {
        OutlineMaterial::new(0.0, Self::COLOR).uniforms(model)
    }
}

/// Pixel width of the outline drawn around a selected line.
#[must_use]
pub fn outline_line_width(highlighted: f32, offset: f32) -> f32 {
    (highlighted + 2.0 * offset).max(highlighted)
}
