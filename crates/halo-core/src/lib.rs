//! Core logic for halo-rs: pointer picking and selection outlines.
//!
//! This crate holds everything that does not touch the GPU:
//! - [`RayPicker`] for finding the renderable under the pointer
//! - [`Selection`] and the mask/outline [`OverlayScenes`] derived from it
//! - [`OutlineMaterial`] describing the offset silhouette
//! - [`PassGraph`] with its ping-pong render targets
//! - [`Pipeline`], the per-frame driver, generic over a [`RenderBackend`]

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
// Builder patterns return Self which doesn't need must_use
#![allow(clippy::must_use_candidate)]
// Pixel sizes and vertex counts are converted to f32 on purpose
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

pub mod backend;
pub mod camera;
pub mod driver;
pub mod error;
pub mod geometry;
pub mod options;
pub mod outline;
pub mod overlay;
pub mod pass_graph;
pub mod pick;
pub mod renderable;
pub mod selection;

pub use backend::{FrameContext, RecordedFrame, RecordedPass, RecordingBackend, RenderBackend};
pub use camera::{Camera, ProjectionMode};
pub use driver::{FrameReport, Pipeline};
pub use error::{HaloError, Result};
pub use geometry::{Aabb, Geometry, LineMode, Polyline, TriangleMesh};
pub use options::PipelineOptions;
pub use outline::{
    outline_line_width, MaskMaterial, OutlineMaterial, OutlineUniforms, DEFAULT_OUTLINE_COLOR,
    DEFAULT_OUTLINE_OFFSET,
};
pub use overlay::{OverlayEntry, OverlayScene, OverlayScenes};
pub use pass_graph::{
    FramePlan, PassGraph, PassInvocation, PassKind, PassNode, TargetHandle, TargetSet, TargetSlot,
    Viewport,
};
pub use pick::{HitElement, Ray, RayHit, RayPicker, SegmentProximity, DEFAULT_LINE_PRECISION};
pub use renderable::{
    find_renderable, hex_to_rgb, FaceSide, Renderable, RenderableId, SurfaceMaterial,
};
pub use selection::{Emphasis, LineWidths, Selection, SelectionChange};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};
