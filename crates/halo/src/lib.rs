//! halo-rs: pointer-driven picking with stencil-masked selection outlines.
//!
//! Every frame the renderable under the pointer is found by ray casting,
//! becomes the single selection, and is redrawn as a stencil mask plus an
//! offset silhouette so that only its rim shows in the outline color.
//!
//! # Quick Start
//!
//! ```no_run
//! use halo::*;
//!
//! fn main() -> Result<()> {
//!     init_logging();
//!
//!     let knot = TriangleMesh::torus_knot(1.0, 0.3, 128, 16, 2, 3);
//!     let scene = vec![Renderable::new(RenderableId(1), Geometry::Mesh(knot))];
//!     let camera = Camera::new(16.0 / 9.0).with_position(Vec3::new(0.0, 0.0, 6.0));
//!
//!     // Opens a window and blocks until it is closed
//!     run(scene, camera, PipelineOptions::default())
//! }
//! ```
//!
//! The same pipeline renders without a window through [`HeadlessRenderer`].

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]

mod app;
pub mod headless;

pub use app::{normalize_pointer, run};
pub use headless::{render_to_file, render_to_image, HeadlessRenderer};

// Re-export core types
pub use halo_core::{
    find_renderable, hex_to_rgb, outline_line_width, Aabb, Camera, Emphasis, FaceSide, FramePlan,
    FrameReport, Geometry, HaloError, HitElement, LineMode, LineWidths, OutlineMaterial,
    OverlayScenes, PassGraph, PassKind, Pipeline, PipelineOptions, Polyline, ProjectionMode, Ray,
    RayHit, RayPicker, RecordedFrame, RecordedPass, RecordingBackend, RenderBackend, Renderable,
    RenderableId, Result, Selection, SelectionChange, SurfaceMaterial, TriangleMesh, Viewport,
    DEFAULT_LINE_PRECISION, DEFAULT_OUTLINE_COLOR, DEFAULT_OUTLINE_OFFSET,
};

// Re-export render types
pub use halo_render::{save_image, RenderEngine, RenderError};

// Re-export glam types for convenience
pub use glam::{Mat4, Vec2, Vec3, Vec4};

/// Initializes `env_logger` from `RUST_LOG`. Calling it again is harmless.
pub fn init_logging() {
    let _ = env_logger::try_init();
}
