//! wgpu backend for halo-rs.
//!
//! This crate provides the [`RenderEngine`], which executes the frame plans
//! of a [`halo_core::Pipeline`]:
//! - ping-pong color + depth/stencil targets, recreated per viewport generation
//! - scene, stencil mask, outline, stencil clear and composite pipelines (WGSL)
//! - GPU geometry uploaded once per renderable
//! - frame capture and image export

// Documentation lints - internal functions don't need exhaustive panic/error docs
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
// wgpu descriptors make these long
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]

pub mod engine;
pub mod error;
pub mod gpu_geometry;
pub mod screenshot;

pub use engine::{
    CameraUniforms, CaptureTarget, PassPipelines, PassTarget, RenderEngine, TargetPair,
    OUTLINE_STENCIL_REF, TARGET_COLOR_FORMAT, TARGET_DEPTH_STENCIL_FORMAT,
};
pub use error::{RenderError, RenderResult};
pub use gpu_geometry::{mesh_vertex_data, segment_instance_data, GeometryCache, ObjectUniforms};
pub use screenshot::{save_image, save_to_buffer, ScreenshotError};
