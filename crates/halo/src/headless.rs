//! Headless rendering API.
//!
//! Runs the same pipeline as the viewer against an offscreen capture
//! texture. Useful for integration tests, batch processing and automated
//! screenshot generation.

use std::path::Path;

use glam::Vec2;
use pollster::FutureExt;

use halo_core::{
    Camera, FrameReport, HaloError, Pipeline, PipelineOptions, Renderable, Result, Viewport,
};
use halo_render::RenderEngine;

/// A windowless pipeline that can render several frames in a row.
///
/// # Example
/// ```no_run
/// use halo::*;
///
/// let scene = vec![Renderable::new(
///     RenderableId(1),
///     Geometry::Mesh(TriangleMesh::uv_sphere(1.0, 32, 16)),
/// )];
/// let mut camera = Camera::new(1.0).with_position(Vec3::new(0.0, 0.0, 5.0));
///
/// let mut renderer = HeadlessRenderer::new(256, 256, PipelineOptions::default()).unwrap();
/// renderer.pointer_moved(Vec2::ZERO);
/// let report = renderer.render_frame(&mut camera, &scene).unwrap();
/// assert_eq!(report.selection, Some(RenderableId(1)));
/// let pixels = renderer.capture().unwrap();
/// assert_eq!(pixels.len(), 256 * 256 * 4);
/// ```
pub struct HeadlessRenderer {
    pipeline: Pipeline<RenderEngine>,
}

impl HeadlessRenderer {
    /// Creates a headless GPU context and a pipeline of the given size.
    ///
    /// # Errors
    ///
    /// Returns an error for a zero size or if no GPU adapter is available.
    pub fn new(width: u32, height: u32, options: PipelineOptions) -> Result<Self> {
        let viewport = Viewport::new(width, height)?;
        let engine = RenderEngine::new_headless(width, height).block_on()?;
        let pipeline = Pipeline::new(engine, options, viewport)?;
        Ok(Self { pipeline })
    }

    /// Sets the pointer, in normalized device coordinates, for the next frame.
    pub fn pointer_moved(&mut self, ndc: Vec2) {
        self.pipeline.pointer_moved(ndc);
    }

    /// Removes the pointer; the next frame has no selection.
    pub fn pointer_left(&mut self) {
        self.pipeline.pointer_left();
    }

    /// Requests a new size, applied at the start of the next frame.
    pub fn resized(&mut self, width: u32, height: u32) {
        self.pipeline.resized(width, height);
    }

    /// Renders one frame into the capture texture.
    pub fn render_frame(&mut self, camera: &mut Camera, scene: &[Renderable]) -> Result<FrameReport> {
        self.pipeline.advance_frame(camera, scene)
    }

    /// Reads back the last rendered frame as RGBA8, row by row from the top left.
    pub fn capture(&self) -> Result<Vec<u8>> {
        self.pipeline.backend().capture_frame().map_err(|e| {
            log::error!("frame capture failed: {e}");
            HaloError::from(e)
        })
    }

    /// Size of the frames rendered so far. A size beyond the device's
    /// texture limit is scaled down to fit.
    pub fn viewport(&self) -> Viewport {
        self.pipeline.viewport()
    }

    /// The pipeline driving this renderer.
    pub fn pipeline(&self) -> &Pipeline<RenderEngine> {
        &self.pipeline
    }
}

/// Renders a single frame of `scene` to a raw RGBA pixel buffer.
///
/// The buffer has `width * height * 4` bytes. With a `pointer` the
/// renderable under it is outlined. The camera's aspect ratio is adjusted
/// to the image.
pub fn render_to_image(
    scene: &[Renderable],
    camera: &Camera,
    pointer: Option<Vec2>,
    width: u32,
    height: u32,
) -> Result<Vec<u8>> {
    render_single(scene, camera, pointer, width, height).map(|(data, _)| data)
}

fn render_single(
    scene: &[Renderable],
    camera: &Camera,
    pointer: Option<Vec2>,
    width: u32,
    height: u32,
) -> Result<(Vec<u8>, Viewport)> {
    let mut renderer = HeadlessRenderer::new(width, height, PipelineOptions::default())?;
    let mut camera = camera.clone();
    camera.set_aspect_ratio(renderer.viewport().aspect_ratio());
    if let Some(ndc) = pointer {
        renderer.pointer_moved(ndc);
    }
    let report = renderer.render_frame(&mut camera, scene)?;
    Ok((renderer.capture()?, report.viewport))
}

/// Renders a single frame of `scene` and saves it as a PNG or JPEG image.
pub fn render_to_file(
    path: impl AsRef<Path>,
    scene: &[Renderable],
    camera: &Camera,
    pointer: Option<Vec2>,
    width: u32,
    height: u32,
) -> Result<()> {
    let (data, viewport) = render_single(scene, camera, pointer, width, height)?;
    halo_render::save_image(path, &data, viewport.width, viewport.height)
        .map_err(|e| HaloError::Render(format!("failed to save image: {e}")))
}
