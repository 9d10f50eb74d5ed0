//! Application window and event loop management.

mod input;

use std::sync::Arc;

use pollster::FutureExt;
use winit::{
    application::ApplicationHandler,
    dpi::LogicalSize,
    event_loop::{ActiveEventLoop, EventLoop},
    window::Window,
};

use halo_core::{Camera, HaloError, Pipeline, PipelineOptions, Renderable, Result};
use halo_render::RenderEngine;

pub use input::normalize_pointer;
use input::PointerState;

/// The viewer application state.
pub(crate) struct App {
    window: Option<Arc<Window>>,
    pipeline: Option<Pipeline<RenderEngine>>,
    scene: Vec<Renderable>,
    camera: Camera,
    options: PipelineOptions,
    pointer: PointerState,
    /// Set on Escape or close; no further frames are scheduled.
    close_requested: bool,
    failure: Option<HaloError>,
}

impl App {
    fn new(scene: Vec<Renderable>, camera: Camera, options: PipelineOptions) -> Self {
        Self {
            window: None,
            pipeline: None,
            scene,
            camera,
            options,
            pointer: PointerState::default(),
            close_requested: false,
            failure: None,
        }
    }

    /// Creates the window, the render engine and the pipeline driving it.
    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window_attributes = Window::default_attributes()
            .with_title("halo-rs")
            .with_inner_size(LogicalSize::new(1280, 720));

        let window = Arc::new(
            event_loop
                .create_window(window_attributes)
                .map_err(|e| HaloError::Render(format!("failed to create window: {e}")))?,
        );

        let engine = RenderEngine::new_windowed(window.clone()).block_on()?;
        let viewport = engine.viewport();
        self.camera.set_aspect_ratio(viewport.aspect_ratio());
        let pipeline = Pipeline::new(engine, self.options.clone(), viewport)?;

        self.window = Some(window);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// Runs one frame of the pipeline.
    fn redraw(&mut self) -> Result<()> {
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Ok(());
        };
        let report = pipeline.advance_frame(&mut self.camera, &self.scene)?;
        if let Some(window) = &self.window {
            window.set_title(&match report.selection {
                Some(id) => format!("halo-rs - renderable {id}"),
                None => "halo-rs".to_string(),
            });
        }
        Ok(())
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: HaloError) {
        log::error!("{error}");
        self.failure = Some(error);
        self.close_requested = true;
        event_loop.exit();
    }

    /// Current window size, which may be ahead of the pipeline's viewport.
    fn window_size(&self) -> Option<(u32, u32)> {
        self.window.as_ref().map(|w| {
            let size = w.inner_size();
            (size.width, size.height)
        })
    }
}

/// Opens a window showing `scene` and blocks until it is closed.
///
/// The renderable under the pointer is outlined; left-drag orbits the
/// camera and the wheel zooms.
///
/// # Errors
///
/// Returns an error if the event loop, window or GPU device cannot be created,
/// or if a frame fails to render.
pub fn run(scene: Vec<Renderable>, camera: Camera, options: PipelineOptions) -> Result<()> {
    let event_loop = EventLoop::new()
        .map_err(|e| HaloError::Render(format!("failed to create event loop: {e}")))?;
    let mut app = App::new(scene, camera, options);

    event_loop
        .run_app(&mut app)
        .map_err(|e| HaloError::Render(format!("event loop error: {e}")))?;

    match app.failure {
        Some(error) => Err(error),
        None => Ok(()),
    }
}
