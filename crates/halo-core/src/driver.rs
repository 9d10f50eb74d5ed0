//! The pipeline driver: one call per displayed frame.

use glam::Vec2;

use crate::backend::{FrameContext, RenderBackend};
use crate::camera::Camera;
use crate::error::Result;
use crate::options::PipelineOptions;
use crate::outline::OutlineMaterial;
use crate::overlay::OverlayScenes;
use crate::pass_graph::{PassGraph, Viewport};
use crate::pick::{RayHit, RayPicker};
use crate::renderable::{Renderable, RenderableId};
use crate::selection::{Selection, SelectionChange};

/// What happened during one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameReport {
    /// Frame counter, starting at 1.
    pub frame: u64,
    /// Output size the frame was rendered at.
    pub viewport: Viewport,
    /// This frame's pick result.
    pub hit: Option<RayHit>,
    /// Selection after the frame.
    pub selection: Option<RenderableId>,
    pub change: SelectionChange,
}

/// Drives picking, selection, overlay rebuild and the pass graph.
///
/// Pointer and resize notifications are only buffered; they take effect at
/// the start of the next [`Pipeline::advance_frame`].
pub struct Pipeline<B: RenderBackend> {
    backend: B,
    options: PipelineOptions,
    picker: RayPicker,
    outline: OutlineMaterial,
    graph: PassGraph,
    selection: Selection,
    overlays: OverlayScenes,
    pointer: Option<Vec2>,
    pending_resize: Option<Viewport>,
    frame: u64,
}

impl<B: RenderBackend> Pipeline<B> {
    /// Creates the pipeline and the backend's first targets.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot create its targets.
    pub fn new(mut backend: B, options: PipelineOptions, viewport: Viewport) -> Result<Self> {
        let viewport = fit_to_backend(&backend, viewport);
        let graph = PassGraph::outline(viewport, options.mask_inverse);
        backend.recreate_targets(&graph.targets())?;
        log::info!(
            "pipeline created at {}x{}",
            viewport.width,
            viewport.height
        );

        Ok(Self {
            picker: options.picker(),
            outline: options.outline_material(),
            backend,
            options,
            graph,
            selection: Selection::new(),
            overlays: OverlayScenes::new(),
            pointer: None,
            pending_resize: None,
            frame: 0,
        })
    }

    /// Records the latest pointer position in normalized device coordinates.
    pub fn pointer_moved(&mut self, ndc: Vec2) {
        self.pointer = Some(ndc);
    }

    /// Records that the pointer left the viewport.
    pub fn pointer_left(&mut self) {
        self.pointer = None;
    }

    /// Records the latest viewport size. Zero-sized notifications are ignored.
    pub fn resized(&mut self, width: u32, height: u32) {
        match Viewport::new(width, height) {
            Ok(viewport) => self.pending_resize = Some(viewport),
            Err(_) => log::debug!("ignoring resize to {width}x{height}"),
        }
    }

    /// Runs one frame: applies a pending resize, picks, updates the selection,
    /// rebuilds the mask and outline scenes, and executes the pass graph.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend fails to recreate targets or draw.
    pub fn advance_frame(
        &mut self,
        camera: &mut Camera,
        renderables: &[Renderable],
    ) -> Result<FrameReport> {
        self.frame += 1;

        if let Some(requested) = self.pending_resize.take() {
            let viewport = fit_to_backend(&self.backend, requested);
            camera.set_aspect_ratio(viewport.aspect_ratio());
            if self.graph.resize(viewport) {
                self.backend.recreate_targets(&self.graph.targets())?;
                log::info!(
                    "render targets recreated at {}x{} (generation {})",
                    viewport.width,
                    viewport.height,
                    self.graph.targets().generation
                );
            }
        }

        let hit = self
            .pointer
            .and_then(|pointer| self.picker.cast(pointer, camera, renderables));
        let change = self.selection.update(hit.as_ref());
        if change != SelectionChange::Unchanged {
            log::debug!("frame {}: selection {:?}", self.frame, change);
        }
        self.overlays.rebuild(&self.selection, renderables);

        let plan = self.graph.plan();
        let context = FrameContext {
            frame: self.frame,
            camera,
            renderables,
            overlays: &self.overlays,
            outline: &self.outline,
            line_widths: self.options.line_widths,
            selection: self.selection,
            clear_color: self.options.clear_color,
            plan: &plan,
        };
        self.backend.execute(&context)?;

        Ok(FrameReport {
            frame: self.frame,
            viewport: self.graph.viewport(),
            hit,
            selection: self.selection.current(),
            change,
        })
    }

    /// Enables or disables an optional pass of the graph.
    ///
    /// # Errors
    ///
    /// Returns an error for a required pass, an unknown index, or an outline
    /// left without its mask.
    pub fn set_pass_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        self.graph.set_enabled(index, enabled)
    }

    /// The current selection.
    #[must_use]
    pub fn selection(&self) -> Selection {
        self.selection
    }

    /// The mask and outline scenes of the last frame.
    #[must_use]
    pub fn overlays(&self) -> &OverlayScenes {
        &self.overlays
    }

    /// The pass graph.
    #[must_use]
    pub fn pass_graph(&self) -> &PassGraph {
        &self.graph
    }

    /// The configuration.
    #[must_use]
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// The viewport the last frame was rendered at.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.graph.viewport()
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The backend, mutably.
    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }
}

/// Shrinks `viewport` to what `backend` can allocate.
fn fit_to_backend<B: RenderBackend>(backend: &B, viewport: Viewport) -> Viewport {
    let fitted = viewport.fit_within(backend.max_target_dimension());
    if fitted != viewport {
        log::warn!(
            "viewport {}x{} exceeds the target limit, rendering at {}x{}",
            viewport.width,
            viewport.height,
            fitted.width,
            fitted.height
        );
    }
    fitted
}
