//! The seam between the pipeline driver and a renderer.

use glam::Vec3;

use crate::camera::Camera;
use crate::error::{HaloError, Result};
use crate::outline::OutlineMaterial;
use crate::overlay::OverlayScenes;
use crate::pass_graph::{FramePlan, PassInvocation, PassKind, TargetSet};
use crate::renderable::{Renderable, RenderableId};
use crate::selection::{Emphasis, LineWidths, Selection};

/// Everything a backend needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext<'a> {
    /// Frame counter, starting at 1.
    pub frame: u64,
    pub camera: &'a Camera,
    pub renderables: &'a [Renderable],
    pub overlays: &'a OverlayScenes,
    pub outline: &'a OutlineMaterial,
    pub line_widths: LineWidths,
    pub selection: Selection,
    /// Background color of the scene pass.
    pub clear_color: Vec3,
    pub plan: &'a FramePlan,
}

impl FrameContext<'_> {
    /// Emphasis of a renderable in this frame.
    #[must_use]
    pub fn emphasis(&self, id: RenderableId) -> Emphasis {
        self.selection.emphasis(id)
    }

    /// Pixel width for drawing the line renderable `id` in the scene pass.
    #[must_use]
    pub fn line_width(&self, id: RenderableId) -> f32 {
        self.line_widths.width(self.emphasis(id))
    }
}

/// A renderer that can execute frame plans.
pub trait RenderBackend {
    /// Releases the current off-screen targets and creates new ones for `targets`.
    ///
    /// # Errors
    ///
    /// Returns an error if the targets cannot be created.
    fn recreate_targets(&mut self, targets: &TargetSet) -> Result<()>;

    /// Largest width or height the backend can allocate targets for.
    fn max_target_dimension(&self) -> u32 {
        u32::MAX
    }

    /// Runs the passes of `frame.plan` in order and presents the result.
    ///
    /// # Errors
    ///
    /// Returns an error if the plan references stale targets or drawing fails.
    fn execute(&mut self, frame: &FrameContext<'_>) -> Result<()>;
}

/// A pass as seen by the [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedPass {
    pub invocation: PassInvocation,
    /// Renderables drawn by this pass, in draw order.
    pub draws: Vec<RenderableId>,
}

/// A frame as seen by the [`RecordingBackend`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFrame {
    pub frame: u64,
    pub targets: TargetSet,
    pub selection: Option<RenderableId>,
    pub passes: Vec<RecordedPass>,
}

impl RecordedFrame {
    /// Pass kinds in execution order.
    #[must_use]
    pub fn kinds(&self) -> Vec<PassKind> {
        self.passes.iter().map(|p| p.invocation.kind).collect()
    }

    /// Draws of the first pass matching `kind`.
    #[must_use]
    pub fn draws(&self, kind: PassKind) -> &[RenderableId] {
        self.passes
            .iter()
            .find(|p| p.invocation.kind == kind)
            .map(|p| p.draws.as_slice())
            .unwrap_or(&[])
    }
}

/// Backend that draws nothing and records what it was asked to do.
///
/// Frames are kept until [`RecordingBackend::take_frames`] drains them; with
/// a frame capacity only the most recent frames are retained.
#[derive(Debug, Default)]
pub struct RecordingBackend {
    live: Option<TargetSet>,
    target_sets: Vec<TargetSet>,
    frames: Vec<RecordedFrame>,
    frame_capacity: Option<usize>,
    max_target_dimension: Option<u32>,
}

impl RecordingBackend {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Keeps at most `capacity` frames, dropping the oldest first.
    #[must_use]
    pub fn with_frame_capacity(mut self, capacity: usize) -> Self {
        self.frame_capacity = Some(capacity.max(1));
        self
    }

    /// Refuses targets wider or taller than `max`, like a device limit.
    #[must_use]
    pub fn with_max_target_dimension(mut self, max: u32) -> Self {
        self.max_target_dimension = Some(max);
        self
    }

    /// Removes and returns the recorded frames, oldest first.
    pub fn take_frames(&mut self) -> Vec<RecordedFrame> {
        std::mem::take(&mut self.frames)
    }

    /// Every target set created so far, oldest first.
    #[must_use]
    pub fn target_sets(&self) -> &[TargetSet] {
        &self.target_sets
    }

    /// The targets currently alive.
    #[must_use]
    pub fn live_targets(&self) -> Option<TargetSet> {
        self.live
    }

    /// Every executed frame, oldest first.
    #[must_use]
    pub fn frames(&self) -> &[RecordedFrame] {
        &self.frames
    }

    /// The most recent frame.
    #[must_use]
    pub fn last_frame(&self) -> Option<&RecordedFrame> {
        self.frames.last()
    }
}

impl RenderBackend for RecordingBackend {
    fn recreate_targets(&mut self, targets: &TargetSet) -> Result<()> {
        let max = self.max_target_dimension();
        if targets.viewport.width > max || targets.viewport.height > max {
            return Err(HaloError::Render(format!(
                "targets of {}x{} exceed the {max} pixel limit",
                targets.viewport.width, targets.viewport.height
            )));
        }
        self.live = Some(*targets);
        self.target_sets.push(*targets);
        Ok(())
    }

    fn max_target_dimension(&self) -> u32 {
        self.max_target_dimension.unwrap_or(u32::MAX)
    }

    fn execute(&mut self, frame: &FrameContext<'_>) -> Result<()> {
        let live = self
            .live
            .ok_or_else(|| HaloError::Render("no render targets".to_string()))?;
        frame.plan.check(&live)?;

        let passes = frame
            .plan
            .passes
            .iter()
            .map(|invocation| {
                let draws = match invocation.kind {
                    PassKind::Scene => frame.renderables.iter().map(|r| r.id).collect(),
                    PassKind::Mask { .. } => frame.overlays.mask().iter().map(|e| e.id).collect(),
                    PassKind::Outline => frame.overlays.outline().iter().map(|e| e.id).collect(),
                    PassKind::ClearMask | PassKind::Composite => Vec::new(),
                };
                RecordedPass {
                    invocation: *invocation,
                    draws,
                }
            })
            .collect();

        self.frames.push(RecordedFrame {
            frame: frame.frame,
            targets: live,
            selection: frame.selection.current(),
            passes,
        });
        if let Some(capacity) = self.frame_capacity {
            let excess = self.frames.len().saturating_sub(capacity);
            self.frames.drain(..excess);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pass_graph::{PassGraph, Viewport};

    fn context<'a>(
        frame: u64,
        camera: &'a Camera,
        overlays: &'a OverlayScenes,
        outline: &'a OutlineMaterial,
        plan: &'a FramePlan,
    ) -> FrameContext<'a> {
        FrameContext {
            frame,
            camera,
            renderables: &[],
            overlays,
            outline,
            line_widths: LineWidths::default(),
            selection: Selection::new(),
            clear_color: Vec3::ZERO,
            plan,
        }
    }

    #[test]
    fn test_execute_without_targets_fails() {
        let graph = PassGraph::outline(Viewport::new(2, 2).unwrap(), true);
        let plan = graph.plan();
        let camera = Camera::default();
        let overlays = OverlayScenes::new();
        let outline = OutlineMaterial::default();
        let frame = context(1, &camera, &overlays, &outline, &plan);

        let mut backend = RecordingBackend::new();
        assert!(backend.execute(&frame).is_err());
        backend.recreate_targets(&graph.targets()).unwrap();
        backend.execute(&frame).unwrap();
        assert_eq!(backend.frames().len(), 1);
        assert!(backend.last_frame().unwrap().draws(PassKind::Outline).is_empty());
    }

    #[test]
    fn test_frame_capacity_and_take() {
        let graph = PassGraph::outline(Viewport::new(2, 2).unwrap(), true);
        let plan = graph.plan();
        let camera = Camera::default();
        let overlays = OverlayScenes::new();
        let outline = OutlineMaterial::default();

        let mut backend = RecordingBackend::new().with_frame_capacity(2);
        backend.recreate_targets(&graph.targets()).unwrap();
        for n in 1..=5 {
            backend
                .execute(&context(n, &camera, &overlays, &outline, &plan))
                .unwrap();
        }
        let kept: Vec<u64> = backend.frames().iter().map(|f| f.frame).collect();
        assert_eq!(kept, vec![4, 5]);

        assert_eq!(backend.take_frames().len(), 2);
        assert!(backend.frames().is_empty());
        assert!(backend.last_frame().is_none());
    }

    #[test]
    fn test_oversized_targets_rejected() {
        let mut backend = RecordingBackend::new().with_max_target_dimension(64);
        assert_eq!(backend.max_target_dimension(), 64);
        let small = PassGraph::outline(Viewport::new(64, 32).unwrap(), true);
        let large = PassGraph::outline(Viewport::new(65, 32).unwrap(), true);
        backend.recreate_targets(&small.targets()).unwrap();
        assert!(backend.recreate_targets(&large.targets()).is_err());
        assert_eq!(backend.live_targets(), Some(small.targets()));
    }
}
