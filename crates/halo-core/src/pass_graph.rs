//! The fixed pass graph: scene, stencil mask, outline, stencil clear, composite.
//!
//! Two off-screen targets (color + depth/stencil) are ping-ponged between
//! passes. Render passes draw into the current read target, the mask and
//! clear passes touch the stencil of both targets, and a pass that needs a
//! swap exchanges the read and write targets after it runs. Target handles
//! carry a generation that is bumped on every resize, so a handle from a
//! previous viewport size can always be told apart from a current one.

use serde::{Deserialize, Serialize};

use crate::error::{HaloError, Result};

/// Size of the output in pixels. Both dimensions are non-zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    /// Creates a viewport.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::InvalidViewport`] if either dimension is zero.
    pub fn new(width: u32, height: u32) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(HaloError::InvalidViewport { width, height });
        }
        Ok(Self { width, height })
    }

    /// Width divided by height.
    #[must_use]
    pub fn aspect_ratio(&self) -> f32 {
        self.width as f32 / self.height as f32
    }

    /// Scales the viewport down, keeping its aspect ratio, until neither
    /// dimension exceeds `max_dimension`.
    #[must_use]
    pub fn fit_within(self, max_dimension: u32) -> Self {
        let max_dimension = max_dimension.max(1);
        let largest = self.width.max(self.height);
        if largest <= max_dimension {
            return self;
        }
        let scale = f64::from(max_dimension) / f64::from(largest);
        let fit = |d: u32| ((f64::from(d) * scale).floor() as u32).clamp(1, max_dimension);
        Self {
            width: fit(self.width),
            height: fit(self.height),
        }
    }
}

/// One of the two ping-pong targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TargetSlot {
    A,
    B,
}

impl TargetSlot {
    /// The other slot.
    #[must_use]
    pub fn other(self) -> Self {
        match self {
            TargetSlot::A => TargetSlot::B,
            TargetSlot::B => TargetSlot::A,
        }
    }
}

/// Reference to an off-screen target of a specific generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TargetHandle {
    pub slot: TargetSlot,
    pub generation: u64,
    pub viewport: Viewport,
}

/// The pair of targets of the current generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetSet {
    pub generation: u64,
    pub viewport: Viewport,
}

impl TargetSet {
    /// Handle for `slot`.
    #[must_use]
    pub fn handle(&self, slot: TargetSlot) -> TargetHandle {
        TargetHandle {
            slot,
            generation: self.generation,
            viewport: self.viewport,
        }
    }

    /// Both handles, A first.
    #[must_use]
    pub fn handles(&self) -> [TargetHandle; 2] {
        [self.handle(TargetSlot::A), self.handle(TargetSlot::B)]
    }

    /// Checks that `handle` belongs to this generation.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::StaleTarget`] for a handle of another generation.
    pub fn check(&self, handle: &TargetHandle) -> Result<()> {
        if handle.generation != self.generation || handle.viewport != self.viewport {
            return Err(HaloError::StaleTarget {
                expected: self.generation,
                actual: handle.generation,
            });
        }
        Ok(())
    }
}

/// What a pass does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PassKind {
    /// Draws every renderable with its surface material into the read target.
    Scene,
    /// Writes the mask scene into the stencil of both targets. With `inverse`
    /// the covered pixels are excluded from later stencil-tested passes.
    Mask { inverse: bool },
    /// Draws the outline scene into the read target where the stencil test passes.
    Outline,
    /// Resets the stencil of both targets.
    ClearMask,
    /// Copies the read target to the write target or the screen.
    Composite,
}

impl PassKind {
    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PassKind::Scene => "scene",
            PassKind::Mask { .. } => "mask",
            PassKind::Outline => "outline",
            PassKind::ClearMask => "clear-mask",
            PassKind::Composite => "composite",
        }
    }
}

/// A pass of the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassNode {
    pub kind: PassKind,
    pub enabled: bool,
    /// Swap read and write targets after this pass.
    pub needs_swap: bool,
    /// Clear the output before drawing.
    pub clear: bool,
}

impl PassNode {
    fn new(kind: PassKind, needs_swap: bool, clear: bool) -> Self {
        Self {
            kind,
            enabled: true,
            needs_swap,
            clear,
        }
    }
}

/// One pass of a frame, bound to concrete targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassInvocation {
    pub kind: PassKind,
    /// Target drawn into by render passes and sampled by the composite.
    pub read: TargetHandle,
    /// The other target.
    pub write: TargetHandle,
    /// The output goes to the presentation surface.
    pub to_screen: bool,
    pub clear: bool,
}

/// The passes of one frame in execution order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramePlan {
    pub targets: TargetSet,
    pub passes: Vec<PassInvocation>,
}

impl FramePlan {
    /// Pass kinds in order.
    #[must_use]
    pub fn kinds(&self) -> Vec<PassKind> {
        self.passes.iter().map(|p| p.kind).collect()
    }

    /// Checks every handle against `targets`.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::StaleTarget`] for the first foreign handle.
    pub fn check(&self, targets: &TargetSet) -> Result<()> {
        for pass in &self.passes {
            targets.check(&pass.read)?;
            targets.check(&pass.write)?;
        }
        Ok(())
    }
}

/// Ordered passes sharing two ping-pong targets.
#[derive(Debug, Clone)]
pub struct PassGraph {
    nodes: Vec<PassNode>,
    targets: TargetSet,
}

impl PassGraph {
    /// Builds the five-pass outline pipeline.
    #[must_use]
    pub fn outline(viewport: Viewport, mask_inverse: bool) -> Self {
        Self {
            nodes: vec![
                PassNode::new(PassKind::Scene, false, true),
                PassNode::new(
                    PassKind::Mask {
                        inverse: mask_inverse,
                    },
                    false,
                    false,
                ),
                // draws over the scene result
                PassNode::new(PassKind::Outline, false, false),
                PassNode::new(PassKind::ClearMask, false, false),
                PassNode::new(PassKind::Composite, true, false),
            ],
            targets: TargetSet {
                generation: 0,
                viewport,
            },
        }
    }

    /// Builds a graph from explicit passes.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::InvalidPassOrder`] if the order is not valid.
    pub fn with_passes(nodes: Vec<PassNode>, viewport: Viewport) -> Result<Self> {
        let graph = Self {
            nodes,
            targets: TargetSet {
                generation: 0,
                viewport,
            },
        };
        graph.validate()?;
        Ok(graph)
    }

    /// The passes.
    #[must_use]
    pub fn nodes(&self) -> &[PassNode] {
        &self.nodes
    }

    /// The current targets.
    #[must_use]
    pub fn targets(&self) -> TargetSet {
        self.targets
    }

    /// The current output size.
    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.targets.viewport
    }

    /// Checks the ordering rules: the scene pass comes first, a mask comes
    /// before any outline, a stencil clear follows the mask and outline, and
    /// the composite is the single last pass. The rules hold for the full
    /// pass list and for the passes currently enabled.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::InvalidPassOrder`] describing the first violation.
    pub fn validate(&self) -> Result<()> {
        let kinds: Vec<PassKind> = self.nodes.iter().map(|n| n.kind).collect();
        validate_order(&kinds)?;
        let enabled: Vec<PassKind> = self
            .nodes
            .iter()
            .filter(|n| n.enabled)
            .map(|n| n.kind)
            .collect();
        validate_order(&enabled)
    }
    /// Enables or disables the pass at `index`. The scene, clear-mask and
    /// composite passes always run, and the enabled passes must still form a
    /// valid order, so an outline cannot run without its mask.
    ///
    /// # Errors
    ///
    /// Returns [`HaloError::InvalidPassOrder`] for a required pass, a bad
    /// index, or a toggle that breaks the ordering rules. The graph is left
    /// unchanged on error.
    pub fn set_enabled(&mut self, index: usize, enabled: bool) -> Result<()> {
        let node = self
            .nodes
            .get_mut(index)
            .ok_or_else(|| HaloError::InvalidPassOrder(format!("no pass at index {index}")))?;
        if !enabled
            && matches!(
                node.kind,
                PassKind::Scene | PassKind::ClearMask | PassKind::Composite
            )
        {
            return Err(HaloError::InvalidPassOrder(format!(
                "{} pass cannot be disabled",
                node.kind.name()
            )));
        }

        let previous = std::mem::replace(&mut node.enabled, enabled);
        if let Err(error) = self.validate() {
            self.nodes[index].enabled = previous;
            return Err(error);
        }
        Ok(())
    }

    /// Moves to a new output size. Returns true if the targets changed, in
    /// which case every handle of the previous generation is stale.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        if viewport == self.targets.viewport {
            return false;
        }
        self.targets = TargetSet {
            generation: self.targets.generation + 1,
            viewport,
        };
        true
    }

    /// Binds the enabled passes to the current targets.
    #[must_use]
    pub fn plan(&self) -> FramePlan {
        let mut read = TargetSlot::A;
        let last_enabled = self.nodes.iter().rposition(|n| n.enabled);
        let mut passes = Vec::with_capacity(self.nodes.len());

        for (index, node) in self.nodes.iter().enumerate() {
            if !node.enabled {
                continue;
            }
            passes.push(PassInvocation {
                kind: node.kind,
                read: self.targets.handle(read),
                write: self.targets.handle(read.other()),
                to_screen: Some(index) == last_enabled,
                clear: node.clear,
            });
            if node.needs_swap {
                read = read.other();
            }
        }

        log::trace!(
            "frame plan gen {}: {:?}",
            self.targets.generation,
            passes.iter().map(|p| p.kind.name()).collect::<Vec<_>>()
        );
        FramePlan {
            targets: self.targets,
            passes,
        }
    }
}

/// Ordering rules shared by the full pass list and its enabled subset.
fn validate_order(kinds: &[PassKind]) -> Result<()> {
    let position = |pred: fn(&PassKind) -> bool| kinds.iter().position(pred);
    let last_position = |pred: fn(&PassKind) -> bool| kinds.iter().rposition(pred);
    let order = |msg: &str| Err(HaloError::InvalidPassOrder(msg.to_string()));

    if kinds.first() != Some(&PassKind::Scene) {
        return order("scene pass must come first");
    }
    if kinds.last() != Some(&PassKind::Composite) {
        return order("composite pass must come last");
    }
    if kinds.iter().filter(|k| **k == PassKind::Composite).count() != 1 {
        return order("exactly one composite pass is allowed");
    }

    let mask = position(|k| matches!(k, PassKind::Mask { .. }));
    let last_mask = last_position(|k| matches!(k, PassKind::Mask { .. }));
    let outline = position(|k| *k == PassKind::Outline);
    let last_outline = last_position(|k| *k == PassKind::Outline);
    let last_clear = last_position(|k| *k == PassKind::ClearMask);

    if let Some(outline) = outline {
        match mask {
            Some(mask) if mask < outline => {}
            _ => return order("mask pass must come before the outline pass"),
        }
    }
    if let Some(last_mask) = last_mask {
        let after = last_outline.map_or(last_mask, |o| o.max(last_mask));
        match last_clear {
            Some(clear) if clear > after => {}
            _ => return order("stencil clear must follow the mask and outline passes"),
        }
    }
    Ok(())
}
