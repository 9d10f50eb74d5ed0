//! Mask and outline scenes.
//!
//! Each scene holds at most one entry: a reference to the selected
//! renderable's geometry and its world transform. The scenes are rebuilt
//! every frame from the selection, so nothing from a previous selection can
//! survive.

use std::sync::Arc;

use glam::Mat4;

use crate::geometry::Geometry;
use crate::renderable::{Renderable, RenderableId};
use crate::selection::Selection;

/// A derived copy of a renderable: shared geometry plus transform.
#[derive(Debug, Clone)]
pub struct OverlayEntry {
    /// Identity of the source renderable.
    pub id: RenderableId,
    /// Geometry shared with the source renderable.
    pub geometry: Arc<Geometry>,
    /// World transform copied from the source renderable.
    pub transform: Mat4,
}

impl OverlayEntry {
    fn from_renderable(renderable: &Renderable) -> Self {
        Self {
            id: renderable.id,
            geometry: Arc::clone(&renderable.geometry),
            transform: renderable.transform,
        }
    }
}

/// A fixed-capacity scene of zero or one entries.
#[derive(Debug, Clone, Default)]
pub struct OverlayScene {
    slot: Option<OverlayEntry>,
}

impl OverlayScene {
    /// Creates an empty scene.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the entry.
    pub fn clear(&mut self) {
        self.slot = None;
    }

    /// Replaces the entry.
    pub fn set(&mut self, entry: OverlayEntry) {
        self.slot = Some(entry);
    }

    /// The entry, if any.
    #[must_use]
    pub fn entry(&self) -> Option<&OverlayEntry> {
        self.slot.as_ref()
    }

    /// Number of entries (0 or 1).
    #[must_use]
    pub fn len(&self) -> usize {
        usize::from(self.slot.is_some())
    }

    /// Returns true if the scene has no entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }

    /// Iterates over the entries.
    pub fn iter(&self) -> impl Iterator<Item = &OverlayEntry> {
        self.slot.iter()
    }
}

/// The mask scene and outline scene, kept in lock-step.
#[derive(Debug, Clone, Default)]
pub struct OverlayScenes {
    mask: OverlayScene,
    outline: OverlayScene,
}

impl OverlayScenes {
    /// Creates empty scenes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The flat mask scene.
    #[must_use]
    pub fn mask(&self) -> &OverlayScene {
        &self.mask
    }

    /// The offset outline scene.
    #[must_use]
    pub fn outline(&self) -> &OverlayScene {
        &self.outline
    }

    /// Identity shown in both scenes, if any.
    #[must_use]
    pub fn selected(&self) -> Option<RenderableId> {
        self.outline.entry().map(|e| e.id)
    }

    /// Clears both scenes, then adds the selected renderable to each.
    ///
    /// A selection that no longer exists among `candidates` leaves both
    /// scenes empty.
    pub fn rebuild(&mut self, selection: &Selection, candidates: &[Renderable]) {
        self.mask.clear();
        self.outline.clear();
        if let Some(renderable) = selection.resolve(candidates) {
            let entry = OverlayEntry::from_renderable(renderable);
            self.mask.set(entry.clone());
            self.outline.set(entry);
        }
    }
}
