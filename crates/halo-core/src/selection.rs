//! Selection state: the single renderable currently under the pointer.

use serde::{Deserialize, Serialize};

use crate::pick::RayHit;
use crate::renderable::{find_renderable, Renderable, RenderableId};

/// How the selection changed during a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionChange {
    /// Same selection as the previous frame (including none).
    Unchanged,
    /// Nothing was selected, now `id` is.
    Selected(RenderableId),
    /// `id` was selected, now nothing is.
    Deselected(RenderableId),
    /// The selection moved from one renderable to another.
    Switched {
        from: RenderableId,
        to: RenderableId,
    },
}

/// The currently highlighted renderable, re-derived every frame from the pick result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Selection {
    current: Option<RenderableId>,
}

impl Selection {
    /// Creates an empty selection.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The selected identity, if any.
    #[must_use]
    pub fn current(&self) -> Option<RenderableId> {
        self.current
    }

    /// Returns true if `id` is selected.
    #[must_use]
    pub fn is_selected(&self, id: RenderableId) -> bool {
        self.current == Some(id)
    }

    /// Replaces the selection with the identity of this frame's hit.
    pub fn update(&mut self, hit: Option<&RayHit>) -> SelectionChange {
        let next = hit.map(|h| h.id);
        let change = match (self.current, next) {
            (None, None) => SelectionChange::Unchanged,
            (Some(from), Some(to)) if from == to => SelectionChange::Unchanged,
            (None, Some(id)) => SelectionChange::Selected(id),
            (Some(id), None) => SelectionChange::Deselected(id),
            (Some(from), Some(to)) => SelectionChange::Switched { from, to },
        };
        self.current = next;
        change
    }

    /// Clears the selection.
    pub fn clear(&mut self) -> SelectionChange {
        self.update(None)
    }

    /// Looks up the selected renderable. A selection whose identity is no
    /// longer among `candidates` resolves to `None`.
    #[must_use]
    pub fn resolve<'a>(&self, candidates: &'a [Renderable]) -> Option<&'a Renderable> {
        self.current.and_then(|id| find_renderable(candidates, id))
    }

    /// Emphasis of `id` under the current selection.
    #[must_use]
    pub fn emphasis(&self, id: RenderableId) -> Emphasis {
        if self.is_selected(id) {
            Emphasis::Highlighted
        } else {
            Emphasis::Normal
        }
    }
}

/// Display emphasis of a renderable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emphasis {
    #[default]
    Normal,
    Highlighted,
}

/// Line widths in pixels for each emphasis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineWidths {
    /// Width of unselected lines.
    pub normal: f32,
    /// Width of the selected line.
    pub highlighted: f32,
}

impl Default for LineWidths {
    fn default() -> Self {
        Self {
            normal: 3.0,
            highlighted: 12.0,
        }
    }
}

impl LineWidths {
    /// The width for `emphasis`.
    #[must_use]
    pub fn width(&self, emphasis: Emphasis) -> f32 {
        match emphasis {
            Emphasis::Normal => self.normal,
            Emphasis::Highlighted => self.highlighted,
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;
    use proptest::prelude::*;

    use super::*;
    use crate::geometry::{Geometry, TriangleMesh};
    use crate::pick::HitElement;

    fn hit(id: u64) -> RayHit {
        RayHit {
            id: RenderableId(id),
            distance: 1.0,
            point: Vec3::ZERO,
            element: HitElement::Face(0),
        }
    }

    #[test]
    fn test_transitions() {
        let mut selection = Selection::new();
        assert_eq!(selection.update(None), SelectionChange::Unchanged);
        assert_eq!(
            selection.update(Some(&hit(2))),
            SelectionChange::Selected(RenderableId(2))
        );
        assert_eq!(selection.update(Some(&hit(2))), SelectionChange::Unchanged);
        assert_eq!(
            selection.update(Some(&hit(5))),
            SelectionChange::Switched {
                from: RenderableId(2),
                to: RenderableId(5)
            }
        );
        assert_eq!(
            selection.clear(),
            SelectionChange::Deselected(RenderableId(5))
        );
        assert_eq!(selection.current(), None);
    }

    #[test]
    fn test_resolve_stale_selection() {
        let geometry = std::sync::Arc::new(Geometry::from(TriangleMesh::cuboid(1.0)));
        let scene = vec![Renderable::new(RenderableId(1), geometry)];
        let mut selection = Selection::new();
        selection.update(Some(&hit(1)));
        assert_eq!(selection.resolve(&scene).map(|r| r.id), Some(RenderableId(1)));
        selection.update(Some(&hit(9)));
        assert!(selection.resolve(&scene).is_none());
    }

    #[test]
    fn test_repeated_hits_keep_fixed_width() {
        let widths = LineWidths::default();
        let mut selection = Selection::new();
        for _ in 0..10 {
            selection.update(Some(&hit(3)));
        }
        assert_eq!(
            widths.width(selection.emphasis(RenderableId(3))),
            widths.highlighted
        );
        assert_eq!(widths.width(selection.emphasis(RenderableId(4))), widths.normal);
    }

    proptest! {
        #[test]
        fn prop_selection_mirrors_last_hit(ids in proptest::collection::vec(proptest::option::of(0u64..4), 1..32)) {
            let mut selection = Selection::new();
            for id in &ids {
                let h = id.map(hit);
                selection.update(h.as_ref());
                prop_assert_eq!(selection.current(), id.map(RenderableId));
            }
        }
    }
}
