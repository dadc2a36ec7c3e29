use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Point;
use crate::layout::Layout;
use crate::links::LinkRenderer;
use crate::positions::PositionStore;
use crate::render::{RenderSurface, RenderTargets};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Middle,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DragRejected {
    #[error("a drag on '{0}' is already in progress")]
    AlreadyDragging(String),
    #[error("only the primary button starts a drag")]
    NotPrimaryButton,
    #[error("no node at path '{0}'")]
    UnknownNode(String),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging { path: String, origin: Point },
}

/// Single-gesture subtree drag. Moves translate the subtree from its
/// baselines; ending the gesture records the final positions in the store.
#[derive(Debug, Clone, Default)]
pub struct DragController {
    state: DragState,
}

impl DragController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    pub fn active_path(&self) -> Option<&str> {
        match &self.state {
            DragState::Dragging { path, .. } => Some(path),
            DragState::Idle => None,
        }
    }

    pub fn start(
        &mut self,
        layout: &mut Layout,
        path: &str,
        pointer: Point,
        button: PointerButton,
    ) -> Result<(), DragRejected> {
        if let DragState::Dragging { path: active, .. } = &self.state {
            return Err(DragRejected::AlreadyDragging(active.clone()));
        }
        if button != PointerButton::Primary {
            return Err(DragRejected::NotPrimaryButton);
        }
        let slot = layout
            .find(path)
            .ok_or_else(|| DragRejected::UnknownNode(path.to_string()))?;

        for member in layout.subtree(slot) {
            let node = layout.node_mut(member);
            node.x0 = node.x;
            node.y0 = node.y;
        }

        tracing::debug!(path, x = pointer.x, y = pointer.y, "drag started");
        self.state = DragState::Dragging {
            path: path.to_string(),
            origin: pointer,
        };
        Ok(())
    }

    /// Apply a pointer move. Returns false when no gesture is active.
    pub fn update(
        &mut self,
        layout: &mut Layout,
        targets: &RenderTargets,
        pointer: Point,
        surface: &mut impl RenderSurface,
    ) -> bool {
        let DragState::Dragging { path, origin } = &self.state else {
            return false;
        };
        let Some(slot) = layout.find(path) else {
            return false;
        };

        let dx = pointer.x - origin.x;
        let dy = pointer.y - origin.y;
        for member in layout.subtree(slot) {
            let node = layout.node_mut(member);
            node.x = node.x0 + dx;
            node.y = node.y0 + dy;
            if let Some(handle) = targets.handle(&node.path) {
                surface.place_node(handle, node.position());
            }
        }
        LinkRenderer::redraw_partial(layout, slot, surface);
        true
    }

    /// Finish the gesture. Returns how many positions were committed, or
    /// `None` when nothing was being dragged.
    pub fn end(&mut self, layout: &mut Layout, store: &mut PositionStore) -> Option<usize> {
        let DragState::Dragging { path, .. } = std::mem::take(&mut self.state) else {
            return None;
        };
        let Some(slot) = layout.find(&path) else {
            return Some(0);
        };

        let members = layout.subtree(slot);
        for &member in &members {
            let node = layout.node_mut(member);
            node.x0 = node.x;
            node.y0 = node.y;
            store.set(&node.path, node.position());
        }

        tracing::debug!(path = %path, committed = members.len(), "drag committed");
        Some(members.len())
    }

    /// The pointer left the tracking surface before release. Treated like a
    /// release at the last applied position.
    pub fn pointer_lost(&mut self, layout: &mut Layout, store: &mut PositionStore) -> Option<usize> {
        if self.is_active() {
            tracing::debug!("pointer lost mid-drag, committing last position");
        }
        self.end(layout, store)
    }
}
