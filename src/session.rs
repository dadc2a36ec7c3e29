use serde::Serialize;

use crate::Point;
use crate::config::LayoutConfig;
use crate::deletion::DeletionController;
use crate::drag::{DragController, DragRejected, PointerButton};
use crate::geometry::{self, HitTarget};
use crate::layout::{Layout, LayoutEngine};
use crate::links::LinkRenderer;
use crate::positions::PositionStore;
use crate::render::{FramePatch, NodeHandle, RenderTargets};
use crate::search::{KeyAction, SearchHighlighter};
use crate::source::{EntryKind, PathEntry};
use crate::tree::{Hierarchy, PathTreeBuilder};
use crate::utils::format_size;
use crate::viewport::{Viewport, ViewportController};

/// Payload for the info panel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeInfo {
    pub name: String,
    pub kind: String,
    pub size: Option<u64>,
    pub size_label: Option<String>,
}

/// A file the host should fetch and display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeafActivation {
    pub path: String,
    pub url: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneNode {
    pub handle: Option<NodeHandle>,
    pub path: String,
    pub name: String,
    pub kind: EntryKind,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub highlighted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SceneLink {
    pub source: String,
    pub target: String,
    pub d: String,
}

/// Everything a host needs to draw the current frame from scratch.
#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    pub name: String,
    pub width: f32,
    pub height: f32,
    pub viewport: Viewport,
    pub blinking: bool,
    pub dragging: Option<String>,
    pub nodes: Vec<SceneNode>,
    pub links: Vec<SceneLink>,
}

#[derive(Debug, Clone)]
pub struct TreeSession {
    name: String,
    source: Vec<PathEntry>,
    hierarchy: Hierarchy,
    positions: PositionStore,
    engine: LayoutEngine,
    layout: Layout,
    targets: RenderTargets,
    drag: DragController,
    search: SearchHighlighter,
    viewport: ViewportController,
}

impl TreeSession {
    pub fn new(name: &str, entries: &[PathEntry], config: LayoutConfig) -> Self {
        let hierarchy = PathTreeBuilder::from_entries(name, entries);
        let positions = PositionStore::new();
        let engine = LayoutEngine::new(config);
        let layout = engine.run(&hierarchy, &positions);
        let mut targets = RenderTargets::new();
        targets.sync(&layout);
        let viewport = ViewportController::new(Viewport::new(
            config.margins.left,
            config.margins.top,
            1.0,
        ));

        tracing::debug!(name, entries = entries.len(), nodes = layout.len(), "session built");

        Self {
            name: name.to_string(),
            source: entries.to_vec(),
            hierarchy,
            positions,
            engine,
            layout,
            targets,
            drag: DragController::new(),
            search: SearchHighlighter::new(),
            viewport,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &LayoutConfig {
        self.engine.config()
    }

    pub fn hierarchy(&self) -> &Hierarchy {
        &self.hierarchy
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn positions(&self) -> &PositionStore {
        &self.positions
    }

    pub fn targets(&self) -> &RenderTargets {
        &self.targets
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport.transform()
    }

    pub fn dragging(&self) -> Option<&str> {
        self.drag.active_path()
    }

    pub fn is_highlighted(&self, path: &str) -> bool {
        self.search.is_highlighted(path)
    }

    pub fn is_blinking(&self) -> bool {
        self.search.is_blinking()
    }

    fn relayout(&mut self) {
        self.layout = self.engine.run(&self.hierarchy, &self.positions);
        self.targets.sync(&self.layout);
        self.search.retain_visible(&self.layout);
    }

    /// Pointer coordinates are in screen space.
    pub fn start_drag(
        &mut self,
        path: &str,
        pointer: Point,
        button: PointerButton,
    ) -> Result<(), DragRejected> {
        let canvas = self.viewport.transform().invert(pointer);
        self.drag.start(&mut self.layout, path, canvas, button)
    }

    pub fn move_drag(&mut self, pointer: Point) -> Option<FramePatch> {
        let canvas = self.viewport.transform().invert(pointer);
        let mut patch = FramePatch::default();
        self.drag
            .update(&mut self.layout, &self.targets, canvas, &mut patch)
            .then_some(patch)
    }

    pub fn end_drag(&mut self) -> Option<usize> {
        self.drag.end(&mut self.layout, &mut self.positions)
    }

    pub fn pointer_lost(&mut self) -> Option<usize> {
        self.drag.pointer_lost(&mut self.layout, &mut self.positions)
    }

    /// Soft-delete `path` and its subtree. An active drag is committed first.
    pub fn delete_node(&mut self, path: &str) -> bool {
        if self.drag.is_active() {
            self.end_drag();
        }
        match DeletionController::delete(
            &mut self.hierarchy,
            &mut self.positions,
            &self.engine,
            path,
        ) {
            Some(deletion) => {
                self.layout = deletion.layout;
                self.targets.sync(&self.layout);
                self.search.retain_visible(&self.layout);
                true
            }
            None => false,
        }
    }

    /// Rebuild from the original listing, bringing back deleted nodes.
    /// Arranged positions that were not purged are kept.
    pub fn reload(&mut self) {
        if self.drag.is_active() {
            self.end_drag();
        }
        self.hierarchy = PathTreeBuilder::from_entries(&self.name, &self.source);
        self.relayout();
    }

    pub fn search(&mut self, query: &str) -> usize {
        self.search.search(&self.layout, query)
    }

    pub fn clear_highlights(&mut self) {
        self.search.clear();
    }

    /// Runs the engine side of a key binding and reports it so the host can
    /// open its own prompt or help panel.
    pub fn handle_key(&mut self, key: &str, ctrl: bool, meta: bool) -> Option<KeyAction> {
        let action = KeyAction::from_key(key, ctrl, meta)?;
        if action == KeyAction::ClearHighlights {
            self.clear_highlights();
        }
        Some(action)
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.viewport.pan(dx, dy);
    }

    pub fn zoom(&mut self, focus: Point, factor: f32) {
        self.viewport.zoom_at(focus, factor);
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if !(width.is_finite() && height.is_finite()) || width < 0.0 || height < 0.0 {
            tracing::warn!(width, height, "ignoring invalid canvas size");
            return;
        }
        if self.drag.is_active() {
            self.end_drag();
        }
        self.engine.resize(width, height);
        self.relayout();
    }

    pub fn select(&self, path: &str) -> Option<NodeInfo> {
        let node = self.layout.get(path)?;
        if node.url.is_none() {
            return None;
        }
        Some(NodeInfo {
            name: node.name.clone(),
            kind: node.kind.display_name().to_string(),
            size: node.size,
            size_label: node.size.map(format_size),
        })
    }

    pub fn activate(&self, path: &str) -> Option<LeafActivation> {
        let node = self.layout.get(path)?;
        if node.kind != EntryKind::Blob {
            return None;
        }
        let url = node.url.clone()?;
        Some(LeafActivation {
            path: node.path.clone(),
            url,
        })
    }

    /// Topmost node under a screen point and which part of it was hit.
    pub fn hit_test(&self, pointer: Point) -> Option<(String, HitTarget)> {
        let canvas = self.viewport.transform().invert(pointer);
        self.layout.nodes().iter().rev().find_map(|node| {
            let local = Point::new(canvas.x - node.x, canvas.y - node.y);
            geometry::hit_test(&node.name, node.kind, node.is_root(), local)
                .map(|target| (node.path.clone(), target))
        })
    }

    pub fn scene(&self) -> Scene {
        let nodes = self
            .layout
            .nodes()
            .iter()
            .map(|node| SceneNode {
                handle: self.targets.handle(&node.path),
                path: node.path.clone(),
                name: node.name.clone(),
                kind: node.kind,
                depth: node.depth,
                x: node.x,
                y: node.y,
                width: geometry::box_width(&node.name),
                highlighted: self.search.is_highlighted(&node.path),
            })
            .collect();
        let links = self
            .layout
            .links()
            .iter()
            .map(|&link| SceneLink {
                source: self.layout.node(link.source).path.clone(),
                target: self.layout.node(link.target).path.clone(),
                d: LinkRenderer::path_for(&self.layout, link),
            })
            .collect();

        let config = self.config();
        Scene {
            name: self.name.clone(),
            width: config.width,
            height: config.height,
            viewport: self.viewport(),
            blinking: self.is_blinking(),
            dragging: self.dragging().map(str::to_string),
            nodes,
            links,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries() -> Vec<PathEntry> {
        vec![
            PathEntry::blob("a/b.txt")
                .with_url("https://api/blobs/1")
                .with_size(2048),
            PathEntry::blob("a/c/d.txt"),
            PathEntry::tree("a").with_url("https://api/trees/a"),
        ]
    }

    fn session() -> TreeSession {
        TreeSession::new("repo", &entries(), LayoutConfig::default())
    }

    #[test]
    fn drag_pointer_is_mapped_through_viewport() {
        let mut session = session();
        session.zoom(Point::new(0.0, 0.0), 2.0);
        let before = session.layout().get("a/c").unwrap().position();

        session
            .start_drag("a/c", Point::new(0.0, 0.0), PointerButton::Primary)
            .unwrap();
        let patch = session.move_drag(Point::new(40.0, 20.0)).unwrap();
        session.end_drag();

        // screen delta (40, 20) at scale 2 is canvas delta (20, 10)
        let after = session.positions().get("a/c").unwrap();
        assert_eq!(after, Point::new(before.x + 20.0, before.y + 10.0));
        assert_eq!(patch.nodes.len(), 2);
        assert_eq!(patch.links.len(), 2);
    }

    #[test]
    fn delete_during_drag_commits_first() {
        let mut session = session();
        session
            .start_drag("a/b.txt", Point::new(0.0, 0.0), PointerButton::Primary)
            .unwrap();
        session.move_drag(Point::new(10.0, 0.0));
        assert!(session.delete_node("a/c"));
        assert!(session.dragging().is_none());
        assert!(session.positions().contains("a/b.txt"));
        assert!(session.layout().get("a/c/d.txt").is_none());
    }

    #[test]
    fn delete_root_is_refused() {
        let mut session = session();
        assert!(!session.delete_node(""));
        assert_eq!(session.layout().len(), 5);
    }

    #[test]
    fn resize_keeps_arranged_nodes() {
        let mut session = session();
        session
            .start_drag("a", Point::new(0.0, 0.0), PointerButton::Primary)
            .unwrap();
        session.move_drag(Point::new(33.0, 0.0));
        session.end_drag();
        let arranged = session.layout().get("a").unwrap().position();

        session.resize(1920.0, 1080.0);
        assert_eq!(session.layout().get("a").unwrap().position(), arranged);
        assert_eq!(session.config().width, 1920.0);
    }

    #[test]
    fn reload_restores_deleted_nodes() {
        let mut session = session();
        session.delete_node("a/c");
        assert_eq!(session.layout().len(), 3);
        session.reload();
        assert_eq!(session.layout().len(), 5);
    }

    #[test]
    fn select_requires_remote_reference() {
        let session = session();
        let info = session.select("a/b.txt").unwrap();
        assert_eq!(info.kind, "file");
        assert_eq!(info.size, Some(2048));
        assert_eq!(info.size_label.as_deref(), Some("2.0 KB"));
        assert_eq!(session.select("a").unwrap().kind, "folder");
        assert!(session.select("a/c/d.txt").is_none());
    }

    #[test]
    fn activate_only_for_blobs_with_url() {
        let session = session();
        assert_eq!(
            session.activate("a/b.txt"),
            Some(LeafActivation {
                path: "a/b.txt".into(),
                url: "https://api/blobs/1".into()
            })
        );
        assert!(session.activate("a").is_none());
        assert!(session.activate("a/c/d.txt").is_none());
    }

    #[test]
    fn escape_clears_highlights() {
        let mut session = session();
        assert_eq!(session.search("D.TXT"), 1);
        assert!(session.is_blinking());
        assert_eq!(
            session.handle_key("Escape", false, false),
            Some(KeyAction::ClearHighlights)
        );
        assert!(!session.is_blinking());
    }

    #[test]
    fn highlights_of_deleted_nodes_are_dropped() {
        let mut session = session();
        session.search("d.txt");
        session.delete_node("a/c");
        assert!(!session.is_blinking());
    }

    #[test]
    fn hit_test_resolves_screen_points() {
        let session = session();
        let node = session.layout().get("a/b.txt").unwrap();
        let screen = session.viewport().apply(node.position());
        assert_eq!(
            session.hit_test(screen),
            Some(("a/b.txt".to_string(), HitTarget::Body))
        );
    }

    #[test]
    fn scene_lists_nodes_links_and_handles() {
        let scene = session().scene();
        assert_eq!(scene.nodes.len(), 5);
        assert_eq!(scene.links.len(), 4);
        assert!(scene.nodes.iter().all(|node| node.handle.is_some()));
        assert_eq!(scene.viewport, Viewport::new(120.0, 60.0, 1.0));
    }
}
