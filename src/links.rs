use serde::Serialize;

use crate::Point;
use crate::layout::Layout;
use crate::render::RenderSurface;

/// Parent to child connector, by layout slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct Link {
    pub source: usize,
    pub target: usize,
}

impl Link {
    pub const fn new(source: usize, target: usize) -> Self {
        Self { source, target }
    }
}

/// Cubic S-curve between two anchors with both control points on the
/// vertical midpoint.
pub fn link_path(source: Point, target: Point) -> String {
    let mid_y = (source.y + target.y) / 2.0;
    format!(
        "M{:.2},{:.2} C{:.2},{:.2} {:.2},{:.2} {:.2},{:.2}",
        source.x, source.y, source.x, mid_y, target.x, mid_y, target.x, target.y
    )
}

pub struct LinkRenderer;

impl LinkRenderer {
    pub fn path_for(layout: &Layout, link: Link) -> String {
        link_path(
            layout.node(link.source).position(),
            layout.node(link.target).position(),
        )
    }

    /// Links touching `slot` or any node beneath it.
    ///
    /// Every such link ends at a subtree member, so this is the incoming link
    /// of each member. The link into `slot` itself is absent for the root.
    pub fn affected(layout: &Layout, slot: usize) -> Vec<Link> {
        layout
            .subtree(slot)
            .into_iter()
            .filter_map(|member| {
                layout
                    .node(member)
                    .parent
                    .map(|parent| Link::new(parent, member))
            })
            .collect()
    }

    pub fn redraw_partial(layout: &Layout, slot: usize, surface: &mut impl RenderSurface) -> usize {
        let affected = Self::affected(layout, slot);
        for &link in &affected {
            surface.redraw_link(
                &layout.node(link.source).path,
                &layout.node(link.target).path,
                &Self::path_for(layout, link),
            );
        }
        affected.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::layout::LayoutEngine;
    use crate::positions::PositionStore;
    use crate::render::FramePatch;
    use crate::source::PathEntry;
    use crate::tree::PathTreeBuilder;
    use std::collections::HashSet;

    fn layout() -> Layout {
        let entries: Vec<PathEntry> = [
            "a/b.txt",
            "a/c/d.txt",
            "a/c/e/f.txt",
            "g/h.txt",
            "i.txt",
        ]
        .iter()
        .map(|p| PathEntry::blob(*p))
        .collect();
        let hierarchy = PathTreeBuilder::from_entries("repo", &entries);
        LayoutEngine::new(LayoutConfig::default()).run(&hierarchy, &PositionStore::new())
    }

    #[test]
    fn path_uses_vertical_midpoint_controls() {
        let d = link_path(Point::new(0.0, 0.0), Point::new(100.0, 180.0));
        assert_eq!(d, "M0.00,0.00 C0.00,90.00 100.00,90.00 100.00,180.00");
    }

    #[test]
    fn partial_redraw_matches_brute_force_filter() {
        let layout = layout();
        for slot in 0..layout.len() {
            let expected: HashSet<Link> = layout
                .links()
                .iter()
                .copied()
                .filter(|link| {
                    let touches = |n: usize| n == slot || layout.is_descendant(slot, n);
                    touches(link.source) || touches(link.target)
                })
                .collect();
            let actual: HashSet<Link> = LinkRenderer::affected(&layout, slot).into_iter().collect();
            assert_eq!(actual, expected, "slot {}", layout.node(slot).path);
        }
    }

    #[test]
    fn root_redraw_covers_every_link() {
        let layout = layout();
        let mut patch = FramePatch::default();
        let drawn = LinkRenderer::redraw_partial(&layout, 0, &mut patch);
        assert_eq!(drawn, layout.links().len());
        assert_eq!(patch.links.len(), drawn);
    }

    #[test]
    fn leaf_redraw_touches_only_its_incoming_link() {
        let layout = layout();
        let leaf = layout.find("i.txt").unwrap();
        let mut patch = FramePatch::default();
        assert_eq!(LinkRenderer::redraw_partial(&layout, leaf, &mut patch), 1);
        assert_eq!(patch.links[0].target, "i.txt");
        assert_eq!(patch.links[0].source, "");
    }

    #[test]
    fn redrawn_link_carries_endpoint_paths_and_curve() {
        let layout = layout();
        let c = layout.find("a/c").unwrap();
        let mut patch = FramePatch::default();
        assert_eq!(LinkRenderer::redraw_partial(&layout, c, &mut patch), 4);

        let into_c = patch
            .links
            .iter()
            .find(|link| link.target == "a/c")
            .expect("link into a/c is redrawn");
        assert_eq!(into_c.source, "a");
        let a = layout.find("a").unwrap();
        assert_eq!(into_c.d, LinkRenderer::path_for(&layout, Link::new(a, c)));
        assert!(patch.links.iter().all(|link| link.target.starts_with("a/c")));
    }
}
