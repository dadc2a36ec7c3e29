use std::collections::HashMap;

use crate::config::LayoutConfig;
use crate::links::Link;
use crate::positions::PositionStore;
use crate::source::EntryKind;
use crate::tree::{Hierarchy, TreeNode};
use crate::Point;

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub url: Option<String>,
    pub size: Option<u64>,
    pub depth: usize,
    pub x: f32,
    pub y: f32,
    /// Baseline captured at the start of a drag gesture.
    pub x0: f32,
    pub y0: f32,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
}

impl LayoutNode {
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn baseline(&self) -> Point {
        Point::new(self.x0, self.y0)
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }
}

/// Positioned hierarchy produced by one layout pass. Index 0 is the root and
/// nodes are stored in pre-order.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    nodes: Vec<LayoutNode>,
    index: HashMap<String, usize>,
    links: Vec<Link>,
}

impl Layout {
    fn from_hierarchy(root: &TreeNode) -> Self {
        let mut nodes: Vec<LayoutNode> = Vec::new();
        let mut stack: Vec<(&TreeNode, Option<usize>, usize)> = vec![(root, None, 0)];

        while let Some((node, parent, depth)) = stack.pop() {
            let slot = nodes.len();
            nodes.push(LayoutNode {
                name: node.name.clone(),
                path: node.path.clone(),
                kind: node.kind,
                url: node.url.clone(),
                size: node.size,
                depth,
                x: 0.0,
                y: 0.0,
                x0: 0.0,
                y0: 0.0,
                parent,
                children: Vec::with_capacity(node.children.len()),
            });
            if let Some(parent) = parent {
                nodes[parent].children.push(slot);
            }
            for child in node.children.iter().rev() {
                stack.push((child, Some(slot), depth + 1));
            }
        }

        let index = nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.path.clone(), slot))
            .collect();
        let links = nodes
            .iter()
            .enumerate()
            .filter_map(|(slot, node)| node.parent.map(|parent| Link::new(parent, slot)))
            .collect();

        Self {
            nodes,
            index,
            links,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn nodes(&self) -> &[LayoutNode] {
        &self.nodes
    }

    pub fn node(&self, slot: usize) -> &LayoutNode {
        &self.nodes[slot]
    }

    pub fn node_mut(&mut self, slot: usize) -> &mut LayoutNode {
        &mut self.nodes[slot]
    }

    pub fn find(&self, path: &str) -> Option<usize> {
        self.index.get(path).copied()
    }

    pub fn get(&self, path: &str) -> Option<&LayoutNode> {
        self.find(path).map(|slot| &self.nodes[slot])
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    /// `slot` and all of its descendants, parents before children.
    pub fn subtree(&self, slot: usize) -> Vec<usize> {
        let mut out = Vec::new();
        let mut stack = vec![slot];
        while let Some(current) = stack.pop() {
            out.push(current);
            stack.extend(self.nodes[current].children.iter().rev());
        }
        out
    }

    /// True when `slot` lies strictly beneath `ancestor`.
    pub fn is_descendant(&self, ancestor: usize, slot: usize) -> bool {
        let mut current = slot;
        while let Some(parent) = self.nodes[current].parent {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutEngine {
    config: LayoutConfig,
}

impl LayoutEngine {
    pub fn new(config: LayoutConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LayoutConfig {
        &self.config
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        self.config.width = width;
        self.config.height = height;
    }

    /// Full layout pass over the current hierarchy.
    ///
    /// Siblings are spaced by `sibling_separation`, nodes with different
    /// parents by `cousin_separation`, and the result is scaled to the canvas
    /// width. Nodes with a stored position take it verbatim; the rest keep the
    /// computed x and sit at `depth * level_stride`.
    pub fn run(&self, hierarchy: &Hierarchy, store: &PositionStore) -> Layout {
        let mut layout = Layout::from_hierarchy(hierarchy.root());
        let tidy = TidyTree::new(&layout, &self.config).positions();

        let mut restored = 0_usize;
        for (node, (x, _)) in layout.nodes.iter_mut().zip(tidy) {
            match store.get(&node.path) {
                Some(stored) => {
                    node.x = stored.x;
                    node.y = stored.y;
                    restored += 1;
                }
                None => {
                    node.x = x;
                    node.y = node.depth as f32 * self.config.level_stride;
                }
            }
            node.x0 = node.x;
            node.y0 = node.y;
        }

        tracing::debug!(
            nodes = layout.len(),
            restored,
            width = self.config.width,
            "layout pass complete"
        );
        layout
    }
}

#[derive(Debug, Clone)]
struct Walker {
    parent: usize,
    children: Vec<usize>,
    number: usize,
    ancestor: usize,
    default_ancestor: Option<usize>,
    prelim: f32,
    modifier: f32,
    change: f32,
    shift: f32,
    thread: Option<usize>,
}

/// Working state for one tidy pass. Walker `i` mirrors layout node `i`; the
/// extra last walker is a virtual parent of the root.
struct TidyTree<'a> {
    layout: &'a Layout,
    config: &'a LayoutConfig,
    walkers: Vec<Walker>,
}

impl<'a> TidyTree<'a> {
    fn new(layout: &'a Layout, config: &'a LayoutConfig) -> Self {
        let sentinel = layout.len();
        let mut walkers: Vec<Walker> = layout
            .nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| Walker {
                parent: node.parent.unwrap_or(sentinel),
                children: node.children.clone(),
                number: 0,
                ancestor: slot,
                default_ancestor: None,
                prelim: 0.0,
                modifier: 0.0,
                change: 0.0,
                shift: 0.0,
                thread: None,
            })
            .collect();
        walkers.push(Walker {
            parent: sentinel,
            children: vec![0],
            number: 0,
            ancestor: sentinel,
            default_ancestor: None,
            prelim: 0.0,
            modifier: 0.0,
            change: 0.0,
            shift: 0.0,
            thread: None,
        });

        for node in &layout.nodes {
            for (number, &child) in node.children.iter().enumerate() {
                walkers[child].number = number;
            }
        }

        Self {
            layout,
            config,
            walkers,
        }
    }

    fn separation(&self, a: usize, b: usize) -> f32 {
        if self.layout.nodes[a].parent == self.layout.nodes[b].parent {
            self.config.sibling_separation
        } else {
            self.config.cousin_separation
        }
    }

    /// Returns `(x, y)` per layout node, scaled to the configured canvas.
    fn positions(mut self) -> Vec<(f32, f32)> {
        if self.layout.is_empty() {
            return Vec::new();
        }

        for v in self.post_order() {
            self.first_walk(v);
        }

        let sentinel = self.layout.len();
        self.walkers[sentinel].modifier = -self.walkers[0].prelim;

        let mut xs = vec![0.0_f32; self.layout.len()];
        for v in 0..self.layout.len() {
            let parent_modifier = self.walkers[self.walkers[v].parent].modifier;
            xs[v] = self.walkers[v].prelim + parent_modifier;
            self.walkers[v].modifier += parent_modifier;
        }

        self.fit_to_canvas(&xs)
    }

    fn fit_to_canvas(&self, xs: &[f32]) -> Vec<(f32, f32)> {
        let mut left = 0_usize;
        let mut right = 0_usize;
        let mut max_depth = 0_usize;
        for (slot, &x) in xs.iter().enumerate() {
            if x < xs[left] {
                left = slot;
            }
            if x > xs[right] {
                right = slot;
            }
            max_depth = max_depth.max(self.layout.nodes[slot].depth);
        }

        let half_gap = if left == right {
            1.0
        } else {
            self.separation(left, right) / 2.0
        };
        let tx = half_gap - xs[left];
        let kx = self.config.inner_width() / (xs[right] + half_gap + tx);
        let ky = self.config.inner_height() / (max_depth.max(1) as f32);

        xs.iter()
            .enumerate()
            .map(|(slot, &x)| {
                let depth = self.layout.nodes[slot].depth as f32;
                ((x + tx) * kx, depth * ky)
            })
            .collect()
    }

    /// Children left to right, then the parent.
    fn post_order(&self) -> Vec<usize> {
        let mut stack = vec![0_usize];
        let mut out = Vec::with_capacity(self.layout.len());
        while let Some(v) = stack.pop() {
            out.push(v);
            stack.extend(self.layout.nodes[v].children.iter().copied());
        }
        out.reverse();
        out
    }

    fn first_walk(&mut self, v: usize) {
        let parent = self.walkers[v].parent;
        let number = self.walkers[v].number;
        let left_sibling = if number > 0 {
            Some(self.walkers[parent].children[number - 1])
        } else {
            None
        };

        let first_child = self.walkers[v].children.first().copied();
        let last_child = self.walkers[v].children.last().copied();
        if let (Some(first), Some(last)) = (first_child, last_child) {
            self.execute_shifts(v);
            let midpoint = (self.walkers[first].prelim + self.walkers[last].prelim) / 2.0;
            match left_sibling {
                Some(w) => {
                    self.walkers[v].prelim = self.walkers[w].prelim + self.separation(v, w);
                    self.walkers[v].modifier = self.walkers[v].prelim - midpoint;
                }
                None => self.walkers[v].prelim = midpoint,
            }
        } else if let Some(w) = left_sibling {
            self.walkers[v].prelim = self.walkers[w].prelim + self.separation(v, w);
        }

        let default_ancestor = self.walkers[parent]
            .default_ancestor
            .unwrap_or(self.walkers[parent].children[0]);
        let next = self.apportion(v, left_sibling, default_ancestor);
        self.walkers[parent].default_ancestor = Some(next);
    }

    fn next_left(&self, v: usize) -> Option<usize> {
        self.walkers[v]
            .children
            .first()
            .copied()
            .or(self.walkers[v].thread)
    }

    fn next_right(&self, v: usize) -> Option<usize> {
        self.walkers[v]
            .children
            .last()
            .copied()
            .or(self.walkers[v].thread)
    }

    fn apportion(&mut self, v: usize, left_sibling: Option<usize>, ancestor: usize) -> usize {
        let Some(w) = left_sibling else {
            return ancestor;
        };
        let mut ancestor = ancestor;

        // inner/outer contours on the right (p) and left (m) side of the gap
        let mut vip = v;
        let mut vop = v;
        let mut vim = w;
        let mut vom = self.walkers[self.walkers[v].parent].children[0];
        let mut sip = self.walkers[vip].modifier;
        let mut sop = self.walkers[vop].modifier;
        let mut sim = self.walkers[vim].modifier;
        let mut som = self.walkers[vom].modifier;

        let mut next_im = self.next_right(vim);
        let mut next_ip = self.next_left(vip);
        while let (Some(im), Some(ip)) = (next_im, next_ip) {
            vim = im;
            vip = ip;
            if let Some(next) = self.next_left(vom) {
                vom = next;
            }
            if let Some(next) = self.next_right(vop) {
                vop = next;
            }
            self.walkers[vop].ancestor = v;

            let shift = self.walkers[vim].prelim + sim - self.walkers[vip].prelim - sip
                + self.separation(vim, vip);
            if shift > 0.0 {
                let mover = self.next_ancestor(vim, v, ancestor);
                self.move_subtree(mover, v, shift);
                sip += shift;
                sop += shift;
            }

            sim += self.walkers[vim].modifier;
            sip += self.walkers[vip].modifier;
            som += self.walkers[vom].modifier;
            sop += self.walkers[vop].modifier;

            next_im = self.next_right(vim);
            next_ip = self.next_left(vip);
        }

        if let Some(im) = next_im {
            if self.next_right(vop).is_none() {
                self.walkers[vop].thread = Some(im);
                self.walkers[vop].modifier += sim - sop;
            }
        }

        if let Some(ip) = next_ip {
            if self.next_left(vom).is_none() {
                self.walkers[vom].thread = Some(ip);
                self.walkers[vom].modifier += sip - som;
                ancestor = v;
            }
        }

        ancestor
    }

    fn next_ancestor(&self, vim: usize, v: usize, fallback: usize) -> usize {
        let candidate = self.walkers[vim].ancestor;
        if self.walkers[candidate].parent == self.walkers[v].parent {
            candidate
        } else {
            fallback
        }
    }

    fn move_subtree(&mut self, wm: usize, wp: usize, shift: f32) {
        let subtrees = (self.walkers[wp].number as f32 - self.walkers[wm].number as f32).max(1.0);
        let change = shift / subtrees;
        self.walkers[wp].change -= change;
        self.walkers[wp].shift += shift;
        self.walkers[wm].change += change;
        self.walkers[wp].prelim += shift;
        self.walkers[wp].modifier += shift;
    }

    fn execute_shifts(&mut self, v: usize) {
        let mut shift = 0.0_f32;
        let mut change = 0.0_f32;
        let children = self.walkers[v].children.clone();
        for &child in children.iter().rev() {
            self.walkers[child].prelim += shift;
            self.walkers[child].modifier += shift;
            change += self.walkers[child].change;
            shift += self.walkers[child].shift + change;
        }
    }
}
