pub mod config;
pub mod deletion;
pub mod drag;
pub mod geometry;
pub mod layout;
pub mod links;
pub mod positions;
pub mod render;
pub mod search;
pub mod session;
pub mod source;
pub mod tree;
pub mod utils;
pub mod viewport;

#[cfg(feature = "server")]
pub mod serve;

use serde::{Deserialize, Serialize};

pub use config::LayoutConfig;
pub use layout::{Layout, LayoutEngine, LayoutNode};
pub use links::{Link, LinkRenderer};
pub use positions::PositionStore;
pub use render::{FramePatch, NodeHandle, RenderSurface, RenderTargets};
pub use session::{LeafActivation, NodeInfo, TreeSession};
pub use source::{EntryKind, PathEntry, SourceError, parse_entries};
pub use tree::{Hierarchy, PathTreeBuilder, TreeNode};

/// Vertical distance between consecutive depths for nodes without a stored position.
pub const LEVEL_STRIDE: f32 = 180.0;
pub const SIBLING_SEPARATION: f32 = 1.5;
pub const COUSIN_SEPARATION: f32 = 2.5;

/// Canvas coordinate, shared by layout, drag and rendering.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}
