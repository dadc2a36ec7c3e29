use crate::layout::{Layout, LayoutEngine};
use crate::positions::PositionStore;
use crate::tree::{Hierarchy, TreeNode};

/// Result of a successful soft delete.
#[derive(Debug, Clone)]
pub struct Deletion {
    pub removed: TreeNode,
    /// Stored positions dropped along with the subtree.
    pub purged: usize,
    pub layout: Layout,
}

impl Deletion {
    pub fn removed_paths(&self) -> Vec<&str> {
        self.removed
            .walk()
            .into_iter()
            .map(|node| node.path.as_str())
            .collect()
    }
}

pub struct DeletionController;

impl DeletionController {
    /// Remove `path` and everything below it from the view, purge their
    /// stored positions and lay out what is left. The root and unknown paths
    /// are left alone.
    pub fn delete(
        hierarchy: &mut Hierarchy,
        store: &mut PositionStore,
        engine: &LayoutEngine,
        path: &str,
    ) -> Option<Deletion> {
        if path.is_empty() {
            tracing::debug!("ignoring request to delete the root");
            return None;
        }
        let removed = hierarchy.remove(path)?;

        let purged = removed
            .walk()
            .into_iter()
            .filter(|node| store.remove(&node.path).is_some())
            .count();

        tracing::debug!(
            path,
            removed = removed.count(),
            purged,
            "node removed from view"
        );

        let layout = engine.run(hierarchy, store);
        Some(Deletion {
            removed,
            purged,
            layout,
        })
    }
}
