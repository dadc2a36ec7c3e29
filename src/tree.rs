use std::collections::HashMap;
use std::collections::hash_map::Entry;

use crate::source::{EntryKind, PathEntry};

/// One file or directory in the view hierarchy. The synthetic root has an empty path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub kind: EntryKind,
    pub url: Option<String>,
    pub size: Option<u64>,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn is_root(&self) -> bool {
        self.path.is_empty()
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }

    /// Pre-order walk over this node and everything beneath it.
    pub fn walk(&self) -> Vec<&TreeNode> {
        let mut out = Vec::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(node.children.iter().rev());
        }
        out
    }

    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TreeNode::count).sum::<usize>()
    }
}

#[derive(Debug)]
struct PendingNode {
    name: String,
    path: String,
    kind: EntryKind,
    url: Option<String>,
    size: Option<u64>,
    synthesized: bool,
    children: Vec<usize>,
}

/// Turns a flat path list into a rooted hierarchy.
///
/// Nodes are created the first time their prefix is seen and appended to their
/// parent in that order. Prefixes that never appear as a full entry become
/// plain directories. Feeding an already-seen path is a no-op, except that a
/// real entry may fill in the metadata of a directory that was synthesized
/// earlier from a deeper path.
#[derive(Debug)]
pub struct PathTreeBuilder {
    nodes: Vec<PendingNode>,
    index: HashMap<String, usize>,
}

impl PathTreeBuilder {
    pub fn new(root_name: &str) -> Self {
        let root = PendingNode {
            name: root_name.to_string(),
            path: String::new(),
            kind: EntryKind::Tree,
            url: None,
            size: None,
            synthesized: false,
            children: Vec::new(),
        };
        let mut index = HashMap::new();
        index.insert(String::new(), 0);
        Self {
            nodes: vec![root],
            index,
        }
    }

    pub fn from_entries<'a>(
        root_name: &str,
        entries: impl IntoIterator<Item = &'a PathEntry>,
    ) -> Hierarchy {
        let mut builder = Self::new(root_name);
        for entry in entries {
            builder.push(entry);
        }
        builder.build()
    }

    /// Returns false when the entry was skipped as malformed.
    pub fn push(&mut self, entry: &PathEntry) -> bool {
        if !is_valid_path(&entry.path) {
            tracing::warn!(path = %entry.path, "skipping malformed path entry");
            return false;
        }

        let segments: Vec<&str> = entry.path.split('/').collect();
        let mut parent = 0_usize;
        let mut prefix = String::new();

        for (depth, segment) in segments.iter().enumerate() {
            if !prefix.is_empty() {
                prefix.push('/');
            }
            prefix.push_str(segment);
            let is_full_path = depth + 1 == segments.len();

            let next = self.nodes.len();
            let slot = match self.index.entry(prefix.clone()) {
                Entry::Occupied(existing) => *existing.get(),
                Entry::Vacant(vacant) => {
                    vacant.insert(next);
                    let node = if is_full_path {
                        PendingNode {
                            name: segment.to_string(),
                            path: prefix.clone(),
                            kind: entry.kind,
                            url: entry.url.clone(),
                            size: entry.size,
                            synthesized: false,
                            children: Vec::new(),
                        }
                    } else {
                        PendingNode {
                            name: segment.to_string(),
                            path: prefix.clone(),
                            kind: EntryKind::Tree,
                            url: None,
                            size: None,
                            synthesized: true,
                            children: Vec::new(),
                        }
                    };
                    self.nodes.push(node);
                    self.nodes[parent].children.push(next);
                    next
                }
            };

            if is_full_path && self.nodes[slot].synthesized {
                let node = &mut self.nodes[slot];
                node.kind = entry.kind;
                node.url = entry.url.clone();
                node.size = entry.size;
                node.synthesized = false;
            }

            parent = slot;
        }

        true
    }

    pub fn build(self) -> Hierarchy {
        let mut slots: Vec<Option<PendingNode>> = self.nodes.into_iter().map(Some).collect();
        let root = assemble(&mut slots, 0);
        Hierarchy::new(root)
    }
}

fn assemble(slots: &mut [Option<PendingNode>], slot: usize) -> TreeNode {
    let Some(pending) = slots[slot].take() else {
        unreachable!("every pending node has exactly one parent");
    };
    let children = pending
        .children
        .iter()
        .map(|&child| assemble(slots, child))
        .collect();
    TreeNode {
        name: pending.name,
        path: pending.path,
        kind: pending.kind,
        url: pending.url,
        size: pending.size,
        children,
    }
}

fn is_valid_path(path: &str) -> bool {
    !path.is_empty()
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

/// The view hierarchy plus a `path -> parent path` lookup kept beside it.
#[derive(Debug, Clone, PartialEq)]
pub struct Hierarchy {
    root: TreeNode,
    parents: HashMap<String, String>,
}

impl Hierarchy {
    pub fn new(root: TreeNode) -> Self {
        let mut hierarchy = Self {
            root,
            parents: HashMap::new(),
        };
        hierarchy.reindex();
        hierarchy
    }

    fn reindex(&mut self) {
        self.parents.clear();
        let mut stack = vec![&self.root];
        while let Some(node) = stack.pop() {
            for child in &node.children {
                self.parents.insert(child.path.clone(), node.path.clone());
                stack.push(child);
            }
        }
    }

    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.parents.len() + 1
    }

    pub fn is_empty(&self) -> bool {
        self.root.children.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        path.is_empty() || self.parents.contains_key(path)
    }

    pub fn parent_of(&self, path: &str) -> Option<&str> {
        self.parents.get(path).map(String::as_str)
    }

    /// True when `path` sits strictly below `ancestor`.
    pub fn is_descendant(&self, ancestor: &str, path: &str) -> bool {
        let mut current = path;
        while let Some(parent) = self.parent_of(current) {
            if parent == ancestor {
                return true;
            }
            current = parent;
        }
        false
    }

    /// Paths from the root's child down to `path`, or `None` if it is not in the tree.
    fn chain_to(&self, path: &str) -> Option<Vec<String>> {
        if !self.contains(path) {
            return None;
        }
        let mut chain = Vec::new();
        let mut current = path;
        while let Some(parent) = self.parent_of(current) {
            chain.push(current.to_string());
            current = parent;
        }
        chain.reverse();
        Some(chain)
    }

    pub fn find(&self, path: &str) -> Option<&TreeNode> {
        let chain = self.chain_to(path)?;
        let mut node = &self.root;
        for step in &chain {
            node = node.children.iter().find(|child| &child.path == step)?;
        }
        Some(node)
    }

    /// Detach `path` and its subtree. The root can't be removed.
    pub fn remove(&mut self, path: &str) -> Option<TreeNode> {
        let parent_path = self.parent_of(path)?.to_string();
        let chain = self.chain_to(&parent_path)?;

        let mut parent = &mut self.root;
        for step in &chain {
            parent = parent.children.iter_mut().find(|child| &child.path == step)?;
        }

        let position = parent.children.iter().position(|child| child.path == path)?;
        let removed = parent.children.remove(position);

        for node in removed.walk() {
            self.parents.remove(&node.path);
        }

        Some(removed)
    }

    /// Every node in pre-order, root first.
    pub fn nodes(&self) -> Vec<&TreeNode> {
        self.root.walk()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn sample() -> Vec<PathEntry> {
        vec![PathEntry::blob("a/b.txt"), PathEntry::blob("a/c/d.txt")]
    }

    #[test]
    fn builds_nested_hierarchy_in_first_seen_order() {
        let hierarchy = PathTreeBuilder::from_entries("repo", &sample());

        assert_eq!(hierarchy.len(), 5);
        let root = hierarchy.root();
        assert_eq!(root.name, "repo");
        assert_eq!(root.path, "");
        assert_eq!(root.children.len(), 1);

        let a = &root.children[0];
        assert_eq!(a.name, "a");
        assert_eq!(a.kind, EntryKind::Tree);
        let names: Vec<&str> = a.children.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["b.txt", "c"]);
        assert_eq!(a.children[0].kind, EntryKind::Blob);
        assert_eq!(a.children[1].kind, EntryKind::Tree);
        assert_eq!(a.children[1].children[0].path, "a/c/d.txt");
    }

    #[test]
    fn four_nodes_below_root_for_example_listing() {
        let hierarchy = PathTreeBuilder::from_entries("repo", &sample());
        assert_eq!(hierarchy.root().walk().len() - 1, 4);
    }

    #[test]
    fn duplicate_entries_are_ignored() {
        let mut entries = sample();
        entries.push(PathEntry::blob("a/b.txt"));
        let once = PathTreeBuilder::from_entries("repo", &sample());
        let twice = PathTreeBuilder::from_entries("repo", &entries);
        assert_eq!(once, twice);
    }

    #[test]
    fn building_twice_is_structurally_identical() {
        let entries = vec![
            PathEntry::tree("src"),
            PathEntry::blob("src/main.rs"),
            PathEntry::blob("README.md"),
            PathEntry::blob("src/bin/tool.rs"),
        ];
        assert_eq!(
            PathTreeBuilder::from_entries("x", &entries),
            PathTreeBuilder::from_entries("x", &entries)
        );
    }

    #[test]
    fn later_directory_entry_fills_synthesized_metadata() {
        let entries = vec![
            PathEntry::blob("docs/guide.md"),
            PathEntry::tree("docs").with_url("https://api/trees/docs"),
        ];
        let hierarchy = PathTreeBuilder::from_entries("repo", &entries);
        let docs = hierarchy.find("docs").unwrap();
        assert_eq!(docs.url.as_deref(), Some("https://api/trees/docs"));
        assert_eq!(docs.children.len(), 1);
    }

    #[test]
    fn malformed_paths_are_skipped() {
        let mut builder = PathTreeBuilder::new("repo");
        assert!(!builder.push(&PathEntry::blob("")));
        assert!(!builder.push(&PathEntry::blob("a//b")));
        assert!(!builder.push(&PathEntry::blob("/abs")));
        assert!(!builder.push(&PathEntry::blob("../escape")));
        assert!(builder.push(&PathEntry::blob("ok.txt")));
        let hierarchy = builder.build();
        assert_eq!(hierarchy.len(), 2);
    }

    #[test]
    fn empty_listing_is_root_only() {
        let hierarchy = PathTreeBuilder::from_entries("repo", &[]);
        assert_eq!(hierarchy.len(), 1);
        assert!(hierarchy.is_empty());
    }

    #[test]
    fn paths_are_unique_and_parents_single() {
        let entries = vec![
            PathEntry::blob("a/x"),
            PathEntry::blob("a/y/z"),
            PathEntry::blob("b/x"),
            PathEntry::blob("a/y/w"),
        ];
        let hierarchy = PathTreeBuilder::from_entries("r", &entries);
        let nodes = hierarchy.nodes();
        let unique: HashSet<&str> = nodes.iter().map(|n| n.path.as_str()).collect();
        assert_eq!(unique.len(), nodes.len());

        for node in nodes.iter().filter(|n| !n.is_root()) {
            let parent = hierarchy.parent_of(&node.path).unwrap();
            assert!(!hierarchy.is_descendant(&node.path, &node.path));
            assert!(!hierarchy.is_descendant(&node.path, parent));
        }
        assert!(hierarchy.parent_of("").is_none());
    }

    #[test]
    fn remove_detaches_subtree_and_lookup() {
        let mut hierarchy = PathTreeBuilder::from_entries("repo", &sample());
        let removed = hierarchy.remove("a/c").unwrap();
        assert_eq!(removed.count(), 2);
        assert!(!hierarchy.contains("a/c"));
        assert!(!hierarchy.contains("a/c/d.txt"));
        let a = hierarchy.find("a").unwrap();
        assert_eq!(a.children.len(), 1);
        assert_eq!(a.children[0].name, "b.txt");
    }

    #[test]
    fn removing_root_or_unknown_path_does_nothing() {
        let mut hierarchy = PathTreeBuilder::from_entries("repo", &sample());
        let before = hierarchy.clone();
        assert!(hierarchy.remove("").is_none());
        assert!(hierarchy.remove("nope").is_none());
        assert_eq!(hierarchy, before);
    }
}
