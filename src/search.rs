use std::collections::BTreeSet;

use serde::Serialize;

use crate::layout::Layout;

pub const HELP_TEXT: &str = "\
Ctrl + H      show this help
Ctrl + F      search for a file or folder by name
Escape        stop the blinking highlight
Hover a node  reveals two controls:
  green       open the file's content (files only)
  red         remove the node and everything below it from the view
Drag a node   moves it together with its whole subtree
";

/// Name-match highlighting. Successive searches accumulate until cleared.
#[derive(Debug, Clone, Default)]
pub struct SearchHighlighter {
    highlighted: BTreeSet<String>,
}

impl SearchHighlighter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highlight every laid-out node whose name contains `query`, ignoring
    /// case and surrounding whitespace. Returns how many nodes matched this
    /// query; a blank query matches nothing.
    pub fn search(&mut self, layout: &Layout, query: &str) -> usize {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return 0;
        }

        let mut matches = 0;
        for node in layout.nodes() {
            if node.name.trim().to_lowercase().contains(&needle) {
                self.highlighted.insert(node.path.clone());
                matches += 1;
            }
        }
        tracing::debug!(query = %needle, matches, "search applied");
        matches
    }

    pub fn clear(&mut self) {
        self.highlighted.clear();
    }

    /// Drop highlights for paths no longer present in `layout`.
    pub fn retain_visible(&mut self, layout: &Layout) {
        self.highlighted.retain(|path| layout.find(path).is_some());
    }

    pub fn is_highlighted(&self, path: &str) -> bool {
        self.highlighted.contains(path)
    }

    pub fn is_blinking(&self) -> bool {
        !self.highlighted.is_empty()
    }

    pub fn highlighted(&self) -> impl Iterator<Item = &str> {
        self.highlighted.iter().map(String::as_str)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyAction {
    Search,
    ClearHighlights,
    Help,
}

impl KeyAction {
    /// `meta` is the Command key on macOS hosts.
    pub fn from_key(key: &str, ctrl: bool, meta: bool) -> Option<Self> {
        match key {
            "Escape" => Some(KeyAction::ClearHighlights),
            "f" | "F" if ctrl || meta => Some(KeyAction::Search),
            "h" | "H" if ctrl => Some(KeyAction::Help),
            _ => None,
        }
    }
}
