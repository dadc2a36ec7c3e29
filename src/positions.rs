use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::Point;

/// User-arranged coordinates keyed by node path.
///
/// Entries are written when a drag gesture ends and removed when the node (or
/// one of its ancestors) is deleted. Nothing else touches them, so a full
/// re-layout reproduces every arranged node exactly where it was left.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PositionStore {
    positions: HashMap<String, Point>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, path: &str) -> Option<Point> {
        self.positions.get(path).copied()
    }

    pub fn set(&mut self, path: &str, point: Point) {
        self.positions.insert(path.to_string(), point);
    }

    pub fn remove(&mut self, path: &str) -> Option<Point> {
        self.positions.remove(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.positions.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}
