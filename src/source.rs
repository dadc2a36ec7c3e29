use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Blob,
    Tree,
    /// Submodule pointer. Rendered like a leaf but has no fetchable content.
    Commit,
}

impl EntryKind {
    /// Wording used by the info panel.
    pub fn display_name(self) -> &'static str {
        match self {
            EntryKind::Blob => "file",
            EntryKind::Tree => "folder",
            EntryKind::Commit => "submodule",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathEntry {
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl PathEntry {
    pub fn blob(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Blob,
            url: None,
            size: None,
        }
    }

    pub fn tree(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind: EntryKind::Tree,
            url: None,
            size: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn with_size(mut self, size: u64) -> Self {
        self.size = Some(size);
        self
    }
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("tree listing is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("tree listing must be an array of entries or an object with a 'tree' array")]
    UnexpectedShape,
}

#[derive(Deserialize)]
struct TreeResponse {
    tree: Vec<serde_json::Value>,
    #[serde(default)]
    truncated: bool,
}

/// Decode a tree listing. Empty or whitespace-only input yields no entries.
///
/// Only the outer shape can fail. Entries that do not decode (unknown
/// `type`, missing `path`, ...) are dropped with a warning.
pub fn parse_entries(text: &str) -> Result<Vec<PathEntry>, SourceError> {
    let trimmed = text.trim_start();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    match trimmed.as_bytes()[0] {
        b'{' => {
            let value: serde_json::Value = serde_json::from_str(trimmed)?;
            if value.get("tree").is_none() {
                return Err(SourceError::UnexpectedShape);
            }
            let response: TreeResponse = serde_json::from_value(value)?;
            if response.truncated {
                tracing::warn!(
                    entries = response.tree.len(),
                    "tree listing was truncated by the remote API"
                );
            }
            Ok(decode_items(response.tree))
        }
        b'[' => {
            let items: Vec<serde_json::Value> = serde_json::from_str(trimmed)?;
            Ok(decode_items(items))
        }
        _ => Ok(parse_path_lines(trimmed)),
    }
}

fn decode_items(items: Vec<serde_json::Value>) -> Vec<PathEntry> {
    items
        .into_iter()
        .enumerate()
        .filter_map(
            |(index, item)| match serde_json::from_value::<PathEntry>(item) {
                Ok(entry) => Some(entry),
                Err(err) => {
                    tracing::warn!(index, error = %err, "skipping malformed tree entry");
                    None
                }
            },
        )
        .collect()
}

fn parse_path_lines(text: &str) -> Vec<PathEntry> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| {
            let line = line.strip_prefix("./").unwrap_or(line);
            match line.strip_suffix('/') {
                Some(dir) => PathEntry::tree(dir),
                None => PathEntry::blob(line),
            }
        })
        .collect()
}
