use serde::{Deserialize, Serialize};

use crate::{COUSIN_SEPARATION, LEVEL_STRIDE, SIBLING_SEPARATION};

const DEFAULT_WIDTH: f32 = 1280.0;
const DEFAULT_HEIGHT: f32 = 800.0;
const MAX_SESSIONS_DEFAULT: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Margins {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Default for Margins {
    fn default() -> Self {
        Self {
            top: 60.0,
            right: 120.0,
            bottom: 60.0,
            left: 120.0,
        }
    }
}

/// Canvas bounds and spacing used by every layout pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutConfig {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub margins: Margins,
    #[serde(default = "default_level_stride")]
    pub level_stride: f32,
    #[serde(default = "default_sibling_separation")]
    pub sibling_separation: f32,
    #[serde(default = "default_cousin_separation")]
    pub cousin_separation: f32,
}

fn default_level_stride() -> f32 {
    LEVEL_STRIDE
}

fn default_sibling_separation() -> f32 {
    SIBLING_SEPARATION
}

fn default_cousin_separation() -> f32 {
    COUSIN_SEPARATION
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            width: DEFAULT_WIDTH,
            height: DEFAULT_HEIGHT,
            margins: Margins::default(),
            level_stride: LEVEL_STRIDE,
            sibling_separation: SIBLING_SEPARATION,
            cousin_separation: COUSIN_SEPARATION,
        }
    }
}

impl LayoutConfig {
    pub fn with_size(width: f32, height: f32) -> Self {
        Self {
            width,
            height,
            ..Self::default()
        }
    }

    /// Horizontal extent handed to the tidy tree pass.
    pub fn inner_width(&self) -> f32 {
        (self.width - self.margins.left - self.margins.right).max(0.0)
    }

    pub fn inner_height(&self) -> f32 {
        (self.height - self.margins.top - self.margins.bottom).max(0.0)
    }
}

/// Limits for the HTTP host. Values come from the environment when set.
#[derive(Debug, Clone)]
pub struct ServeConfig {
    pub max_sessions: usize,
    pub default_width: f32,
    pub default_height: f32,
}

impl Default for ServeConfig {
    fn default() -> Self {
        Self {
            max_sessions: env_or("OXTREE_MAX_SESSIONS", MAX_SESSIONS_DEFAULT),
            default_width: env_or("OXTREE_DEFAULT_WIDTH", DEFAULT_WIDTH),
            default_height: env_or("OXTREE_DEFAULT_HEIGHT", DEFAULT_HEIGHT),
        }
    }
}

impl ServeConfig {
    pub fn layout(&self, width: Option<f32>, height: Option<f32>) -> LayoutConfig {
        LayoutConfig::with_size(
            width.unwrap_or(self.default_width),
            height.unwrap_or(self.default_height),
        )
    }
}

fn env_or<T: std::str::FromStr>(key: &str, fallback: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(fallback)
}
