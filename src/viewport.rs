use serde::{Deserialize, Serialize};

use crate::Point;

pub const MIN_SCALE: f32 = 0.5;
pub const MAX_SCALE: f32 = 3.0;

/// Translate plus uniform scale applied to the whole drawing group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub k: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            k: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(x: f32, y: f32, k: f32) -> Self {
        Self {
            x,
            y,
            k: clamp_scale(k),
        }
    }

    /// Canvas to screen.
    pub fn apply(&self, point: Point) -> Point {
        Point::new(point.x * self.k + self.x, point.y * self.k + self.y)
    }

    /// Screen to canvas.
    pub fn invert(&self, point: Point) -> Point {
        Point::new((point.x - self.x) / self.k, (point.y - self.y) / self.k)
    }

    pub fn to_svg_transform(&self) -> String {
        format!("translate({},{}) scale({})", self.x, self.y, self.k)
    }
}

fn clamp_scale(k: f32) -> f32 {
    if k.is_finite() {
        k.clamp(MIN_SCALE, MAX_SCALE)
    } else {
        1.0
    }
}

#[derive(Debug, Clone)]
pub struct ViewportController {
    transform: Viewport,
}

impl ViewportController {
    pub fn new(transform: Viewport) -> Self {
        Self { transform }
    }

    pub fn transform(&self) -> Viewport {
        self.transform
    }

    pub fn pan(&mut self, dx: f32, dy: f32) {
        if dx.is_finite() && dy.is_finite() {
            self.transform.x += dx;
            self.transform.y += dy;
        }
    }

    /// Multiply the scale by `factor`, keeping the screen point `focus` fixed.
    pub fn zoom_at(&mut self, focus: Point, factor: f32) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let anchor = self.transform.invert(focus);
        let k = clamp_scale(self.transform.k * factor);
        self.transform = Viewport {
            x: focus.x - anchor.x * k,
            y: focus.y - anchor.y * k,
            k,
        };
    }
}
