use serde::Serialize;

use crate::Point;
use crate::source::EntryKind;

pub const NODE_HEIGHT: f32 = 30.0;
pub const CORNER_RADIUS: f32 = 4.0;
pub const CONTROL_RADIUS: f32 = 8.0;
/// Controls sit slightly above the box's horizontal center line.
pub const CONTROL_RISE: f32 = 10.0;

const CHAR_WIDTH: f32 = 8.0;
const BOX_PADDING: f32 = 40.0;
const CONTROL_INSET: f32 = 15.0;

// UTF-16 units, so astral characters such as emoji count twice like in a
// browser string length.
fn name_len(name: &str) -> f32 {
    name.encode_utf16().count() as f32
}

/// Box width for a label. Offsets below are relative to the node anchor at
/// the box center.
pub fn box_width(name: &str) -> f32 {
    name_len(name) * CHAR_WIDTH + BOX_PADDING
}

/// Horizontal distance from the anchor to either control.
pub fn control_offset(name: &str) -> f32 {
    name_len(name) * CHAR_WIDTH / 2.0 + CONTROL_INSET
}

/// Top-left corner of the box, relative to the anchor.
pub fn box_origin(name: &str) -> Point {
    Point::new(-box_width(name) / 2.0, -NODE_HEIGHT / 2.0)
}

pub fn view_control(name: &str) -> Point {
    Point::new(-control_offset(name), -CONTROL_RISE)
}

pub fn delete_control(name: &str) -> Point {
    Point::new(control_offset(name), -CONTROL_RISE)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HitTarget {
    Body,
    View,
    Delete,
}

/// Classify a point given relative to the node anchor.
///
/// Controls win over the box where they overlap. The view control exists only
/// on blobs and the delete control never exists on the root.
pub fn hit_test(name: &str, kind: EntryKind, is_root: bool, local: Point) -> Option<HitTarget> {
    let within = |center: Point| {
        let dx = local.x - center.x;
        let dy = local.y - center.y;
        dx * dx + dy * dy <= CONTROL_RADIUS * CONTROL_RADIUS
    };

    if kind == EntryKind::Blob && within(view_control(name)) {
        return Some(HitTarget::View);
    }
    if !is_root && within(delete_control(name)) {
        return Some(HitTarget::Delete);
    }

    let origin = box_origin(name);
    let inside_x = local.x >= origin.x && local.x <= origin.x + box_width(name);
    let inside_y = local.y >= origin.y && local.y <= origin.y + NODE_HEIGHT;
    (inside_x && inside_y).then_some(HitTarget::Body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn box_dimensions_follow_name_length() {
        assert_eq!(box_width("b.txt"), 80.0);
        assert_eq!(box_origin("b.txt"), Point::new(-40.0, -15.0));
        assert_eq!(control_offset("b.txt"), 35.0);
        assert_eq!(view_control("b.txt"), Point::new(-35.0, -10.0));
        assert_eq!(delete_control("b.txt"), Point::new(35.0, -10.0));
    }

    #[test]
    fn width_counts_utf16_units() {
        assert_eq!(box_width("ü"), 48.0);
        assert_eq!(box_width("🦀.rs"), 80.0);
        assert_eq!(control_offset("🦀"), 23.0);
    }

    #[test]
    fn hit_test_distinguishes_controls_from_body() {
        let name = "b.txt";
        assert_eq!(
            hit_test(name, EntryKind::Blob, false, Point::new(0.0, 0.0)),
            Some(HitTarget::Body)
        );
        assert_eq!(
            hit_test(name, EntryKind::Blob, false, Point::new(-35.0, -10.0)),
            Some(HitTarget::View)
        );
        assert_eq!(
            hit_test(name, EntryKind::Blob, false, Point::new(38.0, -12.0)),
            Some(HitTarget::Delete)
        );
        assert_eq!(hit_test(name, EntryKind::Blob, false, Point::new(0.0, 40.0)), None);
    }

    #[test]
    fn folders_and_root_lack_some_controls() {
        let name = "src";
        let view = view_control(name);
        assert_eq!(
            hit_test(name, EntryKind::Tree, false, view),
            Some(HitTarget::Body)
        );
        let delete = delete_control(name);
        assert_eq!(hit_test(name, EntryKind::Tree, true, delete), Some(HitTarget::Body));
    }
}
