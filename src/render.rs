use std::collections::HashMap;
use std::fmt::Write as FmtWrite;

use anyhow::Result;
use serde::Serialize;

use crate::Point;
use crate::geometry::{self, CONTROL_RADIUS, CORNER_RADIUS, NODE_HEIGHT};
use crate::layout::{Layout, LayoutNode};
use crate::links::LinkRenderer;
use crate::session::TreeSession;
use crate::source::EntryKind;
use crate::utils::escape_xml;

#[cfg(feature = "png")]
use anyhow::{anyhow, bail};
#[cfg(feature = "png")]
use tiny_skia::{Pixmap, Transform};

/// Whatever draws the tree. Drag and link updates go through this instead of
/// touching drawn elements directly.
pub trait RenderSurface {
    fn place_node(&mut self, handle: NodeHandle, position: Point);
    fn redraw_link(&mut self, source: &str, target: &str, d: &str);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeHandle(pub u32);

/// Path to handle association for the drawn elements.
///
/// A path keeps its handle across layout passes for as long as it stays in the
/// tree, so a host can hold on to its element table between frames.
#[derive(Debug, Clone, Default)]
pub struct RenderTargets {
    handles: HashMap<String, NodeHandle>,
    next: u32,
}

impl RenderTargets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sync(&mut self, layout: &Layout) {
        self.handles.retain(|path, _| layout.find(path).is_some());
        for node in layout.nodes() {
            if !self.handles.contains_key(&node.path) {
                self.handles.insert(node.path.clone(), NodeHandle(self.next));
                self.next += 1;
            }
        }
    }

    pub fn handle(&self, path: &str) -> Option<NodeHandle> {
        self.handles.get(path).copied()
    }

    pub fn len(&self) -> usize {
        self.handles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeMove {
    pub handle: NodeHandle,
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkPatch {
    pub source: String,
    pub target: String,
    pub d: String,
}

/// Recorded element updates for one frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FramePatch {
    pub nodes: Vec<NodeMove>,
    pub links: Vec<LinkPatch>,
}

impl FramePatch {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.links.is_empty()
    }
}

impl RenderSurface for FramePatch {
    fn place_node(&mut self, handle: NodeHandle, position: Point) {
        self.nodes.push(NodeMove {
            handle,
            x: position.x,
            y: position.y,
        });
    }

    fn redraw_link(&mut self, source: &str, target: &str, d: &str) {
        self.links.push(LinkPatch {
            source: source.to_string(),
            target: target.to_string(),
            d: d.to_string(),
        });
    }
}

const STYLE: &str = r#"  <style>
    .node .control { opacity: 0; transition: opacity 0.2s; cursor: pointer; }
    .node:hover .control { opacity: 1; }
    .node rect { cursor: pointer; }
    .blink { animation: blink 1s step-start infinite; stroke: #f5a623; stroke-width: 2; }
    @keyframes blink { 50% { fill: #fff3c4; } }
  </style>
"#;

pub fn render_svg(session: &TreeSession, background: &str) -> Result<String> {
    let config = session.config();
    let layout = session.layout();

    let mut svg = String::new();
    write!(
        svg,
        r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="Inter, system-ui, sans-serif">
  <defs>
    <pattern id="grid" width="15" height="15" patternUnits="userSpaceOnUse">
      <rect width="15" height="15" fill="none" stroke="#eee" stroke-width="0.5" />
    </pattern>
  </defs>
{STYLE}  <rect width="100%" height="100%" fill="{}" />
  <rect width="100%" height="100%" fill="url(#grid)" />
  <g class="tree" transform="{}">
"##,
        config.width,
        config.height,
        config.width,
        config.height,
        escape_xml(background),
        session.viewport().to_svg_transform(),
    )?;

    for &link in layout.links() {
        writeln!(
            svg,
            "    <path class=\"link\" d=\"{}\" fill=\"none\" stroke=\"#666\" stroke-width=\"1\" />",
            LinkRenderer::path_for(layout, link)
        )?;
    }

    for node in layout.nodes() {
        write_node(&mut svg, node, session.is_highlighted(&node.path))?;
    }

    svg.push_str("  </g>\n</svg>\n");
    Ok(svg)
}

fn write_node(svg: &mut String, node: &LayoutNode, highlighted: bool) -> Result<()> {
    let origin = geometry::box_origin(&node.name);
    let name = escape_xml(&node.name);

    writeln!(
        svg,
        "    <g class=\"node\" data-path=\"{}\" transform=\"translate({:.2},{:.2})\">",
        escape_xml(&node.path),
        node.x,
        node.y
    )?;
    writeln!(
        svg,
        "      <rect{} x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"{CORNER_RADIUS}\" fill=\"white\" stroke=\"#333\" stroke-width=\"1\" />",
        if highlighted { " class=\"blink\"" } else { "" },
        origin.x,
        origin.y,
        geometry::box_width(&node.name),
        NODE_HEIGHT
    )?;
    writeln!(
        svg,
        "      <text dy=\"0.3em\" text-anchor=\"middle\" font-size=\"12\" fill=\"#0d5497\">{name}</text>"
    )?;

    if node.kind == EntryKind::Blob {
        let view = geometry::view_control(&node.name);
        writeln!(
            svg,
            "      <g class=\"control view\" transform=\"translate({:.1},{:.1})\"><circle r=\"{CONTROL_RADIUS}\" fill=\"#4CAF50\" /></g>",
            view.x, view.y
        )?;
    }
    if !node.is_root() {
        let delete = geometry::delete_control(&node.name);
        writeln!(
            svg,
            "      <g class=\"control delete\" transform=\"translate({:.1},{:.1})\"><circle r=\"{CONTROL_RADIUS}\" fill=\"#ff4444\" /><text dy=\"0.3em\" text-anchor=\"middle\" font-size=\"12\" fill=\"white\">×</text></g>",
            delete.x, delete.y
        )?;
    }

    svg.push_str("    </g>\n");
    Ok(())
}

#[cfg(feature = "png")]
pub fn render_png(session: &TreeSession, background: &str, scale: f32) -> Result<Vec<u8>> {
    if !scale.is_finite() || scale <= 0.0 {
        bail!("scale must be greater than zero when rendering PNG output");
    }

    let svg = render_svg(session, background)?;

    let mut options = resvg::usvg::Options::default();
    options.font_family = "Inter".to_string();
    options.fontdb_mut().load_system_fonts();

    let tree = resvg::usvg::Tree::from_str(&svg, &options)
        .map_err(|err| anyhow!("failed to parse generated SVG for PNG export: {err}"))?;

    let size = tree.size().to_int_size();
    let scaled_width = ((size.width() as f32) * scale).ceil();
    let scaled_height = ((size.height() as f32) * scale).ceil();

    if !scaled_width.is_finite() || !scaled_height.is_finite() {
        bail!("scaled dimensions are not finite; try a smaller scale factor");
    }
    if scaled_width < 1.0 || scaled_height < 1.0 {
        bail!("scaled dimensions collapsed below 1px; try a larger scale factor");
    }
    if scaled_width > u32::MAX as f32 || scaled_height > u32::MAX as f32 {
        bail!("scaled dimensions exceed supported limits; try a smaller scale factor");
    }

    let scaled_width = scaled_width as u32;
    let scaled_height = scaled_height as u32;
    let mut pixmap = Pixmap::new(scaled_width, scaled_height).ok_or_else(|| {
        anyhow!("failed to allocate {scaled_width}x{scaled_height} surface for PNG export")
    })?;

    resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

    pixmap
        .encode_png()
        .map_err(|err| anyhow!("failed to encode PNG output: {err}"))
}
