use std::fmt::Write as FmtWrite;

use crate::cardinality::{MarkerKind, MarkerOrientation};
use crate::error::DiagramError;
use crate::geometry::{EdgeEndpoints, Point, Position, compute_edge_params};
use crate::model::{Diagram, Edge, NodeData, NodeType};
use crate::sanitize::strip_tags;
use crate::utils::escape_xml;

pub const NODE_WIDTH: f32 = 160.0;
pub const NODE_HEIGHT: f32 = 64.0;
const ENTITY_HEADER_HEIGHT: f32 = 28.0;
const ATTRIBUTE_ROW_HEIGHT: f32 = 20.0;
const LAYOUT_MARGIN: f32 = 80.0;
const NOTE_FOLD: f32 = 14.0;
const SELF_LOOP_EXTENT: f32 = 48.0;
const KEY_GLYPH: &str = "\u{1F511}";

const EDGE_LABEL_CHAR_WIDTH: f32 = 7.2;
const EDGE_LABEL_LINE_HEIGHT: f32 = 16.0;
const EDGE_LABEL_HORIZONTAL_PADDING: f32 = 14.0;
const EDGE_LABEL_VERTICAL_PADDING: f32 = 8.0;
const EDGE_LABEL_MIN_WIDTH: f32 = 32.0;
const EDGE_LABEL_MIN_HEIGHT: f32 = 22.0;

const STROKE_COLOR: &str = "#2d3748";
const TEXT_COLOR: &str = "#1a202c";

/// On-canvas extent of a node. Entity tables grow with their attribute
/// rows; every other layout uses the fixed block size.
pub fn node_size(node: &NodeData) -> (f32, f32) {
    match node.node_type {
        Some(kind) if kind.has_attribute_table() => {
            let rows = node.attribute_rows().len().max(1) as f32;
            (
                NODE_WIDTH,
                ENTITY_HEADER_HEIGHT + rows * ATTRIBUTE_ROW_HEIGHT + 6.0,
            )
        }
        _ => (NODE_WIDTH, NODE_HEIGHT),
    }
}

fn node_fill(node: &NodeData) -> &'static str {
    match node.node_type {
        Some(NodeType::Entity) | Some(NodeType::WeakEntity) => "#ebf8ff",
        Some(NodeType::ErNote) | Some(NodeType::UmlNote) => "#fefcbf",
        Some(NodeType::ErTrigger) => "#fed7d7",
        Some(NodeType::ErView) => "#e9d8fd",
        Some(NodeType::ErUseCase) | Some(NodeType::UmlUseCase) => "#c6f6d5",
        None => "#fde68a",
    }
}

/// Resolve compass-aware border anchors for an edge between two node
/// centers. The dominant axis picks the facing sides.
fn resolve_endpoints(
    source_center: Point,
    source_size: (f32, f32),
    target_center: Point,
    target_size: (f32, f32),
) -> EdgeEndpoints {
    let dx = target_center.x - source_center.x;
    let dy = target_center.y - source_center.y;

    if dx.abs() >= dy.abs() {
        let (source_position, target_position, sign) = if dx >= 0.0 {
            (Position::Right, Position::Left, 1.0)
        } else {
            (Position::Left, Position::Right, -1.0)
        };
        EdgeEndpoints {
            source: Point::new(source_center.x + sign * source_size.0 / 2.0, source_center.y),
            source_position,
            target: Point::new(target_center.x - sign * target_size.0 / 2.0, target_center.y),
            target_position,
        }
    } else {
        let (source_position, target_position, sign) = if dy >= 0.0 {
            (Position::Bottom, Position::Top, 1.0)
        } else {
            (Position::Top, Position::Bottom, -1.0)
        };
        EdgeEndpoints {
            source: Point::new(source_center.x, source_center.y + sign * source_size.1 / 2.0),
            source_position,
            target: Point::new(target_center.x, target_center.y - sign * target_size.1 / 2.0),
            target_position,
        }
    }
}

/// Recursive relationships loop over the node's top-right corner.
fn self_loop(center: Point, size: (f32, f32)) -> (String, Point) {
    let start = Point::new(center.x + size.0 / 2.0, center.y - size.1 / 4.0);
    let end = Point::new(center.x + size.0 / 4.0, center.y - size.1 / 2.0);
    let path = format!(
        "M {:.1},{:.1} C {:.1},{:.1} {:.1},{:.1} {:.1},{:.1}",
        start.x,
        start.y,
        start.x + SELF_LOOP_EXTENT,
        start.y,
        end.x,
        end.y - SELF_LOOP_EXTENT,
        end.x,
        end.y
    );
    let anchor = Point::new(
        center.x + size.0 / 2.0 + SELF_LOOP_EXTENT / 2.0,
        center.y - size.1 / 2.0 - SELF_LOOP_EXTENT / 2.0,
    );
    (path, anchor)
}

fn is_er_edge(edge: &Edge, source: &NodeData, target: &NodeData) -> bool {
    edge.cardinality.is_some()
        || source.node_type.is_some_and(|kind| kind.has_attribute_table())
        || target.node_type.is_some_and(|kind| kind.has_attribute_table())
}

fn visible_label(edge: &Edge) -> Option<&str> {
    edge.label
        .as_deref()
        .map(str::trim)
        .filter(|label| !label.is_empty())
}

fn normalize_label_lines(label: &str) -> Vec<String> {
    label
        .split('\n')
        .map(|line| {
            if line.is_empty() {
                " ".to_string()
            } else {
                line.to_string()
            }
        })
        .collect()
}

fn measure_label_box(lines: &[String]) -> (f32, f32) {
    let mut max_chars = 0_usize;
    for line in lines {
        max_chars = max_chars.max(line.chars().count());
    }

    let width = (EDGE_LABEL_CHAR_WIDTH * max_chars as f32 + EDGE_LABEL_HORIZONTAL_PADDING)
        .max(EDGE_LABEL_MIN_WIDTH);
    let height = (EDGE_LABEL_LINE_HEIGHT * lines.len() as f32 + EDGE_LABEL_VERTICAL_PADDING)
        .max(EDGE_LABEL_MIN_HEIGHT);

    (width, height)
}

impl Diagram {
    /// Render the diagram to a standalone SVG document. Deterministic for a
    /// given diagram: node positions come from the data, never from layout
    /// heuristics, and every visual offset is a fixed constant.
    pub fn render_svg(&self, background: &str) -> Result<String, DiagramError> {
        let mut min = Point::new(f32::MAX, f32::MAX);
        let mut max = Point::new(f32::MIN, f32::MIN);
        for node in &self.nodes {
            let (width, height) = node_size(node);
            min.x = min.x.min(node.position.x - width / 2.0);
            max.x = max.x.max(node.position.x + width / 2.0);
            min.y = min.y.min(node.position.y - height / 2.0 - SELF_LOOP_EXTENT);
            max.y = max.y.max(node.position.y + height / 2.0);
        }
        if self.nodes.is_empty() {
            min = Point::new(0.0, 0.0);
            max = Point::new(NODE_WIDTH, NODE_HEIGHT);
        }

        let shift = Point::new(LAYOUT_MARGIN - min.x, LAYOUT_MARGIN - min.y);
        let width = (max.x - min.x) + LAYOUT_MARGIN * 2.0 + SELF_LOOP_EXTENT;
        let height = (max.y - min.y) + LAYOUT_MARGIN * 2.0;

        let mut svg = String::new();
        write!(
            svg,
            r##"<?xml version="1.0" encoding="UTF-8"?>
<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}" viewBox="0 0 {:.0} {:.0}" font-family="Inter, system-ui, sans-serif">
  <defs>
        <marker id="arrow-end" markerWidth="8" markerHeight="8" refX="6" refY="4" orient="auto" markerUnits="strokeWidth">
            <path d="M1,1 L6,4 L1,7 z" fill="context-stroke" />
        </marker>
        <marker id="arrow-start" markerWidth="8" markerHeight="8" refX="2" refY="4" orient="auto" markerUnits="strokeWidth">
            <path d="M7,1 L2,4 L7,7 z" fill="context-stroke" />
        </marker>
{}  </defs>
  <rect width="100%" height="100%" fill="{}" />
"##,
            width,
            height,
            width,
            height,
            MarkerKind::svg_defs(),
            escape_xml(background)
        )?;

        for edge in &self.edges {
            self.render_edge(&mut svg, edge, shift)?;
        }

        for node in &self.nodes {
            self.render_node(&mut svg, node, shift)?;
        }

        svg.push_str("</svg>\n");
        Ok(svg)
    }

    fn render_edge(&self, svg: &mut String, edge: &Edge, shift: Point) -> Result<(), DiagramError> {
        let source = self
            .node(&edge.source)
            .ok_or_else(|| DiagramError::UnknownNode(edge.source.clone()))?;
        let target = self
            .node(&edge.target)
            .ok_or_else(|| DiagramError::UnknownNode(edge.target.clone()))?;

        let source_center = Point::new(source.position.x + shift.x, source.position.y + shift.y);
        let target_center = Point::new(target.position.x + shift.x, target.position.y + shift.y);

        let (path, label_anchor) = if edge.source == edge.target {
            self_loop(source_center, node_size(source))
        } else {
            let endpoints = resolve_endpoints(
                source_center,
                node_size(source),
                target_center,
                node_size(target),
            );
            let params = compute_edge_params(edge, &endpoints, &self.edges);
            (params.path, params.label_anchor)
        };

        let (marker_start, marker_end) = if is_er_edge(edge, source, target) {
            let cardinality = edge.effective_cardinality();
            (
                format!(
                    " marker-start=\"url(#{})\"",
                    cardinality.source_marker().marker_id(MarkerOrientation::Start)
                ),
                format!(
                    " marker-end=\"url(#{})\"",
                    cardinality.target_marker().marker_id(MarkerOrientation::End)
                ),
            )
        } else {
            (String::new(), " marker-end=\"url(#arrow-end)\"".to_string())
        };

        write!(
            svg,
            "  <path d=\"{}\" fill=\"none\" stroke=\"{}\" stroke-width=\"2\"{}{} />\n",
            path, STROKE_COLOR, marker_start, marker_end
        )?;

        if let Some(label) = visible_label(edge) {
            self.render_edge_label(svg, label, label_anchor)?;
        }

        Ok(())
    }

    fn render_edge_label(
        &self,
        svg: &mut String,
        label: &str,
        center: Point,
    ) -> Result<(), DiagramError> {
        let lines = normalize_label_lines(label);
        if lines.is_empty() {
            return Ok(());
        }

        let (box_width, box_height) = measure_label_box(&lines);
        write!(
            svg,
            "  <g pointer-events=\"none\">\n    <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"6\" ry=\"6\" fill=\"white\" fill-opacity=\"0.96\" stroke=\"{}\" stroke-width=\"1\" />\n",
            center.x - box_width / 2.0,
            center.y - box_height / 2.0,
            box_width,
            box_height,
            STROKE_COLOR
        )?;

        let start_y = center.y - EDGE_LABEL_LINE_HEIGHT * (lines.len() as f32 - 1.0) / 2.0;
        for (idx, line) in lines.iter().enumerate() {
            write!(
                svg,
                "    <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"13\" text-anchor=\"middle\" dominant-baseline=\"middle\" xml:space=\"preserve\">{}</text>\n",
                center.x,
                start_y + EDGE_LABEL_LINE_HEIGHT * idx as f32,
                TEXT_COLOR,
                escape_xml(line)
            )?;
        }
        svg.push_str("  </g>\n");
        Ok(())
    }

    fn render_node(&self, svg: &mut String, node: &NodeData, shift: Point) -> Result<(), DiagramError> {
        let (width, height) = node_size(node);
        let center = Point::new(node.position.x + shift.x, node.position.y + shift.y);
        let left = center.x - width / 2.0;
        let top = center.y - height / 2.0;
        let fill = node_fill(node);

        match node.node_type {
            Some(kind) if kind.has_attribute_table() => {
                self.render_entity(svg, node, kind, left, top, width, height)?;
            }
            Some(NodeType::ErNote) | Some(NodeType::UmlNote) => {
                // folded-corner note
                write!(
                    svg,
                    "  <path d=\"M {:.1},{:.1} L {:.1},{:.1} L {:.1},{:.1} L {:.1},{:.1} L {:.1},{:.1} Z\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\" />\n  <path d=\"M {:.1},{:.1} L {:.1},{:.1} L {:.1},{:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1\" />\n",
                    left, top,
                    left + width - NOTE_FOLD, top,
                    left + width, top + NOTE_FOLD,
                    left + width, top + height,
                    left, top + height,
                    fill, STROKE_COLOR,
                    left + width - NOTE_FOLD, top,
                    left + width - NOTE_FOLD, top + NOTE_FOLD,
                    left + width, top + NOTE_FOLD,
                    STROKE_COLOR
                )?;
                let body = node
                    .description
                    .as_deref()
                    .map(strip_tags)
                    .filter(|text| !text.trim().is_empty())
                    .unwrap_or_else(|| node.display_name().to_string());
                write!(
                    svg,
                    "  <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"12\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
                    center.x,
                    center.y,
                    TEXT_COLOR,
                    escape_xml(&body)
                )?;
            }
            Some(NodeType::ErUseCase) | Some(NodeType::UmlUseCase) => {
                write!(
                    svg,
                    "  <ellipse cx=\"{:.1}\" cy=\"{:.1}\" rx=\"{:.1}\" ry=\"{:.1}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\" />\n",
                    center.x,
                    center.y,
                    width / 2.0,
                    height / 2.0,
                    fill,
                    STROKE_COLOR
                )?;
                self.render_centered_label(svg, node, center)?;
            }
            Some(NodeType::ErTrigger) => {
                write!(
                    svg,
                    "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"12\" ry=\"12\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\" stroke-dasharray=\"6 4\" />\n",
                    left, top, width, height, fill, STROKE_COLOR
                )?;
                self.render_centered_label(svg, node, center)?;
            }
            Some(NodeType::ErView) => {
                write!(
                    svg,
                    "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\" />\n  <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"1\" />\n",
                    left, top, width, height, fill, STROKE_COLOR,
                    left, top + ENTITY_HEADER_HEIGHT, left + width, top + ENTITY_HEADER_HEIGHT,
                    STROKE_COLOR
                )?;
                self.render_centered_label(svg, node, center)?;
            }
            _ => {
                // generic palette component: block with icon and label
                write!(
                    svg,
                    "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" rx=\"8\" ry=\"8\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\" />\n",
                    left, top, width, height, fill, STROKE_COLOR
                )?;
                if let Some(icon) = node.icon.as_deref().filter(|icon| !icon.is_empty()) {
                    write!(
                        svg,
                        "  <text x=\"{:.1}\" y=\"{:.1}\" font-size=\"18\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
                        left + 22.0,
                        center.y,
                        escape_xml(icon)
                    )?;
                    write!(
                        svg,
                        "  <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"14\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
                        center.x + 11.0,
                        center.y,
                        TEXT_COLOR,
                        escape_xml(node.display_name())
                    )?;
                } else {
                    self.render_centered_label(svg, node, center)?;
                }
            }
        }

        Ok(())
    }

    fn render_centered_label(
        &self,
        svg: &mut String,
        node: &NodeData,
        center: Point,
    ) -> Result<(), DiagramError> {
        write!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"14\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
            center.x,
            center.y,
            TEXT_COLOR,
            escape_xml(node.display_name())
        )?;
        Ok(())
    }

    fn render_entity(
        &self,
        svg: &mut String,
        node: &NodeData,
        kind: NodeType,
        left: f32,
        top: f32,
        width: f32,
        height: f32,
    ) -> Result<(), DiagramError> {
        write!(
            svg,
            "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"2\" />\n",
            left, top, width, height, node_fill(node), STROKE_COLOR
        )?;
        // weak entities carry the double border of ER notation
        if kind == NodeType::WeakEntity {
            write!(
                svg,
                "  <rect x=\"{:.1}\" y=\"{:.1}\" width=\"{:.1}\" height=\"{:.1}\" fill=\"none\" stroke=\"{}\" stroke-width=\"1\" />\n",
                left + 3.0,
                top + 3.0,
                width - 6.0,
                height - 6.0,
                STROKE_COLOR
            )?;
        }
        write!(
            svg,
            "  <line x1=\"{:.1}\" y1=\"{:.1}\" x2=\"{:.1}\" y2=\"{:.1}\" stroke=\"{}\" stroke-width=\"1\" />\n",
            left,
            top + ENTITY_HEADER_HEIGHT,
            left + width,
            top + ENTITY_HEADER_HEIGHT,
            STROKE_COLOR
        )?;
        write!(
            svg,
            "  <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"14\" font-weight=\"bold\" text-anchor=\"middle\" dominant-baseline=\"middle\">{}</text>\n",
            left + width / 2.0,
            top + ENTITY_HEADER_HEIGHT / 2.0,
            TEXT_COLOR,
            escape_xml(node.display_name())
        )?;

        for (idx, row) in node.attribute_rows().iter().enumerate() {
            let row_y = top + ENTITY_HEADER_HEIGHT + ATTRIBUTE_ROW_HEIGHT * (idx as f32 + 0.5) + 3.0;
            let mut text = String::new();
            if row.is_primary_key {
                text.push_str(KEY_GLYPH);
                text.push(' ');
            }
            text.push_str(&row.text);
            if row.is_foreign_key {
                text.push_str(" (FK)");
            }
            write!(
                svg,
                "  <text x=\"{:.1}\" y=\"{:.1}\" fill=\"{}\" font-size=\"12\"{} dominant-baseline=\"middle\">{}</text>\n",
                left + 10.0,
                row_y,
                TEXT_COLOR,
                if row.is_primary_key {
                    " font-weight=\"bold\""
                } else {
                    ""
                },
                escape_xml(&text)
            )?;
        }

        Ok(())
    }

    /// Rasterize the SVG rendering to PNG bytes.
    #[cfg(feature = "raster")]
    pub fn render_png(&self, background: &str, scale: f32) -> Result<Vec<u8>, DiagramError> {
        use tiny_skia::{Pixmap, Transform};

        if scale <= 0.0 {
            return Err(DiagramError::Render(
                "scale must be greater than zero when rendering PNG output".to_string(),
            ));
        }

        let svg = self.render_svg(background)?;

        let mut options = resvg::usvg::Options::default();
        options.font_family = "Inter".to_string();
        options.fontdb_mut().load_system_fonts();

        let tree = resvg::usvg::Tree::from_str(&svg, &options).map_err(|err| {
            DiagramError::Render(format!("failed to parse generated SVG for PNG export: {err}"))
        })?;

        let size = tree.size().to_int_size();
        let scaled_width = ((size.width() as f32) * scale).ceil();
        let scaled_height = ((size.height() as f32) * scale).ceil();

        if !scaled_width.is_finite()
            || !scaled_height.is_finite()
            || scaled_width < 1.0
            || scaled_height < 1.0
            || scaled_width > u32::MAX as f32
            || scaled_height > u32::MAX as f32
        {
            return Err(DiagramError::Render(
                "scaled dimensions outside supported limits; adjust the scale factor".to_string(),
            ));
        }

        let mut pixmap = Pixmap::new(scaled_width as u32, scaled_height as u32).ok_or_else(|| {
            DiagramError::Render(format!(
                "failed to allocate {scaled_width}x{scaled_height} surface for PNG export"
            ))
        })?;

        resvg::render(&tree, Transform::from_scale(scale, scale), &mut pixmap.as_mut());

        pixmap
            .encode_png()
            .map_err(|err| DiagramError::Render(format!("failed to encode PNG output: {err}")))
    }
}
