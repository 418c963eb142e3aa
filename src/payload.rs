use std::collections::BTreeMap;
use std::fmt::Write as FmtWrite;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cardinality::Cardinality;
use crate::error::ImportError;
use crate::geometry::Point;
use crate::model::{Diagram, DiagramMetadata, Edge, NodeData, NodeType};
use crate::utils::escape_xml;

/// Body of a save request, and the native interchange form of a diagram.
/// Saving the same payload twice stores the same representation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveDiagramPayload {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub nodes: Vec<NodeData>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Owner,
    Edit,
    Read,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramOwner {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture_url: Option<String>,
}

/// Shape returned by the external persistence layer. The core only consumes
/// this; the REST service owns its lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedDiagram {
    #[serde(flatten)]
    pub payload: SaveDiagramPayload,
    pub id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    pub is_owner: bool,
    pub permission: Permission,
    pub owner: DiagramOwner,
}

impl SaveDiagramPayload {
    pub fn from_diagram(diagram: &Diagram) -> Self {
        let (title, description) = match &diagram.metadata {
            Some(meta) => (meta.title.clone(), meta.description.clone()),
            None => ("Untitled diagram".to_string(), None),
        };
        SaveDiagramPayload {
            title,
            description,
            nodes: diagram.nodes.clone(),
            edges: diagram.edges.clone(),
        }
    }

    /// Reconstruct a validated diagram. Fails on duplicate node ids or
    /// dangling edges instead of producing a partial graph.
    pub fn into_diagram(self) -> Result<Diagram, ImportError> {
        let diagram = Diagram {
            nodes: self.nodes,
            edges: self.edges,
            metadata: Some(DiagramMetadata {
                title: self.title,
                description: self.description,
            }),
        };
        diagram.validate()?;
        Ok(diagram)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterchangeFormat {
    Json,
    Xml,
}

/// Sniff the interchange format from the document head.
pub fn detect_format(input: &str) -> Result<InterchangeFormat, ImportError> {
    let head = input.trim_start();
    if head.starts_with('<') {
        Ok(InterchangeFormat::Xml)
    } else if head.starts_with('{') {
        Ok(InterchangeFormat::Json)
    } else {
        Err(ImportError::UnrecognizedFormat)
    }
}

// Accept both the save-payload shape and a bare {nodes, edges, metadata?}
// document; older exports used the latter.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonDocument {
    Payload(SaveDiagramPayload),
    Bare(Diagram),
}

/// Parse either interchange form into the native in-memory shape,
/// normalizing and validating before anything reaches the canvas owner.
pub fn import_diagram(input: &str) -> Result<Diagram, ImportError> {
    let format = detect_format(input)?;
    debug!(?format, "importing diagram");

    let diagram = match format {
        InterchangeFormat::Json => match serde_json::from_str::<JsonDocument>(input)? {
            JsonDocument::Payload(payload) => return payload.into_diagram(),
            JsonDocument::Bare(diagram) => diagram,
        },
        InterchangeFormat::Xml => import_xml(input)?,
    };

    diagram.validate()?;
    Ok(diagram)
}

/// Serialize to the native JSON interchange form.
pub fn export_json(diagram: &Diagram) -> String {
    let payload = SaveDiagramPayload::from_diagram(diagram);
    serde_json::to_string_pretty(&payload).expect("payload serialization is infallible")
}

/// Serialize to the XML diagram-interchange form (mxGraphModel cells) for
/// cross-tool compatibility. The XML dialect carries labels, node types,
/// positions and cardinalities; editor-only fields stay in the JSON form.
pub fn export_xml(diagram: &Diagram) -> String {
    let mut out = String::from("<mxGraphModel>\n  <root>\n");
    out.push_str("    <mxCell id=\"0\" />\n    <mxCell id=\"1\" parent=\"0\" />\n");

    for node in &diagram.nodes {
        let mut style = String::new();
        if let Some(node_type) = node.node_type {
            let _ = write!(style, "nodeType={};", node_type.as_str());
        }
        if let Some(icon) = &node.icon {
            let _ = write!(style, "icon={};", icon);
        }
        let _ = write!(
            out,
            "    <mxCell id=\"{}\" value=\"{}\" style=\"{}\" vertex=\"1\" parent=\"1\">\n      <mxGeometry x=\"{:.1}\" y=\"{:.1}\" as=\"geometry\" />\n    </mxCell>\n",
            escape_xml(&node.id),
            escape_xml(node.display_name()),
            escape_xml(&style),
            node.position.x,
            node.position.y
        );
    }

    for edge in &diagram.edges {
        let style = match edge.cardinality {
            Some(cardinality) => format!("cardinality={};", cardinality.as_str()),
            None => String::new(),
        };
        let _ = write!(
            out,
            "    <mxCell id=\"{}\" value=\"{}\" style=\"{}\" edge=\"1\" parent=\"1\" source=\"{}\" target=\"{}\" />\n",
            escape_xml(&edge.id),
            escape_xml(edge.label.as_deref().unwrap_or("")),
            escape_xml(&style),
            escape_xml(&edge.source),
            escape_xml(&edge.target)
        );
    }

    out.push_str("  </root>\n</mxGraphModel>\n");
    out
}

fn parse_style(style: &str) -> BTreeMap<&str, &str> {
    style
        .split(';')
        .filter_map(|token| token.split_once('='))
        .map(|(key, value)| (key.trim(), value.trim()))
        .collect()
}

fn import_xml(input: &str) -> Result<Diagram, ImportError> {
    let document = roxmltree::Document::parse(input)?;
    let mut diagram = Diagram::default();

    for cell in document
        .descendants()
        .filter(|node| node.has_tag_name("mxCell"))
    {
        let id = cell.attribute("id").unwrap_or_default();
        // ids 0 and 1 are the mx structural root cells
        if id.is_empty() || id == "0" || id == "1" {
            continue;
        }

        let value = cell.attribute("value").unwrap_or_default();
        let style = parse_style(cell.attribute("style").unwrap_or_default());

        if cell.attribute("edge") == Some("1") {
            let mut edge = Edge::new(
                cell.attribute("source").unwrap_or_default(),
                cell.attribute("target").unwrap_or_default(),
            );
            edge.id = id.to_string();
            if !value.is_empty() {
                edge.label = Some(value.to_string());
                edge.has_label = true;
            }
            edge.cardinality = style
                .get("cardinality")
                .map(|raw| Cardinality::parse_lenient(raw));
            diagram.add_edge(edge);
        } else if cell.attribute("vertex") == Some("1") {
            let mut node = NodeData::new(if value.is_empty() { id } else { value });
            node.id = id.to_string();
            node.node_type = style.get("nodeType").and_then(|raw| {
                serde_json::from_value::<NodeType>(serde_json::Value::String((*raw).to_string()))
                    .ok()
            });
            node.icon = style.get("icon").map(|icon| (*icon).to_string());
            if let Some(geometry) = cell
                .children()
                .find(|child| child.has_tag_name("mxGeometry"))
            {
                let coordinate = |name: &str| {
                    geometry
                        .attribute(name)
                        .and_then(|raw| raw.parse::<f32>().ok())
                        .unwrap_or(0.0)
                };
                node.position = Point::new(coordinate("x"), coordinate("y"));
            }
            diagram.add_node(node);
        }
    }

    Ok(diagram)
}
