use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::cardinality::Cardinality;
use crate::error::ImportError;
use crate::events::CanvasEvent;
use crate::geometry::Point;
use crate::property::CustomProperty;

/// How far a duplicated node is dropped from its original.
const DUPLICATE_OFFSET: f32 = 32.0;

/// A scalar value carried by the node extension bag or a custom property.
/// Kept closed (no nested structures) so every consumer of the payload can
/// rely on a flat shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Bool(bool),
    Number(f64),
    String(String),
    Null,
}

/// Structural sub-type of a node. Absent means "generic component": a plain
/// labeled block from the palette (database, cache, load balancer, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Entity,
    WeakEntity,
    ErNote,
    ErView,
    ErTrigger,
    ErUseCase,
    UmlUseCase,
    UmlNote,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::Entity => "entity",
            NodeType::WeakEntity => "weak-entity",
            NodeType::ErNote => "er-note",
            NodeType::ErView => "er-view",
            NodeType::ErTrigger => "er-trigger",
            NodeType::ErUseCase => "er-use-case",
            NodeType::UmlUseCase => "uml-use-case",
            NodeType::UmlNote => "uml-note",
        }
    }

    /// Entity-style nodes are the only ones whose attribute/key fields are
    /// semantically meaningful.
    pub fn has_attribute_table(&self) -> bool {
        matches!(self, NodeType::Entity | NodeType::WeakEntity)
    }
}

/// One derived row of an entity's attribute table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRow {
    pub text: String,
    pub is_primary_key: bool,
    pub is_foreign_key: bool,
}

/// Semantic container for a diagram node. Fields that do not apply to the
/// node's type are ignored, never validated away; arbitrary extra scalar
/// fields ride along in `extras`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeData {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub component_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_type: Option<NodeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Newline-delimited attribute list; a leading `+` marks a primary key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub primary_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_keys: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub custom_properties: Vec<CustomProperty>,
    #[serde(default)]
    pub position: Point,
    #[serde(flatten)]
    pub extras: BTreeMap<String, ScalarValue>,
}

impl NodeData {
    pub fn new(label: impl Into<String>) -> Self {
        NodeData {
            id: Uuid::new_v4().to_string(),
            label: label.into(),
            component_name: None,
            icon: None,
            node_type: None,
            description: None,
            attributes: None,
            primary_key: None,
            foreign_keys: None,
            custom_properties: Vec::new(),
            position: Point::default(),
            extras: BTreeMap::new(),
        }
    }

    /// Display string: `component_name` wins over `label` when present.
    pub fn display_name(&self) -> &str {
        self.component_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.label)
    }

    /// Derive the attribute table for entity/weak-entity nodes.
    ///
    /// Rows come from splitting `attributes` on newlines. Key membership is
    /// substring containment against the `primary_key`/`foreign_keys` lists,
    /// not structural parsing; a `+` prefix forces a primary-key row
    /// independent of the list.
    pub fn attribute_rows(&self) -> Vec<AttributeRow> {
        let Some(attributes) = self.attributes.as_deref() else {
            return Vec::new();
        };

        attributes
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                let (text, forced_pk) = match line.strip_prefix('+') {
                    Some(rest) => (rest.trim(), true),
                    None => (line, false),
                };
                let in_list =
                    |list: &Option<String>| list.as_deref().is_some_and(|l| l.contains(text));
                AttributeRow {
                    text: text.to_string(),
                    is_primary_key: forced_pk || in_list(&self.primary_key),
                    is_foreign_key: in_list(&self.foreign_keys),
                }
            })
            .collect()
    }

    /// Copy of this node with a fresh id and a slightly offset position.
    pub fn duplicate(&self) -> NodeData {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4().to_string();
        copy.position = Point::new(
            self.position.x + DUPLICATE_OFFSET,
            self.position.y + DUPLICATE_OFFSET,
        );
        copy
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn lenient_cardinality<'de, D>(deserializer: D) -> Result<Option<Cardinality>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|value| Cardinality::parse_lenient(&value)))
}

/// A typed connection between two nodes. For ER diagrams the cardinality
/// classification drives crow's-foot markers; a missing value renders as
/// `one-to-many`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// A label slot can be armed before any text exists, for edit-in-place.
    #[serde(default, skip_serializing_if = "is_false")]
    pub has_label: bool,
    #[serde(
        default,
        deserialize_with = "lenient_cardinality",
        skip_serializing_if = "Option::is_none"
    )]
    pub cardinality: Option<Cardinality>,
}

impl Edge {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Edge {
            id: Uuid::new_v4().to_string(),
            source: source.into(),
            target: target.into(),
            label: None,
            has_label: false,
            cardinality: None,
        }
    }

    /// Cardinality used for rendering; `one-to-many` when unset.
    pub fn effective_cardinality(&self) -> Cardinality {
        self.cardinality.unwrap_or(Cardinality::OneToMany)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DiagramMetadata {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// The authoritative node/edge collections for one diagram instance.
///
/// Rendering code treats a `Diagram` as read-only input; structural changes
/// arrive as [`CanvasEvent`]s and are committed here, by the single owner.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Diagram {
    pub nodes: Vec<NodeData>,
    pub edges: Vec<Edge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DiagramMetadata>,
}

impl Diagram {
    pub fn node(&self, id: &str) -> Option<&NodeData> {
        self.nodes.iter().find(|node| node.id == id)
    }

    pub fn edge(&self, id: &str) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.id == id)
    }

    pub fn add_node(&mut self, node: NodeData) {
        self.nodes.push(node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges.push(edge);
    }

    /// Remove a node and every edge incident to it.
    pub fn remove_node(&mut self, node_id: &str) -> bool {
        let before = self.nodes.len();
        self.nodes.retain(|node| node.id != node_id);
        let existed = before != self.nodes.len();
        if existed {
            self.edges
                .retain(|edge| edge.source != node_id && edge.target != node_id);
        }
        existed
    }

    pub fn remove_edge(&mut self, edge_id: &str) -> bool {
        let before = self.edges.len();
        self.edges.retain(|edge| edge.id != edge_id);
        before != self.edges.len()
    }

    /// Duplicate a node in place, returning the new node's id.
    pub fn duplicate_node(&mut self, node_id: &str) -> Option<String> {
        let copy = self.node(node_id)?.duplicate();
        let id = copy.id.clone();
        self.nodes.push(copy);
        Some(id)
    }

    pub fn set_edge_label(&mut self, edge_id: &str, label: Option<String>, has_label: bool) -> bool {
        match self.edges.iter_mut().find(|edge| edge.id == edge_id) {
            Some(edge) => {
                edge.label = label;
                edge.has_label = has_label;
                true
            }
            None => false,
        }
    }

    pub fn set_edge_cardinality(&mut self, edge_id: &str, cardinality: Cardinality) -> bool {
        match self.edges.iter_mut().find(|edge| edge.id == edge_id) {
            Some(edge) => {
                edge.cardinality = Some(cardinality);
                true
            }
            None => false,
        }
    }

    /// Commit a canvas event against the authoritative collections. Events
    /// referencing unknown ids are ignored and reported as unapplied;
    /// toggle/detach carry no structural change at this level.
    pub fn apply(&mut self, event: &CanvasEvent) -> bool {
        match event {
            CanvasEvent::NodeDelete { id } => self.remove_node(id),
            CanvasEvent::NodeDuplicate { id } => self.duplicate_node(id).is_some(),
            CanvasEvent::NodeToggle { id } | CanvasEvent::NodeDetach { id } => {
                self.node(id).is_some()
            }
            CanvasEvent::EdgeLabelChange {
                id,
                label,
                has_label,
            } => self.set_edge_label(id, label.clone(), *has_label),
            CanvasEvent::EdgeCardinalityChange { id, cardinality } => {
                self.set_edge_cardinality(id, *cardinality)
            }
        }
    }

    /// Check the graph invariants an import must uphold: unique node ids and
    /// referential integrity of every edge.
    pub fn validate(&self) -> Result<(), ImportError> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(self.nodes.len());
        for node in &self.nodes {
            if !seen.insert(node.id.as_str()) {
                return Err(ImportError::DuplicateNodeId(node.id.clone()));
            }
        }

        for edge in &self.edges {
            for endpoint in [&edge.source, &edge.target] {
                if !seen.contains(endpoint.as_str()) {
                    return Err(ImportError::DanglingEdge {
                        edge_id: edge.id.clone(),
                        node_id: endpoint.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entity(id: &str) -> NodeData {
        let mut node = NodeData::new(id);
        node.id = id.to_string();
        node.node_type = Some(NodeType::Entity);
        node
    }

    #[test]
    fn component_name_overrides_label() {
        let mut node = NodeData::new("PostgreSQL");
        assert_eq!(node.display_name(), "PostgreSQL");
        node.component_name = Some("Orders DB".to_string());
        assert_eq!(node.display_name(), "Orders DB");
        node.component_name = Some("   ".to_string());
        assert_eq!(node.display_name(), "PostgreSQL");
    }

    #[test]
    fn attribute_rows_mark_keys() {
        let mut node = entity("users");
        node.attributes = Some("+id\nname\nemail\norg_id".to_string());
        node.primary_key = Some("id".to_string());
        node.foreign_keys = Some("org_id".to_string());

        let rows = node.attribute_rows();
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_primary_key, "+id is forced primary");
        assert_eq!(rows[0].text, "id");
        assert!(!rows[1].is_primary_key);
        assert!(!rows[2].is_primary_key);
        assert!(rows[3].is_foreign_key);
    }

    #[test]
    fn plus_prefix_wins_without_list_membership() {
        let mut node = entity("orders");
        node.attributes = Some("+order_ref\ntotal".to_string());

        let rows = node.attribute_rows();
        assert!(rows[0].is_primary_key);
        assert!(!rows[1].is_primary_key);
    }

    #[test]
    fn blank_attribute_lines_are_skipped() {
        let mut node = entity("users");
        node.attributes = Some("id\n\n   \nname".to_string());
        assert_eq!(node.attribute_rows().len(), 2);
    }

    #[test]
    fn duplicate_assigns_fresh_id_and_offsets_position() {
        let mut node = NodeData::new("Cache");
        node.position = Point::new(10.0, 20.0);
        let copy = node.duplicate();

        assert_ne!(copy.id, node.id);
        assert_eq!(copy.label, node.label);
        assert_eq!(copy.position.x, 42.0);
        assert_eq!(copy.position.y, 52.0);
    }

    #[test]
    fn remove_node_cascades_incident_edges() {
        let mut diagram = Diagram::default();
        diagram.add_node(entity("a"));
        diagram.add_node(entity("b"));
        diagram.add_node(entity("c"));
        diagram.add_edge(Edge::new("a", "b"));
        diagram.add_edge(Edge::new("b", "c"));
        diagram.add_edge(Edge::new("a", "c"));

        assert!(diagram.remove_node("b"));
        assert_eq!(diagram.nodes.len(), 2);
        assert_eq!(diagram.edges.len(), 1);
        assert_eq!(diagram.edges[0].source, "a");
        assert_eq!(diagram.edges[0].target, "c");
    }

    #[test]
    fn apply_ignores_unknown_ids() {
        let mut diagram = Diagram::default();
        diagram.add_node(entity("a"));

        assert!(!diagram.apply(&CanvasEvent::NodeDelete {
            id: "ghost".to_string()
        }));
        assert_eq!(diagram.nodes.len(), 1);
    }

    #[test]
    fn apply_edge_cardinality_change() {
        let mut diagram = Diagram::default();
        diagram.add_node(entity("a"));
        diagram.add_node(entity("b"));
        let mut edge = Edge::new("a", "b");
        edge.id = "e1".to_string();
        diagram.add_edge(edge);

        assert!(diagram.apply(&CanvasEvent::EdgeCardinalityChange {
            id: "e1".to_string(),
            cardinality: Cardinality::MandatoryManyToMany,
        }));
        assert_eq!(
            diagram.edge("e1").unwrap().cardinality,
            Some(Cardinality::MandatoryManyToMany)
        );
    }

    #[test]
    fn validate_rejects_duplicate_node_ids() {
        let mut diagram = Diagram::default();
        diagram.add_node(entity("a"));
        diagram.add_node(entity("a"));
        assert!(matches!(
            diagram.validate(),
            Err(ImportError::DuplicateNodeId(id)) if id == "a"
        ));
    }

    #[test]
    fn validate_rejects_dangling_edges() {
        let mut diagram = Diagram::default();
        diagram.add_node(entity("a"));
        let mut edge = Edge::new("a", "missing");
        edge.id = "e1".to_string();
        diagram.add_edge(edge);

        assert!(matches!(
            diagram.validate(),
            Err(ImportError::DanglingEdge { edge_id, node_id })
                if edge_id == "e1" && node_id == "missing"
        ));
    }

    #[test]
    fn unknown_cardinality_string_deserializes_to_default() {
        let edge: Edge = serde_json::from_str(
            r#"{"id":"e1","source":"a","target":"b","cardinality":"galaxy-to-galaxy"}"#,
        )
        .unwrap();
        assert_eq!(edge.cardinality, Some(Cardinality::OneToMany));
    }

    #[test]
    fn extras_round_trip_through_serde() {
        let json = r#"{
            "id": "n1",
            "label": "Queue",
            "throughput": 1200.5,
            "durable": true,
            "region": "us-east-1"
        }"#;
        let node: NodeData = serde_json::from_str(json).unwrap();
        assert_eq!(
            node.extras.get("durable"),
            Some(&ScalarValue::Bool(true))
        );
        assert_eq!(
            node.extras.get("throughput"),
            Some(&ScalarValue::Number(1200.5))
        );

        let back = serde_json::to_value(&node).unwrap();
        assert_eq!(back["region"], "us-east-1");
        assert_eq!(back["durable"], true);
    }
}
