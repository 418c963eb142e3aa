use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Diagram, ScalarValue};

/// Coarse canvas summary sent with a recommendation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasContext {
    pub node_count: usize,
    pub edge_count: usize,
    pub component_types: Vec<String>,
    pub is_empty: bool,
}

/// Per-component summary: enough for the recommender to reason about the
/// design without shipping the full node payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentSummary {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: String,
    pub label: String,
    pub has_description: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, ScalarValue>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub source: String,
    pub target: String,
    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub connection_type: Option<String>,
    pub has_label: bool,
}

impl CanvasContext {
    pub fn summarize(diagram: &Diagram) -> Self {
        let mut component_types: Vec<String> = Vec::new();
        for node in &diagram.nodes {
            let kind = component_type(node);
            if !component_types.contains(&kind) {
                component_types.push(kind);
            }
        }
        CanvasContext {
            node_count: diagram.nodes.len(),
            edge_count: diagram.edges.len(),
            component_types,
            is_empty: diagram.nodes.is_empty(),
        }
    }
}

fn component_type(node: &crate::model::NodeData) -> String {
    node.node_type
        .map(|node_type| node_type.as_str().to_string())
        .unwrap_or_else(|| "component".to_string())
}

pub fn component_summaries(diagram: &Diagram) -> Vec<ComponentSummary> {
    diagram
        .nodes
        .iter()
        .map(|node| {
            let properties: BTreeMap<String, ScalarValue> = node
                .custom_properties
                .iter()
                .map(|property| (property.key.clone(), property.value.clone()))
                .collect();
            ComponentSummary {
                id: node.id.clone(),
                component_type: component_type(node),
                label: node.display_name().to_string(),
                has_description: node
                    .description
                    .as_deref()
                    .is_some_and(|text| !text.trim().is_empty()),
                properties: if properties.is_empty() {
                    None
                } else {
                    Some(properties)
                },
            }
        })
        .collect()
}

pub fn connection_summaries(diagram: &Diagram) -> Vec<ConnectionSummary> {
    diagram
        .edges
        .iter()
        .map(|edge| ConnectionSummary {
            source: edge.source.clone(),
            target: edge.target.clone(),
            connection_type: edge
                .cardinality
                .map(|cardinality| cardinality.as_str().to_string()),
            has_label: edge
                .label
                .as_deref()
                .is_some_and(|label| !label.trim().is_empty()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cardinality::Cardinality;
    use crate::model::{Edge, NodeData, NodeType};
    use crate::property::{CustomProperty, PropertyType};

    #[test]
    fn empty_diagram_summary() {
        let context = CanvasContext::summarize(&Diagram::default());
        assert!(context.is_empty);
        assert_eq!(context.node_count, 0);
        assert!(context.component_types.is_empty());
    }

    #[test]
    fn component_types_are_distinct_and_ordered() {
        let mut diagram = Diagram::default();
        let mut entity = NodeData::new("Users");
        entity.node_type = Some(NodeType::Entity);
        diagram.add_node(entity.clone());
        diagram.add_node(NodeData::new("Cache"));
        let mut another = NodeData::new("Orders");
        another.node_type = Some(NodeType::Entity);
        diagram.add_node(another);

        let context = CanvasContext::summarize(&diagram);
        assert_eq!(context.component_types, vec!["entity", "component"]);
        assert_eq!(context.node_count, 3);
        assert!(!context.is_empty);
    }

    #[test]
    fn summaries_carry_properties_and_cardinality() {
        let mut diagram = Diagram::default();
        let mut node = NodeData::new("Cache");
        node.id = "cache".to_string();
        node.description = Some("<p>hot path</p>".to_string());
        let mut ttl = CustomProperty::new("ttl", "TTL", PropertyType::Number);
        ttl.set_value(ScalarValue::Number(60.0));
        node.custom_properties.push(ttl);
        diagram.add_node(node);
        let mut other = NodeData::new("API");
        other.id = "api".to_string();
        diagram.add_node(other);

        let mut edge = Edge::new("api", "cache");
        edge.cardinality = Some(Cardinality::ManyToOne);
        diagram.add_edge(edge);

        let components = component_summaries(&diagram);
        assert!(components[0].has_description);
        assert_eq!(
            components[0]
                .properties
                .as_ref()
                .unwrap()
                .get("ttl"),
            Some(&ScalarValue::Number(60.0))
        );
        assert_eq!(components[1].properties, None);

        let connections = connection_summaries(&diagram);
        assert_eq!(connections[0].connection_type.as_deref(), Some("many-to-one"));
        assert!(!connections[0].has_label);
    }

    #[test]
    fn wire_shape_uses_camel_case() {
        let context = CanvasContext {
            node_count: 1,
            edge_count: 0,
            component_types: vec!["entity".to_string()],
            is_empty: false,
        };
        let json = serde_json::to_value(&context).unwrap();
        assert_eq!(json["nodeCount"], 1);
        assert_eq!(json["isEmpty"], false);
    }
}
