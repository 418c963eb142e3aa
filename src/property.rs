use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::ScalarValue;

/// Value type of a custom property. The editor renders a matching input
/// widget per type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    Text,
    Textarea,
    Number,
    Boolean,
}

impl PropertyType {
    /// The zero value a property resets to when its type changes.
    pub fn zero_value(&self) -> ScalarValue {
        match self {
            PropertyType::Text | PropertyType::Textarea => ScalarValue::String(String::new()),
            PropertyType::Number => ScalarValue::Number(0.0),
            PropertyType::Boolean => ScalarValue::Bool(false),
        }
    }
}

/// A user-defined typed key/value extension attached to a node beyond its
/// built-in schema fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomProperty {
    pub id: String,
    /// Serialization name.
    pub key: String,
    /// Display name.
    pub label: String,
    #[serde(rename = "type")]
    pub property_type: PropertyType,
    pub value: ScalarValue,
}

impl CustomProperty {
    pub fn new(
        key: impl Into<String>,
        label: impl Into<String>,
        property_type: PropertyType,
    ) -> Self {
        CustomProperty {
            id: Uuid::new_v4().to_string(),
            key: key.into(),
            label: label.into(),
            property_type,
            value: property_type.zero_value(),
        }
    }

    /// Change the property's type. The value resets to the new type's zero
    /// value so a type/value mismatch can never survive the change.
    pub fn set_type(&mut self, property_type: PropertyType) {
        if self.property_type == property_type {
            return;
        }
        self.property_type = property_type;
        self.value = property_type.zero_value();
    }

    pub fn set_value(&mut self, value: ScalarValue) {
        self.value = value;
    }
}

/// Per-property editor chrome state. Newly created properties open
/// expanded; properties loaded from a saved diagram start collapsed. The
/// terminal state (deletion) is the owner's removal of the property from
/// the node; no undo is held here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyEditor {
    expanded: bool,
}

impl PropertyEditor {
    pub fn for_new() -> Self {
        PropertyEditor { expanded: true }
    }

    pub fn for_existing() -> Self {
        PropertyEditor { expanded: false }
    }

    pub fn is_expanded(&self) -> bool {
        self.expanded
    }

    pub fn toggle(&mut self) {
        self.expanded = !self.expanded;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_change_resets_value() {
        let mut property = CustomProperty::new("replicas", "Replicas", PropertyType::Text);
        property.set_value(ScalarValue::String("three".to_string()));

        property.set_type(PropertyType::Boolean);
        assert_eq!(property.value, ScalarValue::Bool(false));

        property.set_value(ScalarValue::Bool(true));
        property.set_type(PropertyType::Number);
        assert_eq!(property.value, ScalarValue::Number(0.0));
    }

    #[test]
    fn same_type_keeps_value() {
        let mut property = CustomProperty::new("notes", "Notes", PropertyType::Textarea);
        property.set_value(ScalarValue::String("multi\nline".to_string()));
        property.set_type(PropertyType::Textarea);
        assert_eq!(
            property.value,
            ScalarValue::String("multi\nline".to_string())
        );
    }

    #[test]
    fn new_properties_start_expanded_existing_collapsed() {
        let mut fresh = PropertyEditor::for_new();
        assert!(fresh.is_expanded());
        fresh.toggle();
        assert!(!fresh.is_expanded());

        assert!(!PropertyEditor::for_existing().is_expanded());
    }

    #[test]
    fn serializes_with_type_field_name() {
        let property = CustomProperty::new("ttl", "TTL", PropertyType::Number);
        let json = serde_json::to_value(&property).unwrap();
        assert_eq!(json["type"], "number");
        assert_eq!(json["value"], 0.0);
        assert_eq!(json["key"], "ttl");
    }
}
