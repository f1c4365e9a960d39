//! Schema - Define type schemas for resources
//!
//! Providers define schemas for each resource type. A schema drives config
//! validation, JSON decoding and planning (which attributes are computed,
//! which changes force replacement).

use std::collections::HashMap;
use std::fmt;

use crate::diagnostics::{AttributePath, Diagnostics};
use crate::resource::Value;
use crate::validator::Validator;

/// Attribute type
#[derive(Debug, Clone)]
pub enum AttributeType {
    /// String
    String,
    /// Integer
    Int,
    /// Floating point number
    Float,
    /// Boolean
    Bool,
    /// Enum (list of allowed values)
    Enum(Vec<String>),
    /// Custom type (with validation function)
    Custom {
        name: String,
        base: Box<AttributeType>,
        validate: fn(&Value) -> Result<(), String>,
    },
    /// Ordered list
    List(Box<AttributeType>),
    /// Unordered set
    Set(Box<AttributeType>),
    /// Map with string keys
    Map(Box<AttributeType>),
    /// Nested object with its own attributes
    Object(Vec<AttributeSchema>),
}

impl AttributeType {
    pub fn list(inner: AttributeType) -> Self {
        AttributeType::List(Box::new(inner))
    }

    pub fn set(inner: AttributeType) -> Self {
        AttributeType::Set(Box::new(inner))
    }

    pub fn map(inner: AttributeType) -> Self {
        AttributeType::Map(Box::new(inner))
    }

    /// Check if a value conforms to this type
    ///
    /// Null and unknown values conform to every type. Nested object
    /// attributes are checked by [`validate_object`], not here.
    pub fn validate(&self, value: &Value) -> Result<(), TypeError> {
        match (self, value) {
            (_, Value::Null | Value::Unknown) => Ok(()),
            (AttributeType::String, Value::String(_)) => Ok(()),
            (AttributeType::Int, Value::Int(_)) => Ok(()),
            (AttributeType::Float, Value::Float(_) | Value::Int(_)) => Ok(()),
            (AttributeType::Bool, Value::Bool(_)) => Ok(()),

            (AttributeType::Enum(variants), Value::String(s)) => {
                if variants.iter().any(|v| v == s) {
                    Ok(())
                } else {
                    Err(TypeError::InvalidEnumVariant {
                        value: s.clone(),
                        expected: variants.clone(),
                    })
                }
            }

            (AttributeType::Custom { validate, base, .. }, v) => {
                base.validate(v)?;
                validate(v).map_err(|msg| TypeError::ValidationFailed { message: msg })
            }

            (AttributeType::List(inner), Value::List(items))
            | (AttributeType::Set(inner), Value::Set(items)) => {
                for (i, item) in items.iter().enumerate() {
                    inner.validate(item).map_err(|e| TypeError::ListItemError {
                        index: i,
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Map(inner), Value::Map(map)) => {
                for (k, v) in map {
                    inner.validate(v).map_err(|e| TypeError::MapValueError {
                        key: k.clone(),
                        inner: Box::new(e),
                    })?;
                }
                Ok(())
            }

            (AttributeType::Object(_), Value::Map(_)) => Ok(()),

            _ => Err(TypeError::TypeMismatch {
                expected: self.type_name(),
                got: value.type_name(),
            }),
        }
    }

    /// Nested attributes of an object type (or of a list/set of objects)
    pub fn object_attributes(&self) -> Option<&[AttributeSchema]> {
        match self {
            AttributeType::Object(attrs) => Some(attrs),
            AttributeType::List(inner) | AttributeType::Set(inner) => inner.object_attributes(),
            _ => None,
        }
    }

    pub fn type_name(&self) -> String {
        match self {
            AttributeType::String => "String".to_string(),
            AttributeType::Int => "Int".to_string(),
            AttributeType::Float => "Float".to_string(),
            AttributeType::Bool => "Bool".to_string(),
            AttributeType::Enum(variants) => format!("Enum({})", variants.join(" | ")),
            AttributeType::Custom { name, .. } => name.clone(),
            AttributeType::List(inner) => format!("List<{}>", inner.type_name()),
            AttributeType::Set(inner) => format!("Set<{}>", inner.type_name()),
            AttributeType::Map(inner) => format!("Map<{}>", inner.type_name()),
            AttributeType::Object(_) => "Object".to_string(),
        }
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.type_name())
    }
}

/// Type error
#[derive(Debug, Clone, thiserror::Error)]
pub enum TypeError {
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch { expected: String, got: String },

    #[error("Invalid enum variant '{value}', expected one of: {}", expected.join(", "))]
    InvalidEnumVariant {
        value: String,
        expected: Vec<String>,
    },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("List item at index {index}: {inner}")]
    ListItemError { index: usize, inner: Box<TypeError> },

    #[error("Map value for key '{key}': {inner}")]
    MapValueError { key: String, inner: Box<TypeError> },
}

/// Whether an attribute is set by the user, by the provider, or both
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeMode {
    Required,
    Optional,
    Computed,
    OptionalComputed,
}

/// Planning behavior attached to an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanModifier {
    /// Changing the attribute destroys and recreates the resource
    RequiresReplace,
    /// An unset computed attribute keeps its prior value instead of becoming unknown
    UseStateForUnknown,
}

/// Attribute schema
#[derive(Debug, Clone)]
pub struct AttributeSchema {
    pub name: String,
    pub attr_type: AttributeType,
    pub mode: AttributeMode,
    pub sensitive: bool,
    pub default: Option<Value>,
    pub description: Option<String>,
    pub validators: Vec<Validator>,
    pub plan_modifiers: Vec<PlanModifier>,
    /// API-side field name (e.g., "segmentHostCount")
    pub provider_name: Option<String>,
}

impl AttributeSchema {
    pub fn new(name: impl Into<String>, attr_type: AttributeType) -> Self {
        Self {
            name: name.into(),
            attr_type,
            mode: AttributeMode::Optional,
            sensitive: false,
            default: None,
            description: None,
            validators: Vec::new(),
            plan_modifiers: Vec::new(),
            provider_name: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.mode = AttributeMode::Required;
        self
    }

    pub fn optional(mut self) -> Self {
        self.mode = AttributeMode::Optional;
        self
    }

    pub fn computed(mut self) -> Self {
        self.mode = AttributeMode::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.mode = AttributeMode::OptionalComputed;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validators.push(validator);
        self
    }

    pub fn requires_replace(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::RequiresReplace);
        self
    }

    pub fn use_state_for_unknown(mut self) -> Self {
        self.plan_modifiers.push(PlanModifier::UseStateForUnknown);
        self
    }

    pub fn with_provider_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = Some(name.into());
        self
    }

    pub fn is_required(&self) -> bool {
        self.mode == AttributeMode::Required
    }

    pub fn is_computed(&self) -> bool {
        matches!(
            self.mode,
            AttributeMode::Computed | AttributeMode::OptionalComputed
        )
    }

    /// Whether users may set the attribute in configuration
    pub fn is_configurable(&self) -> bool {
        self.mode != AttributeMode::Computed
    }

    pub fn has_modifier(&self, modifier: PlanModifier) -> bool {
        self.plan_modifiers.contains(&modifier)
    }
}

/// Resource schema
#[derive(Debug, Clone)]
pub struct ResourceSchema {
    pub resource_type: String,
    pub attributes: HashMap<String, AttributeSchema>,
    pub description: Option<String>,
    /// Schema version, bumped on incompatible state layout changes
    pub version: u32,
}

impl ResourceSchema {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            attributes: HashMap::new(),
            description: None,
            version: 0,
        }
    }

    pub fn attribute(mut self, schema: AttributeSchema) -> Self {
        self.attributes.insert(schema.name.clone(), schema);
        self
    }

    pub fn with_description(mut self, desc: impl Into<String>) -> Self {
        self.description = Some(desc.into());
        self
    }

    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Attributes ordered by name
    pub fn sorted_attributes(&self) -> Vec<&AttributeSchema> {
        let mut attrs: Vec<&AttributeSchema> = self.attributes.values().collect();
        attrs.sort_by(|a, b| a.name.cmp(&b.name));
        attrs
    }

    /// Find the schema of a (possibly nested) attribute by path
    ///
    /// Map keys and list indexes in the path are skipped over.
    pub fn attribute_at(&self, path: &AttributePath) -> Option<&AttributeSchema> {
        self.attributes_along(path).last().copied()
    }

    /// Schemas of every attribute named along the path, outermost first
    pub fn attributes_along(&self, path: &AttributePath) -> Vec<&AttributeSchema> {
        use crate::diagnostics::PathStep;

        let mut found = Vec::new();
        let mut names = path.steps().iter().filter_map(|s| match s {
            PathStep::Attribute(name) => Some(name.as_str()),
            _ => None,
        });
        let Some(first) = names.next() else {
            return found;
        };
        let Some(mut current) = self.attributes.get(first) else {
            return found;
        };
        found.push(current);
        for name in names {
            match current
                .attr_type
                .object_attributes()
                .and_then(|attrs| attrs.iter().find(|a| a.name == name))
            {
                Some(next) => {
                    found.push(next);
                    current = next;
                }
                None => break,
            }
        }
        found
    }

    /// Validate resource attributes, collecting every problem
    pub fn validate(&self, attributes: &HashMap<String, Value>) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let attrs: Vec<&AttributeSchema> = self.sorted_attributes();
        validate_object(&attrs, attributes, &AttributePath::root(), &mut diags);
        diags
    }
}

/// Validate the attributes of one object level and recurse into nested objects
pub fn validate_object(
    schemas: &[&AttributeSchema],
    values: &HashMap<String, Value>,
    path: &AttributePath,
    diags: &mut Diagnostics,
) {
    let mut unknown_names: Vec<&String> = values
        .keys()
        .filter(|k| !schemas.iter().any(|s| &s.name == *k))
        .collect();
    unknown_names.sort();
    for name in unknown_names {
        diags.add_attribute_error(
            &path.attribute(name.as_str()),
            "Unsupported attribute",
            format!("'{}' is not expected here", name),
        );
    }

    for schema in schemas {
        let attr_path = path.attribute(schema.name.as_str());
        let value = values.get(&schema.name).unwrap_or(Value::null_ref());

        if schema.is_required() && value.is_null() {
            diags.add_attribute_error(
                &attr_path,
                "Missing required attribute",
                format!("'{}' must be set", schema.name),
            );
            continue;
        }
        if !schema.is_configurable() && value.is_known() {
            diags.add_attribute_error(
                &attr_path,
                "Invalid configuration",
                format!("'{}' is computed by the provider and cannot be set", schema.name),
            );
            continue;
        }
        if let Err(e) = schema.attr_type.validate(value) {
            diags.add_attribute_error(&attr_path, "Incorrect attribute type", e.to_string());
            continue;
        }
        for validator in &schema.validators {
            validator.validate(value, values, &attr_path, diags);
        }

        let Some(nested) = schema.attr_type.object_attributes() else {
            continue;
        };
        let nested: Vec<&AttributeSchema> = nested.iter().collect();
        match value {
            Value::Map(fields) => validate_object(&nested, fields, &attr_path, diags),
            Value::List(items) | Value::Set(items) => {
                for (i, item) in items.iter().enumerate() {
                    if let Value::Map(fields) = item {
                        validate_object(&nested, fields, &attr_path.index(i), diags);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Helper functions for common types
pub mod types {
    use super::*;

    /// Positive integer type
    pub fn positive_int() -> AttributeType {
        AttributeType::Custom {
            name: "PositiveInt".to_string(),
            base: Box::new(AttributeType::Int),
            validate: |value| match value {
                Value::Int(n) if *n > 0 => Ok(()),
                Value::Int(_) => Err("Value must be positive".to_string()),
                _ => Ok(()),
            },
        }
    }

    /// Set of strings
    pub fn string_set() -> AttributeType {
        AttributeType::set(AttributeType::String)
    }

    /// Map of strings (labels, free-form settings)
    pub fn string_map() -> AttributeType {
        AttributeType::map(AttributeType::String)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources_type() -> AttributeType {
        AttributeType::Object(vec![
            AttributeSchema::new("resource_preset_id", AttributeType::String).required(),
            AttributeSchema::new("disk_size", types::positive_int()).required(),
        ])
    }

    #[test]
    fn validate_string_type() {
        let t = AttributeType::String;
        assert!(t.validate(&Value::String("hello".to_string())).is_ok());
        assert!(t.validate(&Value::Int(42)).is_err());
        assert!(t.validate(&Value::Unknown).is_ok());
    }

    #[test]
    fn validate_enum_type() {
        let t = AttributeType::Enum(vec!["a".to_string(), "b".to_string()]);
        assert!(t.validate(&Value::String("a".to_string())).is_ok());
        assert!(t.validate(&Value::String("c".to_string())).is_err());
    }

    #[test]
    fn validate_positive_int() {
        let t = types::positive_int();
        assert!(t.validate(&Value::Int(1)).is_ok());
        assert!(t.validate(&Value::Int(0)).is_err());
        assert!(t.validate(&Value::String("1".to_string())).is_err());
    }

    #[test]
    fn set_items_are_type_checked() {
        let t = types::string_set();
        assert!(t.validate(&Value::string_set(["a"])).is_ok());
        assert!(t.validate(&Value::set([Value::Int(1)])).is_err());
        // A list is not a set
        assert!(t.validate(&Value::List(vec![])).is_err());
    }

    #[test]
    fn validate_resource_schema() {
        let schema = ResourceSchema::new("resource")
            .attribute(AttributeSchema::new("name", AttributeType::String).required())
            .attribute(AttributeSchema::new("count", types::positive_int()))
            .attribute(AttributeSchema::new("enabled", AttributeType::Bool));

        let mut attrs = HashMap::new();
        attrs.insert("name".to_string(), Value::String("my-resource".to_string()));
        attrs.insert("count".to_string(), Value::Int(5));
        attrs.insert("enabled".to_string(), Value::Bool(true));

        assert!(schema.validate(&attrs).is_empty());
    }

    #[test]
    fn missing_required_attribute() {
        let schema = ResourceSchema::new("cluster")
            .attribute(AttributeSchema::new("name", AttributeType::String).required());

        let diags = schema.validate(&HashMap::new());
        assert!(diags.has_error());
        assert!(diags.to_string().contains("Missing required attribute"));
    }

    #[test]
    fn computed_attribute_cannot_be_configured() {
        let schema = ResourceSchema::new("cluster")
            .attribute(AttributeSchema::new("id", AttributeType::String).computed());
        let attrs = HashMap::from([("id".to_string(), Value::from("c9q1"))]);
        assert!(schema.validate(&attrs).has_error());
    }

    #[test]
    fn unsupported_attribute_is_reported() {
        let schema = ResourceSchema::new("cluster");
        let attrs = HashMap::from([("bogus".to_string(), Value::Bool(true))]);
        let diags = schema.validate(&attrs);
        assert!(diags.to_string().contains("Unsupported attribute (at bogus)"));
    }

    #[test]
    fn nested_objects_are_validated_with_paths() {
        let schema = ResourceSchema::new("cluster").attribute(
            AttributeSchema::new(
                "master_config",
                AttributeType::Object(vec![
                    AttributeSchema::new("resources", resources_type()).required(),
                ]),
            )
            .required(),
        );
        let attrs = HashMap::from([(
            "master_config".to_string(),
            Value::object([(
                "resources",
                Value::object([("disk_size", Value::Int(0))]),
            )]),
        )]);

        let diags = schema.validate(&attrs);
        let rendered = diags.to_string();
        assert_eq!(diags.errors().count(), 2);
        assert!(rendered.contains("master_config.resources.resource_preset_id"));
        assert!(rendered.contains("master_config.resources.disk_size"));
    }

    #[test]
    fn attribute_at_walks_nested_objects() {
        let schema = ResourceSchema::new("cluster").attribute(
            AttributeSchema::new(
                "master_config",
                AttributeType::Object(vec![AttributeSchema::new("resources", resources_type())]),
            )
            .requires_replace(),
        );
        let path = AttributePath::new("master_config")
            .attribute("resources")
            .attribute("disk_size");
        let found = schema.attributes_along(&path);
        assert_eq!(found.len(), 3);
        assert_eq!(schema.attribute_at(&path).map(|a| a.name.as_str()), Some("disk_size"));
        assert!(found[0].has_modifier(PlanModifier::RequiresReplace));
    }
}
