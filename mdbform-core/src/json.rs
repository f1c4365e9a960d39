//! JSON conversion for attribute values
//!
//! Configuration files and state files carry attributes as JSON. Decoding is
//! schema-guided: JSON has no sets and no integer/float distinction, so the
//! attribute type decides what a JSON array or number becomes.

use std::collections::HashMap;

use serde_json::json;

use crate::diagnostics::{AttributePath, Diagnostics};
use crate::resource::Value;
use crate::schema::{AttributeSchema, AttributeType, ResourceSchema};

#[derive(Debug, thiserror::Error)]
pub enum JsonError {
    #[error("attribute '{0}' is unknown and cannot be persisted")]
    UnknownValue(String),
    #[error("float value {0} cannot be represented in JSON")]
    NonFiniteFloat(f64),
}

/// Decode a resource's attributes from a JSON object
pub fn attributes_from_json(
    schema: &ResourceSchema,
    json: &serde_json::Map<String, serde_json::Value>,
    diags: &mut Diagnostics,
) -> HashMap<String, Value> {
    let attrs: Vec<&AttributeSchema> = schema.sorted_attributes();
    object_from_json(&attrs, json, &AttributePath::root(), diags)
}

fn object_from_json(
    schemas: &[&AttributeSchema],
    json: &serde_json::Map<String, serde_json::Value>,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> HashMap<String, Value> {
    let mut out = HashMap::new();
    for (name, raw) in json {
        let attr_path = path.attribute(name.as_str());
        match schemas.iter().find(|s| &s.name == name) {
            Some(schema) => {
                if let Some(value) = value_from_json(raw, &schema.attr_type, &attr_path, diags) {
                    out.insert(name.clone(), value);
                }
            }
            None => diags.add_attribute_error(
                &attr_path,
                "Unsupported attribute",
                format!("'{}' is not expected here", name),
            ),
        }
    }
    out
}

/// Decode one JSON value as the given attribute type
pub fn value_from_json(
    raw: &serde_json::Value,
    attr_type: &AttributeType,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<Value> {
    use serde_json::Value as J;

    let value = match (attr_type, raw) {
        (_, J::Null) => Value::Null,
        (AttributeType::Custom { base, .. }, _) => return value_from_json(raw, base, path, diags),
        (AttributeType::String | AttributeType::Enum(_), J::String(s)) => Value::String(s.clone()),
        (AttributeType::Int, J::Number(n)) => match n.as_i64() {
            Some(i) => Value::Int(i),
            None => {
                diags.add_attribute_error(
                    path,
                    "Incorrect attribute type",
                    format!("expected a whole number, got {}", n),
                );
                return None;
            }
        },
        (AttributeType::Float, J::Number(n)) => Value::Float(n.as_f64().unwrap_or_default()),
        (AttributeType::Bool, J::Bool(b)) => Value::Bool(*b),
        (AttributeType::List(inner), J::Array(items)) => {
            Value::List(items_from_json(items, inner, path, diags)?)
        }
        (AttributeType::Set(inner), J::Array(items)) => {
            Value::set(items_from_json(items, inner, path, diags)?)
        }
        (AttributeType::Map(inner), J::Object(map)) => {
            let mut out = HashMap::new();
            let mut failed = false;
            for (k, v) in map {
                match value_from_json(v, inner, &path.key(k.as_str()), diags) {
                    Some(value) => {
                        out.insert(k.clone(), value);
                    }
                    None => failed = true,
                }
            }
            if failed {
                return None;
            }
            Value::Map(out)
        }
        (AttributeType::Object(attrs), J::Object(map)) => {
            let attrs: Vec<&AttributeSchema> = attrs.iter().collect();
            Value::Map(object_from_json(&attrs, map, path, diags))
        }
        (expected, got) => {
            diags.add_attribute_error(
                path,
                "Incorrect attribute type",
                format!("expected {}, got {}", expected, json_type_name(got)),
            );
            return None;
        }
    };
    Some(value)
}

/// Decode every element, reporting each bad one; `None` if any failed
fn items_from_json(
    items: &[serde_json::Value],
    inner: &AttributeType,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<Vec<Value>> {
    let decoded: Vec<Option<Value>> = items
        .iter()
        .enumerate()
        .map(|(i, item)| value_from_json(item, inner, &path.index(i), diags))
        .collect();
    decoded.into_iter().collect()
}

/// Encode a value as JSON; unknown values cannot be encoded
pub fn value_to_json(value: &Value) -> Result<serde_json::Value, JsonError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Unknown => return Err(JsonError::UnknownValue(String::new())),
        Value::String(s) => json!(s),
        Value::Int(n) => json!(n),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .ok_or(JsonError::NonFiniteFloat(*f))?,
        Value::Bool(b) => json!(b),
        Value::List(items) | Value::Set(items) => serde_json::Value::Array(
            items.iter().map(value_to_json).collect::<Result<_, _>>()?,
        ),
        Value::Map(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map {
                out.insert(k.clone(), value_to_json(v)?);
            }
            serde_json::Value::Object(out)
        }
    })
}

/// Encode a whole attribute map, naming the attribute that failed
pub fn attributes_to_json(
    attributes: &HashMap<String, Value>,
) -> Result<HashMap<String, serde_json::Value>, JsonError> {
    attributes
        .iter()
        .map(|(k, v)| {
            value_to_json(v)
                .map(|j| (k.clone(), j))
                .map_err(|e| match e {
                    JsonError::UnknownValue(_) => JsonError::UnknownValue(k.clone()),
                    other => other,
                })
        })
        .collect()
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types;

    fn schema() -> ResourceSchema {
        ResourceSchema::new("cluster")
            .attribute(AttributeSchema::new("name", AttributeType::String))
            .attribute(AttributeSchema::new("security_group_ids", types::string_set()))
            .attribute(AttributeSchema::new("labels", types::string_map()))
            .attribute(AttributeSchema::new("ratio", AttributeType::Float))
            .attribute(AttributeSchema::new(
                "cloud_storage",
                AttributeType::Object(vec![AttributeSchema::new("enable", AttributeType::Bool)]),
            ))
    }

    #[test]
    fn arrays_become_sets_when_schema_says_so() {
        let raw = json!({"security_group_ids": ["b", "a", "b"]});
        let mut diags = Diagnostics::new();
        let attrs = attributes_from_json(&schema(), raw.as_object().unwrap(), &mut diags);
        assert!(diags.is_empty());
        assert_eq!(attrs["security_group_ids"], Value::string_set(["a", "b"]));
    }

    #[test]
    fn nested_objects_and_nulls() {
        let raw = json!({"cloud_storage": {"enable": true}, "name": null, "ratio": 2});
        let mut diags = Diagnostics::new();
        let attrs = attributes_from_json(&schema(), raw.as_object().unwrap(), &mut diags);
        assert!(diags.is_empty());
        assert_eq!(
            attrs["cloud_storage"],
            Value::object([("enable", Value::Bool(true))])
        );
        assert!(attrs["name"].is_null());
        assert_eq!(attrs["ratio"], Value::Float(2.0));
    }

    #[test]
    fn type_mismatch_reports_path() {
        let raw = json!({"cloud_storage": {"enable": "yes"}});
        let mut diags = Diagnostics::new();
        attributes_from_json(&schema(), raw.as_object().unwrap(), &mut diags);
        assert!(diags.to_string().contains("cloud_storage.enable"));
        assert!(diags.to_string().contains("expected Bool, got string"));
    }

    #[test]
    fn every_bad_element_is_reported() {
        let raw = json!({
            "security_group_ids": ["sg-1", 1, true],
            "labels": {"team": 7, "env": "prod", "tier": false}
        });
        let mut diags = Diagnostics::new();
        let attrs = attributes_from_json(&schema(), raw.as_object().unwrap(), &mut diags);
        assert!(attrs.is_empty());

        let mut paths: Vec<String> = diags
            .errors()
            .filter_map(|d| d.path.as_ref().map(|p| p.to_string()))
            .collect();
        paths.sort();
        assert_eq!(
            paths,
            vec![
                "labels[\"team\"]",
                "labels[\"tier\"]",
                "security_group_ids[1]",
                "security_group_ids[2]",
            ]
        );
    }

    #[test]
    fn unknown_values_cannot_be_persisted() {
        let attrs = HashMap::from([("id".to_string(), Value::Unknown)]);
        let err = attributes_to_json(&attrs).unwrap_err();
        assert_eq!(err.to_string(), "attribute 'id' is unknown and cannot be persisted");
    }

    #[test]
    fn encodes_nested_values() {
        let value = Value::object([("hosts", Value::string_set(["h1"]))]);
        assert_eq!(value_to_json(&value).unwrap(), json!({"hosts": ["h1"]}));
    }
}
