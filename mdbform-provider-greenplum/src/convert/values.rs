//! Scalar and collection helpers shared by every flatten / expand pair

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use mdbform_core::diagnostics::{AttributePath, Diagnostics};
use mdbform_core::resource::Value;

// =============================================================================
// Flatten: API -> Value
// =============================================================================

/// Empty strings are how the API reports an unset optional string
pub(crate) fn string_or_null(s: &str) -> Value {
    if s.is_empty() {
        Value::Null
    } else {
        Value::String(s.to_string())
    }
}

pub(crate) fn int_or_null(value: Option<i64>) -> Value {
    value.map_or(Value::Null, Value::Int)
}

pub(crate) fn bool_or_null(value: Option<bool>) -> Value {
    value.map_or(Value::Null, Value::Bool)
}

/// Nested object; null fields are left out
pub(crate) fn object<'k>(fields: impl IntoIterator<Item = (&'k str, Value)>) -> Value {
    Value::Map(
        fields
            .into_iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.to_string(), v))
            .collect(),
    )
}

/// Like [`object`], but an object with no fields set is `Null` unless the
/// prior state already held an object
pub(crate) fn object_or_null<'k>(
    fields: impl IntoIterator<Item = (&'k str, Value)>,
    prior: &Value,
) -> Value {
    let value = object(fields);
    match &value {
        Value::Map(map) if map.is_empty() && !matches!(prior, Value::Map(_)) => Value::Null,
        _ => value,
    }
}

/// An empty set stays `Null` when the prior state had none
pub(crate) fn string_set(items: &[String], prior: &Value) -> Value {
    if items.is_empty() && prior.is_null() {
        Value::Null
    } else {
        Value::string_set(items)
    }
}

/// An empty map stays `Null` when the prior state had none
pub(crate) fn string_map(map: &HashMap<String, String>, prior: &Value) -> Value {
    if map.is_empty() && prior.is_null() {
        Value::Null
    } else {
        Value::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), Value::String(v.clone())))
                .collect(),
        )
    }
}

pub(crate) fn timestamp(value: Option<&DateTime<Utc>>) -> Value {
    value.map_or(Value::Null, |t| {
        Value::String(t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true))
    })
}

// =============================================================================
// Expand: Value -> API
// =============================================================================

fn mismatch(path: &AttributePath, expected: &str, value: &Value, diags: &mut Diagnostics) {
    diags.add_attribute_error(
        path,
        "Incorrect attribute type",
        format!("expected {}, got {}", expected, value.type_name()),
    );
}

/// Check that a required value is present and known
///
/// Returns false after recording the problem.
pub(crate) fn require(value: &Value, path: &AttributePath, diags: &mut Diagnostics) -> bool {
    match value {
        Value::Null => {
            diags.add_attribute_error(path, "Missing required attribute", "value must be set");
            false
        }
        Value::Unknown => {
            diags.add_attribute_error(
                path,
                "Value not yet known",
                "value must be known before it can be sent",
            );
            false
        }
        _ => true,
    }
}

pub(crate) fn expect_string(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<String> {
    match value {
        Value::Null | Value::Unknown => None,
        Value::String(s) => Some(s.clone()),
        other => {
            mismatch(path, "String", other, diags);
            None
        }
    }
}

pub(crate) fn expect_int(value: &Value, path: &AttributePath, diags: &mut Diagnostics) -> Option<i64> {
    match value {
        Value::Null | Value::Unknown => None,
        Value::Int(n) => Some(*n),
        other => {
            mismatch(path, "Int", other, diags);
            None
        }
    }
}

pub(crate) fn expect_bool(value: &Value, path: &AttributePath, diags: &mut Diagnostics) -> Option<bool> {
    match value {
        Value::Null | Value::Unknown => None,
        Value::Bool(b) => Some(*b),
        other => {
            mismatch(path, "Bool", other, diags);
            None
        }
    }
}

/// Fields of a nested object value
///
/// `Null` and unknown objects are not sent; anything but a map is a type error.
pub(crate) fn expect_object<'a>(
    value: &'a Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<Fields<'a>> {
    match value {
        Value::Null | Value::Unknown => None,
        Value::Map(map) => Some(Fields::new(map, path.clone())),
        other => {
            mismatch(path, "Object", other, diags);
            None
        }
    }
}

/// Typed reads of one object level, reporting problems at the field's path
pub(crate) struct Fields<'a> {
    map: &'a HashMap<String, Value>,
    path: AttributePath,
}

impl<'a> Fields<'a> {
    pub fn new(map: &'a HashMap<String, Value>, path: AttributePath) -> Self {
        Self { map, path }
    }

    pub fn get(&self, name: &str) -> &'a Value {
        self.map.get(name).unwrap_or(Value::null_ref())
    }

    pub fn path(&self, name: &str) -> AttributePath {
        self.path.attribute(name)
    }

    pub fn string(&self, name: &str, diags: &mut Diagnostics) -> Option<String> {
        expect_string(self.get(name), &self.path(name), diags)
    }

    pub fn required_string(&self, name: &str, diags: &mut Diagnostics) -> Option<String> {
        if !require(self.get(name), &self.path(name), diags) {
            return None;
        }
        self.string(name, diags)
    }

    pub fn int(&self, name: &str, diags: &mut Diagnostics) -> Option<i64> {
        expect_int(self.get(name), &self.path(name), diags)
    }

    pub fn required_int(&self, name: &str, diags: &mut Diagnostics) -> Option<i64> {
        if !require(self.get(name), &self.path(name), diags) {
            return None;
        }
        self.int(name, diags)
    }

    pub fn bool(&self, name: &str, diags: &mut Diagnostics) -> Option<bool> {
        expect_bool(self.get(name), &self.path(name), diags)
    }

    pub fn object(&self, name: &str, diags: &mut Diagnostics) -> Option<Fields<'a>> {
        expect_object(self.get(name), &self.path(name), diags)
    }

    /// Elements of a set or list of strings; unset reads as empty
    pub fn strings(&self, name: &str, diags: &mut Diagnostics) -> Vec<String> {
        let path = self.path(name);
        match self.get(name) {
            Value::Null | Value::Unknown => Vec::new(),
            Value::List(items) | Value::Set(items) => items
                .iter()
                .enumerate()
                .filter_map(|(i, item)| expect_string(item, &path.index(i), diags))
                .collect(),
            other => {
                mismatch(&path, "Set<String>", other, diags);
                Vec::new()
            }
        }
    }

    /// Map of strings; unset reads as empty
    pub fn string_map(&self, name: &str, diags: &mut Diagnostics) -> HashMap<String, String> {
        let path = self.path(name);
        match self.get(name) {
            Value::Null | Value::Unknown => HashMap::new(),
            Value::Map(map) => map
                .iter()
                .filter_map(|(k, v)| {
                    expect_string(v, &path.key(k.as_str()), diags).map(|s| (k.clone(), s))
                })
                .collect(),
            other => {
                mismatch(&path, "Map<String>", other, diags);
                HashMap::new()
            }
        }
    }

    /// String parsed into an API enum
    pub fn enumeration<E>(
        &self,
        name: &str,
        parse: fn(&str) -> Option<E>,
        diags: &mut Diagnostics,
    ) -> Option<E> {
        let raw = self.string(name, diags)?;
        let parsed = parse(&raw);
        if parsed.is_none() {
            diags.add_attribute_error(
                &self.path(name),
                "Invalid attribute value",
                format!("unsupported value '{}'", raw),
            );
        }
        parsed
    }

    pub fn required_enumeration<E>(
        &self,
        name: &str,
        parse: fn(&str) -> Option<E>,
        diags: &mut Diagnostics,
    ) -> Option<E> {
        if !require(self.get(name), &self.path(name), diags) {
            return None;
        }
        self.enumeration(name, parse, diags)
    }

    /// RFC 3339 timestamp
    pub fn timestamp(&self, name: &str, diags: &mut Diagnostics) -> Option<DateTime<Utc>> {
        let raw = self.string(name, diags)?;
        match DateTime::parse_from_rfc3339(&raw) {
            Ok(t) => Some(t.with_timezone(&Utc)),
            Err(e) => {
                diags.add_attribute_error(
                    &self.path(name),
                    "Invalid attribute value",
                    format!("'{}' is not an RFC 3339 timestamp: {}", raw, e),
                );
                None
            }
        }
    }
}
