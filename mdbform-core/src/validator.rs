//! Validator - Value and cross-attribute checks attached to attribute schemas

use std::collections::HashMap;

use regex::Regex;

use crate::diagnostics::{AttributePath, Diagnostics};
use crate::resource::Value;

/// A check attached to an [`AttributeSchema`](crate::schema::AttributeSchema)
///
/// Value checks only run on known values. Sibling checks compare against the
/// other attributes of the enclosing object.
#[derive(Debug, Clone)]
pub enum Validator {
    /// String length in characters, inclusive
    StringLength { min: usize, max: usize },
    /// String must be one of the listed values
    OneOf(Vec<String>),
    /// String must match the pattern
    Matches { pattern: String, message: String },
    /// Integer range, inclusive
    IntBetween { min: i64, max: i64 },
    /// Integer lower bound, inclusive
    IntAtLeast(i64),
    /// Number of elements of a list, set or map, inclusive
    SizeBetween { min: usize, max: usize },
    /// Every map key must match the pattern
    MapKeysMatch { pattern: String, message: String },
    /// Map keys must belong to the listed set
    MapKeysOneOf(Vec<String>),
    /// String must be an RFC 3339 timestamp
    Rfc3339,
    /// No listed sibling may be set together with this attribute
    ConflictsWith(Vec<String>),
    /// Every listed sibling must be set together with this attribute
    AlsoRequires(Vec<String>),
    /// This attribute must be set when the sibling equals the value
    RequiredWhen { sibling: String, equals: Value },
    /// This attribute must not be set when the sibling equals the value
    ForbiddenWhen { sibling: String, equals: Value },
}

impl Validator {
    pub fn string_length(min: usize, max: usize) -> Self {
        Self::StringLength { min, max }
    }

    pub fn one_of<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        Self::OneOf(values.into_iter().map(Into::into).collect())
    }

    pub fn matches(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Matches {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    pub fn map_keys_match(pattern: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MapKeysMatch {
            pattern: pattern.into(),
            message: message.into(),
        }
    }

    pub fn conflicts_with<S: Into<String>>(siblings: impl IntoIterator<Item = S>) -> Self {
        Self::ConflictsWith(siblings.into_iter().map(Into::into).collect())
    }

    pub fn also_requires<S: Into<String>>(siblings: impl IntoIterator<Item = S>) -> Self {
        Self::AlsoRequires(siblings.into_iter().map(Into::into).collect())
    }

    pub fn required_when(sibling: impl Into<String>, equals: impl Into<Value>) -> Self {
        Self::RequiredWhen {
            sibling: sibling.into(),
            equals: equals.into(),
        }
    }

    pub fn forbidden_when(sibling: impl Into<String>, equals: impl Into<Value>) -> Self {
        Self::ForbiddenWhen {
            sibling: sibling.into(),
            equals: equals.into(),
        }
    }

    /// Run this check, appending problems to `diags`
    pub fn validate(
        &self,
        value: &Value,
        siblings: &HashMap<String, Value>,
        path: &AttributePath,
        diags: &mut Diagnostics,
    ) {
        match self {
            Validator::RequiredWhen { sibling, equals } => {
                if value.is_null() && siblings.get(sibling) == Some(equals) {
                    diags.add_attribute_error(
                        path,
                        "Missing required attribute",
                        format!("required when {} is {}", sibling, describe(equals)),
                    );
                }
            }
            Validator::ForbiddenWhen { sibling, equals } => {
                if value.is_known() && siblings.get(sibling) == Some(equals) {
                    diags.add_attribute_error(
                        path,
                        "Invalid attribute combination",
                        format!("must not be set when {} is {}", sibling, describe(equals)),
                    );
                }
            }
            Validator::ConflictsWith(others) => {
                if !value.is_known() {
                    return;
                }
                for other in others {
                    if siblings.get(other).is_some_and(Value::is_known) {
                        diags.add_attribute_error(
                            path,
                            "Invalid attribute combination",
                            format!("conflicts with {}", other),
                        );
                    }
                }
            }
            Validator::AlsoRequires(others) => {
                if !value.is_known() {
                    return;
                }
                for other in others {
                    if siblings.get(other).is_none_or(Value::is_null) {
                        diags.add_attribute_error(
                            path,
                            "Invalid attribute combination",
                            format!("{} must be set together with this attribute", other),
                        );
                    }
                }
            }
            _ if !value.is_known() => {}
            _ => {
                if let Err(message) = self.check_value(value) {
                    diags.add_attribute_error(path, "Invalid attribute value", message);
                }
            }
        }
    }

    fn check_value(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Validator::StringLength { min, max }, Value::String(s)) => {
                let len = s.chars().count();
                if len < *min || len > *max {
                    Err(format!(
                        "length must be between {} and {}, got {}",
                        min, max, len
                    ))
                } else {
                    Ok(())
                }
            }
            (Validator::OneOf(allowed), Value::String(s)) => {
                if allowed.iter().any(|a| a == s) {
                    Ok(())
                } else {
                    Err(format!(
                        "value '{}' must be one of: {}",
                        s,
                        allowed.join(", ")
                    ))
                }
            }
            (Validator::Matches { pattern, message }, Value::String(s)) => {
                if compile(pattern)?.is_match(s) {
                    Ok(())
                } else {
                    Err(format!("value '{}' {}", s, message))
                }
            }
            (Validator::IntBetween { min, max }, Value::Int(n)) => {
                if n < min || n > max {
                    Err(format!("value must be between {} and {}, got {}", min, max, n))
                } else {
                    Ok(())
                }
            }
            (Validator::IntAtLeast(min), Value::Int(n)) => {
                if n < min {
                    Err(format!("value must be at least {}, got {}", min, n))
                } else {
                    Ok(())
                }
            }
            (Validator::SizeBetween { min, max }, v) => {
                let len = match v {
                    Value::List(items) | Value::Set(items) => items.len(),
                    Value::Map(map) => map.len(),
                    _ => return Ok(()),
                };
                if len < *min || len > *max {
                    Err(format!(
                        "must contain between {} and {} elements, got {}",
                        min, max, len
                    ))
                } else {
                    Ok(())
                }
            }
            (Validator::MapKeysMatch { pattern, message }, Value::Map(map)) => {
                let re = compile(pattern)?;
                let mut bad: Vec<&String> = map.keys().filter(|k| !re.is_match(k)).collect();
                bad.sort();
                match bad.first() {
                    Some(key) => Err(format!("key '{}' {}", key, message)),
                    None => Ok(()),
                }
            }
            (Validator::MapKeysOneOf(allowed), Value::Map(map)) => {
                let mut bad: Vec<&String> = map
                    .keys()
                    .filter(|k| !allowed.iter().any(|a| a == *k))
                    .collect();
                bad.sort();
                match bad.first() {
                    Some(key) => Err(format!(
                        "unsupported key '{}', expected one of: {}",
                        key,
                        allowed.join(", ")
                    )),
                    None => Ok(()),
                }
            }
            (Validator::Rfc3339, Value::String(s)) => chrono::DateTime::parse_from_rfc3339(s)
                .map(|_| ())
                .map_err(|e| format!("value '{}' is not an RFC 3339 timestamp: {}", s, e)),
            // Type mismatches are reported by the type check
            _ => Ok(()),
        }
    }
}

fn compile(pattern: &str) -> Result<Regex, String> {
    Regex::new(pattern).map_err(|e| format!("invalid pattern '{}': {}", pattern, e))
}

fn describe(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => format!("{:?}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(validator: &Validator, value: Value, siblings: &[(&str, Value)]) -> Diagnostics {
        let siblings: HashMap<String, Value> = siblings
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        let mut diags = Diagnostics::new();
        validator.validate(&value, &siblings, &AttributePath::new("attr"), &mut diags);
        diags
    }

    #[test]
    fn string_length_counts_characters() {
        let v = Validator::string_length(1, 3);
        assert!(!run(&v, Value::from("abc"), &[]).has_error());
        assert!(run(&v, Value::from(""), &[]).has_error());
        assert!(run(&v, Value::from("abcd"), &[]).has_error());
    }

    #[test]
    fn one_of_rejects_unlisted_values() {
        let v = Validator::one_of(["PRESTABLE", "PRODUCTION"]);
        assert!(!run(&v, Value::from("PRODUCTION"), &[]).has_error());
        let diags = run(&v, Value::from("production"), &[]);
        assert!(diags.to_string().contains("must be one of: PRESTABLE, PRODUCTION"));
    }

    #[test]
    fn value_checks_skip_null_and_unknown() {
        let v = Validator::IntBetween { min: 1, max: 2 };
        assert!(!run(&v, Value::Null, &[]).has_error());
        assert!(!run(&v, Value::Unknown, &[]).has_error());
        assert!(run(&v, Value::Int(3), &[]).has_error());
    }

    #[test]
    fn matches_uses_regex() {
        let v = Validator::matches("^[a-z]+$", "must be lowercase letters");
        assert!(!run(&v, Value::from("abc"), &[]).has_error());
        assert!(run(&v, Value::from("ABC"), &[]).has_error());
    }

    #[test]
    fn map_keys_one_of_reports_first_bad_key() {
        let v = Validator::MapKeysOneOf(vec!["max_connections".to_string()]);
        let value = Value::object([("bogus", Value::from("1"))]);
        let diags = run(&v, value, &[]);
        assert!(diags.to_string().contains("unsupported key 'bogus'"));
    }

    #[test]
    fn conflicts_with_sibling() {
        let v = Validator::conflicts_with(["log_group_id"]);
        assert!(run(&v, Value::from("folder"), &[("log_group_id", Value::from("lg"))]).has_error());
        assert!(!run(&v, Value::from("folder"), &[("log_group_id", Value::Null)]).has_error());
        assert!(!run(&v, Value::Null, &[("log_group_id", Value::from("lg"))]).has_error());
    }

    #[test]
    fn required_and_forbidden_when() {
        let required = Validator::required_when("type", "WEEKLY");
        assert!(run(&required, Value::Null, &[("type", Value::from("WEEKLY"))]).has_error());
        assert!(!run(&required, Value::Null, &[("type", Value::from("ANYTIME"))]).has_error());

        let forbidden = Validator::forbidden_when("type", "ANYTIME");
        assert!(run(&forbidden, Value::from("MON"), &[("type", Value::from("ANYTIME"))]).has_error());
        assert!(!run(&forbidden, Value::from("MON"), &[("type", Value::from("WEEKLY"))]).has_error());
    }

    #[test]
    fn rfc3339_timestamps() {
        let v = Validator::Rfc3339;
        assert!(!run(&v, Value::from("2024-03-01T10:00:00Z"), &[]).has_error());
        assert!(run(&v, Value::from("yesterday"), &[]).has_error());
    }
}
