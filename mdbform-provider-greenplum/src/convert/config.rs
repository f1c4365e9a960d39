//! `config` block: Greenplum server settings and connection pooler

use std::collections::HashMap;

use mdbform_core::diagnostics::{AttributePath, Diagnostics};
use mdbform_core::resource::Value;

use super::values::{Fields, expect_object, expect_string, int_or_null, object_or_null};
use crate::api::{ConnectionPoolerConfig, GreenplumConfig6, LogStatement, PoolMode};

// -- greenplum_config ---------------------------------------------------------

/// Settings present in the config, rendered the way users write them
fn settings(config: &GreenplumConfig6) -> Vec<(&'static str, Option<String>)> {
    let int = |v: Option<i64>| v.map(|n| n.to_string());
    let flag = |v: Option<bool>| v.map(|b| b.to_string());
    vec![
        ("max_connections", int(config.max_connections)),
        ("max_slot_wal_keep_size", int(config.max_slot_wal_keep_size)),
        ("gp_workfile_limit_per_segment", int(config.gp_workfile_limit_per_segment)),
        ("gp_workfile_limit_per_query", int(config.gp_workfile_limit_per_query)),
        (
            "gp_workfile_limit_files_per_query",
            int(config.gp_workfile_limit_files_per_query),
        ),
        ("max_prepared_transactions", int(config.max_prepared_transactions)),
        ("gp_workfile_compression", flag(config.gp_workfile_compression)),
        ("max_statement_mem", int(config.max_statement_mem)),
        (
            "log_statement",
            (!config.log_statement.is_unspecified()).then(|| config.log_statement.to_string()),
        ),
        (
            "gp_add_column_inherits_table_setting",
            flag(config.gp_add_column_inherits_table_setting),
        ),
        (
            "gp_enable_global_deadlock_detector",
            flag(config.gp_enable_global_deadlock_detector),
        ),
        (
            "gp_global_deadlock_detector_period",
            int(config.gp_global_deadlock_detector_period),
        ),
    ]
}

fn parse_int(raw: &str) -> Result<i64, String> {
    raw.parse()
        .map_err(|_| format!("'{}' is not an integer", raw))
}

fn parse_bool(raw: &str) -> Result<bool, String> {
    match raw {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(format!("'{}' must be true or false", raw)),
    }
}

fn apply_setting(config: &mut GreenplumConfig6, key: &str, raw: &str) -> Result<(), String> {
    match key {
        "max_connections" => config.max_connections = Some(parse_int(raw)?),
        "max_slot_wal_keep_size" => config.max_slot_wal_keep_size = Some(parse_int(raw)?),
        "gp_workfile_limit_per_segment" => {
            config.gp_workfile_limit_per_segment = Some(parse_int(raw)?)
        }
        "gp_workfile_limit_per_query" => config.gp_workfile_limit_per_query = Some(parse_int(raw)?),
        "gp_workfile_limit_files_per_query" => {
            config.gp_workfile_limit_files_per_query = Some(parse_int(raw)?)
        }
        "max_prepared_transactions" => config.max_prepared_transactions = Some(parse_int(raw)?),
        "gp_workfile_compression" => config.gp_workfile_compression = Some(parse_bool(raw)?),
        "max_statement_mem" => config.max_statement_mem = Some(parse_int(raw)?),
        "log_statement" => {
            config.log_statement = LogStatement::parse(raw)
                .ok_or_else(|| {
                    format!(
                        "'{}' must be one of: {}",
                        raw,
                        LogStatement::VARIANTS.join(", ")
                    )
                })?
        }
        "gp_add_column_inherits_table_setting" => {
            config.gp_add_column_inherits_table_setting = Some(parse_bool(raw)?)
        }
        "gp_enable_global_deadlock_detector" => {
            config.gp_enable_global_deadlock_detector = Some(parse_bool(raw)?)
        }
        "gp_global_deadlock_detector_period" => {
            config.gp_global_deadlock_detector_period = Some(parse_int(raw)?)
        }
        other => return Err(format!("unsupported setting '{}'", other)),
    }
    Ok(())
}

/// User-set server settings as a map of strings
pub fn flatten_greenplum_config(config: Option<&GreenplumConfig6>, prior: &Value) -> Value {
    let map: HashMap<String, String> = config
        .map(settings)
        .unwrap_or_default()
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k.to_string(), v)))
        .collect();
    super::values::string_map(&map, prior)
}

pub fn expand_greenplum_config(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<GreenplumConfig6> {
    let map = match value {
        Value::Null | Value::Unknown => return None,
        Value::Map(map) => map,
        other => {
            diags.add_attribute_error(
                path,
                "Incorrect attribute type",
                format!("expected Map<String>, got {}", other.type_name()),
            );
            return None;
        }
    };

    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    let mut config = GreenplumConfig6::default();
    for key in keys {
        let key_path = path.key(key.as_str());
        let Some(raw) = expect_string(&map[key], &key_path, diags) else {
            continue;
        };
        if let Err(message) = apply_setting(&mut config, key, &raw) {
            diags.add_attribute_error(&key_path, "Invalid attribute value", message);
        }
    }
    if diags.has_error() {
        return None;
    }
    Some(config)
}

// -- pooler_config ------------------------------------------------------------

pub fn flatten_pooler_config(config: Option<&ConnectionPoolerConfig>, prior: &Value) -> Value {
    let Some(config) = config else {
        return Value::Null;
    };
    let mode = if config.mode.is_unspecified() {
        Value::Null
    } else {
        Value::from(config.mode.as_str())
    };
    object_or_null(
        [
            ("pooling_mode", mode),
            ("pool_size", int_or_null(config.size)),
            ("pool_client_idle_timeout", int_or_null(config.client_idle_timeout)),
            (
                "pool_idle_in_transaction_timeout",
                int_or_null(config.idle_in_transaction_timeout),
            ),
        ],
        prior,
    )
}

pub fn expand_pooler_config(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<ConnectionPoolerConfig> {
    let fields: Fields<'_> = expect_object(value, path, diags)?;
    let config = ConnectionPoolerConfig {
        mode: fields
            .enumeration("pooling_mode", PoolMode::parse, diags)
            .unwrap_or_default(),
        size: fields.int("pool_size", diags),
        client_idle_timeout: fields.int("pool_client_idle_timeout", diags),
        idle_in_transaction_timeout: fields.int("pool_idle_in_transaction_timeout", diags),
    };
    if diags.has_error() {
        return None;
    }
    Some(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path() -> AttributePath {
        AttributePath::new("config").attribute("greenplum_config")
    }

    #[test]
    fn greenplum_config_round_trip() {
        let config = GreenplumConfig6 {
            max_connections: Some(400),
            gp_workfile_compression: Some(false),
            log_statement: LogStatement::Ddl,
            gp_global_deadlock_detector_period: Some(120),
            ..Default::default()
        };
        let flat = flatten_greenplum_config(Some(&config), &Value::Null);
        assert_eq!(flat.field("max_connections"), &Value::from("400"));
        assert_eq!(flat.field("log_statement"), &Value::from("DDL"));
        assert_eq!(flat.as_map().map(|m| m.len()), Some(4));

        let mut diags = Diagnostics::new();
        assert_eq!(expand_greenplum_config(&flat, &path(), &mut diags), Some(config));
    }

    #[test]
    fn empty_greenplum_config_follows_prior() {
        assert_eq!(flatten_greenplum_config(None, &Value::Null), Value::Null);
        assert_eq!(
            flatten_greenplum_config(Some(&GreenplumConfig6::default()), &Value::Map(HashMap::new())),
            Value::Map(HashMap::new())
        );
    }

    #[test]
    fn malformed_settings_are_reported_per_key() {
        let value = Value::object([
            ("max_connections", Value::from("lots")),
            ("gp_workfile_compression", Value::from("maybe")),
            ("log_statement", Value::from("ALL")),
        ]);
        let mut diags = Diagnostics::new();
        assert!(expand_greenplum_config(&value, &path(), &mut diags).is_none());
        let paths: Vec<String> = diags
            .errors()
            .filter_map(|d| d.path.as_ref().map(|p| p.to_string()))
            .collect();
        assert_eq!(
            paths,
            vec![
                "config.greenplum_config[\"gp_workfile_compression\"]",
                "config.greenplum_config[\"max_connections\"]",
            ]
        );
    }

    #[test]
    fn pooler_config_round_trip() {
        let config = ConnectionPoolerConfig {
            mode: PoolMode::Transaction,
            size: Some(100),
            client_idle_timeout: Some(0),
            idle_in_transaction_timeout: None,
        };
        let flat = flatten_pooler_config(Some(&config), &Value::Null);
        let mut diags = Diagnostics::new();
        let back = expand_pooler_config(&flat, &AttributePath::new("pooler_config"), &mut diags);
        assert_eq!(back, Some(config));
        assert_eq!(
            flatten_pooler_config(Some(&ConnectionPoolerConfig::default()), &Value::Null),
            Value::Null
        );
    }

    #[test]
    fn pooler_rejects_unknown_mode() {
        let value = Value::object([("pooling_mode", Value::from("STATEMENT"))]);
        let mut diags = Diagnostics::new();
        assert!(expand_pooler_config(&value, &AttributePath::new("pooler_config"), &mut diags).is_none());
        assert!(diags.to_string().contains("unsupported value 'STATEMENT'"));
    }
}
