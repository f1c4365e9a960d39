//! Field masks for partial cluster updates
//!
//! The update endpoint only touches fields named in `updateMask`. Masks are
//! derived from the attribute paths that differ between planned and prior
//! state, so unchanged settings are never rewritten.

use std::collections::{BTreeSet, HashMap};

use mdbform_core::diagnostics::{AttributePath, PathStep};
use mdbform_core::differ::changed_paths;
use mdbform_core::resource::Value;
use mdbform_core::schema::{AttributeSchema, AttributeType, ResourceSchema};

/// Sorted, deduplicated mask entries for the changes from `prior` to `planned`
///
/// Changes that cannot be applied in place (they force replacement) and
/// computed attributes contribute nothing.
pub fn update_mask(
    schema: &ResourceSchema,
    planned: &HashMap<String, Value>,
    prior: &HashMap<String, Value>,
) -> Vec<String> {
    leaf_changes(schema, planned, prior)
        .iter()
        .filter_map(mask_for)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn lookup<'a>(attributes: &'a HashMap<String, Value>, path: &AttributePath) -> &'a Value {
    let mut steps = path.steps().iter();
    let mut current = match steps.next() {
        Some(PathStep::Attribute(name)) => attributes.get(name).unwrap_or(Value::null_ref()),
        _ => return Value::null_ref(),
    };
    for step in steps {
        current = match step {
            PathStep::Attribute(name) | PathStep::Key(name) => current
                .as_map()
                .and_then(|m| m.get(name))
                .unwrap_or(Value::null_ref()),
            PathStep::Index(i) => current
                .as_items()
                .and_then(|items| items.get(*i))
                .unwrap_or(Value::null_ref()),
        };
    }
    current
}

/// Changed paths, descending into objects and maps that exist on one side only
fn leaf_changes(
    schema: &ResourceSchema,
    planned: &HashMap<String, Value>,
    prior: &HashMap<String, Value>,
) -> Vec<AttributePath> {
    let empty = HashMap::new();
    let mut leaves = Vec::new();
    let mut pending = changed_paths(
        &schema.sorted_attributes(),
        planned,
        prior,
        &AttributePath::root(),
    );

    while let Some(path) = pending.pop() {
        let Some(attr) = schema.attribute_at(&path) else {
            leaves.push(path);
            continue;
        };
        if matches!(path.steps().last(), Some(PathStep::Key(_))) {
            leaves.push(path);
            continue;
        }
        let after = lookup(planned, &path).as_map();
        let before = lookup(prior, &path).as_map();
        match (&attr.attr_type, after.or(before)) {
            (AttributeType::Object(nested), Some(_)) if after.is_some() != before.is_some() => {
                let nested: Vec<&AttributeSchema> = nested.iter().collect();
                pending.extend(changed_paths(
                    &nested,
                    after.unwrap_or(&empty),
                    before.unwrap_or(&empty),
                    &path,
                ));
            }
            (AttributeType::Map(_), Some(map)) if after.is_some() != before.is_some() => {
                leaves.extend(map.keys().map(|key| path.key(key.as_str())));
            }
            _ => leaves.push(path),
        }
    }
    leaves
}

fn mask_for(path: &AttributePath) -> Option<String> {
    let mut names = Vec::new();
    let mut key = None;
    for step in path.steps() {
        match step {
            PathStep::Attribute(name) => names.push(name.as_str()),
            PathStep::Key(k) => key = Some(k.as_str()),
            PathStep::Index(_) => {}
        }
    }

    let mask = match names.as_slice() {
        [
            top @ ("name" | "description" | "labels" | "security_group_ids" | "deletion_protection"
            | "service_account_id" | "user_password"),
            ..,
        ] => top.to_string(),
        ["maintenance_window", ..] => "maintenance_window".to_string(),
        ["version"] => "config.version".to_string(),
        ["cluster_config", "backup_window_start", ..] => "config.backup_window_start".to_string(),
        ["cluster_config", "backup_retain_period_days"] => {
            "config.backup_retain_period_days".to_string()
        }
        ["cluster_config", "access", leaf] => format!("config.access.{}", leaf),
        ["cluster_config", "access"] => "config.access".to_string(),
        ["cluster_config", "background_activities", ..] => {
            "config_spec.background_activities".to_string()
        }
        ["cluster_config", "pxf_config", ..] => "config_spec.pxf_config".to_string(),
        [sub @ ("master_config" | "segment_config"), "resources", leaf] => {
            format!("{}.resources.{}", sub, leaf)
        }
        [sub @ ("master_config" | "segment_config"), ..] => format!("{}.resources", sub),
        ["config", "pooler_config", ..] => "config_spec.pool".to_string(),
        ["config", "greenplum_config"] => match key {
            Some(key) => format!("config_spec.greenplum_config_6.{}", key),
            None => "config_spec.greenplum_config_6".to_string(),
        },
        ["cloud_storage", ..] => "cloud_storage.enable".to_string(),
        ["logging", ..] => "logging".to_string(),
        _ => return None,
    };
    Some(mask)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::cluster_schema;

    fn attrs<const N: usize>(pairs: [(&str, Value); N]) -> HashMap<String, Value> {
        pairs.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    fn mask(planned: HashMap<String, Value>, prior: HashMap<String, Value>) -> Vec<String> {
        update_mask(&cluster_schema(), &planned, &prior)
    }

    #[test]
    fn no_changes_no_mask() {
        let state = attrs([("name", Value::from("gp")), ("id", Value::from("c9q1"))]);
        assert!(mask(state.clone(), state).is_empty());
    }

    #[test]
    fn top_level_fields_map_to_themselves() {
        let prior = attrs([
            ("name", Value::from("gp")),
            ("labels", Value::object([("env", Value::from("dev"))])),
        ]);
        let planned = attrs([
            ("name", Value::from("gp2")),
            ("labels", Value::object([("env", Value::from("prod"))])),
            ("deletion_protection", Value::Bool(true)),
        ]);
        assert_eq!(mask(planned, prior), vec!["deletion_protection", "labels", "name"]);
    }

    #[test]
    fn nested_leaves_map_to_api_fields() {
        let resources = |size: i64| {
            Value::object([(
                "resources",
                Value::object([
                    ("resource_preset_id", Value::from("s2.micro")),
                    ("disk_size", Value::Int(size)),
                    ("disk_type_id", Value::from("network-ssd")),
                ]),
            )])
        };
        let access = |web_sql: bool| Value::object([("web_sql", Value::Bool(web_sql))]);
        let prior = attrs([
            ("segment_config", resources(10)),
            ("cluster_config", Value::object([("access", access(false))])),
            ("version", Value::from("6.22")),
        ]);
        let planned = attrs([
            ("segment_config", resources(20)),
            ("cluster_config", Value::object([("access", access(true))])),
            ("version", Value::from("6.25")),
        ]);
        assert_eq!(
            mask(planned, prior),
            vec![
                "config.access.web_sql",
                "config.version",
                "segment_config.resources.disk_size",
            ]
        );
    }

    #[test]
    fn greenplum_settings_are_masked_per_key() {
        let prior = attrs([(
            "config",
            Value::object([(
                "greenplum_config",
                Value::object([("max_connections", Value::from("400"))]),
            )]),
        )]);
        let planned = attrs([(
            "config",
            Value::object([(
                "greenplum_config",
                Value::object([("max_statement_mem", Value::from("1024"))]),
            )]),
        )]);
        assert_eq!(
            mask(planned, prior),
            vec![
                "config_spec.greenplum_config_6.max_connections",
                "config_spec.greenplum_config_6.max_statement_mem",
            ]
        );
    }

    #[test]
    fn blocks_added_or_removed_are_masked() {
        let planned = attrs([
            (
                "config",
                Value::object([
                    (
                        "greenplum_config",
                        Value::object([("log_statement", Value::from("DDL"))]),
                    ),
                    ("pooler_config", Value::object([("pool_size", Value::Int(50))])),
                ]),
            ),
            (
                "logging",
                Value::object([("enabled", Value::Bool(true))]),
            ),
        ]);
        assert_eq!(
            mask(planned.clone(), HashMap::new()),
            vec![
                "config_spec.greenplum_config_6.log_statement",
                "config_spec.pool",
                "logging",
            ]
        );
        assert_eq!(
            mask(HashMap::new(), planned),
            vec![
                "config_spec.greenplum_config_6.log_statement",
                "config_spec.pool",
                "logging",
            ]
        );
    }

    #[test]
    fn replace_only_and_computed_changes_are_ignored() {
        let prior = attrs([
            ("zone_id", Value::from("ru-central1-a")),
            ("status", Value::from("RUNNING")),
        ]);
        let planned = attrs([
            ("zone_id", Value::from("ru-central1-b")),
            ("status", Value::Unknown),
        ]);
        assert!(mask(planned, prior).is_empty());
    }

    #[test]
    fn background_activities_are_masked_as_a_block() {
        let killer = |age: i64| Value::object([("max_age", Value::Int(age))]);
        let prior = attrs([(
            "cluster_config",
            Value::object([(
                "background_activities",
                Value::object([("query_killer_idle", killer(600))]),
            )]),
        )]);
        let planned = attrs([(
            "cluster_config",
            Value::object([(
                "background_activities",
                Value::object([("query_killer_idle", killer(300))]),
            )]),
        )]);
        assert_eq!(mask(planned, prior), vec!["config_spec.background_activities"]);
    }
}
