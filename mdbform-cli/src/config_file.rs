//! Configuration file loading
//!
//! ```json
//! { "resources": [ { "type": "greenplum_cluster", "name": "analytics", "attributes": { ... } } ] }
//! ```

use std::collections::{HashMap, HashSet};

use mdbform_core::diagnostics::Diagnostics;
use mdbform_core::json::attributes_from_json;
use mdbform_core::resource::{Resource, ResourceId};
use mdbform_core::schema::ResourceSchema;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    #[serde(default)]
    resources: Vec<ResourceBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResourceBlock {
    #[serde(rename = "type")]
    resource_type: String,
    name: String,
    #[serde(default)]
    attributes: serde_json::Map<String, serde_json::Value>,
}

fn valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_lowercase() || c == '_')
        && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

/// Decode the resources declared in a configuration file
///
/// Every problem in every resource is collected before failing.
pub fn parse_config(
    content: &str,
    schemas: &HashMap<String, ResourceSchema>,
) -> Result<Vec<Resource>, Diagnostics> {
    let mut diags = Diagnostics::new();
    let file: ConfigFile = match serde_json::from_str(content) {
        Ok(file) => file,
        Err(e) => {
            diags.add_error("Parse error", e.to_string());
            return Err(diags);
        }
    };

    let mut seen: HashSet<ResourceId> = HashSet::new();
    let mut resources = Vec::new();
    for block in file.resources {
        let id = ResourceId::new(block.resource_type.clone(), block.name.clone());
        if !valid_name(&block.name) {
            diags.add_error(
                format!("{}: Invalid resource name", id),
                "names start with a lowercase letter or '_' and contain only lowercase letters, digits, '_' and '-'",
            );
            continue;
        }
        if !seen.insert(id.clone()) {
            diags.add_error(
                format!("{}: Duplicate resource", id),
                "each resource type and name pair may be declared once",
            );
            continue;
        }
        let Some(schema) = schemas.get(&block.resource_type) else {
            diags.add_error(
                format!("{}: Unsupported resource type", id),
                format!("no schema for '{}'", block.resource_type),
            );
            continue;
        };

        let mut resource_diags = Diagnostics::new();
        let attributes = attributes_from_json(schema, &block.attributes, &mut resource_diags);
        if resource_diags.has_error() {
            diags.extend(resource_diags.prefixed(&id.to_string()));
            continue;
        }
        resources.push(Resource {
            id,
            attributes,
        });
    }

    diags.into_result()?;
    Ok(resources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdbform_core::resource::Value;
    use mdbform_provider_greenplum::schema::{RESOURCE_TYPE, cluster_schema};

    fn schemas() -> HashMap<String, ResourceSchema> {
        HashMap::from([(RESOURCE_TYPE.to_string(), cluster_schema())])
    }

    #[test]
    fn test_parse_resources() {
        let content = r#"{
            "resources": [{
                "type": "greenplum_cluster",
                "name": "analytics",
                "attributes": {
                    "name": "analytics",
                    "master_host_count": 2,
                    "security_group_ids": ["sg-2", "sg-1"],
                    "labels": { "team": "bi" }
                }
            }]
        }"#;
        let resources = parse_config(content, &schemas()).unwrap();
        assert_eq!(resources.len(), 1);
        let cluster = &resources[0];
        assert_eq!(cluster.id, ResourceId::new("greenplum_cluster", "analytics"));
        assert_eq!(cluster.get("master_host_count"), &Value::Int(2));
        assert_eq!(
            cluster.get("security_group_ids"),
            &Value::string_set(["sg-1", "sg-2"])
        );
        assert_eq!(cluster.get("labels").field("team"), &Value::from("bi"));
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("{ \"resources\": [", &schemas()).unwrap_err();
        assert!(err.to_string().starts_with("error: Parse error"));
    }

    #[test]
    fn test_unknown_top_level_field_is_rejected() {
        let err = parse_config(r#"{ "resource": [] }"#, &schemas()).unwrap_err();
        assert!(err.to_string().contains("unknown field `resource`"));
    }

    #[test]
    fn test_collects_problems_from_every_resource() {
        let content = r#"{
            "resources": [
                { "type": "greenplum_cluster", "name": "a", "attributes": { "master_host_count": "two" } },
                { "type": "greenplum_cluster", "name": "a" },
                { "type": "postgresql_cluster", "name": "b" },
                { "type": "greenplum_cluster", "name": "Bad Name" }
            ]
        }"#;
        let diags = parse_config(content, &schemas()).unwrap_err();
        let summaries: Vec<&str> = diags.errors().map(|d| d.summary.as_str()).collect();
        assert_eq!(
            summaries,
            vec![
                "greenplum_cluster.a: Incorrect attribute type",
                "greenplum_cluster.a: Duplicate resource",
                "postgresql_cluster.b: Unsupported resource type",
                "greenplum_cluster.Bad Name: Invalid resource name",
            ]
        );
    }

    #[test]
    fn test_empty_config_has_no_resources() {
        assert!(parse_config("{}", &schemas()).unwrap().is_empty());
    }
}
