//! `greenplum_cluster` resource schema
//!
//! Attribute names are the configuration contract; `provider_name` records
//! the API field each one maps to.

mod cluster_config;

use mdbform_core::resource::Value;
use mdbform_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use mdbform_core::validator::Validator;

use crate::api::{Environment, WeekDay};

pub use cluster_config::{cluster_config_type, config_type};

pub const RESOURCE_TYPE: &str = "greenplum_cluster";

/// Greenplum versions accepted on create and upgrade
pub const VERSIONS: &[&str] = &["6.17", "6.19", "6.22", "6.25"];

/// Server settings accepted in `config.greenplum_config`
pub const GREENPLUM_CONFIG_KEYS: &[&str] = &[
    "gp_add_column_inherits_table_setting",
    "gp_enable_global_deadlock_detector",
    "gp_global_deadlock_detector_period",
    "gp_workfile_compression",
    "gp_workfile_limit_files_per_query",
    "gp_workfile_limit_per_query",
    "gp_workfile_limit_per_segment",
    "log_statement",
    "max_connections",
    "max_prepared_transactions",
    "max_slot_wal_keep_size",
    "max_statement_mem",
];

pub const MAINTENANCE_ANYTIME: &str = "ANYTIME";
pub const MAINTENANCE_WEEKLY: &str = "WEEKLY";

/// Bytes per gibibyte; `disk_size` is configured in GiB
pub const GIB: i64 = 1 << 30;

pub(crate) fn enum_type<S: AsRef<str>>(variants: &[S]) -> AttributeType {
    AttributeType::Enum(variants.iter().map(|v| v.as_ref().to_string()).collect())
}

fn resources_type() -> AttributeType {
    AttributeType::Object(vec![
        AttributeSchema::new("resource_preset_id", AttributeType::String)
            .required()
            .with_description("Host class, e.g. s2.medium")
            .with_provider_name("resourcePresetId"),
        AttributeSchema::new("disk_size", types::positive_int())
            .required()
            .with_description("Storage per host, GiB")
            .with_provider_name("diskSize"),
        AttributeSchema::new("disk_type_id", AttributeType::String)
            .required()
            .with_description("Storage type, e.g. network-ssd")
            .with_provider_name("diskTypeId"),
    ])
}

fn subcluster_type() -> AttributeType {
    AttributeType::Object(vec![
        AttributeSchema::new("resources", resources_type())
            .required()
            .with_provider_name("resources"),
    ])
}

fn maintenance_window_type() -> AttributeType {
    let anytime = Value::from(MAINTENANCE_ANYTIME);
    let weekly = Value::from(MAINTENANCE_WEEKLY);
    AttributeType::Object(vec![
        AttributeSchema::new("type", enum_type(&[MAINTENANCE_ANYTIME, MAINTENANCE_WEEKLY]))
            .required(),
        AttributeSchema::new("day", enum_type(WeekDay::VARIANTS))
            .with_description("Day of the week for WEEKLY windows")
            .with_validator(Validator::required_when("type", weekly.clone()))
            .with_validator(Validator::forbidden_when("type", anytime.clone())),
        AttributeSchema::new("hour", AttributeType::Int)
            .with_description("Hour of the day in UTC (1-24) for WEEKLY windows")
            .with_validator(Validator::IntBetween { min: 1, max: 24 })
            .with_validator(Validator::required_when("type", weekly))
            .with_validator(Validator::forbidden_when("type", anytime)),
    ])
}

fn logging_type() -> AttributeType {
    let toggle = |name: &str, api: &str, desc: &str| {
        AttributeSchema::new(name, AttributeType::Bool)
            .with_default(Value::Bool(false))
            .with_description(desc)
            .with_provider_name(api)
    };
    AttributeType::Object(vec![
        toggle("enabled", "enabled", "Deliver logs to Cloud Logging"),
        AttributeSchema::new("folder_id", AttributeType::String)
            .with_description("Write to the default log group of this folder")
            .with_validator(Validator::conflicts_with(["log_group_id"]))
            .with_provider_name("folderId"),
        AttributeSchema::new("log_group_id", AttributeType::String)
            .with_description("Write to this log group")
            .with_validator(Validator::conflicts_with(["folder_id"]))
            .with_provider_name("logGroupId"),
        toggle(
            "command_center_enabled",
            "commandCenterEnabled",
            "Deliver Command Center logs",
        ),
        toggle("greenplum_enabled", "greenplumEnabled", "Deliver Greenplum logs"),
        toggle("pooler_enabled", "poolerEnabled", "Deliver connection pooler logs"),
    ])
}

fn restore_type() -> AttributeType {
    AttributeType::Object(vec![
        AttributeSchema::new("backup_id", AttributeType::String)
            .required()
            .with_description("Backup to restore from"),
        AttributeSchema::new("time", AttributeType::String)
            .with_description("Point in time to restore to (RFC 3339)")
            .with_validator(Validator::Rfc3339),
    ])
}

fn monitoring_type() -> AttributeType {
    AttributeType::list(AttributeType::Object(vec![
        AttributeSchema::new("name", AttributeType::String).computed(),
        AttributeSchema::new("description", AttributeType::String).computed(),
        AttributeSchema::new("link", AttributeType::String).computed(),
    ]))
}

fn hosts_type() -> AttributeType {
    AttributeType::list(AttributeType::Object(vec![
        AttributeSchema::new("fqdn", AttributeType::String).computed(),
        AttributeSchema::new("assign_public_ip", AttributeType::Bool).computed(),
    ]))
}

fn host_count(name: &str, api: &str, validator: Validator, desc: &str) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::Int)
        .required()
        .requires_replace()
        .with_validator(validator)
        .with_description(desc)
        .with_provider_name(api)
}

/// Schema of the `greenplum_cluster` resource
pub fn cluster_schema() -> ResourceSchema {
    ResourceSchema::new(RESOURCE_TYPE)
        .with_description("Managed Greenplum cluster")
        .with_version(1)
        .attribute(
            AttributeSchema::new("id", AttributeType::String)
                .computed()
                .use_state_for_unknown()
                .with_description("Cluster ID")
                .with_provider_name("id"),
        )
        .attribute(
            AttributeSchema::new("folder_id", AttributeType::String)
                .optional_computed()
                .requires_replace()
                .use_state_for_unknown()
                .with_description("Folder to create the cluster in; the provider folder when unset")
                .with_provider_name("folderId"),
        )
        .attribute(
            AttributeSchema::new("name", AttributeType::String)
                .required()
                .with_validator(Validator::string_length(1, 63))
                .with_validator(Validator::matches(
                    "^[a-zA-Z0-9_-]*$",
                    "may only contain letters, digits, '-' and '_'",
                ))
                .with_provider_name("name"),
        )
        .attribute(
            AttributeSchema::new("description", AttributeType::String)
                .with_validator(Validator::string_length(0, 256))
                .with_provider_name("description"),
        )
        .attribute(
            AttributeSchema::new("labels", types::string_map())
                .with_validator(Validator::SizeBetween { min: 0, max: 64 })
                .with_validator(Validator::map_keys_match(
                    "^[a-z][-_./@0-9a-z]{0,62}$",
                    "label keys start with a lowercase letter and are at most 63 characters",
                ))
                .with_provider_name("labels"),
        )
        .attribute(
            AttributeSchema::new("environment", enum_type(Environment::VARIANTS))
                .required()
                .requires_replace()
                .with_provider_name("environment"),
        )
        .attribute(
            AttributeSchema::new("network_id", AttributeType::String)
                .required()
                .requires_replace()
                .with_provider_name("networkId"),
        )
        .attribute(
            AttributeSchema::new("zone_id", AttributeType::String)
                .required()
                .requires_replace()
                .with_description("Availability zone of every host")
                .with_provider_name("config.zoneId"),
        )
        .attribute(
            AttributeSchema::new("subnet_id", AttributeType::String)
                .optional_computed()
                .requires_replace()
                .use_state_for_unknown()
                .with_provider_name("config.subnetId"),
        )
        .attribute(
            AttributeSchema::new("assign_public_ip", AttributeType::Bool)
                .with_default(Value::Bool(false))
                .requires_replace()
                .with_provider_name("config.assignPublicIp"),
        )
        .attribute(
            AttributeSchema::new("version", enum_type(VERSIONS))
                .required()
                .with_description("Greenplum version; changing it upgrades the cluster")
                .with_provider_name("config.version"),
        )
        .attribute(host_count(
            "master_host_count",
            "masterHostCount",
            Validator::IntBetween { min: 1, max: 2 },
            "Number of master hosts (1, or 2 with a standby)",
        ))
        .attribute(host_count(
            "segment_host_count",
            "segmentHostCount",
            Validator::IntAtLeast(2),
            "Number of segment hosts",
        ))
        .attribute(host_count(
            "segment_in_host",
            "segmentInHost",
            Validator::IntAtLeast(1),
            "Number of segments per segment host",
        ))
        .attribute(
            AttributeSchema::new("master_config", subcluster_type())
                .required()
                .with_provider_name("masterConfig"),
        )
        .attribute(
            AttributeSchema::new("segment_config", subcluster_type())
                .required()
                .with_provider_name("segmentConfig"),
        )
        .attribute(
            AttributeSchema::new("user_name", AttributeType::String)
                .required()
                .requires_replace()
                .with_description("Administrator account")
                .with_provider_name("userName"),
        )
        .attribute(
            AttributeSchema::new("user_password", AttributeType::String)
                .required()
                .sensitive()
                .with_validator(Validator::string_length(8, 128))
                .with_description("Administrator password; never returned by the API")
                .with_provider_name("userPassword"),
        )
        .attribute(
            AttributeSchema::new("security_group_ids", types::string_set())
                .with_provider_name("securityGroupIds"),
        )
        .attribute(
            AttributeSchema::new("deletion_protection", AttributeType::Bool)
                .optional_computed()
                .with_default(Value::Bool(false))
                .with_provider_name("deletionProtection"),
        )
        .attribute(
            AttributeSchema::new("service_account_id", AttributeType::String)
                .with_provider_name("serviceAccountId"),
        )
        .attribute(
            AttributeSchema::new("master_host_group_ids", types::string_set())
                .requires_replace()
                .with_provider_name("masterHostGroupIds"),
        )
        .attribute(
            AttributeSchema::new("segment_host_group_ids", types::string_set())
                .requires_replace()
                .with_provider_name("segmentHostGroupIds"),
        )
        .attribute(
            AttributeSchema::new("maintenance_window", maintenance_window_type())
                .optional_computed()
                .with_description("When the service may apply maintenance; ANYTIME when unset")
                .with_provider_name("maintenanceWindow"),
        )
        .attribute(
            AttributeSchema::new("cluster_config", cluster_config_type())
                .optional_computed()
                .with_description("Backups, access and background service settings"),
        )
        .attribute(
            AttributeSchema::new("config", config_type())
                .with_description("Greenplum server and connection pooler settings"),
        )
        .attribute(
            AttributeSchema::new(
                "cloud_storage",
                AttributeType::Object(vec![
                    AttributeSchema::new("enable", AttributeType::Bool)
                        .with_default(Value::Bool(false))
                        .with_description("Enable Yezzey hybrid storage"),
                ]),
            )
            .optional_computed()
            .with_provider_name("cloudStorage"),
        )
        .attribute(
            AttributeSchema::new("logging", logging_type()).with_provider_name("logging"),
        )
        .attribute(
            AttributeSchema::new("restore", restore_type())
                .requires_replace()
                .with_description("Create the cluster from a backup instead of empty"),
        )
        .attribute(
            AttributeSchema::new("created_at", AttributeType::String)
                .computed()
                .use_state_for_unknown()
                .with_provider_name("createdAt"),
        )
        .attribute(
            AttributeSchema::new(
                "health",
                enum_type(&["HEALTH_UNKNOWN", "ALIVE", "DEAD", "DEGRADED", "UNBALANCED"]),
            )
            .computed()
            .with_provider_name("health"),
        )
        .attribute(
            AttributeSchema::new("status", AttributeType::String)
                .computed()
                .with_provider_name("status"),
        )
        .attribute(
            AttributeSchema::new("monitoring", monitoring_type())
                .computed()
                .use_state_for_unknown()
                .with_provider_name("monitoring"),
        )
        .attribute(
            AttributeSchema::new("master_hosts", hosts_type())
                .computed()
                .use_state_for_unknown(),
        )
        .attribute(
            AttributeSchema::new("segment_hosts", hosts_type())
                .computed()
                .use_state_for_unknown(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use mdbform_core::diagnostics::AttributePath;
    use mdbform_core::schema::PlanModifier;
    use std::collections::HashMap;

    fn minimal_config() -> HashMap<String, Value> {
        let resources = Value::object([
            ("resource_preset_id", Value::from("s2.micro")),
            ("disk_size", Value::Int(10)),
            ("disk_type_id", Value::from("network-ssd")),
        ]);
        HashMap::from([
            ("name".to_string(), Value::from("analytics")),
            ("environment".to_string(), Value::from("PRESTABLE")),
            ("network_id".to_string(), Value::from("enp-net")),
            ("zone_id".to_string(), Value::from("ru-central1-a")),
            ("version".to_string(), Value::from("6.25")),
            ("master_host_count".to_string(), Value::Int(2)),
            ("segment_host_count".to_string(), Value::Int(2)),
            ("segment_in_host".to_string(), Value::Int(1)),
            ("user_name".to_string(), Value::from("admin")),
            ("user_password".to_string(), Value::from("s3cretpass")),
            (
                "master_config".to_string(),
                Value::object([("resources", resources.clone())]),
            ),
            (
                "segment_config".to_string(),
                Value::object([("resources", resources)]),
            ),
        ])
    }

    fn error_paths(attrs: &HashMap<String, Value>) -> Vec<String> {
        cluster_schema()
            .validate(attrs)
            .errors()
            .filter_map(|d| d.path.as_ref().map(|p| p.to_string()))
            .collect()
    }

    #[test]
    fn minimal_config_is_valid() {
        let diags = cluster_schema().validate(&minimal_config());
        assert!(!diags.has_error(), "{}", diags);
    }

    #[test]
    fn rejects_bad_name_and_host_count() {
        let mut attrs = minimal_config();
        attrs.insert("name".to_string(), Value::from("bad name!"));
        attrs.insert("master_host_count".to_string(), Value::Int(3));
        assert_eq!(error_paths(&attrs), vec!["master_host_count", "name"]);
    }

    #[test]
    fn weekly_window_requires_day_and_hour() {
        let mut attrs = minimal_config();
        attrs.insert(
            "maintenance_window".to_string(),
            Value::object([("type", Value::from("WEEKLY")), ("hour", Value::Int(3))]),
        );
        assert_eq!(error_paths(&attrs), vec!["maintenance_window.day"]);

        attrs.insert(
            "maintenance_window".to_string(),
            Value::object([("type", Value::from("ANYTIME")), ("day", Value::from("MON"))]),
        );
        assert_eq!(error_paths(&attrs), vec!["maintenance_window.day"]);
    }

    #[test]
    fn logging_destinations_conflict() {
        let mut attrs = minimal_config();
        attrs.insert(
            "logging".to_string(),
            Value::object([
                ("enabled", Value::Bool(true)),
                ("folder_id", Value::from("b1g")),
                ("log_group_id", Value::from("e23")),
            ]),
        );
        assert_eq!(
            error_paths(&attrs),
            vec!["logging.folder_id", "logging.log_group_id"]
        );
    }

    #[test]
    fn greenplum_config_keys_are_whitelisted() {
        let mut attrs = minimal_config();
        attrs.insert(
            "config".to_string(),
            Value::object([(
                "greenplum_config",
                Value::object([
                    ("max_connections", Value::from("400")),
                    ("shared_buffers", Value::from("1GB")),
                ]),
            )]),
        );
        assert_eq!(error_paths(&attrs), vec!["config.greenplum_config"]);
    }

    #[test]
    fn restore_time_must_be_rfc3339() {
        let mut attrs = minimal_config();
        attrs.insert(
            "restore".to_string(),
            Value::object([
                ("backup_id", Value::from("c9q.bk1")),
                ("time", Value::from("yesterday")),
            ]),
        );
        assert_eq!(error_paths(&attrs), vec!["restore.time"]);
    }

    #[test]
    fn computed_attributes_cannot_be_configured() {
        let mut attrs = minimal_config();
        attrs.insert("status".to_string(), Value::from("RUNNING"));
        assert_eq!(error_paths(&attrs), vec!["status"]);
    }

    #[test]
    fn resource_changes_are_in_place() {
        let schema = cluster_schema();
        let path = AttributePath::new("segment_config")
            .attribute("resources")
            .attribute("disk_size");
        assert!(
            !schema
                .attributes_along(&path)
                .iter()
                .any(|a| a.has_modifier(PlanModifier::RequiresReplace))
        );
        let path = AttributePath::new("restore").attribute("time");
        assert!(
            schema
                .attributes_along(&path)
                .iter()
                .any(|a| a.has_modifier(PlanModifier::RequiresReplace))
        );
    }
}
