//! Subclusters, maintenance window, storage, logging, hosts, restore

use chrono::{DateTime, Utc};
use mdbform_core::diagnostics::{AttributePath, Diagnostics};
use mdbform_core::resource::Value;

use super::values::{
    Fields, bool_or_null, expect_object, object, object_or_null, require, string_or_null,
};
use crate::api::{
    CloudStorage, Host, LoggingConfig, MaintenanceWindow, Monitoring, Resources, SubclusterConfig,
    WeekDay,
};
use crate::schema::{GIB, MAINTENANCE_ANYTIME, MAINTENANCE_WEEKLY};

// -- resources ----------------------------------------------------------------

pub fn flatten_resources(resources: &Resources) -> Value {
    object([
        ("resource_preset_id", string_or_null(&resources.resource_preset_id)),
        ("disk_size", Value::Int(resources.disk_size / GIB)),
        ("disk_type_id", string_or_null(&resources.disk_type_id)),
    ])
}

pub fn expand_resources(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<Resources> {
    let fields = expect_object(value, path, diags)?;
    let resource_preset_id = fields.required_string("resource_preset_id", diags);
    let disk_size = fields.required_int("disk_size", diags);
    let disk_type_id = fields.required_string("disk_type_id", diags);

    let disk_size = disk_size?;
    let Some(bytes) = disk_size.checked_mul(GIB) else {
        diags.add_attribute_error(
            &fields.path("disk_size"),
            "Invalid attribute value",
            format!("{} GiB is out of range", disk_size),
        );
        return None;
    };
    Some(Resources {
        resource_preset_id: resource_preset_id?,
        disk_size: bytes,
        disk_type_id: disk_type_id?,
    })
}

// -- master_config / segment_config -------------------------------------------

pub fn flatten_subcluster(config: Option<&SubclusterConfig>) -> Value {
    match config {
        Some(config) => object([(
            "resources",
            config.resources.as_ref().map_or(Value::Null, flatten_resources),
        )]),
        None => Value::Null,
    }
}

pub fn expand_subcluster(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<SubclusterConfig> {
    let fields = expect_object(value, path, diags)?;
    let path = fields.path("resources");
    if !require(fields.get("resources"), &path, diags) {
        return None;
    }
    let resources = expand_resources(fields.get("resources"), &path, diags)?;
    Some(SubclusterConfig {
        resources: Some(resources),
    })
}

// -- maintenance_window -------------------------------------------------------

/// A cluster without a window can be maintained at any time
pub fn flatten_maintenance_window(window: Option<&MaintenanceWindow>) -> Value {
    match window.and_then(|w| w.weekly_maintenance_window.as_ref()) {
        Some(weekly) => object([
            ("type", Value::from(MAINTENANCE_WEEKLY)),
            (
                "day",
                if weekly.day.is_unspecified() {
                    Value::Null
                } else {
                    Value::from(weekly.day.as_str())
                },
            ),
            ("hour", Value::Int(weekly.hour)),
        ]),
        None => object([("type", Value::from(MAINTENANCE_ANYTIME))]),
    }
}

pub fn expand_maintenance_window(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<MaintenanceWindow> {
    let fields = expect_object(value, path, diags)?;
    let kind = fields.required_string("type", diags)?;
    match kind.as_str() {
        MAINTENANCE_ANYTIME => Some(MaintenanceWindow::anytime()),
        MAINTENANCE_WEEKLY => {
            let day = fields.required_enumeration("day", WeekDay::parse, diags);
            let hour = fields.required_int("hour", diags);
            Some(MaintenanceWindow::weekly(day?, hour?))
        }
        other => {
            diags.add_attribute_error(
                &fields.path("type"),
                "Invalid attribute value",
                format!("unsupported maintenance window type '{}'", other),
            );
            None
        }
    }
}

// -- cloud_storage ------------------------------------------------------------

pub fn flatten_cloud_storage(storage: Option<&CloudStorage>) -> Value {
    let storage = storage.copied().unwrap_or_default();
    object([("enable", Value::Bool(storage.enable))])
}

pub fn expand_cloud_storage(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<CloudStorage> {
    let fields = expect_object(value, path, diags)?;
    let enable = fields.bool("enable", diags).unwrap_or_default();
    if diags.has_error() {
        return None;
    }
    Some(CloudStorage { enable })
}

// -- logging ------------------------------------------------------------------

pub fn flatten_logging(logging: Option<&LoggingConfig>, prior: &Value) -> Value {
    let Some(logging) = logging else {
        return Value::Null;
    };
    if logging == &LoggingConfig::default() && !matches!(prior, Value::Map(_)) {
        return Value::Null;
    }
    object_or_null(
        [
            ("enabled", Value::Bool(logging.enabled)),
            (
                "folder_id",
                logging.folder_id.as_deref().map_or(Value::Null, string_or_null),
            ),
            (
                "log_group_id",
                logging.log_group_id.as_deref().map_or(Value::Null, string_or_null),
            ),
            ("command_center_enabled", Value::Bool(logging.command_center_enabled)),
            ("greenplum_enabled", Value::Bool(logging.greenplum_enabled)),
            ("pooler_enabled", Value::Bool(logging.pooler_enabled)),
        ],
        prior,
    )
}

pub fn expand_logging(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<LoggingConfig> {
    let fields = expect_object(value, path, diags)?;
    let flag = |name: &str, diags: &mut Diagnostics| fields.bool(name, diags).unwrap_or_default();

    let logging = LoggingConfig {
        enabled: flag("enabled", diags),
        folder_id: fields.string("folder_id", diags),
        log_group_id: fields.string("log_group_id", diags),
        command_center_enabled: flag("command_center_enabled", diags),
        greenplum_enabled: flag("greenplum_enabled", diags),
        pooler_enabled: flag("pooler_enabled", diags),
    };
    if logging.folder_id.is_some() && logging.log_group_id.is_some() {
        diags.add_attribute_error(
            &fields.path("log_group_id"),
            "Invalid attribute combination",
            "conflicts with folder_id",
        );
    }
    if diags.has_error() {
        return None;
    }
    Some(logging)
}

// -- computed lists -----------------------------------------------------------

pub fn flatten_monitoring(monitoring: &[Monitoring]) -> Value {
    Value::List(
        monitoring
            .iter()
            .map(|m| {
                object([
                    ("name", string_or_null(&m.name)),
                    ("description", string_or_null(&m.description)),
                    ("link", string_or_null(&m.link)),
                ])
            })
            .collect(),
    )
}

/// Hosts ordered by FQDN so reads are stable
pub fn flatten_hosts(hosts: &[Host]) -> Value {
    let mut hosts: Vec<&Host> = hosts.iter().collect();
    hosts.sort_by(|a, b| a.name.cmp(&b.name));
    Value::List(
        hosts
            .into_iter()
            .map(|h| {
                object([
                    ("fqdn", string_or_null(&h.name)),
                    ("assign_public_ip", bool_or_null(Some(h.assign_public_ip))),
                ])
            })
            .collect(),
    )
}

// -- restore ------------------------------------------------------------------

/// Backup to restore from, and the optional point in time
pub struct RestoreSource {
    pub backup_id: String,
    pub time: Option<DateTime<Utc>>,
}

/// `restore` is never returned by the API; reads carry it over from prior state
pub fn expand_restore(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<RestoreSource> {
    let fields: Fields<'_> = expect_object(value, path, diags)?;
    let backup_id = fields.required_string("backup_id", diags);
    let time = fields.timestamp("time", diags);
    if diags.has_error() {
        return None;
    }
    Some(RestoreSource {
        backup_id: backup_id?,
        time,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expand<T>(
        f: fn(&Value, &AttributePath, &mut Diagnostics) -> Option<T>,
        value: &Value,
    ) -> (Option<T>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let out = f(value, &AttributePath::new("block"), &mut diags);
        (out, diags)
    }

    #[test]
    fn resources_round_trip_in_gib() {
        let resources = Resources {
            resource_preset_id: "s2.medium".to_string(),
            disk_size: 100 * GIB,
            disk_type_id: "network-ssd-nonreplicated".to_string(),
        };
        let flat = flatten_resources(&resources);
        assert_eq!(flat.field("disk_size"), &Value::Int(100));
        let (back, diags) = expand(expand_resources, &flat);
        assert!(diags.is_empty());
        assert_eq!(back, Some(resources));
    }

    #[test]
    fn resources_report_every_missing_field() {
        let value = Value::object([("disk_size", Value::Int(10))]);
        let (out, diags) = expand(expand_resources, &value);
        assert!(out.is_none());
        let paths: Vec<String> = diags
            .errors()
            .filter_map(|d| d.path.as_ref().map(|p| p.to_string()))
            .collect();
        assert_eq!(paths, vec!["block.resource_preset_id", "block.disk_type_id"]);
    }

    #[test]
    fn subcluster_round_trip() {
        let config = SubclusterConfig {
            resources: Some(Resources {
                resource_preset_id: "s2.micro".to_string(),
                disk_size: 10 * GIB,
                disk_type_id: "network-hdd".to_string(),
            }),
        };
        let (back, _) = expand(expand_subcluster, &flatten_subcluster(Some(&config)));
        assert_eq!(back, Some(config));
        assert_eq!(flatten_subcluster(None), Value::Null);
    }

    #[test]
    fn maintenance_window_round_trip() {
        for window in [MaintenanceWindow::anytime(), MaintenanceWindow::weekly(WeekDay::Tue, 24)] {
            let (back, diags) = expand(expand_maintenance_window, &flatten_maintenance_window(Some(&window)));
            assert!(diags.is_empty());
            assert_eq!(back, Some(window));
        }
        assert_eq!(
            flatten_maintenance_window(None),
            Value::object([("type", Value::from("ANYTIME"))])
        );
    }

    #[test]
    fn weekly_window_rejects_bad_day() {
        let value = Value::object([
            ("type", Value::from("WEEKLY")),
            ("day", Value::from("FUNDAY")),
            ("hour", Value::Int(2)),
        ]);
        let (out, diags) = expand(expand_maintenance_window, &value);
        assert!(out.is_none());
        assert!(diags.to_string().contains("block.day"));
    }

    #[test]
    fn cloud_storage_absent_reads_disabled() {
        assert_eq!(
            flatten_cloud_storage(None),
            Value::object([("enable", Value::Bool(false))])
        );
        let storage = CloudStorage { enable: true };
        let (back, _) = expand(expand_cloud_storage, &flatten_cloud_storage(Some(&storage)));
        assert_eq!(back, Some(storage));
    }

    #[test]
    fn logging_round_trip_and_null_default() {
        let logging = LoggingConfig {
            enabled: true,
            folder_id: None,
            log_group_id: Some("e23log".to_string()),
            command_center_enabled: false,
            greenplum_enabled: true,
            pooler_enabled: true,
        };
        let flat = flatten_logging(Some(&logging), &Value::Null);
        let (back, _) = expand(expand_logging, &flat);
        assert_eq!(back, Some(logging));

        assert_eq!(flatten_logging(Some(&LoggingConfig::default()), &Value::Null), Value::Null);
        assert_eq!(flatten_logging(None, &Value::Null), Value::Null);
        assert!(matches!(
            flatten_logging(Some(&LoggingConfig::default()), &Value::object([("enabled", Value::Bool(true))])),
            Value::Map(_)
        ));
    }

    #[test]
    fn hosts_are_sorted_by_fqdn() {
        let hosts = vec![
            Host {
                name: "rc1b-2.mdb.yandexcloud.net".to_string(),
                ..Default::default()
            },
            Host {
                name: "rc1a-1.mdb.yandexcloud.net".to_string(),
                assign_public_ip: true,
                ..Default::default()
            },
        ];
        let flat = flatten_hosts(&hosts);
        let items = flat.as_items().unwrap();
        assert_eq!(items[0].field("fqdn"), &Value::from("rc1a-1.mdb.yandexcloud.net"));
        assert_eq!(items[0].field("assign_public_ip"), &Value::Bool(true));
    }

    #[test]
    fn restore_requires_backup_and_valid_time() {
        let value = Value::object([("time", Value::from("not-a-time"))]);
        let (out, diags) = expand(expand_restore, &value);
        assert!(out.is_none());
        assert_eq!(diags.errors().count(), 2);

        let value = Value::object([
            ("backup_id", Value::from("c9q.bk1")),
            ("time", Value::from("2024-03-01T10:00:00Z")),
        ]);
        let (out, _) = expand(expand_restore, &value);
        let source = out.unwrap();
        assert_eq!(source.backup_id, "c9q.bk1");
        assert!(source.time.is_some());
    }
}
