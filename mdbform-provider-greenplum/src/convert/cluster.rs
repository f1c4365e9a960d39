//! Whole-cluster conversions built from the per-block pairs

use std::collections::HashMap;

use mdbform_core::diagnostics::{AttributePath, Diagnostics};
use mdbform_core::resource::Value;

use super::blocks::{
    expand_cloud_storage, expand_logging, expand_maintenance_window, expand_restore,
    expand_subcluster, flatten_cloud_storage, flatten_hosts, flatten_logging,
    flatten_maintenance_window, flatten_monitoring, flatten_subcluster,
};
use super::cluster_config::{
    expand_access, expand_background_activities, expand_pxf_config, expand_time_of_day,
    flatten_access, flatten_background_activities, flatten_pxf_config, flatten_time_of_day,
};
use super::config::{
    expand_greenplum_config, expand_pooler_config, flatten_greenplum_config, flatten_pooler_config,
};
use super::values::{
    Fields, int_or_null, object, object_or_null, require, string_map, string_or_null, string_set,
    timestamp,
};
use crate::api::{
    Cluster, ConfigSpec, CreateClusterRequest, Environment, GreenplumConfig, Host,
    RestoreClusterRequest, UpdateClusterRequest,
};

fn enum_or_null(name: &str, unspecified: bool) -> Value {
    if unspecified {
        Value::Null
    } else {
        Value::from(name)
    }
}

fn flatten_cluster_config(cluster: &Cluster, prior: &Value) -> Value {
    let config = cluster.config.as_ref();
    let sets = cluster.cluster_config.as_ref();
    object([
        (
            "backup_window_start",
            flatten_time_of_day(config.and_then(|c| c.backup_window_start.as_ref())),
        ),
        (
            "backup_retain_period_days",
            int_or_null(config.and_then(|c| c.backup_retain_period_days)),
        ),
        ("access", flatten_access(config.and_then(|c| c.access.as_ref()))),
        (
            "background_activities",
            flatten_background_activities(
                sets.and_then(|s| s.background_activities.as_ref()),
                prior.field("background_activities"),
            ),
        ),
        (
            "pxf_config",
            flatten_pxf_config(
                sets.and_then(|s| s.pxf_config.as_ref())
                    .and_then(|p| p.user_config.as_ref()),
                prior.field("pxf_config"),
            ),
        ),
    ])
}

fn flatten_config(cluster: &Cluster, prior: &Value) -> Value {
    let sets = cluster.cluster_config.as_ref();
    object_or_null(
        [
            (
                "greenplum_config",
                flatten_greenplum_config(
                    sets.and_then(|s| s.greenplum_config_set_6.as_ref())
                        .and_then(|s| s.user_config.as_ref()),
                    prior.field("greenplum_config"),
                ),
            ),
            (
                "pooler_config",
                flatten_pooler_config(
                    sets.and_then(|s| s.pool.as_ref())
                        .and_then(|s| s.user_config.as_ref()),
                    prior.field("pooler_config"),
                ),
            ),
        ],
        prior,
    )
}

/// Resource attributes from a cluster and its hosts
///
/// `prior` decides between `Null` and empty collections and supplies the
/// attributes the API never returns (`user_password`, `restore`).
pub fn flatten_cluster(
    cluster: &Cluster,
    master_hosts: &[Host],
    segment_hosts: &[Host],
    prior: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let prior_value = |name: &str| prior.get(name).unwrap_or(Value::null_ref());
    let config = cluster.config.clone().unwrap_or_default();

    let attributes = [
        ("id", string_or_null(&cluster.id)),
        ("folder_id", string_or_null(&cluster.folder_id)),
        ("name", string_or_null(&cluster.name)),
        ("description", string_or_null(&cluster.description)),
        ("labels", string_map(&cluster.labels, prior_value("labels"))),
        (
            "environment",
            enum_or_null(cluster.environment.as_str(), cluster.environment.is_unspecified()),
        ),
        ("network_id", string_or_null(&cluster.network_id)),
        ("zone_id", string_or_null(&config.zone_id)),
        ("subnet_id", string_or_null(&config.subnet_id)),
        ("assign_public_ip", Value::Bool(config.assign_public_ip)),
        ("version", string_or_null(&config.version)),
        ("master_host_count", Value::Int(cluster.master_host_count)),
        ("segment_host_count", Value::Int(cluster.segment_host_count)),
        ("segment_in_host", Value::Int(cluster.segment_in_host)),
        ("master_config", flatten_subcluster(cluster.master_config.as_ref())),
        ("segment_config", flatten_subcluster(cluster.segment_config.as_ref())),
        ("user_name", string_or_null(&cluster.user_name)),
        ("user_password", prior_value("user_password").clone()),
        (
            "security_group_ids",
            string_set(&cluster.security_group_ids, prior_value("security_group_ids")),
        ),
        ("deletion_protection", Value::Bool(cluster.deletion_protection)),
        ("service_account_id", string_or_null(&cluster.service_account_id)),
        (
            "master_host_group_ids",
            string_set(&cluster.master_host_group_ids, prior_value("master_host_group_ids")),
        ),
        (
            "segment_host_group_ids",
            string_set(&cluster.segment_host_group_ids, prior_value("segment_host_group_ids")),
        ),
        (
            "maintenance_window",
            flatten_maintenance_window(cluster.maintenance_window.as_ref()),
        ),
        (
            "cluster_config",
            flatten_cluster_config(cluster, prior_value("cluster_config")),
        ),
        ("config", flatten_config(cluster, prior_value("config"))),
        ("cloud_storage", flatten_cloud_storage(cluster.cloud_storage.as_ref())),
        (
            "logging",
            flatten_logging(cluster.logging.as_ref(), prior_value("logging")),
        ),
        ("restore", prior_value("restore").clone()),
        ("created_at", timestamp(cluster.created_at.as_ref())),
        ("health", Value::from(cluster.health.as_str())),
        (
            "status",
            enum_or_null(cluster.status.as_str(), cluster.status.is_unspecified()),
        ),
        ("monitoring", flatten_monitoring(&cluster.monitoring)),
        ("master_hosts", flatten_hosts(master_hosts)),
        ("segment_hosts", flatten_hosts(segment_hosts)),
    ];

    attributes
        .into_iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

/// Full cluster specification as a create request
///
/// `folder_id` is left empty when unset; callers fill in their default.
pub fn expand_cluster(
    attributes: &HashMap<String, Value>,
    diags: &mut Diagnostics,
) -> Option<CreateClusterRequest> {
    let fields = Fields::new(attributes, AttributePath::root());
    let cluster_config = fields.object("cluster_config", diags);
    let config_block = fields.object("config", diags);

    let config = GreenplumConfig {
        version: fields.required_string("version", diags).unwrap_or_default(),
        backup_window_start: cluster_config.as_ref().and_then(|c| {
            expand_time_of_day(c.get("backup_window_start"), &c.path("backup_window_start"), diags)
        }),
        backup_retain_period_days: cluster_config
            .as_ref()
            .and_then(|c| c.int("backup_retain_period_days", diags)),
        access: cluster_config
            .as_ref()
            .and_then(|c| expand_access(c.get("access"), &c.path("access"), diags)),
        zone_id: fields.required_string("zone_id", diags).unwrap_or_default(),
        subnet_id: fields.string("subnet_id", diags).unwrap_or_default(),
        assign_public_ip: fields.bool("assign_public_ip", diags).unwrap_or_default(),
    };

    let config_spec = ConfigSpec {
        greenplum_config_6: config_block.as_ref().and_then(|c| {
            expand_greenplum_config(c.get("greenplum_config"), &c.path("greenplum_config"), diags)
        }),
        pool: config_block.as_ref().and_then(|c| {
            expand_pooler_config(c.get("pooler_config"), &c.path("pooler_config"), diags)
        }),
        background_activities: cluster_config.as_ref().and_then(|c| {
            expand_background_activities(
                c.get("background_activities"),
                &c.path("background_activities"),
                diags,
            )
        }),
        pxf_config: cluster_config
            .as_ref()
            .and_then(|c| expand_pxf_config(c.get("pxf_config"), &c.path("pxf_config"), diags)),
    };

    let subcluster = |name: &str, diags: &mut Diagnostics| {
        if require(fields.get(name), &fields.path(name), diags) {
            expand_subcluster(fields.get(name), &fields.path(name), diags)
        } else {
            None
        }
    };
    let master_config = subcluster("master_config", diags);
    let segment_config = subcluster("segment_config", diags);

    let request = CreateClusterRequest {
        folder_id: fields.string("folder_id", diags).unwrap_or_default(),
        name: fields.required_string("name", diags).unwrap_or_default(),
        description: fields.string("description", diags).unwrap_or_default(),
        labels: fields.string_map("labels", diags),
        environment: fields
            .required_enumeration("environment", Environment::parse, diags)
            .unwrap_or_default(),
        config: Some(config),
        master_config,
        segment_config,
        master_host_count: fields.required_int("master_host_count", diags).unwrap_or_default(),
        segment_in_host: fields.required_int("segment_in_host", diags).unwrap_or_default(),
        segment_host_count: fields.required_int("segment_host_count", diags).unwrap_or_default(),
        user_name: fields.required_string("user_name", diags).unwrap_or_default(),
        user_password: fields.required_string("user_password", diags).unwrap_or_default(),
        network_id: fields.required_string("network_id", diags).unwrap_or_default(),
        security_group_ids: fields.strings("security_group_ids", diags),
        deletion_protection: fields.bool("deletion_protection", diags).unwrap_or_default(),
        maintenance_window: expand_maintenance_window(
            fields.get("maintenance_window"),
            &fields.path("maintenance_window"),
            diags,
        ),
        config_spec: (!config_spec.is_empty()).then_some(config_spec),
        cloud_storage: expand_cloud_storage(
            fields.get("cloud_storage"),
            &fields.path("cloud_storage"),
            diags,
        ),
        master_host_group_ids: fields.strings("master_host_group_ids", diags),
        segment_host_group_ids: fields.strings("segment_host_group_ids", diags),
        service_account_id: fields.string("service_account_id", diags).unwrap_or_default(),
        logging: expand_logging(fields.get("logging"), &fields.path("logging"), diags),
    };

    if diags.has_error() {
        return None;
    }
    Some(request)
}

/// Update request applying `update_mask` to the cluster
pub fn expand_update(
    attributes: &HashMap<String, Value>,
    cluster_id: &str,
    update_mask: Vec<String>,
    diags: &mut Diagnostics,
) -> Option<UpdateClusterRequest> {
    let spec = expand_cluster(attributes, diags)?;
    Some(UpdateClusterRequest {
        cluster_id: cluster_id.to_string(),
        update_mask,
        description: spec.description,
        labels: spec.labels,
        name: spec.name,
        config: spec.config,
        master_config: spec.master_config,
        segment_config: spec.segment_config,
        maintenance_window: spec.maintenance_window,
        security_group_ids: spec.security_group_ids,
        deletion_protection: spec.deletion_protection,
        config_spec: spec.config_spec,
        cloud_storage: spec.cloud_storage,
        service_account_id: spec.service_account_id,
        logging: spec.logging,
        user_password: spec.user_password,
    })
}

/// Restore request when the `restore` block is set, `None` otherwise
///
/// Errors are reported through `diags`; check it to tell the cases apart.
pub fn expand_restore_request(
    attributes: &HashMap<String, Value>,
    spec: &CreateClusterRequest,
    diags: &mut Diagnostics,
) -> Option<RestoreClusterRequest> {
    let value = attributes.get("restore").unwrap_or(Value::null_ref());
    let source = expand_restore(value, &AttributePath::new("restore"), diags)?;
    Some(RestoreClusterRequest::from_create(
        spec,
        source.backup_id,
        source.time,
    ))
}
