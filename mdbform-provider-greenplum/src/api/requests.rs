use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{
    Access, CloudStorage, ConfigSpec, Environment, GreenplumConfig, LoggingConfig,
    MaintenanceWindow, Resources, SubclusterConfig, TimeOfDay, field_mask, int64,
};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CreateClusterRequest {
    pub folder_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    pub environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<GreenplumConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_config: Option<SubclusterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_config: Option<SubclusterConfig>,
    #[serde(with = "int64")]
    pub master_host_count: i64,
    #[serde(with = "int64")]
    pub segment_in_host: i64,
    #[serde(with = "int64")]
    pub segment_host_count: i64,
    pub user_name: String,
    pub user_password: String,
    pub network_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    pub deletion_protection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_spec: Option<ConfigSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_storage: Option<CloudStorage>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub master_host_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segment_host_group_ids: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Partial update; only the fields named in `update_mask` are applied
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateClusterRequest {
    /// Carried in the URL path
    #[serde(skip)]
    pub cluster_id: String,
    #[serde(with = "field_mask")]
    pub update_mask: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<GreenplumConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_config: Option<SubclusterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_config: Option<SubclusterConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    pub deletion_protection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_spec: Option<ConfigSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cloud_storage: Option<CloudStorage>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_account_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub user_password: String,
}

/// Cluster settings a restore may override
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GreenplumRestoreConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_window_start: Option<TimeOfDay>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zone_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subnet_id: String,
    pub assign_public_ip: bool,
}

/// Create a new cluster from a backup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RestoreClusterRequest {
    pub backup_id: String,
    /// Point in time to restore to; latest state of the backup when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<DateTime<Utc>>,
    pub folder_id: String,
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    pub labels: HashMap<String, String>,
    pub environment: Environment,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<GreenplumRestoreConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub master_resources: Option<Resources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub segment_resources: Option<Resources>,
    pub network_id: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub security_group_ids: Vec<String>,
    pub deletion_protection: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maintenance_window: Option<MaintenanceWindow>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub service_account_id: String,
    #[serde(with = "int64")]
    pub segment_host_count: i64,
    #[serde(with = "int64")]
    pub segment_in_host: i64,
}

impl RestoreClusterRequest {
    /// Restore request carrying the settings of a create request
    pub fn from_create(
        request: &CreateClusterRequest,
        backup_id: impl Into<String>,
        time: Option<DateTime<Utc>>,
    ) -> Self {
        let config = request.config.as_ref().map(|c| GreenplumRestoreConfig {
            backup_window_start: c.backup_window_start,
            access: c.access,
            zone_id: c.zone_id.clone(),
            subnet_id: c.subnet_id.clone(),
            assign_public_ip: c.assign_public_ip,
        });
        let resources = |sub: &Option<SubclusterConfig>| {
            sub.as_ref().and_then(|s| s.resources.clone())
        };

        Self {
            backup_id: backup_id.into(),
            time,
            folder_id: request.folder_id.clone(),
            name: request.name.clone(),
            description: request.description.clone(),
            labels: request.labels.clone(),
            environment: request.environment,
            config,
            master_resources: resources(&request.master_config),
            segment_resources: resources(&request.segment_config),
            network_id: request.network_id.clone(),
            security_group_ids: request.security_group_ids.clone(),
            deletion_protection: request.deletion_protection,
            maintenance_window: request.maintenance_window.clone(),
            service_account_id: request.service_account_id.clone(),
            segment_host_count: request.segment_host_count,
            segment_in_host: request.segment_in_host,
        }
    }
}
