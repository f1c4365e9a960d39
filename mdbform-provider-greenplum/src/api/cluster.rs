use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ClusterConfigSet, int64};

api_enum! {
    /// Deployment environment of a cluster
    Environment, "ENVIRONMENT_UNSPECIFIED" {
        Production => "PRODUCTION",
        Prestable => "PRESTABLE",
    }
}

api_enum! {
    /// Aggregated health of a cluster
    Health, "HEALTH_UNKNOWN" {
        Alive => "ALIVE",
        Dead => "DEAD",
        Degraded => "DEGRADED",
        Unbalanced => "UNBALANCED",
    }
}

api_enum! {
    ClusterStatus, "STATUS_UNKNOWN" {
        Creating => "CREATING",
        Running => "RUNNING",
        Error => "ERROR",
        Updating => "UPDATING",
        Stopping => "STOPPING",
        Stopped => "STOPPED",
        Starting => "STARTING",
    }
}

api_enum! {
    WeekDay, "WEEK_DAY_UNSPECIFIED" {
        Mon => "MON",
        Tue => "TUE",
        Wed => "WED",
        Thu => "THU",
        Fri => "FRI",
        Sat => "SAT",
        Sun => "SUN",
    }
}

api_enum! {
    HostType, "TYPE_UNSPECIFIED" {
        Master => "MASTER",
        Replica => "REPLICA",
        Segment => "SEGMENT",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Cluster {
    pub id: String,
    pub folder_id: String,
    pub created_at: Option<DateTime<Utc>>,
    pub name: String,
    pub config: Option<GreenplumConfig>,
    pub description: String,
    pub labels: HashMap<String, String>,
    pub environment: Environment,
    pub monitoring: Vec<Monitoring>,
    pub master_config: Option<SubclusterConfig>,
    pub segment_config: Option<SubclusterConfig>,
    #[serde(with = "int64")]
    pub master_host_count: i64,
    #[serde(with = "int64")]
    pub segment_host_count: i64,
    #[serde(with = "int64")]
    pub segment_in_host: i64,
    pub network_id: String,
    pub health: Health,
    pub status: ClusterStatus,
    pub maintenance_window: Option<MaintenanceWindow>,
    pub planned_operation: Option<MaintenanceOperation>,
    pub security_group_ids: Vec<String>,
    pub user_name: String,
    pub deletion_protection: bool,
    pub host_group_ids: Vec<String>,
    pub cluster_config: Option<ClusterConfigSet>,
    pub cloud_storage: Option<CloudStorage>,
    pub master_host_group_ids: Vec<String>,
    pub segment_host_group_ids: Vec<String>,
    pub service_account_id: String,
    pub logging: Option<LoggingConfig>,
}

/// Cluster-wide settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GreenplumConfig {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backup_window_start: Option<TimeOfDay>,
    #[serde(
        with = "int64::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub backup_retain_period_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access: Option<Access>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub zone_id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub subnet_id: String,
    pub assign_public_ip: bool,
}

/// Services allowed to reach the cluster
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Access {
    pub data_lens: bool,
    pub web_sql: bool,
    pub data_transfer: bool,
    pub yandex_query: bool,
}

/// `google.type.TimeOfDay`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TimeOfDay {
    pub hours: i32,
    pub minutes: i32,
    pub seconds: i32,
    pub nanos: i32,
}

/// Master or segment subcluster; creation and update use the same shape
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SubclusterConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
}

pub type MasterSubclusterConfig = SubclusterConfig;
pub type SegmentSubclusterConfig = SubclusterConfig;

/// Compute and storage of every host in a subcluster
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Resources {
    pub resource_preset_id: String,
    #[serde(with = "int64")]
    pub disk_size: i64,
    pub disk_type_id: String,
}

/// Oneof: exactly one policy is set
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaintenanceWindow {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anytime: Option<AnytimeMaintenanceWindow>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weekly_maintenance_window: Option<WeeklyMaintenanceWindow>,
}

impl MaintenanceWindow {
    pub fn anytime() -> Self {
        Self {
            anytime: Some(AnytimeMaintenanceWindow {}),
            weekly_maintenance_window: None,
        }
    }

    pub fn weekly(day: WeekDay, hour: i64) -> Self {
        Self {
            anytime: None,
            weekly_maintenance_window: Some(WeeklyMaintenanceWindow { day, hour }),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnytimeMaintenanceWindow {}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeeklyMaintenanceWindow {
    pub day: WeekDay,
    /// Hour of the day in UTC, 1..=24
    #[serde(with = "int64")]
    pub hour: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MaintenanceOperation {
    pub info: String,
    pub delayed_until: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CloudStorage {
    pub enable: bool,
}

/// Log delivery to Cloud Logging; `folder_id` and `log_group_id` are a oneof
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingConfig {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub folder_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_group_id: Option<String>,
    pub command_center_enabled: bool,
    pub greenplum_enabled: bool,
    pub pooler_enabled: bool,
}

/// Link to a monitoring system
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Monitoring {
    pub name: String,
    pub description: String,
    pub link: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Host {
    pub name: String,
    pub cluster_id: String,
    pub zone_id: String,
    #[serde(rename = "type")]
    pub host_type: HostType,
    pub resources: Option<Resources>,
    pub health: HostHealth,
    pub subnet_id: String,
    pub assign_public_ip: bool,
}

api_enum! {
    HostHealth, "UNKNOWN" {
        Alive => "ALIVE",
        Dead => "DEAD",
        Degraded => "DEGRADED",
        Unbalanced => "UNBALANCED",
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListHostsResponse {
    pub hosts: Vec<Host>,
    pub next_page_token: String,
}
