use serde::{Deserialize, Serialize};

use super::int64;

/// Effective, user-set and default values of each configurable component
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClusterConfigSet {
    #[serde(rename = "greenplumConfigSet_6", skip_serializing_if = "Option::is_none")]
    pub greenplum_config_set_6: Option<GreenplumConfigSet6>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<ConnectionPoolerConfigSet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_activities: Option<BackgroundActivitiesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pxf_config: Option<PxfConfigSet>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GreenplumConfigSet6 {
    pub effective_config: Option<GreenplumConfig6>,
    pub user_config: Option<GreenplumConfig6>,
    pub default_config: Option<GreenplumConfig6>,
}

api_enum! {
    LogStatement, "LOG_STATEMENT_UNSPECIFIED" {
        None => "NONE",
        Ddl => "DDL",
        Mod => "MOD",
        All => "ALL",
    }
}

/// Greenplum 6 server settings exposed by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GreenplumConfig6 {
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub max_slot_wal_keep_size: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub gp_workfile_limit_per_segment: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub gp_workfile_limit_per_query: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub gp_workfile_limit_files_per_query: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub max_prepared_transactions: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gp_workfile_compression: Option<bool>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub max_statement_mem: Option<i64>,
    #[serde(skip_serializing_if = "LogStatement::is_unspecified")]
    pub log_statement: LogStatement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gp_add_column_inherits_table_setting: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gp_enable_global_deadlock_detector: Option<bool>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub gp_global_deadlock_detector_period: Option<i64>,
}

api_enum! {
    PoolMode, "POOL_MODE_UNSPECIFIED" {
        Session => "SESSION",
        Transaction => "TRANSACTION",
    }
}

/// Odyssey connection pooler in front of the master
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionPoolerConfig {
    #[serde(skip_serializing_if = "PoolMode::is_unspecified")]
    pub mode: PoolMode,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub size: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub client_idle_timeout: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub idle_in_transaction_timeout: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConnectionPoolerConfigSet {
    pub effective_config: Option<ConnectionPoolerConfig>,
    pub user_config: Option<ConnectionPoolerConfig>,
    pub default_config: Option<ConnectionPoolerConfig>,
}

/// Platform Extension Framework service settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PxfConfig {
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub connection_timeout: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub upload_timeout: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub max_threads: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool_allow_core_thread_timeout: Option<bool>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub pool_core_size: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub pool_queue_capacity: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub pool_max_size: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub xmx: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub xms: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PxfConfigSet {
    pub effective_config: Option<PxfConfig>,
    pub user_config: Option<PxfConfig>,
    pub default_config: Option<PxfConfig>,
}

/// Scheduled maintenance scripts run by the service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackgroundActivitiesConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analyze_and_vacuum: Option<AnalyzeAndVacuum>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_killer_scripts: Option<QueryKillerScripts>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyzeAndVacuum {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start: Option<BackgroundActivityStartAt>,
    /// Seconds
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub analyze_timeout: Option<i64>,
    /// Seconds
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub vacuum_timeout: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BackgroundActivityStartAt {
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub hours: Option<i64>,
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub minutes: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryKillerScripts {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle: Option<QueryKiller>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_in_transaction: Option<QueryKiller>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_running: Option<QueryKiller>,
}

/// Terminates sessions matching a script's condition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryKiller {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable: Option<bool>,
    /// Seconds
    #[serde(with = "int64::option", skip_serializing_if = "Option::is_none")]
    pub max_age: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ignore_users: Vec<String>,
}

/// User-set configuration sent on create and update
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigSpec {
    #[serde(rename = "greenplumConfig_6", skip_serializing_if = "Option::is_none")]
    pub greenplum_config_6: Option<GreenplumConfig6>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<ConnectionPoolerConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub background_activities: Option<BackgroundActivitiesConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pxf_config: Option<PxfConfig>,
}

impl ConfigSpec {
    pub fn is_empty(&self) -> bool {
        self == &ConfigSpec::default()
    }
}
