use mdbform_core::resource::Value;
use mdbform_core::schema::{AttributeSchema, AttributeType, types};
use mdbform_core::validator::Validator;

use super::{GREENPLUM_CONFIG_KEYS, enum_type};
use crate::api::PoolMode;

fn int_between(name: &str, api: &str, min: i64, max: i64) -> AttributeSchema {
    AttributeSchema::new(name, AttributeType::Int)
        .with_validator(Validator::IntBetween { min, max })
        .with_provider_name(api)
}

fn time_of_day_type() -> AttributeType {
    AttributeType::Object(vec![
        int_between("hours", "hours", 0, 23).with_default(Value::Int(0)),
        int_between("minutes", "minutes", 0, 59).with_default(Value::Int(0)),
    ])
}

fn access_type() -> AttributeType {
    let flag = |name: &str, api: &str| {
        AttributeSchema::new(name, AttributeType::Bool)
            .with_default(Value::Bool(false))
            .with_provider_name(api)
    };
    AttributeType::Object(vec![
        flag("data_lens", "dataLens"),
        flag("web_sql", "webSql"),
        flag("data_transfer", "dataTransfer"),
        flag("yandex_query", "yandexQuery"),
    ])
}

/// Server-side defaults fill in everything left unset here
fn background_activities_type() -> AttributeType {
    let start = AttributeType::Object(vec![
        int_between("hours", "hours", 0, 23).optional_computed(),
        int_between("minutes", "minutes", 0, 59).optional_computed(),
    ]);
    let analyze_and_vacuum = AttributeType::Object(vec![
        AttributeSchema::new("start", start)
            .optional_computed()
            .with_description("Daily start time (UTC)"),
        AttributeSchema::new("analyze_timeout", AttributeType::Int)
            .optional_computed()
            .with_validator(Validator::IntAtLeast(1))
            .with_description("Maximum ANALYZE duration, seconds")
            .with_provider_name("analyzeTimeout"),
        AttributeSchema::new("vacuum_timeout", AttributeType::Int)
            .optional_computed()
            .with_validator(Validator::IntAtLeast(1))
            .with_description("Maximum VACUUM duration, seconds")
            .with_provider_name("vacuumTimeout"),
    ]);
    let query_killer = || {
        AttributeType::Object(vec![
            AttributeSchema::new("enable", AttributeType::Bool).optional_computed(),
            AttributeSchema::new("max_age", AttributeType::Int)
                .optional_computed()
                .with_validator(Validator::IntAtLeast(1))
                .with_description("Seconds before a matching session is terminated")
                .with_provider_name("maxAge"),
            AttributeSchema::new("ignore_users", types::string_set())
                .optional_computed()
                .with_provider_name("ignoreUsers"),
        ])
    };

    AttributeType::Object(vec![
        AttributeSchema::new("analyze_and_vacuum", analyze_and_vacuum)
            .optional_computed()
            .with_provider_name("analyzeAndVacuum"),
        AttributeSchema::new("query_killer_idle", query_killer())
            .optional_computed()
            .with_description("Terminate idle sessions")
            .with_provider_name("queryKillerScripts.idle"),
        AttributeSchema::new("query_killer_idle_in_transaction", query_killer())
            .optional_computed()
            .with_description("Terminate sessions idle in an open transaction")
            .with_provider_name("queryKillerScripts.idleInTransaction"),
        AttributeSchema::new("query_killer_long_running", query_killer())
            .optional_computed()
            .with_description("Terminate long running queries")
            .with_provider_name("queryKillerScripts.longRunning"),
    ])
}

fn pxf_config_type() -> AttributeType {
    AttributeType::Object(vec![
        int_between("connection_timeout", "connectionTimeout", 5, 600),
        int_between("upload_timeout", "uploadTimeout", 5, 600),
        int_between("max_threads", "maxThreads", 1, 1024),
        AttributeSchema::new("pool_allow_core_thread_timeout", AttributeType::Bool)
            .with_provider_name("poolAllowCoreThreadTimeout"),
        int_between("pool_core_size", "poolCoreSize", 1, 512),
        AttributeSchema::new("pool_queue_capacity", AttributeType::Int)
            .with_validator(Validator::IntAtLeast(0))
            .with_provider_name("poolQueueCapacity"),
        int_between("pool_max_size", "poolMaxSize", 1, 512),
        int_between("xmx", "xmx", 64, 16384).with_description("JVM maximum heap, MiB"),
        int_between("xms", "xms", 64, 16384).with_description("JVM initial heap, MiB"),
    ])
}

/// `cluster_config` block: backups, access and service-managed activities
pub fn cluster_config_type() -> AttributeType {
    AttributeType::Object(vec![
        AttributeSchema::new("backup_window_start", time_of_day_type())
            .optional_computed()
            .with_description("Daily backup start time (UTC)")
            .with_provider_name("config.backupWindowStart"),
        AttributeSchema::new("backup_retain_period_days", AttributeType::Int)
            .optional_computed()
            .with_validator(Validator::IntBetween { min: 1, max: 60 })
            .with_provider_name("config.backupRetainPeriodDays"),
        AttributeSchema::new("access", access_type())
            .optional_computed()
            .with_provider_name("config.access"),
        AttributeSchema::new("background_activities", background_activities_type())
            .optional_computed()
            .use_state_for_unknown()
            .with_provider_name("clusterConfig.backgroundActivities"),
        AttributeSchema::new("pxf_config", pxf_config_type())
            .with_provider_name("clusterConfig.pxfConfig.userConfig"),
    ])
}

/// `config` block: Greenplum server and pooler settings set by the user
pub fn config_type() -> AttributeType {
    let pooler = AttributeType::Object(vec![
        AttributeSchema::new("pooling_mode", enum_type(PoolMode::VARIANTS))
            .with_provider_name("mode"),
        AttributeSchema::new("pool_size", AttributeType::Int)
            .with_validator(Validator::IntAtLeast(0))
            .with_provider_name("size"),
        AttributeSchema::new("pool_client_idle_timeout", AttributeType::Int)
            .with_validator(Validator::IntAtLeast(0))
            .with_description("Seconds; 0 disables the timeout")
            .with_provider_name("clientIdleTimeout"),
        AttributeSchema::new("pool_idle_in_transaction_timeout", AttributeType::Int)
            .with_validator(Validator::IntAtLeast(0))
            .with_description("Seconds; 0 disables the timeout")
            .with_provider_name("idleInTransactionTimeout"),
    ]);

    AttributeType::Object(vec![
        AttributeSchema::new("greenplum_config", types::string_map())
            .with_validator(Validator::MapKeysOneOf(
                GREENPLUM_CONFIG_KEYS.iter().map(|k| k.to_string()).collect(),
            ))
            .with_description("Server settings by name; values are strings")
            .with_provider_name("clusterConfig.greenplumConfigSet_6.userConfig"),
        AttributeSchema::new("pooler_config", pooler)
            .with_provider_name("clusterConfig.pool.userConfig"),
    ])
}
