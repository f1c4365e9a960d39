//! `cluster_config` block: backup window, access, background activities, PXF

use mdbform_core::diagnostics::{AttributePath, Diagnostics};
use mdbform_core::resource::Value;

use super::values::{bool_or_null, expect_object, int_or_null, object, object_or_null, string_set};
use crate::api::{
    Access, AnalyzeAndVacuum, BackgroundActivitiesConfig, BackgroundActivityStartAt, PxfConfig,
    QueryKiller, QueryKillerScripts, TimeOfDay,
};

// -- backup_window_start ------------------------------------------------------

/// Midnight when the API leaves the window unset
pub fn flatten_time_of_day(time: Option<&TimeOfDay>) -> Value {
    let time = time.copied().unwrap_or_default();
    object([
        ("hours", Value::Int(i64::from(time.hours))),
        ("minutes", Value::Int(i64::from(time.minutes))),
    ])
}

pub fn expand_time_of_day(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<TimeOfDay> {
    let fields = expect_object(value, path, diags)?;
    let mut component = |name: &str, max: i64| {
        let n = fields.int(name, diags).unwrap_or_default();
        match i32::try_from(n) {
            Ok(v) if (0..=max).contains(&n) => v,
            _ => {
                diags.add_attribute_error(
                    &fields.path(name),
                    "Invalid attribute value",
                    format!("value must be between 0 and {}, got {}", max, n),
                );
                0
            }
        }
    };
    let hours = component("hours", 23);
    let minutes = component("minutes", 59);
    if diags.has_error() {
        return None;
    }
    Some(TimeOfDay {
        hours,
        minutes,
        ..Default::default()
    })
}

// -- access -------------------------------------------------------------------

/// Every service denied when the API leaves access unset
pub fn flatten_access(access: Option<&Access>) -> Value {
    let access = access.copied().unwrap_or_default();
    object([
        ("data_lens", Value::Bool(access.data_lens)),
        ("web_sql", Value::Bool(access.web_sql)),
        ("data_transfer", Value::Bool(access.data_transfer)),
        ("yandex_query", Value::Bool(access.yandex_query)),
    ])
}

pub fn expand_access(value: &Value, path: &AttributePath, diags: &mut Diagnostics) -> Option<Access> {
    let fields = expect_object(value, path, diags)?;
    let mut flag = |name: &str| fields.bool(name, diags).unwrap_or_default();
    let access = Access {
        data_lens: flag("data_lens"),
        web_sql: flag("web_sql"),
        data_transfer: flag("data_transfer"),
        yandex_query: flag("yandex_query"),
    };
    if diags.has_error() {
        return None;
    }
    Some(access)
}

// -- background_activities ----------------------------------------------------

fn flatten_query_killer(killer: Option<&QueryKiller>, prior: &Value) -> Value {
    let Some(killer) = killer else {
        return Value::Null;
    };
    object_or_null(
        [
            ("enable", bool_or_null(killer.enable)),
            ("max_age", int_or_null(killer.max_age)),
            (
                "ignore_users",
                string_set(&killer.ignore_users, prior.field("ignore_users")),
            ),
        ],
        prior,
    )
}

fn expand_query_killer(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<QueryKiller> {
    let fields = expect_object(value, path, diags)?;
    let killer = QueryKiller {
        enable: fields.bool("enable", diags),
        max_age: fields.int("max_age", diags),
        ignore_users: fields.strings("ignore_users", diags),
    };
    if diags.has_error() {
        return None;
    }
    Some(killer)
}

fn flatten_analyze_and_vacuum(config: Option<&AnalyzeAndVacuum>, prior: &Value) -> Value {
    let Some(config) = config else {
        return Value::Null;
    };
    let start = config.start.map_or(Value::Null, |s| {
        object([("hours", int_or_null(s.hours)), ("minutes", int_or_null(s.minutes))])
    });
    object_or_null(
        [
            ("start", start),
            ("analyze_timeout", int_or_null(config.analyze_timeout)),
            ("vacuum_timeout", int_or_null(config.vacuum_timeout)),
        ],
        prior,
    )
}

fn expand_analyze_and_vacuum(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<AnalyzeAndVacuum> {
    let fields = expect_object(value, path, diags)?;
    // Unset or unknown parts are left to the service
    let start = fields.object("start", diags).map(|start| BackgroundActivityStartAt {
        hours: start.int("hours", diags),
        minutes: start.int("minutes", diags),
    });
    let config = AnalyzeAndVacuum {
        start,
        analyze_timeout: fields.int("analyze_timeout", diags),
        vacuum_timeout: fields.int("vacuum_timeout", diags),
    };
    if diags.has_error() {
        return None;
    }
    Some(config)
}

const QUERY_KILLERS: [&str; 3] = [
    "query_killer_idle",
    "query_killer_idle_in_transaction",
    "query_killer_long_running",
];

pub fn flatten_background_activities(
    config: Option<&BackgroundActivitiesConfig>,
    prior: &Value,
) -> Value {
    let Some(config) = config else {
        return Value::Null;
    };
    let scripts = config.query_killer_scripts.clone().unwrap_or_default();
    let killers = [&scripts.idle, &scripts.idle_in_transaction, &scripts.long_running];

    let mut fields = vec![(
        "analyze_and_vacuum",
        flatten_analyze_and_vacuum(
            config.analyze_and_vacuum.as_ref(),
            prior.field("analyze_and_vacuum"),
        ),
    )];
    for (name, killer) in QUERY_KILLERS.into_iter().zip(killers) {
        fields.push((name, flatten_query_killer(killer.as_ref(), prior.field(name))));
    }
    object_or_null(fields, prior)
}

pub fn expand_background_activities(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<BackgroundActivitiesConfig> {
    let fields = expect_object(value, path, diags)?;
    let analyze_and_vacuum = expand_analyze_and_vacuum(
        fields.get("analyze_and_vacuum"),
        &fields.path("analyze_and_vacuum"),
        diags,
    );
    let [idle, idle_in_transaction, long_running] =
        QUERY_KILLERS.map(|name| expand_query_killer(fields.get(name), &fields.path(name), diags));
    if diags.has_error() {
        return None;
    }

    let scripts = QueryKillerScripts {
        idle,
        idle_in_transaction,
        long_running,
    };
    let query_killer_scripts = (scripts != QueryKillerScripts::default()).then_some(scripts);
    Some(BackgroundActivitiesConfig {
        analyze_and_vacuum,
        query_killer_scripts,
    })
}

// -- pxf_config ---------------------------------------------------------------

/// Only user-set values are tracked; service defaults stay out of state
pub fn flatten_pxf_config(config: Option<&PxfConfig>, prior: &Value) -> Value {
    let Some(config) = config else {
        return Value::Null;
    };
    object_or_null(
        [
            ("connection_timeout", int_or_null(config.connection_timeout)),
            ("upload_timeout", int_or_null(config.upload_timeout)),
            ("max_threads", int_or_null(config.max_threads)),
            (
                "pool_allow_core_thread_timeout",
                bool_or_null(config.pool_allow_core_thread_timeout),
            ),
            ("pool_core_size", int_or_null(config.pool_core_size)),
            ("pool_queue_capacity", int_or_null(config.pool_queue_capacity)),
            ("pool_max_size", int_or_null(config.pool_max_size)),
            ("xmx", int_or_null(config.xmx)),
            ("xms", int_or_null(config.xms)),
        ],
        prior,
    )
}

pub fn expand_pxf_config(
    value: &Value,
    path: &AttributePath,
    diags: &mut Diagnostics,
) -> Option<PxfConfig> {
    let fields = expect_object(value, path, diags)?;
    let config = PxfConfig {
        connection_timeout: fields.int("connection_timeout", diags),
        upload_timeout: fields.int("upload_timeout", diags),
        max_threads: fields.int("max_threads", diags),
        pool_allow_core_thread_timeout: fields.bool("pool_allow_core_thread_timeout", diags),
        pool_core_size: fields.int("pool_core_size", diags),
        pool_queue_capacity: fields.int("pool_queue_capacity", diags),
        pool_max_size: fields.int("pool_max_size", diags),
        xmx: fields.int("xmx", diags),
        xms: fields.int("xms", diags),
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
        AttributePath::new("cluster_config")
    }

    #[test]
    fn time_of_day_round_trip_and_default() {
        let time = TimeOfDay {
            hours: 22,
            minutes: 30,
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        let back = expand_time_of_day(&flatten_time_of_day(Some(&time)), &path(), &mut diags);
        assert_eq!(back, Some(time));
        assert_eq!(
            flatten_time_of_day(None),
            Value::object([("hours", Value::Int(0)), ("minutes", Value::Int(0))])
        );
    }

    #[test]
    fn time_of_day_rejects_out_of_range() {
        let value = Value::object([("hours", Value::Int(24)), ("minutes", Value::Int(0))]);
        let mut diags = Diagnostics::new();
        assert!(expand_time_of_day(&value, &path(), &mut diags).is_none());
        assert!(diags.to_string().contains("cluster_config.hours"));
    }

    #[test]
    fn access_round_trip() {
        let access = Access {
            web_sql: true,
            yandex_query: true,
            ..Default::default()
        };
        let mut diags = Diagnostics::new();
        let back = expand_access(&flatten_access(Some(&access)), &path(), &mut diags);
        assert_eq!(back, Some(access));
        assert_eq!(flatten_access(None).field("data_lens"), &Value::Bool(false));
    }

    #[test]
    fn background_activities_round_trip() {
        let config = BackgroundActivitiesConfig {
            analyze_and_vacuum: Some(AnalyzeAndVacuum {
                start: Some(BackgroundActivityStartAt {
                    hours: Some(19),
                    minutes: Some(15),
                }),
                analyze_timeout: Some(3600),
                vacuum_timeout: Some(7200),
            }),
            query_killer_scripts: Some(QueryKillerScripts {
                idle: Some(QueryKiller {
                    enable: Some(true),
                    max_age: Some(600),
                    ignore_users: vec!["etl".to_string(), "admin".to_string()],
                }),
                idle_in_transaction: None,
                long_running: Some(QueryKiller {
                    enable: Some(false),
                    max_age: None,
                    ignore_users: vec![],
                }),
            }),
        };
        let flat = flatten_background_activities(Some(&config), &Value::Null);
        assert_eq!(
            flat.field("query_killer_idle").field("ignore_users"),
            &Value::string_set(["admin", "etl"])
        );
        assert!(flat.field("query_killer_long_running").field("ignore_users").is_null());

        let mut diags = Diagnostics::new();
        let mut back = expand_background_activities(&flat, &path(), &mut diags).unwrap();
        if let Some(idle) = back
            .query_killer_scripts
            .as_mut()
            .and_then(|s| s.idle.as_mut())
        {
            idle.ignore_users.sort();
        }
        let mut expected = config;
        if let Some(idle) = expected
            .query_killer_scripts
            .as_mut()
            .and_then(|s| s.idle.as_mut())
        {
            idle.ignore_users.sort();
        }
        assert_eq!(back, expected);
    }

    #[test]
    fn unknown_start_minutes_are_not_sent() {
        let value = Value::object([(
            "start",
            Value::object([("hours", Value::Int(3)), ("minutes", Value::Unknown)]),
        )]);
        let mut diags = Diagnostics::new();
        let config = expand_analyze_and_vacuum(&value, &path(), &mut diags).unwrap();
        let start = config.start.unwrap();
        assert_eq!(start.hours, Some(3));
        assert_eq!(start.minutes, None);
        assert_eq!(
            serde_json::to_value(start).unwrap(),
            serde_json::json!({"hours": "3"})
        );
    }

    #[test]
    fn pxf_config_keeps_only_user_values() {
        let config = PxfConfig {
            max_threads: Some(200),
            pool_allow_core_thread_timeout: Some(true),
            xmx: Some(2048),
            ..Default::default()
        };
        let flat = flatten_pxf_config(Some(&config), &Value::Null);
        assert_eq!(flat.as_map().map(|m| m.len()), Some(3));
        let mut diags = Diagnostics::new();
        assert_eq!(expand_pxf_config(&flat, &path(), &mut diags), Some(config));

        assert_eq!(flatten_pxf_config(Some(&PxfConfig::default()), &Value::Null), Value::Null);
        assert_eq!(flatten_pxf_config(None, &Value::Null), Value::Null);
    }
}
