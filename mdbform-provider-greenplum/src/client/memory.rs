//! In-process `ClusterApi` for tests and offline runs

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use super::{ApiError, ApiResult, ClusterApi};
use crate::api::{
    Cluster, ClusterConfigSet, ClusterStatus, ConfigSpec, ConnectionPoolerConfigSet,
    CreateClusterRequest, GreenplumConfig, GreenplumConfig6, GreenplumConfigSet6, Health, Host,
    HostHealth, HostType, MaintenanceWindow, Monitoring, Operation, PxfConfigSet,
    RestoreClusterRequest, Status, SubclusterConfig, UpdateClusterRequest,
};

/// gRPC status codes used in operation errors
const INVALID_ARGUMENT: i32 = 3;
const NOT_FOUND: i32 = 5;
const FAILED_PRECONDITION: i32 = 9;

#[derive(Default)]
struct Inner {
    clusters: HashMap<String, Cluster>,
    operations: HashMap<String, Operation>,
    /// Remaining polls before each pending operation completes
    pending: HashMap<String, u32>,
    /// Backup id -> cluster as it was when the backup was taken
    backups: HashMap<String, Cluster>,
    fail_next: Option<Status>,
    operation_delay: u32,
    updates: Vec<UpdateClusterRequest>,
}

/// Cluster service kept in memory
///
/// Operations complete immediately unless a delay is configured. A failure
/// can be injected for the next mutating call, which then leaves every
/// cluster untouched.
#[derive(Default)]
pub struct InMemoryClusterApi {
    inner: Mutex<Inner>,
}

fn short_id(prefix: &str) -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("{}{}", prefix, &id[..17])
}

fn snake_to_camel(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper = false;
    for c in name.chars() {
        if c == '_' {
            upper = true;
        } else if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn invalid(message: impl Into<String>) -> Status {
    Status {
        code: INVALID_ARGUMENT,
        message: message.into(),
        details: vec![],
    }
}

fn hosts_for(cluster: &Cluster, host_type: HostType, count: i64) -> Vec<Host> {
    let (letter, subcluster) = match host_type {
        HostType::Master => ("m", cluster.master_config.as_ref()),
        _ => ("s", cluster.segment_config.as_ref()),
    };
    let config = cluster.config.clone().unwrap_or_default();
    (1..=count)
        .map(|n| Host {
            name: format!("rc1a-{}-{}{}.mdb.yandexcloud.net", cluster.id, letter, n),
            cluster_id: cluster.id.clone(),
            zone_id: config.zone_id.clone(),
            host_type,
            resources: subcluster.and_then(|s| s.resources.clone()),
            health: HostHealth::Alive,
            subnet_id: config.subnet_id.clone(),
            assign_public_ip: config.assign_public_ip,
        })
        .collect()
}

fn config_set(spec: ConfigSpec) -> ClusterConfigSet {
    ClusterConfigSet {
        greenplum_config_set_6: Some(GreenplumConfigSet6 {
            effective_config: spec.greenplum_config_6.clone(),
            user_config: spec.greenplum_config_6,
            default_config: None,
        }),
        pool: Some(ConnectionPoolerConfigSet {
            effective_config: spec.pool.clone(),
            user_config: spec.pool,
            default_config: None,
        }),
        background_activities: spec.background_activities,
        pxf_config: Some(PxfConfigSet {
            effective_config: spec.pxf_config.clone(),
            user_config: spec.pxf_config,
            default_config: None,
        }),
    }
}

/// Copy one setting from `from` into `into` by its field name
fn copy_setting(into: &mut GreenplumConfig6, from: &GreenplumConfig6, key: &str) -> Result<(), Status> {
    let field = snake_to_camel(key);
    let mut target = serde_json::to_value(&*into).map_err(|e| invalid(e.to_string()))?;
    let source = serde_json::to_value(from).map_err(|e| invalid(e.to_string()))?;
    let Some(object) = target.as_object_mut() else {
        return Err(invalid("greenplum config is not an object"));
    };
    match source.get(&field) {
        Some(value) => {
            object.insert(field, value.clone());
        }
        None => {
            object.remove(&field);
        }
    }
    *into = serde_json::from_value(target).map_err(|e| invalid(e.to_string()))?;
    Ok(())
}

/// Apply one update mask path to a stored cluster
fn apply_mask_path(
    cluster: &mut Cluster,
    request: &UpdateClusterRequest,
    path: &str,
) -> Result<(), Status> {
    let requested = request.config.clone().unwrap_or_default();
    let config = cluster.config.get_or_insert_with(GreenplumConfig::default);
    let spec = request.config_spec.clone().unwrap_or_default();
    let sets = cluster.cluster_config.get_or_insert_with(ClusterConfigSet::default);

    match path.split('.').collect::<Vec<_>>().as_slice() {
        ["name"] => cluster.name = request.name.clone(),
        ["description"] => cluster.description = request.description.clone(),
        ["labels"] => cluster.labels = request.labels.clone(),
        ["security_group_ids"] => cluster.security_group_ids = request.security_group_ids.clone(),
        ["deletion_protection"] => cluster.deletion_protection = request.deletion_protection,
        ["service_account_id"] => cluster.service_account_id = request.service_account_id.clone(),
        ["user_password"] => {}
        ["maintenance_window"] => {
            cluster.maintenance_window = Some(
                request
                    .maintenance_window
                    .clone()
                    .unwrap_or_else(MaintenanceWindow::anytime),
            )
        }
        ["config", "version"] => config.version = requested.version,
        ["config", "backup_window_start"] => {
            config.backup_window_start = requested.backup_window_start
        }
        ["config", "backup_retain_period_days"] => {
            config.backup_retain_period_days = requested.backup_retain_period_days
        }
        ["config", "access", rest @ ..] => {
            let from = requested.access.unwrap_or_default();
            let access = config.access.get_or_insert_with(Default::default);
            match rest {
                [] => *access = from,
                ["data_lens"] => access.data_lens = from.data_lens,
                ["web_sql"] => access.web_sql = from.web_sql,
                ["data_transfer"] => access.data_transfer = from.data_transfer,
                ["yandex_query"] => access.yandex_query = from.yandex_query,
                _ => return Err(invalid(format!("unknown update mask path '{}'", path))),
            }
        }
        [sub @ ("master_config" | "segment_config"), "resources", rest @ ..] => {
            let (target, from) = if *sub == "master_config" {
                (&mut cluster.master_config, &request.master_config)
            } else {
                (&mut cluster.segment_config, &request.segment_config)
            };
            let from = from.clone().and_then(|s| s.resources).unwrap_or_default();
            let resources = target
                .get_or_insert_with(SubclusterConfig::default)
                .resources
                .get_or_insert_with(Default::default);
            match rest {
                [] => *resources = from,
                ["resource_preset_id"] => resources.resource_preset_id = from.resource_preset_id,
                ["disk_size"] => {
                    if from.disk_size < resources.disk_size {
                        return Err(invalid("disk size cannot be decreased"));
                    }
                    resources.disk_size = from.disk_size
                }
                ["disk_type_id"] => resources.disk_type_id = from.disk_type_id,
                _ => return Err(invalid(format!("unknown update mask path '{}'", path))),
            }
        }
        ["config_spec", "pool"] => {
            sets.pool = Some(ConnectionPoolerConfigSet {
                effective_config: spec.pool.clone(),
                user_config: spec.pool,
                default_config: None,
            })
        }
        ["config_spec", "greenplum_config_6", key] => {
            let set = sets.greenplum_config_set_6.get_or_insert_with(Default::default);
            let from = spec.greenplum_config_6.unwrap_or_default();
            let user = set.user_config.get_or_insert_with(Default::default);
            copy_setting(user, &from, key)?;
            set.effective_config = set.user_config.clone();
        }
        ["config_spec", "background_activities"] => {
            sets.background_activities = spec.background_activities
        }
        ["config_spec", "pxf_config"] => {
            sets.pxf_config = Some(PxfConfigSet {
                effective_config: spec.pxf_config.clone(),
                user_config: spec.pxf_config,
                default_config: None,
            })
        }
        ["cloud_storage", "enable"] => cluster.cloud_storage = request.cloud_storage,
        ["logging"] => cluster.logging = request.logging.clone(),
        _ => return Err(invalid(format!("unknown update mask path '{}'", path))),
    }
    Ok(())
}

impl InMemoryClusterApi {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic while holding the lock leaves plain data behind; keep using it.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Snapshot a cluster; returns the backup id, or `None` for an unknown cluster
    pub fn take_backup(&self, cluster_id: &str) -> Option<String> {
        let mut inner = self.lock();
        let cluster = inner.clusters.get(cluster_id)?.clone();
        let backup_id = format!("{}:{}", cluster_id, short_id("stream_"));
        inner.backups.insert(backup_id.clone(), cluster);
        Some(backup_id)
    }

    /// Operations stay unfinished for this many `get_operation` calls
    pub fn with_operation_delay(self, polls: u32) -> Self {
        self.lock().operation_delay = polls;
        self
    }

    /// The next mutating call starts an operation that fails with `status`
    pub fn fail_next_operation(&self, status: Status) {
        self.lock().fail_next = Some(status);
    }

    pub fn cluster(&self, cluster_id: &str) -> Option<Cluster> {
        self.lock().clusters.get(cluster_id).cloned()
    }

    pub fn cluster_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.lock().clusters.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Update requests received so far, oldest first
    pub fn updates(&self) -> Vec<UpdateClusterRequest> {
        self.lock().updates.clone()
    }

    /// Record an operation; `change` runs only when no failure is injected
    fn run_operation(
        &self,
        description: &str,
        cluster_id: &str,
        change: impl FnOnce(&mut Inner) -> Result<(), Status>,
    ) -> Operation {
        let mut inner = self.lock();
        let error = match inner.fail_next.take() {
            Some(status) => Some(status),
            None => change(&mut inner).err(),
        };
        let now = Utc::now();
        let operation = Operation {
            id: short_id("op"),
            description: description.to_string(),
            created_at: Some(now),
            created_by: "mdbform".to_string(),
            modified_at: Some(now),
            done: inner.operation_delay == 0,
            metadata: Some(json!({ "clusterId": cluster_id })),
            error,
            response: None,
        };
        let delay = inner.operation_delay;
        if delay > 0 {
            inner.pending.insert(operation.id.clone(), delay);
        }
        inner.operations.insert(operation.id.clone(), operation.clone());
        operation
    }

    fn new_cluster(request: &CreateClusterRequest, id: String) -> Cluster {
        let cluster = Cluster {
            id,
            folder_id: request.folder_id.clone(),
            created_at: Some(Utc::now()),
            name: request.name.clone(),
            config: request.config.clone(),
            description: request.description.clone(),
            labels: request.labels.clone(),
            environment: request.environment,
            monitoring: vec![],
            master_config: request.master_config.clone(),
            segment_config: request.segment_config.clone(),
            master_host_count: request.master_host_count,
            segment_host_count: request.segment_host_count,
            segment_in_host: request.segment_in_host,
            network_id: request.network_id.clone(),
            health: Health::Alive,
            status: ClusterStatus::Running,
            maintenance_window: Some(
                request
                    .maintenance_window
                    .clone()
                    .unwrap_or_else(MaintenanceWindow::anytime),
            ),
            planned_operation: None,
            security_group_ids: request.security_group_ids.clone(),
            user_name: request.user_name.clone(),
            deletion_protection: request.deletion_protection,
            host_group_ids: vec![],
            cluster_config: Some(config_set(request.config_spec.clone().unwrap_or_default())),
            cloud_storage: request.cloud_storage,
            master_host_group_ids: request.master_host_group_ids.clone(),
            segment_host_group_ids: request.segment_host_group_ids.clone(),
            service_account_id: request.service_account_id.clone(),
            logging: request.logging.clone(),
        };
        Cluster {
            monitoring: vec![Monitoring {
                name: "Console".to_string(),
                description: "Cluster monitoring in the management console".to_string(),
                link: format!(
                    "https://console.cloud.yandex.ru/folders/{}/managed-greenplum/cluster/{}",
                    cluster.folder_id, cluster.id
                ),
            }],
            ..cluster
        }
    }
}

#[async_trait]
impl ClusterApi for InMemoryClusterApi {
    async fn get_cluster(&self, cluster_id: &str) -> ApiResult<Option<Cluster>> {
        Ok(self.cluster(cluster_id))
    }

    async fn list_master_hosts(&self, cluster_id: &str) -> ApiResult<Vec<Host>> {
        let cluster = self
            .cluster(cluster_id)
            .ok_or_else(|| ApiError::NotFound(format!("cluster {}", cluster_id)))?;
        Ok(hosts_for(&cluster, HostType::Master, cluster.master_host_count))
    }

    async fn list_segment_hosts(&self, cluster_id: &str) -> ApiResult<Vec<Host>> {
        let cluster = self
            .cluster(cluster_id)
            .ok_or_else(|| ApiError::NotFound(format!("cluster {}", cluster_id)))?;
        Ok(hosts_for(&cluster, HostType::Segment, cluster.segment_host_count))
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> ApiResult<Operation> {
        let id = short_id("c9q");
        let cluster = Self::new_cluster(request, id.clone());
        Ok(self.run_operation("Create Greenplum cluster", &id, move |inner| {
            inner.clusters.insert(cluster.id.clone(), cluster);
            Ok(())
        }))
    }

    async fn update_cluster(&self, request: &UpdateClusterRequest) -> ApiResult<Operation> {
        if self.cluster(&request.cluster_id).is_none() {
            return Err(ApiError::NotFound(format!("cluster {}", request.cluster_id)));
        }
        self.lock().updates.push(request.clone());
        Ok(self.run_operation("Update Greenplum cluster", &request.cluster_id, |inner| {
            let Some(current) = inner.clusters.get(&request.cluster_id) else {
                return Ok(());
            };
            let mut updated = current.clone();
            for path in &request.update_mask {
                apply_mask_path(&mut updated, request, path)?;
            }
            inner.clusters.insert(updated.id.clone(), updated);
            Ok(())
        }))
    }

    async fn delete_cluster(&self, cluster_id: &str) -> ApiResult<Operation> {
        if self.cluster(cluster_id).is_none() {
            return Err(ApiError::NotFound(format!("cluster {}", cluster_id)));
        }
        Ok(self.run_operation("Delete Greenplum cluster", cluster_id, |inner| {
            if inner.clusters.get(cluster_id).is_some_and(|c| c.deletion_protection) {
                return Err(Status {
                    code: FAILED_PRECONDITION,
                    message: "The operation was rejected because cluster has 'deletion_protection' = ON"
                        .to_string(),
                    details: vec![],
                });
            }
            inner.clusters.remove(cluster_id);
            Ok(())
        }))
    }

    async fn restore_cluster(&self, request: &RestoreClusterRequest) -> ApiResult<Operation> {
        let id = short_id("c9q");
        let cluster_id = id.clone();
        let request = request.clone();
        Ok(self.run_operation("Restore Greenplum cluster", &cluster_id, move |inner| {
            let Some(source) = inner.backups.get(&request.backup_id).cloned() else {
                return Err(Status {
                    code: NOT_FOUND,
                    message: format!("Backup '{}' not found", request.backup_id),
                    details: vec![],
                });
            };
            let config = request.config.unwrap_or_default();
            let source_config = source.config.unwrap_or_default();
            let create = CreateClusterRequest {
                folder_id: request.folder_id,
                name: request.name,
                description: request.description,
                labels: request.labels,
                environment: request.environment,
                config: Some(GreenplumConfig {
                    version: source_config.version,
                    backup_window_start: config.backup_window_start,
                    backup_retain_period_days: source_config.backup_retain_period_days,
                    access: config.access,
                    zone_id: config.zone_id,
                    subnet_id: config.subnet_id,
                    assign_public_ip: config.assign_public_ip,
                }),
                master_config: Some(SubclusterConfig {
                    resources: request.master_resources,
                }),
                segment_config: Some(SubclusterConfig {
                    resources: request.segment_resources,
                }),
                master_host_count: source.master_host_count,
                segment_in_host: request.segment_in_host,
                segment_host_count: request.segment_host_count,
                user_name: source.user_name,
                network_id: request.network_id,
                security_group_ids: request.security_group_ids,
                deletion_protection: request.deletion_protection,
                maintenance_window: request.maintenance_window,
                service_account_id: request.service_account_id,
                ..Default::default()
            };
            let cluster = Self::new_cluster(&create, id);
            inner.clusters.insert(cluster.id.clone(), cluster);
            Ok(())
        }))
    }

    async fn get_operation(&self, operation_id: &str) -> ApiResult<Operation> {
        let mut inner = self.lock();
        if let Some(remaining) = inner.pending.get_mut(operation_id) {
            *remaining = remaining.saturating_sub(1);
            if *remaining == 0 {
                inner.pending.remove(operation_id);
                if let Some(op) = inner.operations.get_mut(operation_id) {
                    op.done = true;
                    op.modified_at = Some(Utc::now());
                }
            }
        }
        inner
            .operations
            .get(operation_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("operation {}", operation_id)))
    }
}
