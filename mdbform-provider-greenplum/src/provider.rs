//! Greenplum Provider implementation
//!
//! Drives the cluster lifecycle against a [`ClusterApi`]: requests are built
//! from planned attributes, every mutating call is followed by polling its
//! operation, and the resulting cluster is read back into state.

use std::collections::HashMap;

use log::{debug, info, warn};
use mdbform_core::diagnostics::Diagnostics;
use mdbform_core::provider::{ProviderError, ProviderResult};
use mdbform_core::resource::{Resource, ResourceId, State, Value};
use mdbform_core::schema::ResourceSchema;
use tokio::time::{Instant, sleep};

use crate::api::{CreateClusterRequest, Operation};
use crate::client::{ApiError, ClusterApi, RestClusterApi};
use crate::config::ProviderConfig;
use crate::convert::{expand_cluster, expand_restore_request, expand_update, flatten_cluster};
use crate::schema::cluster_schema;
use crate::update_mask::update_mask;

fn api_error(context: &'static str) -> impl FnOnce(ApiError) -> ProviderError {
    move |e| ProviderError::new(format!("{}: {}", context, e)).with_cause(e)
}

/// Managed Greenplum Provider
pub struct GreenplumProvider<C: ClusterApi = RestClusterApi> {
    api: C,
    config: ProviderConfig,
    schema: ResourceSchema,
}

impl GreenplumProvider<RestClusterApi> {
    /// Provider talking to the REST gateway described by `config`
    pub fn from_config(config: ProviderConfig) -> ProviderResult<Self> {
        config
            .validate()
            .map_err(|e| ProviderError::new(format!("Invalid provider configuration: {}", e)).with_cause(e))?;
        let api = RestClusterApi::new(&config).map_err(api_error("Failed to create HTTP client"))?;
        Ok(Self::new(api, config))
    }
}

impl<C: ClusterApi> GreenplumProvider<C> {
    pub fn new(api: C, config: ProviderConfig) -> Self {
        Self {
            api,
            config,
            schema: cluster_schema(),
        }
    }

    pub fn api(&self) -> &C {
        &self.api
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Poll an operation until it is done
    ///
    /// A finished operation carrying an error becomes a `ProviderError` with
    /// the operation's status message.
    async fn wait_for_operation(&self, operation: Operation) -> ProviderResult<Operation> {
        let started = Instant::now();
        let mut operation = operation;

        loop {
            if operation.done {
                if let Some(status) = &operation.error {
                    return Err(ProviderError::new(format!(
                        "Operation {} ({}) failed: {}",
                        operation.id, operation.description, status
                    )));
                }
                debug!("Operation {} finished", operation.id);
                return Ok(operation);
            }
            if started.elapsed() >= self.config.operation_timeout {
                return Err(ProviderError::new(format!(
                    "Timed out after {:?} waiting for operation {} ({})",
                    self.config.operation_timeout, operation.id, operation.description
                )));
            }

            sleep(self.config.poll_interval).await;
            operation = self
                .api
                .get_operation(&operation.id)
                .await
                .map_err(api_error("Failed to get operation status"))?;
        }
    }

    fn cluster_id_of(operation: &Operation) -> ProviderResult<String> {
        operation.cluster_id().map(str::to_string).ok_or_else(|| {
            ProviderError::new(format!(
                "Operation {} did not report a cluster id",
                operation.id
            ))
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Read a cluster and its hosts into state
    ///
    /// `prior` supplies attributes the API never returns.
    pub async fn read_cluster(
        &self,
        id: &ResourceId,
        cluster_id: &str,
        prior: &HashMap<String, Value>,
    ) -> ProviderResult<State> {
        let Some(cluster) = self
            .api
            .get_cluster(cluster_id)
            .await
            .map_err(api_error("Failed to read cluster"))?
        else {
            debug!("Cluster {} not found", cluster_id);
            return Ok(State::not_found(id.clone()));
        };

        let masters = self
            .api
            .list_master_hosts(cluster_id)
            .await
            .map_err(api_error("Failed to list master hosts"))?;
        let segments = self
            .api
            .list_segment_hosts(cluster_id)
            .await
            .map_err(api_error("Failed to list segment hosts"))?;

        let attributes = flatten_cluster(&cluster, &masters, &segments, prior);
        Ok(State::existing(id.clone(), attributes).with_identifier(cluster.id))
    }

    async fn read_existing(
        &self,
        id: &ResourceId,
        cluster_id: &str,
        prior: &HashMap<String, Value>,
    ) -> ProviderResult<State> {
        let state = self.read_cluster(id, cluster_id, prior).await?;
        if !state.exists {
            return Err(ProviderError::new(format!(
                "Cluster {} disappeared after the operation finished",
                cluster_id
            )));
        }
        Ok(state)
    }

    fn expand(&self, resource: &Resource) -> ProviderResult<CreateClusterRequest> {
        let mut diags = Diagnostics::new();
        let Some(mut request) = expand_cluster(&resource.attributes, &mut diags) else {
            return Err(ProviderError::from_diagnostics(
                "Invalid cluster configuration",
                diags,
            ));
        };
        if request.folder_id.is_empty() {
            request.folder_id = self.config.folder_id.clone().ok_or_else(|| {
                ProviderError::new("folder_id is not set and no default folder is configured")
            })?;
        }
        Ok(request)
    }

    pub async fn create_cluster(&self, resource: &Resource) -> ProviderResult<State> {
        let id = &resource.id;
        let request = self.expand(resource)?;
        let mut diags = Diagnostics::new();
        let restore = expand_restore_request(&resource.attributes, &request, &mut diags);
        if diags.has_error() {
            return Err(ProviderError::from_diagnostics(
                "Invalid restore configuration",
                diags,
            ));
        }

        let operation = match &restore {
            Some(restore) => {
                info!("Restoring {} from backup {}", id, restore.backup_id);
                self.api
                    .restore_cluster(restore)
                    .await
                    .map_err(api_error("Failed to restore cluster"))?
            }
            None => {
                info!("Creating {} in folder {}", id, request.folder_id);
                self.api
                    .create_cluster(&request)
                    .await
                    .map_err(api_error("Failed to create cluster"))?
            }
        };
        let cluster_id = Self::cluster_id_of(&operation)?;
        self.wait_for_operation(operation).await?;
        info!("Created {} as cluster {}", id, cluster_id);

        let state = self
            .read_existing(id, &cluster_id, &resource.attributes)
            .await?;
        if restore.is_none() {
            return Ok(state);
        }

        // A restore only takes part of the configuration; apply the rest in place.
        let mask = update_mask(&self.schema, &resource.attributes, &state.attributes);
        if mask.is_empty() {
            return Ok(state);
        }
        self.apply_update(id, &cluster_id, resource, mask).await
    }

    pub async fn update_cluster(
        &self,
        id: &ResourceId,
        cluster_id: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        let mask = update_mask(&self.schema, &to.attributes, &from.attributes);
        if mask.is_empty() {
            debug!("No updatable changes for {}", id);
            return self.read_existing(id, cluster_id, &to.attributes).await;
        }
        self.apply_update(id, cluster_id, to, mask).await
    }

    async fn apply_update(
        &self,
        id: &ResourceId,
        cluster_id: &str,
        to: &Resource,
        mask: Vec<String>,
    ) -> ProviderResult<State> {
        let mut diags = Diagnostics::new();
        let Some(request) = expand_update(&to.attributes, cluster_id, mask, &mut diags) else {
            return Err(ProviderError::from_diagnostics(
                "Invalid cluster configuration",
                diags,
            ));
        };

        info!("Updating {} ({})", id, request.update_mask.join(", "));
        let operation = self
            .api
            .update_cluster(&request)
            .await
            .map_err(api_error("Failed to update cluster"))?;
        self.wait_for_operation(operation).await?;

        self.read_existing(id, cluster_id, &to.attributes).await
    }

    pub async fn delete_cluster(&self, id: &ResourceId, cluster_id: &str) -> ProviderResult<()> {
        info!("Deleting {} (cluster {})", id, cluster_id);
        let operation = match self.api.delete_cluster(cluster_id).await {
            Ok(operation) => operation,
            Err(e) if e.is_not_found() => {
                warn!("Cluster {} is already gone", cluster_id);
                return Ok(());
            }
            Err(e) => return Err(api_error("Failed to delete cluster")(e)),
        };
        self.wait_for_operation(operation).await?;
        info!("Deleted {}", id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Status;
    use crate::client::InMemoryClusterApi;
    use std::time::Duration;

    fn provider(api: InMemoryClusterApi) -> GreenplumProvider<InMemoryClusterApi> {
        let config = ProviderConfig::new("t1")
            .with_folder_id("b1gfolder")
            .with_polling(Duration::from_millis(1), Duration::from_millis(200));
        GreenplumProvider::new(api, config)
    }

    #[tokio::test]
    async fn failed_operation_reports_status_message() {
        let provider = provider(InMemoryClusterApi::new());
        let id = ResourceId::new("greenplum_cluster", "main");
        provider.api().fail_next_operation(Status {
            code: 9,
            message: "quota exceeded".to_string(),
            details: vec![],
        });
        let op = provider
            .api()
            .create_cluster(&CreateClusterRequest::default())
            .await
            .unwrap();
        let err = provider.wait_for_operation(op).await.unwrap_err();
        assert!(err.to_string().contains("quota exceeded (code 9)"), "{}", err);
        let state = provider.read_cluster(&id, "c9qmissing", &HashMap::new()).await.unwrap();
        assert!(!state.exists);
    }

    #[tokio::test]
    async fn polling_waits_for_completion() {
        let provider = provider(InMemoryClusterApi::new().with_operation_delay(3));
        let op = provider
            .api()
            .create_cluster(&CreateClusterRequest::default())
            .await
            .unwrap();
        assert!(!op.done);
        assert!(provider.wait_for_operation(op).await.unwrap().done);
    }

    #[tokio::test]
    async fn polling_times_out() {
        let api = InMemoryClusterApi::new().with_operation_delay(u32::MAX);
        let config = ProviderConfig::new("t1")
            .with_polling(Duration::from_millis(5), Duration::from_millis(20));
        let provider = GreenplumProvider::new(api, config);
        let op = provider
            .api()
            .create_cluster(&CreateClusterRequest::default())
            .await
            .unwrap();
        let err = provider.wait_for_operation(op).await.unwrap_err();
        assert!(err.to_string().starts_with("Timed out after"), "{}", err);
    }

    #[tokio::test]
    async fn deleting_a_missing_cluster_succeeds() {
        let provider = provider(InMemoryClusterApi::new());
        let id = ResourceId::new("greenplum_cluster", "main");
        assert!(provider.delete_cluster(&id, "c9qgone").await.is_ok());
    }
}
