//! Managed Greenplum API client trait and error types

mod memory;
mod rest;

pub use memory::InMemoryClusterApi;
pub use rest::RestClusterApi;

use async_trait::async_trait;
use thiserror::Error;

use crate::api::{
    Cluster, CreateClusterRequest, Host, Operation, RestoreClusterRequest, UpdateClusterRequest,
};

/// Errors that can occur when calling the API
#[derive(Debug, Error)]
pub enum ApiError {
    /// Transport failure before a response was received
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success response
    #[error("{method} {url} returned {status}: {message}")]
    Status {
        method: String,
        url: String,
        status: u16,
        message: String,
    },

    /// Response body did not match the expected message
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// Object referenced by a mutating call does not exist
    #[error("Not found: {0}")]
    NotFound(String),
}

impl ApiError {
    /// Whether the API reported a missing object
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
            || matches!(self, ApiError::Status { status: 404, .. })
    }
}

/// Result type for API calls
pub type ApiResult<T> = Result<T, ApiError>;

/// Calls of the Managed Greenplum cluster service
///
/// Mutating calls return the long-running [`Operation`] they started;
/// callers poll it with [`ClusterApi::get_operation`].
#[async_trait]
pub trait ClusterApi: Send + Sync {
    /// Fetch a cluster; `None` if it does not exist
    async fn get_cluster(&self, cluster_id: &str) -> ApiResult<Option<Cluster>>;

    async fn list_master_hosts(&self, cluster_id: &str) -> ApiResult<Vec<Host>>;

    async fn list_segment_hosts(&self, cluster_id: &str) -> ApiResult<Vec<Host>>;

    async fn create_cluster(&self, request: &CreateClusterRequest) -> ApiResult<Operation>;

    async fn update_cluster(&self, request: &UpdateClusterRequest) -> ApiResult<Operation>;

    async fn delete_cluster(&self, cluster_id: &str) -> ApiResult<Operation>;

    async fn restore_cluster(&self, request: &RestoreClusterRequest) -> ApiResult<Operation>;

    async fn get_operation(&self, operation_id: &str) -> ApiResult<Operation>;
}
