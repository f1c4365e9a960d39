//! `ClusterApi` over the Managed Greenplum REST gateway

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use super::{ApiError, ApiResult, ClusterApi};
use crate::api::{
    Cluster, CreateClusterRequest, Host, ListHostsResponse, Operation, RestoreClusterRequest,
    Status, UpdateClusterRequest,
};
use crate::config::ProviderConfig;

/// Longest response body quoted in an error when it is not a `Status`
const MAX_ERROR_BODY: usize = 200;

const HOSTS_PAGE_SIZE: &str = "1000";

fn error_message(body: &str) -> String {
    if let Ok(status) = serde_json::from_str::<Status>(body)
        && !status.message.is_empty()
    {
        return status.message;
    }
    let body: String = body
        .chars()
        .filter(|c| c.is_ascii_graphic() || *c == ' ')
        .collect();
    if body.len() > MAX_ERROR_BODY {
        format!("{}... [truncated]", &body[..MAX_ERROR_BODY])
    } else {
        body
    }
}

/// REST client authenticated with an IAM token
#[derive(Clone)]
pub struct RestClusterApi {
    client: Client,
    token: String,
    endpoint: String,
    operation_endpoint: String,
}

impl RestClusterApi {
    pub fn new(config: &ProviderConfig) -> ApiResult<Self> {
        let client = Client::builder()
            .user_agent(concat!("mdbform/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            token: config.token.clone(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            operation_endpoint: config.operation_endpoint.trim_end_matches('/').to_string(),
        })
    }

    fn clusters_url(&self) -> String {
        format!("{}/managed-greenplum/v1/clusters", self.endpoint)
    }

    fn cluster_url(&self, cluster_id: &str) -> String {
        format!("{}/{}", self.clusters_url(), cluster_id)
    }

    /// Send a request and decode a successful response body
    ///
    /// Request bodies are never logged; they carry the admin password.
    async fn send<T: DeserializeOwned>(
        &self,
        method: &str,
        url: &str,
        request: RequestBuilder,
    ) -> ApiResult<T> {
        debug!("{} {}", method, url);

        let response = request.bearer_auth(&self.token).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = error_message(&body);
            debug!("{} {} failed with {}: {}", method, url, status, message);
            return Err(ApiError::Status {
                method: method.to_string(),
                url: url.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body)
            .map_err(|e| ApiError::Decode(format!("{} {}: {}", method, url, e)))
    }

    async fn list_hosts(&self, cluster_id: &str, kind: &str) -> ApiResult<Vec<Host>> {
        let url = format!("{}/{}", self.cluster_url(cluster_id), kind);
        let mut hosts = Vec::new();
        let mut page_token = String::new();

        loop {
            let mut request = self
                .client
                .get(&url)
                .query(&[("pageSize", HOSTS_PAGE_SIZE)]);
            if !page_token.is_empty() {
                request = request.query(&[("pageToken", page_token.as_str())]);
            }
            let page: ListHostsResponse = self.send("GET", &url, request).await?;
            hosts.extend(page.hosts);
            if page.next_page_token.is_empty() {
                break;
            }
            page_token = page.next_page_token;
        }

        Ok(hosts)
    }
}

#[async_trait]
impl ClusterApi for RestClusterApi {
    async fn get_cluster(&self, cluster_id: &str) -> ApiResult<Option<Cluster>> {
        let url = self.cluster_url(cluster_id);
        match self.send("GET", &url, self.client.get(&url)).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn list_master_hosts(&self, cluster_id: &str) -> ApiResult<Vec<Host>> {
        self.list_hosts(cluster_id, "master-hosts").await
    }

    async fn list_segment_hosts(&self, cluster_id: &str) -> ApiResult<Vec<Host>> {
        self.list_hosts(cluster_id, "segment-hosts").await
    }

    async fn create_cluster(&self, request: &CreateClusterRequest) -> ApiResult<Operation> {
        let url = self.clusters_url();
        self.send("POST", &url, self.client.post(&url).json(request))
            .await
    }

    async fn update_cluster(&self, request: &UpdateClusterRequest) -> ApiResult<Operation> {
        let url = self.cluster_url(&request.cluster_id);
        self.send("PATCH", &url, self.client.patch(&url).json(request))
            .await
    }

    async fn delete_cluster(&self, cluster_id: &str) -> ApiResult<Operation> {
        let url = self.cluster_url(cluster_id);
        match self.send("DELETE", &url, self.client.delete(&url)).await {
            Err(e) if e.is_not_found() => Err(ApiError::NotFound(format!("cluster {}", cluster_id))),
            other => other,
        }
    }

    async fn restore_cluster(&self, request: &RestoreClusterRequest) -> ApiResult<Operation> {
        let url = format!("{}:restore", self.clusters_url());
        self.send("POST", &url, self.client.post(&url).json(request))
            .await
    }

    async fn get_operation(&self, operation_id: &str) -> ApiResult<Operation> {
        let url = format!("{}/operations/{}", self.operation_endpoint, operation_id);
        self.send("GET", &url, self.client.get(&url)).await
    }
}
