//! mdbform Managed Greenplum Provider
//!
//! Resource `greenplum_cluster` backed by the Managed Service for Greenplum
//! API.
//!
//! ## Module Structure
//!
//! - `api` - REST messages of the cluster and operation services
//! - `schema` - Resource schema
//! - `convert` - Flatten / expand between attributes and API messages
//! - `update_mask` - Field masks for partial updates
//! - `client` - `ClusterApi` trait with REST and in-memory implementations
//! - `provider` - GreenplumProvider implementation

pub mod api;
pub mod client;
pub mod config;
pub mod convert;
pub mod provider;
pub mod resources;
pub mod schema;
pub mod update_mask;

// Re-export main types
pub use client::{ClusterApi, InMemoryClusterApi, RestClusterApi};
pub use config::ProviderConfig;
pub use provider::GreenplumProvider;

use mdbform_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use mdbform_core::resource::{Resource, ResourceId, State};

use resources::resource_types;

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl<C: ClusterApi> Provider for GreenplumProvider<C> {
    fn name(&self) -> &'static str {
        "yandex"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resource_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: Option<&str>,
        prior: Option<&State>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.map(|s| s.to_string());
        let prior = prior.map(|s| s.attributes.clone()).unwrap_or_default();
        Box::pin(async move {
            let Some(identifier) = identifier else {
                return Ok(State::not_found(id));
            };
            self.read_cluster(&id, &identifier, &prior)
                .await
                .map_err(|e| e.for_resource(id))
        })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move {
            self.create_cluster(&resource)
                .await
                .map_err(|e| e.for_resource(resource.id.clone()))
        })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move {
            self.update_cluster(&id, &identifier, &from, &to)
                .await
                .map_err(|e| e.for_resource(id))
        })
    }

    fn delete(&self, id: &ResourceId, identifier: &str) -> BoxFuture<'_, ProviderResult<()>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        Box::pin(async move {
            self.delete_cluster(&id, &identifier)
                .await
                .map_err(|e| e.for_resource(id))
        })
    }
}
