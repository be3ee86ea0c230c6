//! Discovery providers
//!
//! A [`DiscoveryProvider`] is one session against a cloud account. It knows
//! which regions are enabled, which services and resource types exist, and how
//! to list resources, their subresources and their secondary attributes.
//! Concrete SDK clients implement this trait; the engine never talks to a
//! cloud API directly.
//!
//! - [`inventory`] - Provider that replays an account snapshot from a YAML/JSON document

pub mod inventory;

use crate::error::ProviderError;
use crate::model::{AttributeHandle, ClientConfig, ResourceHandle};
use crate::urn::DEFAULT_CLOUD;
use async_trait::async_trait;

pub use inventory::{Inventory, InventoryProvider};

/// One provider session. Sessions are never shared between concurrent
/// region tasks; each task builds its own through a session factory.
#[async_trait]
pub trait DiscoveryProvider: Send + Sync {
    /// Name used as the cloud segment of every urn
    fn cloud_name(&self) -> &str {
        DEFAULT_CLOUD
    }

    /// Account the session is authenticated against
    async fn account_id(&self) -> Result<String, ProviderError>;

    async fn enabled_regions(&self) -> Result<Vec<String>, ProviderError>;

    async fn list_services(&self) -> Result<Vec<String>, ProviderError>;

    async fn list_resource_types(&self, service: &str) -> Result<Vec<String>, ProviderError>;

    /// All resources of one type, from the region named in `client_config`
    async fn list_resources(
        &self,
        service: &str,
        resource_type: &str,
        client_config: &ClientConfig,
    ) -> Result<Vec<ResourceHandle>, ProviderError>;

    async fn subresources_of(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<ResourceHandle>, ProviderError>;

    /// Fill in a subresource's properties. Providers that list fully
    /// populated handles can keep the default.
    async fn load(&self, resource: &ResourceHandle) -> Result<ResourceHandle, ProviderError> {
        Ok(resource.clone())
    }

    async fn secondary_attributes_of(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<AttributeHandle>, ProviderError>;

    /// Region the resource actually lives in, which for global or
    /// replicated services can differ from the region that was queried
    async fn region_of(&self, resource: &ResourceHandle) -> Result<String, ProviderError>;

    /// Types of the subresources nested under `resource_type`. Their stale
    /// records are reconciled together with the parent type's scope.
    fn subresource_types(&self, _service: &str, _resource_type: &str) -> Vec<String> {
        Vec::new()
    }

    /// Regions whose resources the API in `queried_region` may report. An
    /// empty list means only the regions actually listed are reconciled.
    fn regions_returned_from(&self, _service: &str, queried_region: &str) -> Vec<String> {
        vec![queried_region.to_string()]
    }
}
