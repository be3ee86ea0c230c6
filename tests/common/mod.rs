//! Shared fixtures for integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use cloudsweep::{
    AttributeHandle, ClientConfig, ConnectorError, DiscoveryProvider, Inventory, InventoryProvider,
    KeepSet, MemoryConnector, ProviderError, ResourceHandle, ResourceRecord, Scope,
    StorageConnector, StoredRecord, Urn,
};
use futures::stream::BoxStream;
use std::collections::HashSet;

pub const ACCOUNT: &str = "111111111111";

pub fn inventory(yaml: &str) -> InventoryProvider {
    InventoryProvider::new(Inventory::from_yaml_str(yaml).expect("inventory should parse"))
}

/// Inventory provider with failures injected at chosen points
#[derive(Clone)]
pub struct FlakyProvider {
    inner: InventoryProvider,
    /// Resource ids whose region cannot be resolved
    pub unresolvable: HashSet<String>,
    /// (resource type, region) pairs whose listing fails
    pub failing_listings: HashSet<(String, String)>,
    /// Regions in which listing services panics
    pub panicking_regions: HashSet<String>,
    /// Parent ids whose subresources cannot be listed
    pub failing_subresources: HashSet<String>,
    /// Subresource ids that cannot be loaded
    pub failing_loads: HashSet<String>,
    /// Resource ids whose secondary attributes cannot be fetched
    pub failing_attributes: HashSet<String>,
}

impl FlakyProvider {
    pub fn new(inner: InventoryProvider) -> Self {
        Self {
            inner,
            unresolvable: HashSet::new(),
            failing_listings: HashSet::new(),
            panicking_regions: HashSet::new(),
            failing_subresources: HashSet::new(),
            failing_loads: HashSet::new(),
            failing_attributes: HashSet::new(),
        }
    }

    pub fn unresolvable(mut self, resource_id: &str) -> Self {
        self.unresolvable.insert(resource_id.to_string());
        self
    }

    pub fn failing_listing(mut self, resource_type: &str, region: &str) -> Self {
        self.failing_listings
            .insert((resource_type.to_string(), region.to_string()));
        self
    }

    pub fn panicking_in(mut self, region: &str) -> Self {
        self.panicking_regions.insert(region.to_string());
        self
    }

    pub fn failing_subresources_of(mut self, parent_id: &str) -> Self {
        self.failing_subresources.insert(parent_id.to_string());
        self
    }

    pub fn failing_load(mut self, subresource_id: &str) -> Self {
        self.failing_loads.insert(subresource_id.to_string());
        self
    }

    pub fn failing_attributes_of(mut self, resource_id: &str) -> Self {
        self.failing_attributes.insert(resource_id.to_string());
        self
    }
}

#[async_trait]
impl DiscoveryProvider for FlakyProvider {
    fn cloud_name(&self) -> &str {
        self.inner.cloud_name()
    }

    async fn account_id(&self) -> Result<String, ProviderError> {
        self.inner.account_id().await
    }

    async fn enabled_regions(&self) -> Result<Vec<String>, ProviderError> {
        self.inner.enabled_regions().await
    }

    async fn list_services(&self) -> Result<Vec<String>, ProviderError> {
        self.inner.list_services().await
    }

    async fn list_resource_types(&self, service: &str) -> Result<Vec<String>, ProviderError> {
        self.inner.list_resource_types(service).await
    }

    async fn list_resources(
        &self,
        service: &str,
        resource_type: &str,
        client_config: &ClientConfig,
    ) -> Result<Vec<ResourceHandle>, ProviderError> {
        let region = client_config.region().unwrap_or_default().to_string();
        if self.panicking_regions.contains(&region) {
            panic!("session for {} blew up", region);
        }
        if self
            .failing_listings
            .contains(&(resource_type.to_string(), region.clone()))
        {
            return Err(ProviderError::Transient(format!(
                "throttled listing {} in {}",
                resource_type, region
            )));
        }
        self.inner
            .list_resources(service, resource_type, client_config)
            .await
    }

    async fn subresources_of(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<ResourceHandle>, ProviderError> {
        if self.failing_subresources.contains(&resource.resource_id) {
            return Err(ProviderError::api("ListRolePolicies", "access denied"));
        }
        self.inner.subresources_of(resource).await
    }

    async fn load(&self, resource: &ResourceHandle) -> Result<ResourceHandle, ProviderError> {
        if self.failing_loads.contains(&resource.resource_id) {
            return Err(ProviderError::NotFound(format!("policy {}", resource.resource_id)));
        }
        self.inner.load(resource).await
    }

    async fn secondary_attributes_of(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<AttributeHandle>, ProviderError> {
        if self.failing_attributes.contains(&resource.resource_id) {
            return Err(ProviderError::Transient(format!(
                "throttled fetching attributes of {}",
                resource.resource_id
            )));
        }
        self.inner.secondary_attributes_of(resource).await
    }

    async fn region_of(&self, resource: &ResourceHandle) -> Result<String, ProviderError> {
        if self.unresolvable.contains(&resource.resource_id) {
            return Err(ProviderError::PermissionDenied(format!(
                "GetBucketLocation on {}",
                resource.resource_id
            )));
        }
        self.inner.region_of(resource).await
    }

    fn subresource_types(&self, service: &str, resource_type: &str) -> Vec<String> {
        self.inner.subresource_types(service, resource_type)
    }

    fn regions_returned_from(&self, service: &str, queried_region: &str) -> Vec<String> {
        self.inner.regions_returned_from(service, queried_region)
    }
}

/// Connector that stores nothing: every write is rejected, deletes succeed
#[derive(Default)]
pub struct RejectingConnector {
    pub store: MemoryConnector,
}

#[async_trait]
impl StorageConnector for RejectingConnector {
    fn name(&self) -> &str {
        "rejecting"
    }

    async fn write_resource(&self, _: &Urn, _: &ResourceHandle) -> Result<(), ConnectorError> {
        Err(ConnectorError::Status(503))
    }

    async fn write_secondary_attribute(
        &self,
        _: &Urn,
        _: &AttributeHandle,
        _: &str,
    ) -> Result<(), ConnectorError> {
        Err(ConnectorError::Status(503))
    }

    async fn delete_resources_not_in(
        &self,
        scope: &Scope,
        account_id: &str,
        urns_to_keep: &KeepSet,
    ) -> Result<(), ConnectorError> {
        self.store.delete_resources_not_in(scope, account_id, urns_to_keep).await
    }

    async fn read_resource(&self, urn: &Urn) -> Result<Option<ResourceRecord>, ConnectorError> {
        self.store.read_resource(urn).await
    }

    async fn delete_resource(&self, urn: &Urn) -> Result<(), ConnectorError> {
        self.store.delete_resource(urn).await
    }

    fn read_all(&self) -> BoxStream<'_, Result<StoredRecord, ConnectorError>> {
        self.store.read_all()
    }
}
