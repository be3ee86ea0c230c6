//! Inventory Provider - replay an account snapshot from YAML or JSON
//!
//! The inventory document describes an account the way a live provider would
//! report it: enabled regions, services and their resource types, and every
//! resource with the regions whose API lists it.
//!
//! Services under `regions_returned` are global: only the regions mapped there
//! list them, and crawling any other region neither lists nor sweeps them.
//!
//! ```yaml
//! account_id: "111111111111"
//! regions: [us-east-1, eu-west-2]
//! services:
//!   ec2: [vpc, instance]
//!   s3: [bucket]
//! subresource_types:
//!   iam:
//!     role: [role_policy]
//! regions_returned:
//!   s3:
//!     us-east-1: [us-east-1, eu-west-2]
//! resources:
//!   - service: s3
//!     resource_type: bucket
//!     id: logs-eu
//!     region: eu-west-2
//!     listed_in: [us-east-1]
//! ```

use super::DiscoveryProvider;
use crate::error::ProviderError;
use crate::model::{AttributeHandle, ClientConfig, ResourceHandle};
use crate::urn::DEFAULT_CLOUD;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

/// Subresource entry, nested under its parent
#[derive(Debug, Clone, Deserialize)]
pub struct SubresourceEntry {
    pub resource_type: String,
    pub id: String,
    #[serde(default)]
    pub properties: Value,
}

/// Secondary attribute entry
#[derive(Debug, Clone, Deserialize)]
pub struct AttributeEntry {
    pub attribute_type: String,
    #[serde(default)]
    pub properties: Value,
}

/// Resource entry
#[derive(Debug, Clone, Deserialize)]
pub struct ResourceEntry {
    pub service: String,
    pub resource_type: String,
    pub id: String,
    /// Region the resource lives in
    pub region: String,
    /// Regions whose API lists this resource (defaults to `region`)
    #[serde(default)]
    pub listed_in: Vec<String>,
    #[serde(default)]
    pub properties: Value,
    #[serde(default)]
    pub subresources: Vec<SubresourceEntry>,
    #[serde(default)]
    pub secondary_attributes: Vec<AttributeEntry>,
}

impl ResourceEntry {
    fn is_listed_in(&self, region: &str) -> bool {
        if self.listed_in.is_empty() {
            self.region == region
        } else {
            self.listed_in.iter().any(|r| r == region)
        }
    }

    fn handle(&self) -> ResourceHandle {
        ResourceHandle::new(&self.service, &self.resource_type, &self.id)
            .with_region(&self.region)
            .with_properties(self.properties.clone())
    }

    fn matches(&self, handle: &ResourceHandle) -> bool {
        self.service == handle.service
            && self.resource_type == handle.resource_type
            && self.id == handle.resource_id
            && handle.region.as_deref().map_or(true, |r| r == self.region)
    }
}

/// Root structure of an inventory document
#[derive(Debug, Clone, Deserialize)]
pub struct Inventory {
    pub account_id: String,
    #[serde(default = "default_cloud")]
    pub cloud: String,
    pub regions: Vec<String>,
    /// Service name -> resource types
    #[serde(default)]
    pub services: BTreeMap<String, Vec<String>>,
    /// Service name -> resource type -> nested subresource types
    #[serde(default)]
    pub subresource_types: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    /// Service name -> queried region -> regions its API reports
    #[serde(default)]
    pub regions_returned: BTreeMap<String, BTreeMap<String, Vec<String>>>,
    #[serde(default)]
    pub resources: Vec<ResourceEntry>,
}

fn default_cloud() -> String {
    DEFAULT_CLOUD.to_string()
}

impl Inventory {
    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse inventory YAML")
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse inventory JSON")
    }

    /// Load from disk; `.json` files are read as JSON, anything else as YAML
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read inventory {}", path.display()))?;

        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    fn find(&self, handle: &ResourceHandle) -> Option<&ResourceEntry> {
        self.resources.iter().find(|entry| entry.matches(handle))
    }
}

/// Provider session over a shared, immutable inventory snapshot
#[derive(Debug, Clone)]
pub struct InventoryProvider {
    inventory: Arc<Inventory>,
}

impl InventoryProvider {
    pub fn new(inventory: Inventory) -> Self {
        Self {
            inventory: Arc::new(inventory),
        }
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        Ok(Self::new(Inventory::from_path(path)?))
    }

    /// Factory handing every caller its own session
    pub fn session_factory(
        &self,
    ) -> impl Fn() -> Result<InventoryProvider, ProviderError> + Send + Sync + 'static {
        let inventory = Arc::clone(&self.inventory);
        move || {
            Ok(InventoryProvider {
                inventory: Arc::clone(&inventory),
            })
        }
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    fn entry(&self, operation: &str, handle: &ResourceHandle) -> Result<&ResourceEntry, ProviderError> {
        self.inventory.find(handle).ok_or_else(|| {
            ProviderError::NotFound(format!(
                "{}: {} {} {}",
                operation, handle.service, handle.resource_type, handle.resource_id
            ))
        })
    }
}

#[async_trait]
impl DiscoveryProvider for InventoryProvider {
    fn cloud_name(&self) -> &str {
        &self.inventory.cloud
    }

    async fn account_id(&self) -> Result<String, ProviderError> {
        Ok(self.inventory.account_id.clone())
    }

    async fn enabled_regions(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.inventory.regions.clone())
    }

    async fn list_services(&self) -> Result<Vec<String>, ProviderError> {
        Ok(self.inventory.services.keys().cloned().collect())
    }

    async fn list_resource_types(&self, service: &str) -> Result<Vec<String>, ProviderError> {
        self.inventory
            .services
            .get(service)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("service {}", service)))
    }

    async fn list_resources(
        &self,
        service: &str,
        resource_type: &str,
        client_config: &ClientConfig,
    ) -> Result<Vec<ResourceHandle>, ProviderError> {
        let Some(region) = client_config.region() else {
            return Err(ProviderError::api("list_resources", "client config names no region"));
        };

        tracing::debug!("inventory: listing {} {} in {}", service, resource_type, region);

        Ok(self
            .inventory
            .resources
            .iter()
            .filter(|entry| {
                entry.service == service && entry.resource_type == resource_type && entry.is_listed_in(region)
            })
            .map(ResourceEntry::handle)
            .collect())
    }

    async fn subresources_of(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<ResourceHandle>, ProviderError> {
        let entry = self.entry("subresources_of", resource)?;
        Ok(entry
            .subresources
            .iter()
            .map(|sub| {
                ResourceHandle::new(&entry.service, &sub.resource_type, &sub.id)
                    .with_region(&entry.region)
                    .with_properties(sub.properties.clone())
            })
            .collect())
    }

    async fn secondary_attributes_of(
        &self,
        resource: &ResourceHandle,
    ) -> Result<Vec<AttributeHandle>, ProviderError> {
        let entry = self.entry("secondary_attributes_of", resource)?;
        Ok(entry
            .secondary_attributes
            .iter()
            .map(|attr| AttributeHandle::new(&attr.attribute_type, attr.properties.clone()))
            .collect())
    }

    async fn region_of(&self, resource: &ResourceHandle) -> Result<String, ProviderError> {
        if let Some(region) = &resource.region {
            return Ok(region.clone());
        }
        Ok(self.entry("region_of", resource)?.region.clone())
    }

    fn subresource_types(&self, service: &str, resource_type: &str) -> Vec<String> {
        self.inventory
            .subresource_types
            .get(service)
            .and_then(|by_type| by_type.get(resource_type))
            .cloned()
            .unwrap_or_default()
    }

    fn regions_returned_from(&self, service: &str, queried_region: &str) -> Vec<String> {
        // A mapped service only reports through the regions it maps
        match self.inventory.regions_returned.get(service) {
            Some(by_region) => by_region.get(queried_region).cloned().unwrap_or_default(),
            None => vec![queried_region.to_string()],
        }
    }
}
