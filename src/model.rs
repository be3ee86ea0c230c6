//! Data model shared by providers, connectors and the engine

use crate::urn::Urn;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::fmt;

/// Urns produced by a fresh discovery pass over a scope
pub type KeepSet = HashSet<Urn>;

/// Key under which the orchestrator places the region being crawled
pub const REGION_KEY: &str = "region_name";

/// The unit of reconciliation: every record of one resource type of one
/// service in one region is replaced as a set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Scope {
    pub service: String,
    pub resource_type: String,
    pub region: String,
}

impl Scope {
    pub fn new(service: &str, resource_type: &str, region: &str) -> Self {
        Self {
            service: service.to_string(),
            resource_type: resource_type.to_string(),
            region: region.to_string(),
        }
    }

    /// Same service and type, different region
    pub fn in_region(&self, region: &str) -> Self {
        Self::new(&self.service, &self.resource_type, region)
    }

    pub fn contains(&self, urn: &Urn, account_id: &str) -> bool {
        urn.in_scope(&self.service, &self.resource_type, &self.region, account_id)
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} in {}", self.service, self.resource_type, self.region)
    }
}

/// Options handed through to the provider untouched, apart from the region
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientConfig(Map<String, Value>);

impl ClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    pub fn region(&self) -> Option<&str> {
        self.0.get(REGION_KEY).and_then(|v| v.as_str())
    }

    /// Copy of this config pinned to `region`
    pub fn for_region(&self, region: &str) -> Self {
        let mut config = self.clone();
        config.insert(REGION_KEY, Value::String(region.to_string()));
        config
    }
}

impl From<Map<String, Value>> for ClientConfig {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// A resource or subresource as handed out by a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceHandle {
    pub service: String,
    pub resource_type: String,
    pub resource_id: String,
    /// Region tag set by the provider, if it knows one without another call
    #[serde(default)]
    pub region: Option<String>,
    #[serde(default)]
    pub properties: Value,
}

impl ResourceHandle {
    pub fn new(service: &str, resource_type: &str, resource_id: &str) -> Self {
        Self {
            service: service.to_string(),
            resource_type: resource_type.to_string(),
            resource_id: resource_id.to_string(),
            region: None,
            properties: Value::Object(Map::new()),
        }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }

    pub fn with_properties(mut self, properties: Value) -> Self {
        self.properties = properties;
        self
    }
}

/// An extended property set of a resource fetched through a separate call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeHandle {
    pub attribute_type: String,
    #[serde(default)]
    pub properties: Value,
}

impl AttributeHandle {
    pub fn new(attribute_type: &str, properties: Value) -> Self {
        Self {
            attribute_type: attribute_type.to_string(),
            properties,
        }
    }
}

/// Stored state of a resource at the moment it was discovered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRecord {
    pub urn: Urn,
    pub properties: Value,
    pub discovered_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn new(urn: &Urn, resource: &ResourceHandle) -> Self {
        Self {
            urn: urn.clone(),
            properties: resource.properties.clone(),
            discovered_at: Utc::now(),
        }
    }
}

/// Stored secondary attribute, keyed by its owning resource's urn
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecondaryAttributeRecord {
    pub urn: Urn,
    pub attribute_type: String,
    pub properties: Value,
    pub discovered_at: DateTime<Utc>,
}

impl SecondaryAttributeRecord {
    pub fn new(urn: &Urn, attribute: &AttributeHandle, attribute_type: &str) -> Self {
        Self {
            urn: urn.clone(),
            attribute_type: attribute_type.to_string(),
            properties: attribute.properties.clone(),
            discovered_at: Utc::now(),
        }
    }
}

/// Anything a connector hands back from its read surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoredRecord {
    Resource(ResourceRecord),
    SecondaryAttribute(SecondaryAttributeRecord),
}

impl StoredRecord {
    pub fn urn(&self) -> &Urn {
        match self {
            StoredRecord::Resource(record) => &record.urn,
            StoredRecord::SecondaryAttribute(record) => &record.urn,
        }
    }
}
