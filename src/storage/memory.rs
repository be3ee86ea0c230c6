//! Memory Connector
//!
//! Keeps records in process, keyed by urn. The contents can be loaded from and
//! saved to a JSON file so that consecutive runs reconcile against each other.

use super::StorageConnector;
use crate::error::ConnectorError;
use crate::model::{
    AttributeHandle, KeepSet, ResourceHandle, ResourceRecord, Scope, SecondaryAttributeRecord,
    StoredRecord,
};
use crate::urn::Urn;
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::sync::RwLock;

#[derive(Debug, Clone, Default)]
struct Entry {
    resource: Option<ResourceRecord>,
    attributes: BTreeMap<String, SecondaryAttributeRecord>,
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryConnector {
    data: RwLock<BTreeMap<Urn, Entry>>,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from records previously written by [`MemoryConnector::save`]
    pub fn from_records(records: Vec<StoredRecord>) -> Self {
        let mut data: BTreeMap<Urn, Entry> = BTreeMap::new();
        for record in records {
            match record {
                StoredRecord::Resource(record) => {
                    let key = record.urn.clone();
                    data.entry(key).or_default().resource = Some(record);
                }
                StoredRecord::SecondaryAttribute(record) => {
                    data.entry(record.urn.clone())
                        .or_default()
                        .attributes
                        .insert(record.attribute_type.clone(), record);
                }
            }
        }
        Self {
            data: RwLock::new(data),
        }
    }

    /// Load a store from a JSON file; a missing file yields an empty store
    pub async fn load(path: &Path) -> Result<Self, ConnectorError> {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(e) => return Err(e.into()),
        };
        let records: Vec<StoredRecord> = serde_json::from_str(&content)?;
        Ok(Self::from_records(records))
    }

    /// Write every record to a JSON file
    pub async fn save(&self, path: &Path) -> Result<(), ConnectorError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let records = self.snapshot().await;
        let content = serde_json::to_string_pretty(&records)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }

    /// Urns of every stored resource record
    pub async fn urns(&self) -> Vec<Urn> {
        self.data
            .read()
            .await
            .iter()
            .filter(|(_, entry)| entry.resource.is_some())
            .map(|(urn, _)| urn.clone())
            .collect()
    }

    pub async fn attributes_of(&self, urn: &Urn) -> Vec<SecondaryAttributeRecord> {
        self.data
            .read()
            .await
            .get(urn)
            .map(|entry| entry.attributes.values().cloned().collect())
            .unwrap_or_default()
    }

    async fn snapshot(&self) -> Vec<StoredRecord> {
        let data = self.data.read().await;
        let mut records = Vec::new();
        for entry in data.values() {
            if let Some(resource) = &entry.resource {
                records.push(StoredRecord::Resource(resource.clone()));
            }
            records.extend(
                entry
                    .attributes
                    .values()
                    .cloned()
                    .map(StoredRecord::SecondaryAttribute),
            );
        }
        records
    }
}

#[async_trait]
impl StorageConnector for MemoryConnector {
    fn name(&self) -> &str {
        "memory"
    }

    async fn write_resource(&self, urn: &Urn, resource: &ResourceHandle) -> Result<(), ConnectorError> {
        let record = ResourceRecord::new(urn, resource);
        self.data.write().await.entry(urn.clone()).or_default().resource = Some(record);
        Ok(())
    }

    async fn write_secondary_attribute(
        &self,
        urn: &Urn,
        attribute: &AttributeHandle,
        attribute_type: &str,
    ) -> Result<(), ConnectorError> {
        let record = SecondaryAttributeRecord::new(urn, attribute, attribute_type);
        self.data
            .write()
            .await
            .entry(urn.clone())
            .or_default()
            .attributes
            .insert(attribute_type.to_string(), record);
        Ok(())
    }

    async fn delete_resources_not_in(
        &self,
        scope: &Scope,
        account_id: &str,
        urns_to_keep: &KeepSet,
    ) -> Result<(), ConnectorError> {
        let mut data = self.data.write().await;
        let before = data.len();
        data.retain(|urn, _| !scope.contains(urn, account_id) || urns_to_keep.contains(urn));

        let removed = before - data.len();
        if removed > 0 {
            tracing::debug!("memory: removed {} stale records of {}", removed, scope);
        }
        Ok(())
    }

    async fn read_resource(&self, urn: &Urn) -> Result<Option<ResourceRecord>, ConnectorError> {
        Ok(self
            .data
            .read()
            .await
            .get(urn)
            .and_then(|entry| entry.resource.clone()))
    }

    async fn delete_resource(&self, urn: &Urn) -> Result<(), ConnectorError> {
        self.data.write().await.remove(urn);
        Ok(())
    }

    fn read_all(&self) -> BoxStream<'_, Result<StoredRecord, ConnectorError>> {
        stream::once(self.snapshot())
            .flat_map(|records| stream::iter(records.into_iter().map(Ok::<_, ConnectorError>)))
            .boxed()
    }
}
