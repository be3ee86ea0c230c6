//! Storage connectors
//!
//! A [`StorageConnector`] persists resource and secondary attribute records
//! and removes stale ones when the engine reconciles a scope. One pass can
//! write to any number of connectors.
//!
//! # Concurrency contract
//!
//! In concurrent mode every region task shares the same connector instances,
//! so every method must tolerate being called from several tasks at once.
//! The `Send + Sync` bound makes the compiler hold implementations to that;
//! backends that cannot accept parallel requests must serialize internally.
//!
//! - [`memory`] - In-process store, optionally persisted to a JSON file
//! - [`http`] - Forwards records to a collector HTTP API

pub mod http;
pub mod memory;

use crate::error::ConnectorError;
use crate::model::{AttributeHandle, KeepSet, ResourceHandle, ResourceRecord, Scope, StoredRecord};
use crate::urn::Urn;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::sync::Arc;

pub use http::HttpConnector;
pub use memory::MemoryConnector;

/// Connectors shared by every task of a pass
pub type Connectors = Arc<Vec<Arc<dyn StorageConnector>>>;

#[async_trait]
pub trait StorageConnector: Send + Sync {
    /// Short name used in log lines
    fn name(&self) -> &str;

    /// Upsert a resource or subresource
    async fn write_resource(&self, urn: &Urn, resource: &ResourceHandle) -> Result<(), ConnectorError>;

    /// Upsert a secondary attribute under its owning resource's urn
    async fn write_secondary_attribute(
        &self,
        urn: &Urn,
        attribute: &AttributeHandle,
        attribute_type: &str,
    ) -> Result<(), ConnectorError>;

    /// Delete every record of `scope` in `account_id` whose urn is not in
    /// `urns_to_keep`. Records outside the scope must be left alone.
    async fn delete_resources_not_in(
        &self,
        scope: &Scope,
        account_id: &str,
        urns_to_keep: &KeepSet,
    ) -> Result<(), ConnectorError>;

    async fn read_resource(&self, urn: &Urn) -> Result<Option<ResourceRecord>, ConnectorError>;

    /// Delete one resource together with its secondary attributes
    async fn delete_resource(&self, urn: &Urn) -> Result<(), ConnectorError>;

    /// Every stored record, produced lazily
    fn read_all(&self) -> BoxStream<'_, Result<StoredRecord, ConnectorError>>;
}
