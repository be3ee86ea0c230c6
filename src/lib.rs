//! Cloud account discovery with pluggable storage and stale-record sweeping.
//!
//! A pass walks every enabled region, every service and every resource type
//! of an account through a [`DiscoveryProvider`], writes what it finds to one
//! or more [`StorageConnector`]s, and then deletes stored records of each
//! scope that the pass did not see again.
//!
//! ```ignore
//! use cloudsweep::{ClientConfig, InventoryProvider, MemoryConnector, Orchestrator, WriteOptions};
//! use std::sync::Arc;
//!
//! async fn sweep(provider: InventoryProvider) -> anyhow::Result<()> {
//!     let orchestrator = Orchestrator::new(provider, vec![Arc::new(MemoryConnector::new())]);
//!     let report = orchestrator
//!         .write_all(&WriteOptions::excluding(["instance"]), &ClientConfig::new())
//!         .await?;
//!     println!("{} urns written", report.written());
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod discovery;
pub mod engine;
pub mod error;
pub mod model;
pub mod storage;
pub mod urn;

pub use discovery::{DiscoveryProvider, Inventory, InventoryProvider};
pub use engine::{
    Orchestrator, Reconciler, RegionOutcome, RegionReport, RunReport, ScopeReport, ScopeWriter,
    WriteOptions,
};
pub use error::{ConnectorError, ProviderError, TaskError, UrnParseError};
pub use model::{
    AttributeHandle, ClientConfig, KeepSet, ResourceHandle, ResourceRecord, Scope,
    SecondaryAttributeRecord, StoredRecord,
};
pub use storage::{Connectors, HttpConnector, MemoryConnector, StorageConnector};
pub use urn::Urn;
