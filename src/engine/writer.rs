//! Scope Writer
//!
//! Lists every resource of one scope, writes each resource, its subresources
//! and its secondary attributes to all connectors, and collects the urns that
//! were written. A failure on one entity is logged and skipped; it never aborts
//! the scope.

use crate::discovery::DiscoveryProvider;
use crate::error::ProviderError;
use crate::model::{AttributeHandle, ClientConfig, KeepSet, ResourceHandle, Scope};
use crate::storage::StorageConnector;
use crate::urn::Urn;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Keep-set of one pass over a scope, plus what went wrong along the way
#[derive(Debug, Default)]
pub struct ScopeOutcome {
    pub keep: KeepSet,
    /// Resources and subresources missing from the keep-set due to errors
    pub failed: usize,
    pub attribute_failures: usize,
    /// Writes rejected by a single connector while another stored the record
    pub connector_failures: usize,
}

pub struct ScopeWriter<'a, P: ?Sized> {
    provider: &'a P,
    connectors: &'a [Arc<dyn StorageConnector>],
    account_id: &'a str,
}

impl<'a, P: DiscoveryProvider + ?Sized> ScopeWriter<'a, P> {
    pub fn new(provider: &'a P, connectors: &'a [Arc<dyn StorageConnector>], account_id: &'a str) -> Self {
        Self {
            provider,
            connectors,
            account_id,
        }
    }

    /// Write every resource of `scope`. Only listing the scope itself can fail.
    pub async fn write_scope(
        &self,
        scope: &Scope,
        client_config: &ClientConfig,
    ) -> Result<ScopeOutcome, ProviderError> {
        info!("--> Fetching {} {} from {}", scope.service, scope.resource_type, scope.region);

        let resources = self
            .provider
            .list_resources(&scope.service, &scope.resource_type, client_config)
            .await?;

        let mut outcome = ScopeOutcome::default();
        for resource in &resources {
            self.write_resource(scope, resource, &mut outcome).await;
        }

        debug!(
            "{}: {} listed, {} written, {} failed",
            scope,
            resources.len(),
            outcome.keep.len(),
            outcome.failed
        );
        Ok(outcome)
    }

    async fn write_resource(&self, scope: &Scope, resource: &ResourceHandle, outcome: &mut ScopeOutcome) {
        let region = match self.provider.region_of(resource).await {
            Ok(region) => region,
            Err(e) => {
                error!(
                    "Skipping {} {} {} queried in {}: cannot resolve region: {}",
                    scope.service, scope.resource_type, resource.resource_id, scope.region, e
                );
                outcome.failed += 1;
                return;
            }
        };

        let urn = Urn::new(
            self.account_id,
            &region,
            &scope.service,
            &scope.resource_type,
            &resource.resource_id,
        )
        .with_cloud(self.provider.cloud_name());

        if !self.write_to_all(&urn, resource, outcome).await {
            outcome.failed += 1;
            return;
        }
        outcome.keep.insert(urn.clone());

        // Subresources only after their parent is stored
        self.write_subresources(scope, resource, &urn, outcome).await;
        self.write_secondary_attributes(resource, &urn, outcome).await;
    }

    async fn write_subresources(
        &self,
        scope: &Scope,
        parent: &ResourceHandle,
        parent_urn: &Urn,
        outcome: &mut ScopeOutcome,
    ) {
        let subresources = match self.provider.subresources_of(parent).await {
            Ok(subresources) => subresources,
            Err(e) => {
                error!("Failed to list subresources of {}: {}", parent_urn, e);
                outcome.failed += 1;
                return;
            }
        };

        for subresource in &subresources {
            let loaded = match self.provider.load(subresource).await {
                Ok(loaded) => loaded,
                Err(e) => {
                    error!(
                        "Skipping {} {} of {}: load failed: {}",
                        subresource.resource_type, subresource.resource_id, parent_urn, e
                    );
                    outcome.failed += 1;
                    continue;
                }
            };

            let urn = Urn::subresource(
                self.account_id,
                parent_urn.region(),
                &scope.service,
                &loaded.resource_type,
                parent_urn.resource_id(),
                &loaded.resource_id,
            )
            .with_cloud(self.provider.cloud_name());

            if self.write_to_all(&urn, &loaded, outcome).await {
                outcome.keep.insert(urn);
            } else {
                outcome.failed += 1;
            }
        }
    }

    /// Attributes ride on the parent's urn and never enter the keep-set
    async fn write_secondary_attributes(&self, resource: &ResourceHandle, urn: &Urn, outcome: &mut ScopeOutcome) {
        let attributes: Vec<AttributeHandle> = match self.provider.secondary_attributes_of(resource).await {
            Ok(attributes) => attributes,
            Err(e) => {
                error!("Failed to fetch secondary attributes of {}: {}", urn, e);
                outcome.attribute_failures += 1;
                return;
            }
        };

        for attribute in &attributes {
            info!("---> Fetching {} in {}", attribute.attribute_type, urn.region());
            let mut all_written = true;
            for connector in self.connectors {
                if let Err(e) = connector
                    .write_secondary_attribute(urn, attribute, &attribute.attribute_type)
                    .await
                {
                    error!(
                        "{}: failed to write {} of {}: {}",
                        connector.name(),
                        attribute.attribute_type,
                        urn,
                        e
                    );
                    all_written = false;
                }
            }
            if !all_written {
                outcome.attribute_failures += 1;
            }
        }
    }

    /// Offer the record to every connector; true if at least one stored it
    async fn write_to_all(&self, urn: &Urn, resource: &ResourceHandle, outcome: &mut ScopeOutcome) -> bool {
        let mut stored = 0;
        for connector in self.connectors {
            match connector.write_resource(urn, resource).await {
                Ok(()) => stored += 1,
                Err(e) => {
                    error!("{}: failed to write {}: {}", connector.name(), urn, e);
                    outcome.connector_failures += 1;
                }
            }
        }
        stored > 0
    }
}
