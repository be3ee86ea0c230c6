//! Reconciler
//!
//! Removes stored records of a scope that did not show up in the latest pass.
//! Connectors do the actual query and delete; this only hands them the scope
//! and the keep-set.

use crate::model::{KeepSet, Scope};
use crate::storage::StorageConnector;
use std::sync::Arc;

pub struct Reconciler<'a> {
    connectors: &'a [Arc<dyn StorageConnector>],
}

impl<'a> Reconciler<'a> {
    pub fn new(connectors: &'a [Arc<dyn StorageConnector>]) -> Self {
        Self { connectors }
    }

    /// Delete every record of `scope` in `account_id` not in `keep`. An empty
    /// keep-set empties the scope. Returns the number of connectors that
    /// failed; the others are reconciled regardless.
    pub async fn reconcile(&self, scope: &Scope, account_id: &str, keep: &KeepSet) -> usize {
        tracing::info!(
            "--> Deleting {} {} from {} ({} to keep)",
            scope.service,
            scope.resource_type,
            scope.region,
            keep.len()
        );

        let mut failures = 0;
        for connector in self.connectors {
            if let Err(e) = connector.delete_resources_not_in(scope, account_id, keep).await {
                tracing::error!("{}: failed to reconcile {}: {}", connector.name(), scope, e);
                failures += 1;
            }
        }
        failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ConnectorError;
    use crate::model::{AttributeHandle, ResourceHandle, ResourceRecord, StoredRecord};
    use crate::storage::MemoryConnector;
    use crate::urn::Urn;
    use async_trait::async_trait;
    use futures::stream::BoxStream;

    struct BrokenConnector;

    #[async_trait]
    impl StorageConnector for BrokenConnector {
        fn name(&self) -> &str {
            "broken"
        }

        async fn write_resource(&self, _: &Urn, _: &ResourceHandle) -> Result<(), ConnectorError> {
            Err(ConnectorError::Backend("down".to_string()))
        }

        async fn write_secondary_attribute(
            &self,
            _: &Urn,
            _: &AttributeHandle,
            _: &str,
        ) -> Result<(), ConnectorError> {
            Err(ConnectorError::Backend("down".to_string()))
        }

        async fn delete_resources_not_in(&self, _: &Scope, _: &str, _: &KeepSet) -> Result<(), ConnectorError> {
            Err(ConnectorError::Backend("down".to_string()))
        }

        async fn read_resource(&self, _: &Urn) -> Result<Option<ResourceRecord>, ConnectorError> {
            Ok(None)
        }

        async fn delete_resource(&self, _: &Urn) -> Result<(), ConnectorError> {
            Ok(())
        }

        fn read_all(&self) -> BoxStream<'_, Result<StoredRecord, ConnectorError>> {
            Box::pin(futures::stream::empty())
        }
    }

    #[tokio::test]
    async fn test_empty_keep_set_empties_scope_despite_failing_peer() {
        let memory = Arc::new(MemoryConnector::new());
        let urn = Urn::new("1", "us-east-1", "ec2", "vpc", "vpc-1");
        memory.write_resource(&urn, &ResourceHandle::new("ec2", "vpc", "vpc-1")).await.unwrap();

        let connectors: Vec<Arc<dyn StorageConnector>> = vec![Arc::new(BrokenConnector), memory.clone()];
        let failures = Reconciler::new(&connectors)
            .reconcile(&Scope::new("ec2", "vpc", "us-east-1"), "1", &KeepSet::new())
            .await;

        assert_eq!(failures, 1);
        assert!(memory.urns().await.is_empty());
    }
}
