//! Orchestrator
//!
//! Drives a pass over an account: regions, then services, then resource
//! types. Each resource type in each region is one scope, written by the
//! [`ScopeWriter`] and then swept by the [`Reconciler`].
//!
//! Regions can be crawled one after another or fanned out over a bounded set
//! of tokio tasks. In the concurrent case every task builds its own provider
//! session through a factory, while connectors are shared by all tasks.

use super::reconciler::Reconciler;
use super::report::{RegionOutcome, RegionReport, RunReport, ScopeReport};
use super::writer::{ScopeOutcome, ScopeWriter};
use crate::discovery::DiscoveryProvider;
use crate::error::{ProviderError, TaskError};
use crate::model::{ClientConfig, KeepSet, Scope};
use crate::storage::{Connectors, StorageConnector};
use futures::stream::{self, StreamExt};
use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Per-pass policy
#[derive(Debug, Clone, Default)]
pub struct WriteOptions {
    /// Resource types to skip, matched by exact name in every service
    pub exclude: HashSet<String>,
    /// Leave a scope's stored records alone if any of its entities failed.
    /// Off by default: a partial keep-set is reconciled like a complete one.
    pub skip_reconcile_on_failure: bool,
}

impl WriteOptions {
    pub fn excluding<I, S>(resource_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            exclude: resource_types.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn is_excluded(&self, resource_type: &str) -> bool {
        self.exclude.contains(resource_type)
    }
}

pub struct Orchestrator<P> {
    provider: P,
    connectors: Connectors,
}

impl<P: DiscoveryProvider + 'static> Orchestrator<P> {
    pub fn new(provider: P, connectors: Vec<Arc<dyn StorageConnector>>) -> Self {
        Self::with_connectors(provider, Arc::new(connectors))
    }

    pub fn with_connectors(provider: P, connectors: Connectors) -> Self {
        Self { provider, connectors }
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn connectors(&self) -> &Connectors {
        &self.connectors
    }

    /// Write every region reported enabled, one after another
    pub async fn write_all(
        &self,
        options: &WriteOptions,
        client_config: &ClientConfig,
    ) -> Result<RunReport, ProviderError> {
        let run_id = Uuid::new_v4().to_string();

        async {
            info!("Writing resources in all regions");
            let account_id = self.provider.account_id().await?;
            let regions = self.provider.enabled_regions().await?;

            let mut outcomes = Vec::with_capacity(regions.len());
            for region in regions {
                let result = self
                    .write_region(options, &region, client_config)
                    .instrument(info_span!("region", region = %region))
                    .await
                    .map_err(|source| {
                        error!("Region {} failed: {}", region, source);
                        TaskError::Failed {
                            region: region.clone(),
                            source,
                        }
                    });
                outcomes.push(RegionOutcome { region, result });
            }

            Ok::<_, ProviderError>(RunReport {
                run_id: run_id.clone(),
                account_id,
                regions: outcomes,
            })
        }
        .instrument(info_span!("run", run_id = %run_id))
        .await
    }

    /// Write every region on a pool of at most `concurrency` tasks.
    ///
    /// A region whose task errors or panics is reported in its
    /// [`RegionOutcome`] and does not disturb the other regions.
    pub async fn write_all_concurrently<F>(
        &self,
        options: &WriteOptions,
        client_config: &ClientConfig,
        concurrency: usize,
        session_factory: F,
    ) -> Result<RunReport, ProviderError>
    where
        F: Fn() -> Result<P, ProviderError> + Send + Sync + 'static,
    {
        let run_id = Uuid::new_v4().to_string();
        let concurrency = concurrency.max(1);
        let factory = Arc::new(session_factory);

        async {
            info!("Writing resources in all regions");
            warn!("Using concurrency of {}; connectors are shared by all region tasks", concurrency);

            let account_id = self.provider.account_id().await?;
            let regions = self.provider.enabled_regions().await?;

            let mut indexed: Vec<(usize, RegionOutcome)> = stream::iter(regions.into_iter().enumerate())
                .map(|(index, region)| {
                    let factory = Arc::clone(&factory);
                    let connectors = Arc::clone(&self.connectors);
                    let options = options.clone();
                    let client_config = client_config.clone();
                    let span = info_span!("region", region = %region);

                    async move {
                        let task_region = region.clone();
                        let handle = tokio::spawn(
                            async move {
                                let session = (*factory)()?;
                                let orchestrator = Orchestrator::with_connectors(session, connectors);
                                orchestrator
                                    .write_region(&options, &task_region, &client_config)
                                    .await
                            }
                            .instrument(span),
                        );

                        let result = match handle.await {
                            Ok(Ok(report)) => Ok(report),
                            Ok(Err(source)) => {
                                error!("Region {} failed: {}", region, source);
                                Err(TaskError::Failed {
                                    region: region.clone(),
                                    source,
                                })
                            }
                            Err(join_error) => {
                                let message = if join_error.is_panic() {
                                    panic_message(join_error.into_panic())
                                } else {
                                    join_error.to_string()
                                };
                                error!("Region {} task aborted: {}", region, message);
                                Err(TaskError::Aborted {
                                    region: region.clone(),
                                    message,
                                })
                            }
                        };
                        (index, RegionOutcome { region, result })
                    }
                })
                .buffer_unordered(concurrency)
                .collect()
                .await;

            indexed.sort_by_key(|(index, _)| *index);

            Ok::<_, ProviderError>(RunReport {
                run_id: run_id.clone(),
                account_id,
                regions: indexed.into_iter().map(|(_, outcome)| outcome).collect(),
            })
        }
        .instrument(info_span!("run", run_id = %run_id))
        .await
    }

    /// Write every non-excluded resource type of every service in `region`
    pub async fn write_region(
        &self,
        options: &WriteOptions,
        region: &str,
        client_config: &ClientConfig,
    ) -> Result<RegionReport, ProviderError> {
        let account_id = self.provider.account_id().await?;
        let client_config = client_config.for_region(region);
        let mut report = RegionReport::new(region);

        for service in self.provider.list_services().await? {
            info!("Writing all {} resources in {}", service, region);

            let resource_types = match self.provider.list_resource_types(&service).await {
                Ok(resource_types) => resource_types,
                Err(e) => {
                    error!("Skipping {} in {}: cannot list resource types: {}", service, region, e);
                    report.skipped_services.push(service);
                    continue;
                }
            };

            for resource_type in resource_types {
                if options.is_excluded(&resource_type) {
                    info!("Skipping {} as per exclude list", resource_type);
                    continue;
                }
                let scope = Scope::new(&service, &resource_type, region);
                report
                    .scopes
                    .push(self.write_scope(&scope, &account_id, options, &client_config).await);
            }
        }

        Ok(report)
    }

    /// Write one scope, then reconcile it in every region it can report
    pub async fn write_scope(
        &self,
        scope: &Scope,
        account_id: &str,
        options: &WriteOptions,
        client_config: &ClientConfig,
    ) -> ScopeReport {
        let mut report = ScopeReport::new(scope);
        let writer = ScopeWriter::new(&self.provider, &self.connectors, account_id);

        let outcome = match writer.write_scope(scope, client_config).await {
            Ok(outcome) => outcome,
            Err(e) => {
                // Without a keep-set there is nothing safe to reconcile against
                error!("Failed to list {}; stored records left untouched: {}", scope, e);
                report.listing_error = Some(e.to_string());
                return report;
            }
        };

        report.written = outcome.keep.len();
        report.failed = outcome.failed;
        report.attribute_failures = outcome.attribute_failures;
        report.connector_failures = outcome.connector_failures;

        if outcome.failed > 0 {
            warn!(
                "{} entities of {} could not be written; reconciling may remove records of resources that still exist",
                outcome.failed, scope
            );
            if options.skip_reconcile_on_failure {
                warn!("Not reconciling {} as requested", scope);
                report.reconcile_skipped = true;
                return report;
            }
        }

        let reconciler = Reconciler::new(&self.connectors);
        for target in self.reconcile_targets(scope, &outcome) {
            let keep: KeepSet = outcome
                .keep
                .iter()
                .filter(|urn| target.contains(urn, account_id))
                .cloned()
                .collect();
            report.reconcile_failures += reconciler.reconcile(&target, account_id, &keep).await;
            report.reconciled.push(target);
        }

        report
    }

    /// Scopes to sweep after writing `scope`: its own type and its subresource
    /// types, in every region the API may report and every region it did report
    fn reconcile_targets(&self, scope: &Scope, outcome: &ScopeOutcome) -> Vec<Scope> {
        let mut regions: BTreeSet<String> = self
            .provider
            .regions_returned_from(&scope.service, &scope.region)
            .into_iter()
            .collect();
        regions.extend(outcome.keep.iter().map(|urn| urn.region().to_string()));

        let mut resource_types: BTreeSet<String> = BTreeSet::new();
        resource_types.insert(scope.resource_type.clone());
        resource_types.extend(self.provider.subresource_types(&scope.service, &scope.resource_type));
        resource_types.extend(
            outcome
                .keep
                .iter()
                .filter(|urn| urn.is_subresource())
                .map(|urn| urn.resource_type().to_string()),
        );

        regions
            .iter()
            .flat_map(|region| {
                resource_types
                    .iter()
                    .map(move |resource_type| Scope::new(&scope.service, resource_type, region))
            })
            .collect()
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {}", message)
    } else {
        "panicked".to_string()
    }
}
