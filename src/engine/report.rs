//! Pass reports
//!
//! Every traversal returns what it wrote, what failed and what it reconciled,
//! so callers do not have to scrape logs to learn whether a region completed.

use crate::error::TaskError;
use crate::model::Scope;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

/// Result of writing and reconciling one scope
#[derive(Debug, Clone, Serialize)]
pub struct ScopeReport {
    pub scope: Scope,
    /// Urns that made it into the keep-set
    pub written: usize,
    /// Resources and subresources that could not be fetched or written
    pub failed: usize,
    /// Secondary attributes that could not be fetched or written
    pub attribute_failures: usize,
    /// Writes rejected by one connector but stored by another
    pub connector_failures: usize,
    /// Set when listing the scope failed; nothing was reconciled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_error: Option<String>,
    /// Scopes whose stale records were swept
    pub reconciled: Vec<Scope>,
    pub reconcile_skipped: bool,
    /// Connector deletes that failed
    pub reconcile_failures: usize,
}

impl ScopeReport {
    pub fn new(scope: &Scope) -> Self {
        Self {
            scope: scope.clone(),
            written: 0,
            failed: 0,
            attribute_failures: 0,
            connector_failures: 0,
            listing_error: None,
            reconciled: Vec::new(),
            reconcile_skipped: false,
            reconcile_failures: 0,
        }
    }

    pub fn is_clean(&self) -> bool {
        self.listing_error.is_none()
            && self.failed == 0
            && self.attribute_failures == 0
            && self.connector_failures == 0
            && self.reconcile_failures == 0
    }
}

/// Result of traversing one region
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegionReport {
    pub region: String,
    pub scopes: Vec<ScopeReport>,
    /// Services whose resource types could not be listed
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub skipped_services: Vec<String>,
}

impl RegionReport {
    pub fn new(region: &str) -> Self {
        Self {
            region: region.to_string(),
            ..Self::default()
        }
    }

    pub fn written(&self) -> usize {
        self.scopes.iter().map(|s| s.written).sum()
    }

    pub fn scope(&self, service: &str, resource_type: &str) -> Option<&ScopeReport> {
        self.scopes
            .iter()
            .find(|s| s.scope.service == service && s.scope.resource_type == resource_type)
    }
}

/// What became of one region's task
#[derive(Debug)]
pub struct RegionOutcome {
    pub region: String,
    pub result: Result<RegionReport, TaskError>,
}

impl Serialize for RegionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("RegionOutcome", 3)?;
        state.serialize_field("region", &self.region)?;
        match &self.result {
            Ok(report) => {
                state.serialize_field("report", report)?;
                state.serialize_field("error", &None::<String>)?;
            }
            Err(err) => {
                state.serialize_field("report", &None::<RegionReport>)?;
                state.serialize_field("error", &Some(err.to_string()))?;
            }
        }
        state.end()
    }
}

/// Result of a whole pass over an account
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub account_id: String,
    pub regions: Vec<RegionOutcome>,
}

impl RunReport {
    pub fn written(&self) -> usize {
        self.regions
            .iter()
            .filter_map(|o| o.result.as_ref().ok())
            .map(RegionReport::written)
            .sum()
    }

    pub fn failed_regions(&self) -> Vec<&TaskError> {
        self.regions
            .iter()
            .filter_map(|o| o.result.as_ref().err())
            .collect()
    }

    pub fn region(&self, region: &str) -> Option<&RegionOutcome> {
        self.regions.iter().find(|o| o.region == region)
    }
}
