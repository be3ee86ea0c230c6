//! Discovery, write and reconcile engine
//!
//! # Architecture
//!
//! - [`orchestrator`] - Walks regions, services and resource types; owns exclusion and concurrency
//! - [`writer`] - Writes one scope to every connector and builds its keep-set
//! - [`reconciler`] - Deletes stored records of a scope missing from the keep-set
//! - [`report`] - What a pass wrote, skipped and swept

pub mod orchestrator;
pub mod reconciler;
pub mod report;
pub mod writer;

pub use orchestrator::{Orchestrator, WriteOptions};
pub use reconciler::Reconciler;
pub use report::{RegionOutcome, RegionReport, RunReport, ScopeReport};
pub use writer::{ScopeOutcome, ScopeWriter};
