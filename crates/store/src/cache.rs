use std::path::PathBuf;

use relay_core::AggregateSnapshot;

use crate::Result;
use crate::document::{UsageDocument, read_document, write_document};

/// Durable last-known-good aggregate, owned exclusively by the orchestrator.
/// Survives process restart so a fresh process starts from cached data
/// instead of an empty view.
#[derive(Debug, Clone)]
pub struct MetricsCache {
    path: PathBuf,
}

impl MetricsCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Returns the persisted aggregate, or an empty one when nothing has
    /// been saved yet or the stored form no longer decodes.
    pub fn load(&self) -> AggregateSnapshot {
        read_document(&self.path)
            .map(UsageDocument::into_aggregate)
            .unwrap_or_default()
    }

    /// Replaces the persisted aggregate wholesale.
    pub fn save(&self, aggregate: &AggregateSnapshot) -> Result<()> {
        write_document(&self.path, &UsageDocument::from_aggregate(aggregate))
    }
}
