use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use relay_core::{AggregateSnapshot, MetricsSnapshot, Source, UsageWindow, WindowKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;

/// Current document format version. Bump on breaking shape changes; readers
/// treat documents from a newer writer as absent rather than guessing.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Persisted form of an aggregate snapshot, shared by the local cache and the
/// cross-process publication record. Keys are plain strings so a reader built
/// against an older source enumeration can skip entries it does not know.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsageDocument {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceRecord {
    pub fetched_at: DateTime<Utc>,
    pub windows: BTreeMap<String, WindowRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowRecord {
    pub used: f64,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageDocument {
    pub fn from_aggregate(aggregate: &AggregateSnapshot) -> Self {
        let sources = aggregate
            .entries
            .iter()
            .map(|(source, snapshot)| {
                let windows = snapshot
                    .windows
                    .iter()
                    .map(|(kind, window)| {
                        (
                            kind.key().to_string(),
                            WindowRecord {
                                used: window.used,
                                total: window.total,
                                resets_at: window.resets_at,
                            },
                        )
                    })
                    .collect();
                (
                    source.key().to_string(),
                    SourceRecord {
                        fetched_at: snapshot.fetched_at,
                        windows,
                    },
                )
            })
            .collect();
        Self {
            version: SNAPSHOT_VERSION,
            generated_at: Utc::now(),
            sources,
        }
    }

    /// Lenient conversion back into the in-memory form: unknown source keys
    /// and unknown window keys are skipped entry-wise, and a document from a
    /// newer writer reads as empty.
    pub fn into_aggregate(self) -> AggregateSnapshot {
        if self.version > SNAPSHOT_VERSION {
            debug!(
                version = self.version,
                "usage document from newer writer, treating as empty"
            );
            return AggregateSnapshot::default();
        }
        let mut aggregate = AggregateSnapshot::default();
        for (key, record) in self.sources {
            let Some(source) = Source::from_key(&key) else {
                debug!(key = %key, "skipping unknown source in usage document");
                continue;
            };
            let mut snapshot = MetricsSnapshot::new(source, record.fetched_at);
            for (window_key, window) in record.windows {
                let Some(kind) = WindowKind::from_key(&window_key) else {
                    continue;
                };
                snapshot.windows.insert(
                    kind,
                    UsageWindow::new(window.used, window.total, window.resets_at),
                );
            }
            aggregate.insert(snapshot);
        }
        aggregate
    }
}

/// Reads a persisted usage document, treating anything unreadable as absent.
/// Corrupt data must never escalate beyond an empty aggregate.
pub(crate) fn read_document(path: &Path) -> Option<UsageDocument> {
    let contents = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(document) => Some(document),
        Err(err) => {
            debug!(path = %path.display(), "discarding unreadable usage document: {err}");
            None
        }
    }
}

/// Writes the document to a sibling temp file and renames it into place so a
/// reader (or a crash) can never observe a half-written record.
pub(crate) fn write_document(path: &Path, document: &UsageDocument) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let temp_path = path.with_extension("json.tmp");
    let contents = serde_json::to_string_pretty(document)?;
    fs::write(&temp_path, contents)?;
    fs::rename(&temp_path, path)?;
    Ok(())
}
