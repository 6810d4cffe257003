use std::path::{Path, PathBuf};

use relay_core::AggregateSnapshot;
use tracing::debug;

use crate::Result;
use crate::document::{UsageDocument, read_document, write_document};

/// Namespace both the writer process and the out-of-process reader must
/// agree on. A mismatch silently reads as "no data" on the reader side.
pub const DEFAULT_NAMESPACE: &str = "quota-relay";

/// Cross-process replica of the aggregate snapshot: written wholesale by the
/// orchestrator, read-only for the out-of-process consumer. The record lives
/// at `<dir>/<namespace>.json`; a companion socket at `<dir>/<namespace>.sock`
/// carries the best-effort "data changed" nudge.
#[derive(Debug, Clone)]
pub struct PublicationStore {
    dir: PathBuf,
    namespace: String,
}

impl PublicationStore {
    pub fn new(dir: impl Into<PathBuf>, namespace: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            namespace: namespace.into(),
        }
    }

    pub fn record_path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.namespace))
    }

    pub fn signal_path(&self) -> PathBuf {
        self.dir.join(format!("{}.sock", self.namespace))
    }

    /// Replaces the published record as a single atomic unit.
    pub fn publish(&self, aggregate: &AggregateSnapshot) -> Result<()> {
        write_document(&self.record_path(), &UsageDocument::from_aggregate(aggregate))
    }

    /// Returns the last published aggregate, or empty when nothing has been
    /// published under this namespace or the record fails to decode. Entries
    /// for sources unknown to this build are skipped, not errors.
    pub fn read(&self) -> AggregateSnapshot {
        read_document(&self.record_path())
            .map(UsageDocument::into_aggregate)
            .unwrap_or_default()
    }

    /// Removes the published record. Only an explicit user reset calls this.
    pub fn clear(&self) -> Result<()> {
        let path = self.record_path();
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        Ok(())
    }

    /// Fire-and-forget nudge telling the out-of-process consumer to re-read
    /// soon. No listener, no delivery guarantee, no error surface.
    pub fn notify(&self) {
        notify_socket(&self.signal_path());
    }
}

#[cfg(unix)]
fn notify_socket(path: &Path) {
    use std::io::Write;
    use std::os::unix::net::UnixStream;

    match UnixStream::connect(path) {
        Ok(mut stream) => {
            if let Err(err) = stream.write_all(&[1]) {
                debug!(path = %path.display(), "publication nudge dropped: {err}");
            }
        }
        Err(err) => {
            debug!(path = %path.display(), "no publication listener: {err}");
        }
    }
}

#[cfg(not(unix))]
fn notify_socket(_path: &Path) {}
