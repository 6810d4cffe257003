mod cache;
mod document;
mod publication;

pub use cache::MetricsCache;
pub use document::{SNAPSHOT_VERSION, SourceRecord, UsageDocument, WindowRecord};
pub use publication::{DEFAULT_NAMESPACE, PublicationStore};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
