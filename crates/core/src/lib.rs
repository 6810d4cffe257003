use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One tracked upstream quota provider.
///
/// The set is closed and the string keys are stable: they name entries in the
/// persisted usage documents and must never be renamed once shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Source {
    #[serde(rename = "claude")]
    Claude,
    #[serde(rename = "claude-code")]
    ClaudeCode,
    #[serde(rename = "openai")]
    OpenAi,
}

impl Source {
    pub const ALL: [Source; 3] = [Source::Claude, Source::ClaudeCode, Source::OpenAi];

    pub fn key(&self) -> &'static str {
        match self {
            Source::Claude => "claude",
            Source::ClaudeCode => "claude-code",
            Source::OpenAi => "openai",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Source::Claude => "Claude",
            Source::ClaudeCode => "Claude Code",
            Source::OpenAi => "OpenAI",
        }
    }

    pub fn from_key(key: &str) -> Option<Source> {
        Source::ALL.into_iter().find(|source| source.key() == key)
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Named quota window within a source.
///
/// Which kinds a source reports is source-specific; unknown kinds found in a
/// persisted document are skipped on read rather than rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    Session,
    Weekly,
    Secondary,
}

impl WindowKind {
    pub const ALL: [WindowKind; 3] =
        [WindowKind::Session, WindowKind::Weekly, WindowKind::Secondary];

    pub fn key(&self) -> &'static str {
        match self {
            WindowKind::Session => "session",
            WindowKind::Weekly => "weekly",
            WindowKind::Secondary => "secondary",
        }
    }

    pub fn from_key(key: &str) -> Option<WindowKind> {
        WindowKind::ALL.into_iter().find(|kind| kind.key() == key)
    }
}

/// One bounded quota window: how much is used out of how much is allowed,
/// and when the window resets. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UsageWindow {
    pub used: f64,
    pub total: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
}

impl UsageWindow {
    pub fn new(used: f64, total: f64, resets_at: Option<DateTime<Utc>>) -> Self {
        Self {
            used,
            total,
            resets_at,
        }
    }

    /// Window expressed directly as a utilization percentage.
    pub fn from_percent(percent: f64, resets_at: Option<DateTime<Utc>>) -> Self {
        Self::new(percent, 100.0, resets_at)
    }

    /// Consumed share of the window in percent, clamped to `[0, 100]`.
    /// A window with no capacity reads as 0, not as a division error.
    pub fn percentage(&self) -> f64 {
        if self.total <= 0.0 {
            return 0.0;
        }
        (self.used / self.total * 100.0).clamp(0.0, 100.0)
    }

    /// Capacity left in the window, clamped to `[0, total]`.
    pub fn remaining(&self) -> f64 {
        if self.total <= 0.0 {
            return 0.0;
        }
        (self.total - self.used).clamp(0.0, self.total)
    }
}

/// One source's usage windows as observed by a single fetch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub source: Source,
    pub windows: BTreeMap<WindowKind, UsageWindow>,
    pub fetched_at: DateTime<Utc>,
}

impl MetricsSnapshot {
    pub fn new(source: Source, fetched_at: DateTime<Utc>) -> Self {
        Self {
            source,
            windows: BTreeMap::new(),
            fetched_at,
        }
    }

    pub fn with_window(mut self, kind: WindowKind, window: UsageWindow) -> Self {
        self.windows.insert(kind, window);
        self
    }

    pub fn window(&self, kind: WindowKind) -> Option<&UsageWindow> {
        self.windows.get(&kind)
    }
}

/// The latest known-good snapshot per source. A source appears only once it
/// has produced a known-good result; a failed fetch never removes an entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AggregateSnapshot {
    pub entries: BTreeMap<Source, MetricsSnapshot>,
}

impl AggregateSnapshot {
    pub fn get(&self, source: Source) -> Option<&MetricsSnapshot> {
        self.entries.get(&source)
    }

    pub fn insert(&mut self, snapshot: MetricsSnapshot) {
        self.entries.insert(snapshot.source, snapshot);
    }

    pub fn contains(&self, source: Source) -> bool {
        self.entries.contains_key(&source)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Classified failure of a single source fetch.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("not authenticated: {0}")]
    NotAuthenticated(String),
    #[error("network failure: {0}")]
    TransientNetwork(String),
    #[error("remote rejected request ({status}): {body}")]
    RemoteRejected { status: u16, body: String },
    #[error("response decode failed: {context}")]
    DecodeFailed { context: String },
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::NotAuthenticated(_) => FetchErrorKind::NotAuthenticated,
            FetchError::TransientNetwork(_) => FetchErrorKind::TransientNetwork,
            FetchError::RemoteRejected { .. } => FetchErrorKind::RemoteRejected,
            FetchError::DecodeFailed { .. } => FetchErrorKind::DecodeFailed,
        }
    }
}

/// Stable classification of a `FetchError`, safe to persist and serialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchErrorKind {
    NotAuthenticated,
    TransientNetwork,
    RemoteRejected,
    DecodeFailed,
}

/// Diagnostic record of the most recent failed fetch, surfaced to the live
/// consumer. The cached per-source data stays authoritative for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshFailure {
    pub source: Source,
    pub kind: FetchErrorKind,
    pub message: String,
    pub observed_at: DateTime<Utc>,
}

impl RefreshFailure {
    pub fn new(source: Source, error: &FetchError) -> Self {
        Self {
            source,
            kind: error.kind(),
            message: error.to_string(),
            observed_at: Utc::now(),
        }
    }
}
