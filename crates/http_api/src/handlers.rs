use axum::Json;
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use relay_core::{AggregateSnapshot, RefreshFailure, Source};
use serde::Serialize;

use crate::errors::HttpError;
use crate::state::HttpState;

/// What the UI should show for one source. A transient failure never blanks
/// a source: it either has data (fresh or stale) or an explained absence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Ok,
    Stale,
    NotConfigured,
    Unavailable,
}

#[derive(Serialize)]
pub struct WindowView {
    pub kind: &'static str,
    pub used: f64,
    pub total: f64,
    pub percentage: f64,
    pub remaining: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resets_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct SourceView {
    pub source: &'static str,
    pub display_name: &'static str,
    pub state: ConnectionState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    pub windows: Vec<WindowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_failure: Option<RefreshFailure>,
}

#[derive(Serialize)]
pub struct UsageResponse {
    pub sources: Vec<SourceView>,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub refreshing: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<RefreshFailure>,
}

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

pub async fn usage(State(state): State<HttpState>) -> Json<UsageResponse> {
    let aggregate = state.orchestrator.current_aggregate();
    Json(usage_response(&state, &aggregate))
}

pub async fn usage_source(
    State(state): State<HttpState>,
    Path(source): Path<String>,
) -> Result<Json<SourceView>, HttpError> {
    let source = parse_source(&source)?;
    let aggregate = state.orchestrator.current_aggregate();
    Ok(Json(source_view(&state, &aggregate, source)))
}

pub async fn status(State(state): State<HttpState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        refreshing: state.orchestrator.is_refreshing(),
        last_error: state.orchestrator.last_error(),
    })
}

pub async fn refresh_all(
    State(state): State<HttpState>,
) -> Result<Json<UsageResponse>, HttpError> {
    let aggregate = state.orchestrator.refresh_all().await?;
    Ok(Json(usage_response(&state, &aggregate)))
}

pub async fn refresh_source(
    State(state): State<HttpState>,
    Path(source): Path<String>,
) -> Result<Json<SourceView>, HttpError> {
    let source = parse_source(&source)?;
    let aggregate = state.orchestrator.refresh(source).await?;
    Ok(Json(source_view(&state, &aggregate, source)))
}

pub async fn reset(State(state): State<HttpState>) -> Result<Json<serde_json::Value>, HttpError> {
    state.orchestrator.reset().await?;
    Ok(Json(serde_json::json!({ "reset": true })))
}

fn parse_source(key: &str) -> Result<Source, HttpError> {
    Source::from_key(key).ok_or_else(|| HttpError::unknown_source(key))
}

fn usage_response(state: &HttpState, aggregate: &AggregateSnapshot) -> UsageResponse {
    let sources = Source::ALL
        .into_iter()
        .map(|source| source_view(state, aggregate, source))
        .collect();
    UsageResponse { sources }
}

fn source_view(state: &HttpState, aggregate: &AggregateSnapshot, source: Source) -> SourceView {
    let entry = aggregate.get(source);
    let last_failure = state.orchestrator.source_failure(source);
    let connection = match (&entry, &last_failure) {
        (Some(_), None) => ConnectionState::Ok,
        (Some(_), Some(_)) => ConnectionState::Stale,
        (None, _) if !state.orchestrator.is_eligible(source) => ConnectionState::NotConfigured,
        (None, _) => ConnectionState::Unavailable,
    };
    let windows = entry
        .map(|snapshot| {
            snapshot
                .windows
                .iter()
                .map(|(kind, window)| WindowView {
                    kind: kind.key(),
                    used: window.used,
                    total: window.total,
                    percentage: window.percentage(),
                    remaining: window.remaining(),
                    resets_at: window.resets_at,
                })
                .collect()
        })
        .unwrap_or_default();
    SourceView {
        source: source.key(),
        display_name: source.display_name(),
        state: connection,
        fetched_at: entry.map(|snapshot| snapshot.fetched_at),
        windows,
        last_failure,
    }
}
