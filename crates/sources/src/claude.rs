use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use relay_core::{FetchError, MetricsSnapshot, Source, UsageWindow, WindowKind};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use tracing::debug;

use crate::client::{SourceClient, classify_status, classify_transport, decode_failure};
use crate::credentials::FileCredentialStore;

/// OAuth usage endpoint shared by the Claude and Claude Code sources.
const USAGE_URL: &str = "https://api.anthropic.com/api/oauth/usage";

const ANTHROPIC_BETA_HEADER: &str = "anthropic-beta";
const ANTHROPIC_BETA_VALUE: &str = "oauth-2025-04-20";

/// User agent matching Claude Code, required for the Claude Code account view.
const CLAUDE_CODE_USER_AGENT: &str = "claude-code/2.0.31";

/// Usage for a claude.ai subscription.
pub struct ClaudeClient {
    inner: OauthUsageClient,
}

impl ClaudeClient {
    pub fn new(http: reqwest::Client, credentials: Arc<FileCredentialStore>) -> Self {
        Self {
            inner: OauthUsageClient {
                http,
                credentials,
                source: Source::Claude,
                user_agent: None,
            },
        }
    }
}

#[async_trait]
impl SourceClient for ClaudeClient {
    fn source(&self) -> Source {
        Source::Claude
    }

    async fn fetch(&self) -> Result<MetricsSnapshot, FetchError> {
        self.inner.fetch().await
    }
}

/// Usage for a Claude Code subscription: same endpoint and response shape as
/// claude.ai, tracked as its own source.
pub struct ClaudeCodeClient {
    inner: OauthUsageClient,
}

impl ClaudeCodeClient {
    pub fn new(http: reqwest::Client, credentials: Arc<FileCredentialStore>) -> Self {
        Self {
            inner: OauthUsageClient {
                http,
                credentials,
                source: Source::ClaudeCode,
                user_agent: Some(CLAUDE_CODE_USER_AGENT),
            },
        }
    }
}

#[async_trait]
impl SourceClient for ClaudeCodeClient {
    fn source(&self) -> Source {
        Source::ClaudeCode
    }

    async fn fetch(&self) -> Result<MetricsSnapshot, FetchError> {
        self.inner.fetch().await
    }
}

struct OauthUsageClient {
    http: reqwest::Client,
    credentials: Arc<FileCredentialStore>,
    source: Source,
    user_agent: Option<&'static str>,
}

impl OauthUsageClient {
    async fn fetch(&self) -> Result<MetricsSnapshot, FetchError> {
        let token = self.credentials.claude_access_token().ok_or_else(|| {
            FetchError::NotAuthenticated("no Claude OAuth credentials".to_string())
        })?;

        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
            FetchError::NotAuthenticated(format!("invalid token format: {err}"))
        })?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(
            ANTHROPIC_BETA_HEADER,
            HeaderValue::from_static(ANTHROPIC_BETA_VALUE),
        );
        if let Some(user_agent) = self.user_agent {
            headers.insert(USER_AGENT, HeaderValue::from_static(user_agent));
        }

        let response = self
            .http
            .get(USAGE_URL)
            .headers(headers)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(status, body));
        }

        debug!(source = self.source.key(), "decoding oauth usage response");
        decode_usage(self.source, &body, Utc::now())
    }
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    five_hour: Option<ApiWindow>,
    seven_day: Option<ApiWindow>,
    seven_day_opus: Option<ApiWindow>,
}

#[derive(Debug, Deserialize)]
struct ApiWindow {
    utilization: f64,
    resets_at: Option<String>,
}

fn decode_usage(
    source: Source,
    body: &str,
    fetched_at: DateTime<Utc>,
) -> Result<MetricsSnapshot, FetchError> {
    let response: UsageResponse =
        serde_json::from_str(body).map_err(|err| decode_failure(&err, body))?;

    let mut snapshot = MetricsSnapshot::new(source, fetched_at);
    let windows = [
        (WindowKind::Session, response.five_hour),
        (WindowKind::Weekly, response.seven_day),
        (WindowKind::Secondary, response.seven_day_opus),
    ];
    for (kind, window) in windows {
        let Some(window) = window else { continue };
        let resets_at = window.resets_at.as_deref().and_then(parse_reset_time);
        snapshot
            .windows
            .insert(kind, UsageWindow::from_percent(window.utilization, resets_at));
    }
    Ok(snapshot)
}

/// Reset timestamps arrive as RFC3339 text; an unparseable one degrades to
/// "no reset time" instead of failing the whole snapshot.
fn parse_reset_time(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_all_three_windows() {
        let body = r#"{
            "five_hour": { "utilization": 85.0, "resets_at": "2026-08-04T15:00:00Z" },
            "seven_day": { "utilization": 42.5, "resets_at": "2026-08-10T00:00:00Z" },
            "seven_day_opus": { "utilization": 10.0, "resets_at": null }
        }"#;
        let snapshot = decode_usage(Source::Claude, body, Utc::now()).expect("decode");
        let session = snapshot.window(WindowKind::Session).expect("session window");
        assert_eq!(session.percentage(), 85.0);
        assert!(session.resets_at.is_some());
        let weekly = snapshot.window(WindowKind::Weekly).expect("weekly window");
        assert_eq!(weekly.percentage(), 42.5);
        let secondary = snapshot
            .window(WindowKind::Secondary)
            .expect("secondary window");
        assert_eq!(secondary.percentage(), 10.0);
        assert!(secondary.resets_at.is_none());
    }

    #[test]
    fn missing_windows_are_omitted() {
        let body = r#"{ "five_hour": { "utilization": 12.0, "resets_at": null } }"#;
        let snapshot = decode_usage(Source::ClaudeCode, body, Utc::now()).expect("decode");
        assert_eq!(snapshot.windows.len(), 1);
        assert!(snapshot.window(WindowKind::Weekly).is_none());
    }

    #[test]
    fn malformed_body_is_a_decode_failure() {
        let error = decode_usage(Source::Claude, "<html>busy</html>", Utc::now())
            .expect_err("should not decode");
        assert_eq!(error.kind(), relay_core::FetchErrorKind::DecodeFailed);
        assert!(error.to_string().contains("<html>busy</html>"));
    }

    #[test]
    fn bad_reset_timestamp_degrades_to_none() {
        let body = r#"{ "five_hour": { "utilization": 5.0, "resets_at": "tomorrow" } }"#;
        let snapshot = decode_usage(Source::Claude, body, Utc::now()).expect("decode");
        let session = snapshot.window(WindowKind::Session).expect("session window");
        assert!(session.resets_at.is_none());
    }
}
