use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use relay_core::{FetchError, MetricsSnapshot, Source, UsageWindow, WindowKind};
use reqwest::header::{AUTHORIZATION, HeaderValue};
use tracing::debug;

use serde::Deserialize;

use crate::client::{SourceClient, classify_status, classify_transport, decode_failure};
use crate::credentials::FileCredentialStore;

/// Rate-limit endpoint used by the Codex CLI's ChatGPT account mode.
const USAGE_URL: &str = "https://chatgpt.com/backend-api/wham/usage";

/// Usage for an OpenAI (Codex) subscription, authenticated with the ChatGPT
/// OAuth token the Codex CLI stores locally.
pub struct OpenAiClient {
    http: reqwest::Client,
    credentials: Arc<FileCredentialStore>,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client, credentials: Arc<FileCredentialStore>) -> Self {
        Self { http, credentials }
    }
}

#[async_trait]
impl SourceClient for OpenAiClient {
    fn source(&self) -> Source {
        Source::OpenAi
    }

    async fn fetch(&self) -> Result<MetricsSnapshot, FetchError> {
        let token = self.credentials.openai_access_token().ok_or_else(|| {
            FetchError::NotAuthenticated("no Codex CLI credentials".to_string())
        })?;
        let bearer = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|err| {
            FetchError::NotAuthenticated(format!("invalid token format: {err}"))
        })?;

        let response = self
            .http
            .get(USAGE_URL)
            .header(AUTHORIZATION, bearer)
            .send()
            .await
            .map_err(classify_transport)?;

        let status = response.status();
        let body = response.text().await.map_err(classify_transport)?;
        if !status.is_success() {
            return Err(classify_status(status, body));
        }

        debug!(source = "openai", "decoding rate limit response");
        decode_usage(&body, Utc::now())
    }
}

#[derive(Debug, Deserialize)]
struct UsageResponse {
    rate_limits: Option<RateLimits>,
}

#[derive(Debug, Deserialize)]
struct RateLimits {
    primary: Option<ApiWindow>,
    secondary: Option<ApiWindow>,
}

#[derive(Debug, Deserialize)]
struct ApiWindow {
    used_percent: f64,
    resets_in_seconds: Option<i64>,
}

fn decode_usage(body: &str, fetched_at: DateTime<Utc>) -> Result<MetricsSnapshot, FetchError> {
    let response: UsageResponse =
        serde_json::from_str(body).map_err(|err| decode_failure(&err, body))?;

    let mut snapshot = MetricsSnapshot::new(Source::OpenAi, fetched_at);
    let Some(limits) = response.rate_limits else {
        return Ok(snapshot);
    };
    // The primary window is the short rolling session limit, the secondary
    // the weekly one.
    let windows = [
        (WindowKind::Session, limits.primary),
        (WindowKind::Weekly, limits.secondary),
    ];
    for (kind, window) in windows {
        let Some(window) = window else { continue };
        let resets_at = window
            .resets_in_seconds
            .map(|seconds| fetched_at + Duration::seconds(seconds));
        snapshot
            .windows
            .insert(kind, UsageWindow::from_percent(window.used_percent, resets_at));
    }
    Ok(snapshot)
}
