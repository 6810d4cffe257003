use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::{TimeZone, Utc};
use http_body_util::BodyExt;
use serde_json::Value;
use tower::util::ServiceExt;

use http_api::HttpState;
use relay_app::RefreshOrchestrator;
use relay_core::{FetchError, MetricsSnapshot, Source, UsageWindow, WindowKind};
use relay_sources::{CredentialStore, SourceClient, SourceRegistry};
use relay_store::{DEFAULT_NAMESPACE, MetricsCache, PublicationStore};

enum Step {
    Snapshot(MetricsSnapshot),
    Fail,
}

struct ScriptedClient {
    source: Source,
    script: Mutex<VecDeque<Step>>,
}

#[async_trait]
impl SourceClient for ScriptedClient {
    fn source(&self) -> Source {
        self.source
    }

    async fn fetch(&self) -> Result<MetricsSnapshot, FetchError> {
        match self.script.lock().unwrap().pop_front() {
            Some(Step::Snapshot(snapshot)) => Ok(snapshot),
            _ => Err(FetchError::TransientNetwork("connection reset".to_string())),
        }
    }
}

struct StaticCredentials {
    eligible: Vec<Source>,
}

impl CredentialStore for StaticCredentials {
    fn is_eligible(&self, source: Source) -> bool {
        self.eligible.contains(&source)
    }
}

struct TestApp {
    _temp_dir: tempfile::TempDir,
    router: axum::Router,
}

fn snapshot(source: Source, percent: f64) -> MetricsSnapshot {
    let fetched_at = Utc
        .with_ymd_and_hms(2026, 8, 4, 12, 0, 0)
        .single()
        .expect("timestamp");
    MetricsSnapshot::new(source, fetched_at)
        .with_window(WindowKind::Session, UsageWindow::from_percent(percent, None))
}

fn build_app(scripts: Vec<(Source, Vec<Step>)>, eligible: Vec<Source>) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let mut registry = SourceRegistry::new();
    for (source, script) in scripts {
        registry.register(Arc::new(ScriptedClient {
            source,
            script: Mutex::new(script.into()),
        }));
    }
    let cache = MetricsCache::new(temp_dir.path().join("usage-cache.json"));
    let publication = PublicationStore::new(temp_dir.path().join("shared"), DEFAULT_NAMESPACE);
    let orchestrator = Arc::new(RefreshOrchestrator::new(
        registry,
        Arc::new(StaticCredentials { eligible }),
        cache,
        publication,
    ));
    let router = http_api::router(HttpState::new(orchestrator));
    TestApp {
        _temp_dir: temp_dir,
        router,
    }
}

async fn body_json(response: axum::response::Response) -> Value {
    let body = response
        .into_body()
        .collect()
        .await
        .expect("body")
        .to_bytes();
    serde_json::from_slice(&body).expect("json body")
}

fn source_entry<'a>(payload: &'a Value, key: &str) -> &'a Value {
    payload["sources"]
        .as_array()
        .expect("sources array")
        .iter()
        .find(|entry| entry["source"] == key)
        .expect("source entry")
}

#[tokio::test]
async fn health_endpoint_is_ok() {
    let app = build_app(Vec::new(), Vec::new());
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unconfigured_source_reports_not_configured_rather_than_error() {
    let app = build_app(
        vec![(Source::Claude, Vec::new())],
        Vec::new(), // no credentials at all
    );

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/refresh")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;

    let claude = source_entry(&payload, "claude");
    assert_eq!(claude["state"], "not_configured");
    assert!(claude.get("last_failure").is_none());

    let status = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status_payload = body_json(status).await;
    assert!(status_payload.get("last_error").is_none());
}

#[tokio::test]
async fn refresh_returns_fresh_percentages() {
    let app = build_app(
        vec![(
            Source::OpenAi,
            vec![Step::Snapshot(snapshot(Source::OpenAi, 85.0))],
        )],
        vec![Source::OpenAi],
    );

    let response = app
        .router
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/refresh")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let payload = body_json(response).await;

    let openai = source_entry(&payload, "openai");
    assert_eq!(openai["state"], "ok");
    assert_eq!(openai["windows"][0]["kind"], "session");
    assert_eq!(openai["windows"][0]["percentage"], 85.0);
}

#[tokio::test]
async fn failed_refresh_marks_source_stale_but_keeps_windows() {
    let app = build_app(
        vec![(
            Source::ClaudeCode,
            vec![Step::Snapshot(snapshot(Source::ClaudeCode, 40.0)), Step::Fail],
        )],
        vec![Source::ClaudeCode],
    );

    for _ in 0..2 {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/refresh/claude-code")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/usage/claude-code")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let payload = body_json(response).await;
    assert_eq!(payload["state"], "stale");
    assert_eq!(payload["windows"][0]["percentage"], 40.0);
    assert_eq!(payload["last_failure"]["kind"], "transient_network");

    let status = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/status")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let status_payload = body_json(status).await;
    assert_eq!(status_payload["last_error"]["source"], "claude-code");
    assert_eq!(status_payload["last_error"]["kind"], "transient_network");
}

#[tokio::test]
async fn unknown_source_key_is_not_found() {
    let app = build_app(Vec::new(), Vec::new());
    let response = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/usage/gemini")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let payload = body_json(response).await;
    assert_eq!(payload["code"], "unknown_source");
}

#[tokio::test]
async fn reset_clears_the_usage_view() {
    let app = build_app(
        vec![(
            Source::Claude,
            vec![Step::Snapshot(snapshot(Source::Claude, 50.0))],
        )],
        vec![Source::Claude],
    );

    let refresh = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/refresh")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(refresh.status(), StatusCode::OK);

    let reset = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/reset")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    assert_eq!(reset.status(), StatusCode::OK);

    let usage = app
        .router
        .oneshot(
            Request::builder()
                .uri("/api/usage")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");
    let payload = body_json(usage).await;
    let claude = source_entry(&payload, "claude");
    assert!(claude["windows"].as_array().expect("windows").is_empty());
    assert_ne!(claude["state"], "ok");
}
