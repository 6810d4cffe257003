use std::time::Duration;

use async_trait::async_trait;
use relay_core::{FetchError, MetricsSnapshot, Source};
use reqwest::StatusCode;

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// One upstream quota provider. Stateless per call: every `fetch` produces a
/// complete snapshot or a classified failure, nothing in between.
#[async_trait]
pub trait SourceClient: Send + Sync {
    fn source(&self) -> Source;

    async fn fetch(&self) -> Result<MetricsSnapshot, FetchError>;
}

/// Shared HTTP client with the fetch timeouts applied. A timed-out request
/// surfaces as a transient failure like any other network error.
pub fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(REQUEST_TIMEOUT)
        .build()
}

/// Transport-level failures (timeouts, connection refusals, DNS) all retry
/// on the next scheduled cycle.
pub(crate) fn classify_transport(err: reqwest::Error) -> FetchError {
    FetchError::TransientNetwork(err.to_string())
}

/// Non-2xx responses: auth statuses map to `NotAuthenticated`, everything
/// else is an application-level rejection.
pub(crate) fn classify_status(status: StatusCode, body: String) -> FetchError {
    let body = truncate_body(&body);
    if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
        FetchError::NotAuthenticated(format!("{}: {}", status, body))
    } else {
        FetchError::RemoteRejected {
            status: status.as_u16(),
            body,
        }
    }
}

pub(crate) fn decode_failure(err: &serde_json::Error, body: &str) -> FetchError {
    FetchError::DecodeFailed {
        context: format!("{}; body: {}", err, truncate_body(body)),
    }
}

/// Raw bodies are kept for diagnosis but capped so a huge error page cannot
/// flood logs or the error surface.
fn truncate_body(body: &str) -> String {
    const MAX_LEN: usize = 512;
    let trimmed = body.trim();
    if trimmed.len() <= MAX_LEN {
        return trimmed.to_string();
    }
    let mut end = MAX_LEN;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &trimmed[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use relay_core::FetchErrorKind;

    #[test]
    fn unauthorized_status_classifies_as_not_authenticated() {
        let error = classify_status(StatusCode::UNAUTHORIZED, "token expired".to_string());
        assert_eq!(error.kind(), FetchErrorKind::NotAuthenticated);
        let error = classify_status(StatusCode::FORBIDDEN, String::new());
        assert_eq!(error.kind(), FetchErrorKind::NotAuthenticated);
    }

    #[test]
    fn rate_limit_status_classifies_as_remote_rejected() {
        let error = classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down".to_string());
        match error {
            FetchError::RemoteRejected { status, body } => {
                assert_eq!(status, 429);
                assert_eq!(body, "slow down");
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }

    #[test]
    fn decode_failure_carries_truncated_body() {
        let err = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        let huge_body = "x".repeat(2000);
        let error = decode_failure(&err, &huge_body);
        match error {
            FetchError::DecodeFailed { context } => {
                assert!(context.len() < 700);
                assert!(context.contains("body: x"));
            }
            other => panic!("unexpected classification: {other:?}"),
        }
    }
}
