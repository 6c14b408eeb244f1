//! Provider setup errors and HTTP failure classification

use chrono::{DateTime, Utc};
use council_application::CapabilityError;
use council_domain::ProviderKind;
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use thiserror::Error;

/// Longest error body quoted in a [`CapabilityError`] message.
const MAX_ERROR_BODY: usize = 200;

/// Longest wait a provider hint can impose.
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Errors building a provider adapter.
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("No API key configured for {provider} (set {env_var})")]
    MissingApiKey {
        provider: ProviderKind,
        env_var: String,
    },
}

/// Map a non-success HTTP response to the capability error taxonomy.
///
/// - 429 is a rate limit, with the provider's hint when it sent one
/// - 408 and 5xx are transient
/// - any other status is persistent
pub(crate) fn classify_status(
    provider: ProviderKind,
    status: StatusCode,
    headers: &HeaderMap,
    body: &str,
) -> CapabilityError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return CapabilityError::RateLimited {
            retry_after: retry_after(headers, Utc::now()),
        };
    }
    let message = format!("{} API error ({}): {}", provider, status, truncate(body));
    if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        CapabilityError::Transient(message)
    } else {
        CapabilityError::Persistent(message)
    }
}

/// Map a transport-level failure.
pub(crate) fn classify_transport(provider: ProviderKind, error: &reqwest::Error) -> CapabilityError {
    let message = format!("{} request failed: {}", provider, error);
    if error.is_decode() || error.is_builder() {
        CapabilityError::Persistent(message)
    } else {
        CapabilityError::Transient(message)
    }
}

/// How long the provider asked us to wait.
///
/// `Retry-After` (delta seconds or an HTTP date) wins over
/// `X-RateLimit-Reset` (epoch milliseconds). A reset in the past yields
/// `None` so the caller falls back to its configured delay. Hints are
/// capped at [`MAX_RETRY_AFTER`].
pub(crate) fn retry_after(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    hinted_delay(headers, now).map(|delay| delay.min(MAX_RETRY_AFTER))
}

fn hinted_delay(headers: &HeaderMap, now: DateTime<Utc>) -> Option<Duration> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
    };

    if let Some(raw) = header("retry-after") {
        if let Ok(seconds) = raw.parse::<f64>() {
            if seconds.is_finite() && seconds >= 0.0 {
                return Some(Duration::try_from_secs_f64(seconds).unwrap_or(MAX_RETRY_AFTER));
            }
        }
        if let Ok(at) = DateTime::parse_from_rfc2822(raw) {
            return (at.with_timezone(&Utc) - now).to_std().ok();
        }
    }

    let reset_ms = header("x-ratelimit-reset")?.parse::<i64>().ok()?;
    let reset = DateTime::<Utc>::from_timestamp_millis(reset_ms)?;
    (reset - now).to_std().ok().filter(|d| !d.is_zero())
}

fn truncate(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() <= MAX_ERROR_BODY {
        return body.to_string();
    }
    let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn retry_after_seconds() {
        let h = headers(&[("retry-after", "12")]);
        assert_eq!(retry_after(&h, Utc::now()), Some(Duration::from_secs(12)));
    }

    #[test]
    fn oversized_retry_after_is_capped() {
        let h = headers(&[("retry-after", "1e30")]);
        assert_eq!(retry_after(&h, Utc::now()), Some(MAX_RETRY_AFTER));

        let h = headers(&[("retry-after", "86400")]);
        assert_eq!(retry_after(&h, Utc::now()), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn far_future_reset_is_capped() {
        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let h = headers(&[("x-ratelimit-reset", "4102444800000")]);
        assert_eq!(retry_after(&h, now), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn retry_after_http_date() {
        let now = DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let h = headers(&[("retry-after", "Wed, 01 Jan 2025 00:00:30 GMT")]);
        assert_eq!(retry_after(&h, now), Some(Duration::from_secs(30)));
    }

    #[test]
    fn ratelimit_reset_epoch_millis() {
        let now = Utc::now();
        let reset = now.timestamp_millis() + 45_000;
        let h = headers(&[("x-ratelimit-reset", &reset.to_string())]);
        let wait = retry_after(&h, now).unwrap();
        assert!(wait <= Duration::from_secs(45));
        assert!(wait >= Duration::from_millis(44_000));
    }

    #[test]
    fn past_reset_gives_no_hint() {
        let now = Utc::now();
        let reset = now.timestamp_millis() - 1_000;
        let h = headers(&[("x-ratelimit-reset", &reset.to_string())]);
        assert_eq!(retry_after(&h, now), None);
        assert_eq!(retry_after(&HeaderMap::new(), now), None);
    }

    #[test]
    fn status_classification() {
        let empty = HeaderMap::new();
        let limited = classify_status(
            ProviderKind::OpenRouter,
            StatusCode::TOO_MANY_REQUESTS,
            &headers(&[("retry-after", "3")]),
            "",
        );
        assert_eq!(
            limited,
            CapabilityError::RateLimited {
                retry_after: Some(Duration::from_secs(3))
            }
        );
        assert!(
            classify_status(ProviderKind::Ollama, StatusCode::BAD_GATEWAY, &empty, "").is_transient()
        );
        let persistent = classify_status(
            ProviderKind::OpenRouter,
            StatusCode::UNAUTHORIZED,
            &empty,
            "invalid key",
        );
        assert!(matches!(persistent, CapabilityError::Persistent(ref m) if m.contains("invalid key")));
    }

    #[test]
    fn long_bodies_are_truncated() {
        let body = "x".repeat(500);
        assert_eq!(truncate(&body).len(), MAX_ERROR_BODY + 3);
    }
}
