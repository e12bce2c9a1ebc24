use crate::common::TransportErrorKind;
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;

pub use reqwest::{Method, StatusCode};

/// A single HTTP request against the control plane.
///
/// Constructed fresh per call by the caller and treated as immutable once it
/// has been handed to the transport; the dispatcher adds its headers to its
/// own copy before sending.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub uri: String,
    /// Header map with lower-cased keys.
    pub headers: HashMap<String, String>,
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Sets a header, replacing any previous value regardless of case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_lowercase(), value.into());
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    /// Serializes `body` as the JSON request payload.
    pub fn with_json_body(mut self, body: &Value) -> Self {
        self.body = Some(body.to_string());
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }
}

/// A completed HTTP exchange.
///
/// The body is parsed JSON when the server returned JSON, the raw text as a
/// JSON string otherwise, and `None` for empty bodies. Read-only once
/// produced by the transport.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub status_text: String,
    /// Header map with lower-cased keys.
    pub headers: HashMap<String, String>,
    pub body: Option<Value>,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// The `retry-after` header as a duration, when present and well-formed.
    pub fn retry_after(&self) -> Option<Duration> {
        self.header("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// The `status` field of the response body, used by the async-operation
    /// protocol to report operation progress.
    pub fn body_status(&self) -> Option<&str> {
        self.body.as_ref()?.get("status")?.as_str()
    }

    /// The `error.code` field of the standard ARM error envelope.
    pub fn error_code(&self) -> Option<&str> {
        self.body.as_ref()?.get("error")?.get("code")?.as_str()
    }
}

/// Retry behavior for a single logical send.
///
/// Stateless and supplied per call; the defaults match the web client the
/// resource clients have always been built on: `[408, 409, 500, 502, 503,
/// 504]`, five attempts, a two second base interval, and no retry of
/// requests that themselves timed out (the LRO poller tolerates those at a
/// higher level instead).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub retriable_status_codes: Vec<StatusCode>,
    pub retriable_error_kinds: Vec<TransportErrorKind>,
    pub max_attempts: u32,
    pub retry_interval: Duration,
    pub retry_on_request_timeout: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retriable_status_codes: vec![
                StatusCode::REQUEST_TIMEOUT,
                StatusCode::CONFLICT,
                StatusCode::INTERNAL_SERVER_ERROR,
                StatusCode::BAD_GATEWAY,
                StatusCode::SERVICE_UNAVAILABLE,
                StatusCode::GATEWAY_TIMEOUT,
            ],
            retriable_error_kinds: vec![
                TransportErrorKind::Timeout,
                TransportErrorKind::ConnectionReset,
                TransportErrorKind::ConnectionRefused,
                TransportErrorKind::DnsFailure,
                TransportErrorKind::HostUnreachable,
                TransportErrorKind::BrokenPipe,
            ],
            max_attempts: 5,
            retry_interval: Duration::from_secs(2),
            retry_on_request_timeout: false,
        }
    }
}

impl RetryPolicy {
    pub fn is_retriable_status(&self, status: StatusCode) -> bool {
        self.retriable_status_codes.contains(&status)
    }

    pub fn is_retriable_error(&self, kind: TransportErrorKind) -> bool {
        if kind == TransportErrorKind::Timeout && !self.retry_on_request_timeout {
            return false;
        }
        self.retriable_error_kinds.contains(&kind)
    }

    /// Sleep interval before the given retry. Grows by one second per
    /// attempt, so intervals are monotonically non-decreasing and bounded by
    /// the attempt count.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.retry_interval + Duration::from_secs(attempt.saturating_sub(1) as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response_with(headers: &[(&str, &str)], body: Option<Value>) -> HttpResponse {
        HttpResponse {
            status: StatusCode::OK,
            status_text: "OK".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.to_string()))
                .collect(),
            body,
        }
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let response = response_with(&[("Retry-After", "30")], None);
        assert_eq!(response.header("retry-after"), Some("30"));
        assert_eq!(response.header("RETRY-AFTER"), Some("30"));
        assert_eq!(response.retry_after(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn malformed_retry_after_is_ignored() {
        let response = response_with(&[("retry-after", "soon")], None);
        assert_eq!(response.retry_after(), None);
    }

    #[test]
    fn body_status_and_error_code_read_the_envelope() {
        let response = response_with(
            &[],
            Some(json!({"status": "Running", "error": {"code": "ExpiredAuthenticationToken"}})),
        );
        assert_eq!(response.body_status(), Some("Running"));
        assert_eq!(response.error_code(), Some("ExpiredAuthenticationToken"));
    }

    #[test]
    fn default_policy_matches_the_web_client_defaults() {
        let policy = RetryPolicy::default();
        assert!(policy.is_retriable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!policy.is_retriable_status(StatusCode::NOT_FOUND));
        assert!(policy.is_retriable_error(TransportErrorKind::ConnectionReset));
        // Request timeouts are not retried unless explicitly enabled.
        assert!(!policy.is_retriable_error(TransportErrorKind::Timeout));
        assert_eq!(policy.max_attempts, 5);
    }

    #[test]
    fn backoff_is_monotonically_non_decreasing() {
        let policy = RetryPolicy::default();
        let mut previous = Duration::ZERO;
        for attempt in 1..=5 {
            let interval = policy.backoff(attempt);
            assert!(interval >= previous);
            previous = interval;
        }
    }

    #[test]
    fn request_headers_replace_regardless_of_case() {
        let mut request = HttpRequest::new(Method::GET, "https://example.test");
        request.set_header("Authorization", "Bearer one");
        request.set_header("authorization", "Bearer two");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.header("Authorization"), Some("Bearer two"));
    }
}
