use super::errors::{ApiResult, ArmError, AzureError};
use super::types::ListResponse;
use crate::auth::ApplicationTokenCredentials;
use crate::common::{TransportError, TransportErrorKind, ValidationError};
use crate::http::types::{HttpRequest, HttpResponse, Method, RetryPolicy, StatusCode};
use crate::http::{HttpTransport, ReqwestTransport, send_request};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Default resource-manager API version for requests that do not pin one.
const DEFAULT_API_VERSION: &str = "2021-04-01";
/// Error code the service uses when it considers the bearer token expired.
const EXPIRED_TOKEN_CODE: &str = "ExpiredAuthenticationToken";

/// Authenticated client for one subscription on one resource-manager
/// endpoint.
///
/// Every request goes through [`begin_request`](Self::begin_request), which
/// attaches the bearer token and the common headers, and transparently
/// refreshes the token once when the service rejects it as expired.
pub struct ArmClient {
    pub(crate) credentials: Arc<ApplicationTokenCredentials>,
    pub(crate) transport: Arc<dyn HttpTransport>,
    subscription_id: String,
    base_uri: String,
    api_version: String,
    accept_language: Option<String>,
    retry_policy: RetryPolicy,
    /// Default polling window for long-running operations, in minutes.
    /// Zero polls indefinitely.
    pub(crate) lro_timeout_minutes: u64,
}

impl ArmClient {
    pub fn new(
        credentials: Arc<ApplicationTokenCredentials>,
        subscription_id: impl Into<String>,
    ) -> Result<Self, ArmError> {
        Self::with_transport(credentials, subscription_id, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        credentials: Arc<ApplicationTokenCredentials>,
        subscription_id: impl Into<String>,
        transport: Arc<dyn HttpTransport>,
    ) -> Result<Self, ArmError> {
        let subscription_id = subscription_id.into();
        if subscription_id.trim().is_empty() {
            return Err(ValidationError::Empty {
                name: "subscription_id",
            }
            .into());
        }
        let base_uri = credentials.base_url().trim_end_matches('/').to_string();
        Ok(Self {
            credentials,
            transport,
            subscription_id,
            base_uri,
            api_version: DEFAULT_API_VERSION.to_string(),
            accept_language: Some("en-US".to_string()),
            retry_policy: RetryPolicy::default(),
            lro_timeout_minutes: 0,
        })
    }

    pub fn with_api_version(mut self, api_version: impl Into<String>) -> Self {
        self.api_version = api_version.into();
        self
    }

    pub fn with_accept_language(mut self, accept_language: Option<String>) -> Self {
        self.accept_language = accept_language;
        self
    }

    pub fn with_retry_policy(mut self, retry_policy: RetryPolicy) -> Self {
        self.retry_policy = retry_policy;
        self
    }

    pub fn with_lro_timeout_minutes(mut self, minutes: u64) -> Self {
        self.lro_timeout_minutes = minutes;
        self
    }

    pub fn subscription_id(&self) -> &str {
        &self.subscription_id
    }

    pub fn base_uri(&self) -> &str {
        &self.base_uri
    }

    /// Builds a full request URI from a path template.
    ///
    /// `{subscriptionId}` is substituted implicitly; other `{name}`
    /// placeholders come from `params`, url-encoded. Duplicate slashes from
    /// careless templates are collapsed, the scheme separator excepted, and
    /// the effective `api-version` is appended ahead of any extra query
    /// parameters.
    pub fn request_uri(
        &self,
        template: &str,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
        api_version: Option<&str>,
    ) -> String {
        let mut path = template.replace(
            "{subscriptionId}",
            &urlencoding::encode(&self.subscription_id),
        );
        for (name, value) in params {
            path = path.replace(&format!("{{{name}}}"), &urlencoding::encode(value));
        }

        let mut uri = collapse_duplicate_slashes(&format!("{}/{}", self.base_uri, path));

        let effective_version = api_version.unwrap_or(&self.api_version);
        let mut pairs = Vec::with_capacity(query.len() + 1);
        if !effective_version.is_empty() {
            pairs.push(format!(
                "api-version={}",
                urlencoding::encode(effective_version)
            ));
        }
        pairs.extend(
            query
                .iter()
                .map(|(name, value)| format!("{name}={}", urlencoding::encode(value))),
        );
        if !pairs.is_empty() {
            uri.push(if uri.contains('?') { '&' } else { '?' });
            uri.push_str(&pairs.join("&"));
        }
        uri
    }

    /// Sends one authenticated request.
    ///
    /// If the service answers 401 with `ExpiredAuthenticationToken`, the
    /// token is refreshed once and the request resent; whatever the resend
    /// produces is returned as-is, so a repeat 401 surfaces to the caller
    /// instead of looping.
    pub async fn begin_request(&self, request: &HttpRequest) -> Result<HttpResponse, ArmError> {
        let token = self.credentials.get_token(false).await?;
        let mut outgoing = request.clone();
        self.apply_common_headers(&mut outgoing, &token);

        let response = self.send_checked(&outgoing).await?;
        let response = if response.status == StatusCode::UNAUTHORIZED
            && response.error_code() == Some(EXPIRED_TOKEN_CODE)
        {
            log::info!("service reported the access token expired, refreshing and retrying once");
            let token = self.credentials.get_token(true).await?;
            outgoing.set_header("authorization", format!("Bearer {token}"));
            self.send_checked(&outgoing).await?
        } else {
            response
        };

        if let Some(correlation_id) = response.header("x-ms-correlation-request-id") {
            log::debug!(
                "{} {} -> {} (correlation {correlation_id})",
                outgoing.method,
                outgoing.uri,
                response.status
            );
        }
        Ok(response)
    }

    /// Variant of [`begin_request`](Self::begin_request) for endpoints that
    /// shed load with 5xx answers. Responses below 500 return immediately;
    /// otherwise the wait grows by the attempt number each round, the
    /// `retry-after` header taking precedence when present.
    pub async fn begin_request_with_backoff(
        &self,
        request: &HttpRequest,
        max_attempts: u32,
    ) -> Result<HttpResponse, ArmError> {
        let max_attempts = max_attempts.max(1);
        let mut sleep_duration = Duration::ZERO;
        let mut attempt = 1u32;
        loop {
            let response = self.begin_request(request).await?;
            if response.status.as_u16() < 500 || attempt >= max_attempts {
                return Ok(response);
            }
            sleep_duration += Duration::from_secs(attempt as u64);
            let wait = response.retry_after().unwrap_or(sleep_duration);
            log::debug!(
                "request to {} returned {}, backing off {wait:?} (attempt {attempt} of {max_attempts})",
                request.uri,
                response.status
            );
            tokio::time::sleep(wait).await;
            attempt += 1;
        }
    }

    /// Walks a `nextLink` chain, collecting every page's items in order.
    ///
    /// Any failing page aborts the whole accumulation; partial results are
    /// never returned.
    pub async fn accumulate_paged(&self, first_uri: &str) -> ApiResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut next = Some(first_uri.to_string());
        while let Some(uri) = next {
            let request = HttpRequest::new(Method::GET, &uri);
            let response = self.begin_request(&request).await?;
            if response.status != StatusCode::OK {
                return Err(ArmError::Api(AzureError::from_response(&response)));
            }
            let body = response.body.ok_or_else(|| ArmError::ProtocolViolation {
                expected: "a list response body".to_string(),
                actual: "empty body".to_string(),
            })?;
            let page: ListResponse<Value> =
                serde_json::from_value(body).map_err(|e| ArmError::ProtocolViolation {
                    expected: "a list response with a value array".to_string(),
                    actual: e.to_string(),
                })?;
            items.extend(page.value);
            next = page.next_link.filter(|link| !link.is_empty());
        }
        Ok(items)
    }

    fn apply_common_headers(&self, request: &mut HttpRequest, token: &str) {
        request.set_header("authorization", format!("Bearer {token}"));
        if request.header("content-type").is_none() {
            request.set_header("content-type", "application/json; charset=utf-8");
        }
        if let Some(language) = &self.accept_language {
            request.set_header("accept-language", language.clone());
        }
    }

    /// Sends through the retrying executor, emitting the trust-store hint on
    /// TLS verification failures before propagating them.
    async fn send_checked(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        match send_request(self.transport.as_ref(), request, &self.retry_policy).await {
            Err(error) if error.kind == TransportErrorKind::TlsTrust => {
                log::warn!(
                    "could not verify the certificate chain for {}; if the endpoint uses a \
                     private CA, add its root certificate to the local trust store",
                    request.uri
                );
                Err(error)
            }
            result => result,
        }
    }
}

/// Collapses `//` runs to a single slash, leaving the `://` after a scheme
/// intact.
fn collapse_duplicate_slashes(uri: &str) -> String {
    let mut out = String::with_capacity(uri.len());
    for c in uri.chars() {
        if c == '/' && out.ends_with('/') && !out.ends_with("://") {
            continue;
        }
        out.push(c);
    }
    out
}
