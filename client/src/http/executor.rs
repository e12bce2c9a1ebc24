use super::transport::HttpTransport;
use super::types::{HttpRequest, HttpResponse, RetryPolicy};
use crate::common::TransportError;

/// Sends one logical request, retrying per `policy`.
///
/// Each attempt issues exactly one physical request. A response whose status
/// is in the policy's retriable set, or a transport error of a retriable
/// kind, is retried after the `retry-after` header value (honored verbatim)
/// or the policy's backoff for that attempt. Once attempts are exhausted the
/// last response or error is returned as-is; success is never fabricated.
///
/// Request bodies may contain secrets and are never logged here.
pub async fn send_request(
    transport: &dyn HttpTransport,
    request: &HttpRequest,
    policy: &RetryPolicy,
) -> Result<HttpResponse, TransportError> {
    let mut attempt = 1u32;
    loop {
        match transport.send(request).await {
            Ok(response) => {
                if attempt >= policy.max_attempts || !policy.is_retriable_status(response.status) {
                    return Ok(response);
                }
                let interval = response.retry_after().unwrap_or_else(|| policy.backoff(attempt));
                log::debug!(
                    "request to {} returned {}, retrying in {interval:?} (attempt {attempt} of {})",
                    request.uri,
                    response.status,
                    policy.max_attempts
                );
                tokio::time::sleep(interval).await;
            }
            Err(error) => {
                if attempt >= policy.max_attempts || !policy.is_retriable_error(error.kind) {
                    return Err(error);
                }
                let interval = policy.backoff(attempt);
                log::debug!(
                    "request to {} failed ({}), retrying in {interval:?} (attempt {attempt} of {})",
                    request.uri,
                    error.reason,
                    policy.max_attempts
                );
                tokio::time::sleep(interval).await;
            }
        }
        attempt += 1;
    }
}
