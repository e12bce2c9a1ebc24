use super::errors::AuthError;
use crate::http::HttpTransport;
use crate::http::types::{HttpRequest, Method};
use std::time::Duration;

const MAX_ATTEMPTS: u32 = 3;
const RETRY_INTERVAL: Duration = Duration::from_secs(2);

/// Obtains a short-lived OIDC token from the pipeline's token service.
///
/// The token service issues per-connection tokens that the authority then
/// accepts as a client assertion. Transient failures are retried a few times
/// on a fixed interval; the token is single-use, so nothing is cached here.
pub(crate) async fn fetch_oidc_token(
    token_service_url: &str,
    system_access_token: &str,
    service_connection_id: &str,
    transport: &dyn HttpTransport,
) -> Result<String, AuthError> {
    let separator = if token_service_url.contains('?') { '&' } else { '?' };
    let uri = format!(
        "{}{separator}serviceConnectionId={}",
        token_service_url.trim_end_matches('/'),
        urlencoding::encode(service_connection_id)
    );
    let request = HttpRequest::new(Method::POST, uri)
        .with_header("authorization", format!("Bearer {system_access_token}"))
        .with_header("content-type", "application/json");

    let mut last_failure = String::new();
    for attempt in 1..=MAX_ATTEMPTS {
        match transport.send(&request).await {
            Ok(response) if response.status.is_success() => {
                if let Some(token) = response
                    .body
                    .as_ref()
                    .and_then(|b| b.get("oidcToken"))
                    .and_then(|v| v.as_str())
                {
                    return Ok(token.to_string());
                }
                last_failure = "response carried no oidcToken".to_string();
            }
            Ok(response) => {
                last_failure = format!("{} {}", response.status.as_u16(), response.status_text);
            }
            Err(error) => {
                last_failure = error.to_string();
            }
        }

        if attempt < MAX_ATTEMPTS {
            log::debug!(
                "OIDC token request failed ({last_failure}), retrying (attempt {attempt} of {MAX_ATTEMPTS})"
            );
            tokio::time::sleep(RETRY_INTERVAL).await;
        }
    }

    Err(AuthError::FederatedTokenUnavailable {
        reason: last_failure,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{MockTransport, empty_response, json_response};
    use claims::{assert_err, assert_ok};
    use serde_json::json;

    const TOKEN_SERVICE: &str =
        "https://dev.example.com/org/proj/_apis/distributedtask/hubs/build/plans/1/jobs/2/oidctoken";

    #[tokio::test]
    async fn posts_with_the_system_token_and_connection_id() {
        let transport = MockTransport::new();
        transport.push_response(json_response(200, json!({"oidcToken": "oidc-abc"})));

        let token = assert_ok!(
            fetch_oidc_token(TOKEN_SERVICE, "system-pat", "conn-42", &transport).await
        );
        assert_eq!(token, "oidc-abc");

        let request = transport.request(0);
        assert_eq!(request.method, Method::POST);
        assert!(request.uri.ends_with("oidctoken?serviceConnectionId=conn-42"));
        assert_eq!(request.header("authorization"), Some("Bearer system-pat"));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried() {
        let transport = MockTransport::new();
        transport.push_response(empty_response(500));
        transport.push_response(empty_response(500));
        transport.push_response(json_response(200, json!({"oidcToken": "oidc-abc"})));

        let started = tokio::time::Instant::now();
        assert_ok!(fetch_oidc_token(TOKEN_SERVICE, "system-pat", "conn-42", &transport).await);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_report_the_last_failure() {
        let transport = MockTransport::new();
        for _ in 0..3 {
            transport.push_response(empty_response(503));
        }

        let error = assert_err!(
            fetch_oidc_token(TOKEN_SERVICE, "system-pat", "conn-42", &transport).await
        );
        match error {
            AuthError::FederatedTokenUnavailable { reason } => {
                assert!(reason.contains("503"));
            }
            other => panic!("expected FederatedTokenUnavailable, got {other:?}"),
        }
        assert_eq!(transport.request_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_token_field_is_not_a_success() {
        let transport = MockTransport::new();
        for _ in 0..3 {
            transport.push_response(json_response(200, json!({"unexpected": true})));
        }

        let error = assert_err!(
            fetch_oidc_token(TOKEN_SERVICE, "system-pat", "conn-42", &transport).await
        );
        assert!(matches!(error, AuthError::FederatedTokenUnavailable { .. }));
    }
}
