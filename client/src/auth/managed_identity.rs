use super::credentials::parse_token_response;
use super::errors::AuthError;
use super::types::{CachedToken, CredentialConfig, DEFAULT_IMDS_ENDPOINT};
use crate::http::HttpTransport;
use crate::http::types::{HttpRequest, Method, StatusCode};
use std::time::Duration;

const IMDS_API_VERSION: &str = "2018-02-01";
const MAX_ATTEMPTS: u32 = 5;

/// Fetches a token from the instance metadata service.
///
/// The metadata service throttles aggressively, so 429 and 500 are retried
/// here with a doubling wait rather than through the shared executor policy.
/// Any other failure status means no usable identity is assigned and is
/// reported immediately.
pub(crate) async fn fetch_token(
    config: &CredentialConfig,
    msi_client_id: Option<&str>,
    transport: &dyn HttpTransport,
) -> Result<CachedToken, AuthError> {
    let endpoint = config
        .metadata_endpoint
        .as_deref()
        .unwrap_or(DEFAULT_IMDS_ENDPOINT)
        .trim_end_matches('/');
    let mut uri = format!(
        "{endpoint}/metadata/identity/oauth2/token?api-version={IMDS_API_VERSION}&resource={}",
        urlencoding::encode(&config.resource_id)
    );
    if let Some(client_id) = msi_client_id {
        uri.push_str(&format!("&client_id={}", urlencoding::encode(client_id)));
    }
    let request = HttpRequest::new(Method::GET, uri).with_header("metadata", "true");

    let mut waited = Duration::ZERO;
    let mut attempt = 1u32;
    loop {
        let response = transport.send(&request).await?;
        if response.status.is_success() {
            return parse_token_response(&response);
        }

        let throttled = matches!(
            response.status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::INTERNAL_SERVER_ERROR
        );
        if !throttled {
            let message = response
                .body
                .as_ref()
                .map(|b| b.to_string())
                .unwrap_or_else(|| response.status_text.clone());
            return Err(AuthError::ManagedIdentityNotConfigured {
                status: response.status.as_u16(),
                message,
            });
        }
        if attempt >= MAX_ATTEMPTS {
            return Err(AuthError::ManagedIdentityExhausted {
                attempts: MAX_ATTEMPTS,
                status: response.status.as_u16(),
            });
        }

        waited = Duration::from_secs(2) + waited * 2;
        log::debug!(
            "metadata service returned {}, retrying in {waited:?} (attempt {attempt} of {MAX_ATTEMPTS})",
            response.status
        );
        tokio::time::sleep(waited).await;
        attempt += 1;
    }
}
