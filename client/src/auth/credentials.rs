use super::errors::AuthError;
use super::types::{AuthScheme, CachedToken, CredentialConfig};
use super::{federated, managed_identity, service_principal};
use crate::http::{HttpRequest, HttpResponse, ReqwestTransport, RetryPolicy, send_request};
use crate::http::types::Method;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Grant type for the standard client-credentials flow.
const GRANT_CLIENT_CREDENTIALS: &str = "client_credentials";
/// Assertion type for certificate and federated credentials.
const CLIENT_ASSERTION_TYPE: &str = "urn:ietf:params:oauth:client-assertion-type:jwt-bearer";

/// Token provider for one configured identity.
///
/// Minted tokens are cached until shortly before expiry. The cache lock is
/// held across the refresh network call, so concurrent callers that find a
/// stale token trigger exactly one refresh and all receive its result.
pub struct ApplicationTokenCredentials {
    config: CredentialConfig,
    transport: Arc<dyn crate::http::HttpTransport>,
    cached: Mutex<Option<CachedToken>>,
}

impl ApplicationTokenCredentials {
    pub fn new(config: CredentialConfig) -> Result<Self, AuthError> {
        Self::with_transport(config, Arc::new(ReqwestTransport::new()))
    }

    pub fn with_transport(
        config: CredentialConfig,
        transport: Arc<dyn crate::http::HttpTransport>,
    ) -> Result<Self, AuthError> {
        config.validate()?;
        Ok(Self {
            config,
            transport,
            cached: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &CredentialConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Returns a valid access token, minting or refreshing one as needed.
    ///
    /// `force_refresh` bypasses the cache; the dispatcher uses it after the
    /// service reports an expired token that the local clock still considered
    /// fresh.
    pub async fn get_token(&self, force_refresh: bool) -> Result<String, AuthError> {
        let mut guard = self.cached.lock().await;
        if !force_refresh
            && let Some(cached) = guard.as_ref()
            && !cached.needs_refresh()
        {
            return Ok(cached.token.clone());
        }

        log::debug!(
            "acquiring access token for {} (force_refresh: {force_refresh})",
            self.config.scope()
        );
        let fresh = self.request_token().await?;
        let token = fresh.token.clone();
        *guard = Some(fresh);
        Ok(token)
    }

    async fn request_token(&self) -> Result<CachedToken, AuthError> {
        match &self.config.scheme {
            AuthScheme::ServicePrincipalKey { client_secret } => {
                self.client_credentials_grant(&[(
                    "client_secret",
                    client_secret.clone(),
                )])
                .await
            }
            AuthScheme::ServicePrincipalCertificate { certificate_pem } => {
                let assertion =
                    service_principal::build_client_assertion(&self.config, certificate_pem)?;
                self.client_credentials_grant(&[
                    ("client_assertion_type", CLIENT_ASSERTION_TYPE.to_string()),
                    ("client_assertion", assertion),
                ])
                .await
            }
            AuthScheme::ManagedIdentity { msi_client_id } => {
                managed_identity::fetch_token(
                    &self.config,
                    msi_client_id.as_deref(),
                    self.transport.as_ref(),
                )
                .await
            }
            AuthScheme::WorkloadIdentityFederation {
                token_service_url,
                system_access_token,
                service_connection_id,
            } => {
                let assertion = federated::fetch_oidc_token(
                    token_service_url,
                    system_access_token,
                    service_connection_id,
                    self.transport.as_ref(),
                )
                .await?;
                self.client_credentials_grant(&[
                    ("client_assertion_type", CLIENT_ASSERTION_TYPE.to_string()),
                    ("client_assertion", assertion),
                ])
                .await
            }
        }
    }

    /// Runs the client-credentials grant with the given extra form fields.
    async fn client_credentials_grant(
        &self,
        extra: &[(&str, String)],
    ) -> Result<CachedToken, AuthError> {
        let mut form = vec![
            ("grant_type", GRANT_CLIENT_CREDENTIALS.to_string()),
            ("client_id", self.config.client_id.clone()),
            ("scope", self.config.scope()),
        ];
        form.extend(extra.iter().map(|(k, v)| (*k, v.clone())));

        let mut request = HttpRequest::new(Method::POST, self.config.token_endpoint())
            .with_header("content-type", "application/x-www-form-urlencoded");
        request.body = Some(encode_form(&form));

        let response = send_request(self.transport.as_ref(), &request, &RetryPolicy::default())
            .await?;
        if response.status.is_success() {
            parse_token_response(&response)
        } else {
            Err(rejection_from(&response))
        }
    }
}

fn encode_form(pairs: &[(&str, String)]) -> String {
    pairs
        .iter()
        .map(|(name, value)| format!("{name}={}", urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Parses a successful token response from the authority or the metadata
/// service. `expires_in` arrives as a number from Azure AD and as a decimal
/// string from the metadata service; both are accepted.
pub(crate) fn parse_token_response(response: &HttpResponse) -> Result<CachedToken, AuthError> {
    let body = response
        .body
        .as_ref()
        .ok_or_else(|| AuthError::MalformedResponse {
            reason: "empty body".to_string(),
        })?;
    let token = body
        .get("access_token")
        .and_then(|v| v.as_str())
        .ok_or_else(|| AuthError::MalformedResponse {
            reason: "missing access_token".to_string(),
        })?;

    let expires_in = match body.get("expires_in") {
        Some(value) => value
            .as_u64()
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .unwrap_or(3600),
        None => 3600,
    };

    Ok(CachedToken::new(token, Duration::from_secs(expires_in)))
}

/// Maps an authority error response onto [`AuthError`].
///
/// AADSTS7000222 (expired client secret) and AADSTS700024 (expired client
/// assertion certificate) get a dedicated variant so callers can tell the
/// operator exactly what to rotate.
fn rejection_from(response: &HttpResponse) -> AuthError {
    let body = response.body.as_ref();
    let code = body
        .and_then(|b| b.get("error"))
        .and_then(|v| v.as_str())
        .unwrap_or("unknown_error")
        .to_string();
    let description = body
        .and_then(|b| b.get("error_description"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| format!("{} {}", response.status.as_u16(), response.status_text));

    if description.contains("AADSTS7000222") || description.contains("AADSTS700024") {
        let detail = description.lines().next().unwrap_or_default().to_string();
        AuthError::ExpiredCredential { detail }
    } else {
        AuthError::CredentialRejected { code, description }
    }
}
