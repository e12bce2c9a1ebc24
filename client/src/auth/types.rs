use crate::common::ValidationError;
use serde::{Deserialize, Serialize};
use tokio::time::{Duration, Instant};

/// Public-cloud Azure AD authority.
pub const DEFAULT_AUTHORITY_URL: &str = "https://login.microsoftonline.com";
/// Public-cloud Azure Resource Manager endpoint, also the default token
/// audience.
pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";
/// Instance metadata service endpoint used for managed-identity tokens.
pub const DEFAULT_IMDS_ENDPOINT: &str = "http://169.254.169.254";

/// Tokens are refreshed this long before their reported expiry, so a token
/// handed to a caller never expires mid-request.
const EXPIRY_BUFFER: Duration = Duration::from_secs(300);

/// How a service principal (or workload) proves its identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "auth_type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// Client-credentials grant with a shared secret.
    ServicePrincipalKey { client_secret: String },
    /// Client-credentials grant with a signed certificate assertion.
    ServicePrincipalCertificate { certificate_pem: String },
    /// Token fetched from the instance metadata service; no secret leaves
    /// the machine.
    ManagedIdentity {
        #[serde(default)]
        msi_client_id: Option<String>,
    },
    /// Workload identity federation: a short-lived OIDC token is obtained
    /// from an external token service and exchanged for an access token.
    WorkloadIdentityFederation {
        token_service_url: String,
        system_access_token: String,
        service_connection_id: String,
    },
}

/// Everything needed to mint access tokens for one identity against one
/// cloud instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialConfig {
    #[serde(default)]
    pub client_id: String,
    pub tenant_id: String,
    #[serde(flatten)]
    pub scheme: AuthScheme,
    /// Resource-manager endpoint requests are sent to.
    #[serde(default = "default_management_url")]
    pub base_url: String,
    /// Audience the minted tokens are scoped to. Usually equals `base_url`
    /// but differs on sovereign clouds and Azure Stack.
    #[serde(default = "default_management_url")]
    pub resource_id: String,
    #[serde(default = "default_authority_url")]
    pub authority_url: String,
    /// Azure Stack authorities are ADFS-backed and take no tenant segment in
    /// the token endpoint path.
    #[serde(default)]
    pub is_azure_stack: bool,
    /// Override for the instance metadata endpoint, for testing and for
    /// Azure Arc hosts.
    #[serde(default)]
    pub metadata_endpoint: Option<String>,
}

fn default_management_url() -> String {
    DEFAULT_MANAGEMENT_URL.to_string()
}

fn default_authority_url() -> String {
    DEFAULT_AUTHORITY_URL.to_string()
}

impl CredentialConfig {
    pub fn new(
        client_id: impl Into<String>,
        tenant_id: impl Into<String>,
        scheme: AuthScheme,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            tenant_id: tenant_id.into(),
            scheme,
            base_url: default_management_url(),
            resource_id: default_management_url(),
            authority_url: default_authority_url(),
            is_azure_stack: false,
            metadata_endpoint: None,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ValidationError::Empty { name: "tenant_id" });
        }
        // Managed identity resolves the identity on the host side, all other
        // schemes authenticate as an application.
        let needs_client_id = !matches!(self.scheme, AuthScheme::ManagedIdentity { .. });
        if needs_client_id && self.client_id.trim().is_empty() {
            return Err(ValidationError::Empty { name: "client_id" });
        }
        match &self.scheme {
            AuthScheme::ServicePrincipalKey { client_secret } if client_secret.is_empty() => {
                Err(ValidationError::Empty {
                    name: "client_secret",
                })
            }
            AuthScheme::ServicePrincipalCertificate { certificate_pem }
                if certificate_pem.trim().is_empty() =>
            {
                Err(ValidationError::Empty {
                    name: "certificate_pem",
                })
            }
            AuthScheme::WorkloadIdentityFederation {
                token_service_url, ..
            } if token_service_url.trim().is_empty() => Err(ValidationError::Empty {
                name: "token_service_url",
            }),
            _ => Ok(()),
        }
    }

    /// The v2.0 token endpoint for this tenant.
    pub fn token_endpoint(&self) -> String {
        let authority = self.authority_url.trim_end_matches('/');
        if self.is_azure_stack {
            format!("{authority}/oauth2/v2.0/token")
        } else {
            format!("{authority}/{}/oauth2/v2.0/token", self.tenant_id)
        }
    }

    /// The scope requested for the configured resource.
    pub fn scope(&self) -> String {
        format!("{}/.default", self.resource_id.trim_end_matches('/'))
    }
}

/// A minted access token together with its expiry.
#[derive(Debug, Clone)]
pub struct CachedToken {
    pub token: String,
    pub expires_at: Instant,
}

impl CachedToken {
    pub fn new(token: impl Into<String>, expires_in: Duration) -> Self {
        Self {
            token: token.into(),
            expires_at: Instant::now() + expires_in,
        }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    /// True once the token is inside the refresh buffer.
    pub fn needs_refresh(&self) -> bool {
        Instant::now() + EXPIRY_BUFFER >= self.expires_at
    }
}
