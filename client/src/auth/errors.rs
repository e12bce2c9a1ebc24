use crate::common::{TransportError, ValidationError};
use thiserror::Error;

/// Failures while acquiring or refreshing an access token.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The authority rejected the credential outright.
    #[error("token request rejected ({code}): {description}")]
    CredentialRejected { code: String, description: String },

    /// The client secret or certificate has expired. Kept distinct from
    /// other rejections so the operator gets an actionable message.
    #[error(
        "the service principal credential has expired; rotate the secret or \
         certificate in the directory and update the connection: {detail}"
    )]
    ExpiredCredential { detail: String },

    /// The metadata service answered, but with a status that means no
    /// managed identity is assigned to this host.
    #[error(
        "managed identity token request failed with status {status}: {message}; \
         verify a managed identity is configured for this resource"
    )]
    ManagedIdentityNotConfigured { status: u16, message: String },

    /// The metadata service kept throttling or failing past the retry budget.
    #[error("managed identity token request gave up after {attempts} attempts (last status {status})")]
    ManagedIdentityExhausted { attempts: u32, status: u16 },

    /// The federated token service never produced an OIDC token.
    #[error("could not obtain a federated OIDC token: {reason}")]
    FederatedTokenUnavailable { reason: String },

    /// The authority answered 200 but the payload was not a usable token
    /// response.
    #[error("malformed token response: {reason}")]
    MalformedResponse { reason: String },

    /// The certificate assertion could not be built.
    #[error("failed to build client assertion: {reason}")]
    AssertionBuild { reason: String },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
