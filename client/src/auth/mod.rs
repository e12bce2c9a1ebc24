//! Access-token acquisition for the management plane.
//!
//! [`ApplicationTokenCredentials`] owns the credential material, mints
//! tokens through whichever scheme the [`CredentialConfig`] selects and
//! caches them until shortly before expiry.

pub mod credentials;
pub mod errors;
pub mod types;

mod federated;
mod managed_identity;
mod service_principal;

pub use credentials::ApplicationTokenCredentials;
pub use errors::AuthError;
pub use types::{
    AuthScheme, CachedToken, CredentialConfig, DEFAULT_AUTHORITY_URL, DEFAULT_IMDS_ENDPOINT,
    DEFAULT_MANAGEMENT_URL,
};
