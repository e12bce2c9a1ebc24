use thiserror::Error;

/// Classification of low-level transport failures.
///
/// The executor's [`RetryPolicy`](crate::http::RetryPolicy) decides whether to
/// retry a failed attempt based on this classification, mirroring the error
/// classes a native HTTP stack reports (timeouts, resets, refused
/// connections, DNS failures). [`TlsTrust`](TransportErrorKind::TlsTrust) is
/// distinguished so callers can surface an actionable trust-store hint
/// instead of a generic network failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    /// The request did not complete within the transport's socket timeout.
    Timeout,
    /// The peer reset the connection mid-request.
    ConnectionReset,
    /// The connection attempt was refused.
    ConnectionRefused,
    /// Hostname resolution failed.
    DnsFailure,
    /// No route to the host.
    HostUnreachable,
    /// The connection was closed while writing the request.
    BrokenPipe,
    /// The server certificate chain could not be verified against the local
    /// trust store.
    TlsTrust,
    /// Anything the transport could not classify further.
    Other,
}

/// A network-level request failure, before any HTTP status was received.
#[derive(Debug, Clone, Error)]
#[error("request to {url} failed: {reason}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub url: String,
    pub reason: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// Classifies a `reqwest` error, walking its source chain so that TLS
    /// verification failures buried below a connect error are still detected.
    pub fn from_reqwest(url: &str, err: &reqwest::Error) -> Self {
        let mut reason = String::new();
        let mut source: Option<&(dyn std::error::Error + 'static)> = Some(err);
        while let Some(inner) = source {
            if !reason.is_empty() {
                reason.push_str(": ");
            }
            reason.push_str(&inner.to_string());
            source = inner.source();
        }

        let lower = reason.to_lowercase();
        let kind = if lower.contains("certificate") || lower.contains("unknownissuer") {
            TransportErrorKind::TlsTrust
        } else if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::ConnectionRefused
        } else {
            TransportErrorKind::Other
        };

        Self::new(kind, url, reason)
    }
}

/// Input validation failures, reported before any network call is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{name} cannot be empty")]
    Empty { name: &'static str },

    #[error("{name} is invalid: {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display_includes_url_and_reason() {
        let err = TransportError::new(
            TransportErrorKind::ConnectionReset,
            "https://management.azure.com/subscriptions",
            "connection reset by peer",
        );
        let rendered = err.to_string();
        assert!(rendered.contains("https://management.azure.com/subscriptions"));
        assert!(rendered.contains("connection reset by peer"));
    }

    #[test]
    fn validation_error_names_the_field() {
        let err = ValidationError::Empty { name: "tenant_id" };
        assert_eq!(err.to_string(), "tenant_id cannot be empty");
    }
}
