//! Scripted transport and response builders shared by the unit tests.

use crate::auth::{ApplicationTokenCredentials, AuthScheme, CredentialConfig};
use crate::common::TransportError;
use crate::http::HttpTransport;
use crate::http::types::{HttpRequest, HttpResponse, StatusCode};
use crate::management::ArmClient;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// Transport that replays a queue of scripted outcomes and records every
/// request it receives.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<VecDeque<Result<HttpResponse, TransportError>>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_response(&self, response: HttpResponse) {
        self.script.lock().unwrap().push_back(Ok(response));
    }

    pub fn push_error(&self, error: TransportError) {
        self.script.lock().unwrap().push_back(Err(error));
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> HttpRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted outcome for {} {}", request.method, request.uri))
    }
}

pub fn json_response_with_headers(
    status: u16,
    headers: &[(&str, &str)],
    body: Value,
) -> HttpResponse {
    let status = StatusCode::from_u16(status).expect("test status code is valid");
    HttpResponse {
        status,
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers: headers
            .iter()
            .map(|(name, value)| (name.to_lowercase(), value.to_string()))
            .collect(),
        body: Some(body),
    }
}

pub fn json_response(status: u16, body: Value) -> HttpResponse {
    json_response_with_headers(status, &[], body)
}

pub fn empty_response(status: u16) -> HttpResponse {
    let status = StatusCode::from_u16(status).expect("test status code is valid");
    HttpResponse {
        status,
        status_text: status.canonical_reason().unwrap_or_default().to_string(),
        headers: std::collections::HashMap::new(),
        body: None,
    }
}

/// A successful token response in the authority's shape.
pub fn token_response(token: &str, expires_in: u64) -> HttpResponse {
    json_response(
        200,
        json!({
            "token_type": "Bearer",
            "expires_in": expires_in,
            "access_token": token,
        }),
    )
}

pub fn test_config() -> CredentialConfig {
    CredentialConfig::new(
        "11111111-2222-3333-4444-555555555555",
        "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee",
        AuthScheme::ServicePrincipalKey {
            client_secret: "test-secret".to_string(),
        },
    )
}

/// Credentials whose authority transport hands out `token-1`, `token-2`, …
/// so tests can assert which token a given request carried.
pub fn test_credentials() -> Arc<ApplicationTokenCredentials> {
    let authority = Arc::new(MockTransport::new());
    for i in 1..=8 {
        authority.push_response(token_response(&format!("token-{i}"), 3600));
    }
    Arc::new(
        ApplicationTokenCredentials::with_transport(test_config(), authority)
            .expect("test config is valid"),
    )
}

/// A client for subscription `sub-123` whose management traffic goes through
/// the given transport. Token traffic uses its own scripted authority.
pub fn test_client(transport: Arc<MockTransport>) -> ArmClient {
    ArmClient::with_transport(test_credentials(), "sub-123", transport)
        .expect("test client parameters are valid")
}
