use super::types::{HttpRequest, HttpResponse};
use crate::common::TransportError;
use async_trait::async_trait;
use serde_json::Value;

/// Seam between the client core and the concrete HTTP stack.
///
/// Everything above this trait (executor, dispatcher, poller, pagination)
/// only ever sees [`HttpRequest`]/[`HttpResponse`]; the physical send,
/// socket timeouts and proxy handling live behind it.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Production transport backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone, Default)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = self.client.request(request.method.clone(), &request.uri);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.uri, &e))?;

        let status = response.status();
        let status_text = status.canonical_reason().unwrap_or_default().to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();

        let text = response
            .text()
            .await
            .map_err(|e| TransportError::from_reqwest(&request.uri, &e))?;
        let body = if text.is_empty() {
            None
        } else {
            // JSON when the server sent JSON, the raw text otherwise.
            Some(serde_json::from_str(&text).unwrap_or(Value::String(text)))
        };

        Ok(HttpResponse {
            status,
            status_text,
            headers,
            body,
        })
    }
}
