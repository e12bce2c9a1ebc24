use super::client::ArmClient;
use super::errors::{ApiResult, ArmError, AzureError};
use crate::common::ValidationError;
use crate::http::types::{HttpRequest, Method, StatusCode};
use serde_json::Value;
use tokio_util::sync::CancellationToken;

/// API version of the Microsoft.Resources deployment endpoints.
const DEPLOYMENTS_API_VERSION: &str = "2021-04-01";

/// Template deployments scoped to an arbitrary resource URI (a subscription,
/// a resource group, or a management group).
pub struct Deployments<'a> {
    client: &'a ArmClient,
}

impl<'a> Deployments<'a> {
    pub fn new(client: &'a ArmClient) -> Self {
        Self { client }
    }

    /// Creates or updates a deployment and waits for it to finish.
    ///
    /// A direct 200/201 answer is returned as-is. An asynchronous answer is
    /// polled to completion, after which the deployment record is fetched
    /// again and judged by its `properties.provisioningState`: only
    /// `Succeeded` is success, anything else fails with the deployment's own
    /// error envelope.
    pub async fn create_or_update(
        &self,
        resource_uri: &str,
        deployment_name: &str,
        parameters: &Value,
        cancel: &CancellationToken,
    ) -> ApiResult<Value> {
        validate_inputs(resource_uri, deployment_name)?;
        let uri = self.deployment_uri(resource_uri, deployment_name, "");
        let request = HttpRequest::new(Method::PUT, &uri).with_json_body(parameters);
        let response = self.client.begin_request(&request).await?;

        if is_async_response(response.status, &response.headers) {
            log::info!("deployment {deployment_name} accepted, polling until it settles");
            self.client.wait_for_operation(&response, None, cancel).await?;

            let final_response = self
                .client
                .begin_request(&HttpRequest::new(Method::GET, &uri))
                .await?;
            if final_response.status != StatusCode::OK {
                return Err(ArmError::Api(AzureError::from_response(&final_response)));
            }
            interpret_provisioning_state(final_response.body.unwrap_or(Value::Null))
        } else if response.status == StatusCode::OK || response.status == StatusCode::CREATED {
            Ok(response.body.unwrap_or(Value::Null))
        } else {
            Err(ArmError::Api(AzureError::from_response(&response)))
        }
    }

    /// Validates a deployment without executing it.
    ///
    /// The endpoint reports template problems through a 400 whose body is
    /// the validation result, so both 200 and 400 are successful validations
    /// from the client's point of view.
    pub async fn validate(
        &self,
        resource_uri: &str,
        deployment_name: &str,
        parameters: &Value,
    ) -> ApiResult<Value> {
        validate_inputs(resource_uri, deployment_name)?;
        let uri = self.deployment_uri(resource_uri, deployment_name, "/validate");
        let request = HttpRequest::new(Method::POST, &uri).with_json_body(parameters);
        let response = self.client.begin_request(&request).await?;

        if response.status == StatusCode::OK || response.status == StatusCode::BAD_REQUEST {
            Ok(response.body.unwrap_or(Value::Null))
        } else {
            Err(ArmError::Api(AzureError::from_response(&response)))
        }
    }

    fn deployment_uri(&self, resource_uri: &str, deployment_name: &str, suffix: &str) -> String {
        let template = format!(
            "//{}/providers/Microsoft.Resources/deployments/{{deploymentName}}{suffix}",
            resource_uri.trim_matches('/')
        );
        self.client.request_uri(
            &template,
            &[("deploymentName", deployment_name)],
            &[],
            Some(DEPLOYMENTS_API_VERSION),
        )
    }
}

fn validate_inputs(resource_uri: &str, deployment_name: &str) -> Result<(), ValidationError> {
    if resource_uri.trim().is_empty() {
        return Err(ValidationError::Empty {
            name: "resource_uri",
        });
    }
    if deployment_name.trim().is_empty() {
        return Err(ValidationError::Empty {
            name: "deployment_name",
        });
    }
    Ok(())
}

/// Whether the service chose the asynchronous protocol for this request.
fn is_async_response(
    status: StatusCode,
    headers: &std::collections::HashMap<String, String>,
) -> bool {
    status == StatusCode::ACCEPTED
        || headers.contains_key("azure-asyncoperation")
        || headers.contains_key("location")
}

/// Judges a settled deployment record.
fn interpret_provisioning_state(body: Value) -> ApiResult<Value> {
    let Some(properties) = body.get("properties") else {
        return Err(ArmError::ProtocolViolation {
            expected: "a deployment record with properties.provisioningState".to_string(),
            actual: body.to_string(),
        });
    };
    let Some(state) = properties.get("provisioningState").and_then(|v| v.as_str()) else {
        return Err(ArmError::ProtocolViolation {
            expected: "a provisioningState string".to_string(),
            actual: properties.to_string(),
        });
    };

    if state == "Succeeded" {
        Ok(body)
    } else {
        let envelope = properties.get("error").unwrap_or(properties);
        let mut error = AzureError::from_body(envelope);
        if error.code.is_none() {
            error.code = Some(state.to_string());
        }
        Err(ArmError::OperationFailed(error))
    }
}
