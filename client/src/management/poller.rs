use super::client::ArmClient;
use super::errors::ArmError;
use crate::common::TransportErrorKind;
use crate::http::types::{HttpRequest, HttpResponse, Method, StatusCode};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Poll interval when the service does not send `retry-after`.
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(15);
/// How many request timeouts a single polling session absorbs before giving
/// up; the tracking endpoint is read-only, so re-polling is always safe.
const REQUEST_TIMEOUT_TOLERANCE: u32 = 5;
/// Body `status` values that mean the operation is still in flight.
/// `DeploymentNotFound` covers the window where the deployment record is not
/// yet visible to the tracking endpoint.
const IN_FLIGHT_STATUSES: [&str; 4] = ["Accepted", "Running", "InProgress", "DeploymentNotFound"];

impl ArmClient {
    /// Polls an asynchronous operation until it settles.
    ///
    /// The tracking URI comes from the initial response's
    /// `azure-asyncoperation` header, or `location` when that is absent. The
    /// first settled response is returned whatever its outcome; interpreting
    /// success or failure is the caller's job. `timeout_minutes` falls back
    /// to the client default, and zero polls indefinitely.
    pub async fn wait_for_operation(
        &self,
        initial: &HttpResponse,
        timeout_minutes: Option<u64>,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse, ArmError> {
        let tracking_uri = initial
            .header("azure-asyncoperation")
            .or_else(|| initial.header("location"))
            .ok_or(ArmError::MissingTrackingUri)?
            .to_string();

        let timeout = timeout_minutes.unwrap_or(self.lro_timeout_minutes);
        let deadline = (timeout > 0)
            .then(|| tokio::time::Instant::now() + Duration::from_secs(timeout * 60));
        let request = HttpRequest::new(Method::GET, &tracking_uri);
        let mut ignored_timeouts = 0u32;

        loop {
            if let Some(deadline) = deadline
                && tokio::time::Instant::now() >= deadline
            {
                return Err(ArmError::OperationTimedOut {
                    timeout_minutes: timeout,
                });
            }

            let response = match self.begin_request(&request).await {
                Ok(response) => response,
                Err(ArmError::Transport(error))
                    if error.kind == TransportErrorKind::Timeout
                        && ignored_timeouts < REQUEST_TIMEOUT_TOLERANCE =>
                {
                    ignored_timeouts += 1;
                    log::debug!(
                        "poll of {tracking_uri} timed out, re-polling ({ignored_timeouts} of {REQUEST_TIMEOUT_TOLERANCE} tolerated)"
                    );
                    continue;
                }
                Err(error) => return Err(error),
            };

            let in_flight = response.status == StatusCode::ACCEPTED
                || response
                    .body_status()
                    .is_some_and(|status| IN_FLIGHT_STATUSES.contains(&status));
            if !in_flight {
                return Ok(response);
            }

            let interval = response.retry_after().unwrap_or(DEFAULT_POLL_INTERVAL);
            tokio::select! {
                _ = cancel.cancelled() => return Err(ArmError::OperationCancelled),
                _ = tokio::time::sleep(interval) => {}
            }
        }
    }
}
