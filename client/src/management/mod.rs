//! Authenticated access to the resource-management plane.
//!
//! [`ArmClient`] dispatches individual requests (bearer token, common
//! headers, one transparent refresh on an expired token) and knows the two
//! service-wide protocols built on top of plain requests: `nextLink`
//! pagination and long-running-operation polling. [`Deployments`] composes
//! them into the template-deployment workflow.

pub mod client;
pub mod deployments;
pub mod errors;
pub mod types;

mod poller;

pub use client::ArmClient;
pub use deployments::Deployments;
pub use errors::{ApiResult, ArmError, AzureError};
pub use types::ListResponse;
