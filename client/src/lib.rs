//! Client core for the Azure Resource Manager control plane.
//!
//! The crate is layered bottom-up: [`http`] owns the transport seam and the
//! policy-driven request executor, [`auth`] mints and caches access tokens
//! for the supported credential schemes, and [`management`] builds the
//! authenticated dispatcher, pagination, long-running-operation polling and
//! the deployment workflow on top of both.
//!
//! All network access funnels through the [`http::HttpTransport`] trait, so
//! every layer above it is testable against a scripted transport without
//! opening a socket.

pub mod auth;
pub mod common;
pub mod http;
pub mod management;

#[cfg(test)]
mod test_support;
