//! Partner Connect client
//!
//! A thin, typed wrapper over the Partner Connect REST API used by the partner adapter:
//! * OAuth2 client-credentials token acquisition,
//! * origin, transaction and event fetches,
//! * request resource downloads and response resource uploads,
//! * the `PATCH` status-reporting call.
//!
//! The [`PartnerPlatform`] trait describes these calls so that the adapter can be exercised against a mock platform.
//! [`PartnerConnectApi`] is the reqwest-backed implementation. Every call carries a fixed user agent, a request timeout
//! and a bounded retry policy for transport errors and 5xx responses.
mod api;
mod config;
mod error;
mod platform;
mod retry;

pub mod data_objects;
pub mod helpers;

pub use api::PartnerConnectApi;
pub use config::{PartnerConnectConfig, DEFAULT_LOAN_FORMAT};
pub use error::PartnerConnectError;
pub use platform::PartnerPlatform;
pub use retry::RetryPolicy;
