//! # Partner Adapter server
//! This crate hosts the HTTP surface of the partner adapter. It is responsible for:
//! * Receiving Partner Connect webhook notifications, fetching the referenced transaction or event and taking ownership
//!   of it.
//! * Handing the transaction to the reconciliation engine and reporting the outcome back to the platform.
//! * Serving the JSON calls made by the partner UI.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/ui`: Product list, order history and origin details for the partner UI.
//! * `/progress`: The current state of the order linked to a transaction.
//! * `/request`: Webhook for transaction `created` and `updated` notifications.
//! * `/event`: Webhook for transaction event notifications.
//! * `/orders/{order_id}/status`: Fulfilment actions (complete, cancel, input required) taken in the partner UI.
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod integrations;
pub mod response_reporter;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
