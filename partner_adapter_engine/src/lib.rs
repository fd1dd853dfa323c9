//! Partner Adapter Engine
//!
//! The partner adapter receives transaction and event notifications from the Partner Connect platform, links them to
//! partner orders and reports progress back to the platform. This library holds the provider-agnostic core; the HTTP
//! surface and the platform client live in other crates.
//!
//! The library is divided into three main sections:
//! 1. Validation and typing of inbound payloads ([`mod@notification`], [`mod@transaction`]). Loosely-typed JSON is
//!    checked once, at the boundary, and converted into strong types.
//! 2. Database management ([`mod@db_types`] and the backend traits in [`mod@traits`]). SQLite is the supported backend.
//!    Orders are documents whose transaction chain and notification trail are append-only.
//! 3. The engine API: [`ReconciliationApi`] correlates notifications with orders, [`AuthApi`] checks partner users and
//!    their UI sessions, and [`OrderHistoryApi`] answers the UI's read-only queries.
mod db;

pub mod db_types;
pub mod helpers;
pub mod notification;
mod pae_api;
pub mod transaction;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

#[cfg(feature = "sqlite")]
pub use db::sqlite::{SqliteDatabase, SqliteDatabaseError};
pub use db::traits;
pub use db::traits::{AuthManagement, OrderManagement, PartnerAdapterDatabase, ProductCatalog};
pub use pae_api::{
    auth_api::{is_token_expired, AuthApi},
    errors::{AuthApiError, ReconciliationError, StoreError},
    order_history_api::{select_order, OrderHistoryApi},
    reconciliation_api::{ReconciliationApi, ReconciliationKind, ReconciliationOutcome},
};
