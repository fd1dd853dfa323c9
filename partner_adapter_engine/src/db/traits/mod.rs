//! # Backend contracts
//!
//! The traits in this module define what a storage backend has to provide for the partner adapter. The engine APIs in
//! `pae_api` are generic over them, so a backend only needs to implement these traits to be usable by the server.
//!
//! * [`ProductCatalog`] gives read access to the partner's products.
//! * [`OrderManagement`] stores orders and links platform transactions and notifications to them. Appends must be
//!   atomic: two concurrent appends to the same order must both survive.
//! * [`AuthManagement`] looks up partner users and records their session tokens.
//! * [`PartnerAdapterDatabase`] ties the three together.
mod auth_management;
mod order_management;
mod partner_adapter_database;
mod product_catalog;

pub use auth_management::AuthManagement;
pub use order_management::OrderManagement;
pub use partner_adapter_database::PartnerAdapterDatabase;
pub use product_catalog::ProductCatalog;
