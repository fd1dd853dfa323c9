pub mod auth_api;
pub mod errors;
pub mod order_history_api;
pub mod reconciliation_api;
