use thiserror::Error;

use crate::{notification::ValidationError, transaction::EntityReferenceError};

/// Persistence failures. These are surfaced to the caller as-is; neither the store nor the engine retries them.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Stored document could not be (de)serialized: {0}")]
    SerializationError(String),
    #[error("Transaction {trx_id} is already linked to order #{owner}")]
    TransactionAlreadyLinked { trx_id: String, owner: i64 },
    #[error("Order #{0} does not exist")]
    OrderNotFound(i64),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::SerializationError(e.to_string())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ReconciliationError {
    #[error("Product '{0}' is not offered by this partner")]
    InvalidProduct(String),
    #[error("The transaction is an EXISTING_REQUEST, but does not name a prior request id")]
    MissingPriorTransaction,
    #[error("No order is linked to transaction {0}")]
    OrderNotFound(String),
    #[error("{0}")]
    InvalidEntityReference(#[from] EntityReferenceError),
    #[error("Transaction {trx_id} is already linked to order #{owner}")]
    TransactionAlreadyLinked { trx_id: String, owner: i64 },
    #[error("The notification is not valid. {0}")]
    InvalidNotification(#[from] ValidationError),
    #[error("{0}")]
    Store(StoreError),
}

impl From<StoreError> for ReconciliationError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TransactionAlreadyLinked { trx_id, owner } => Self::TransactionAlreadyLinked { trx_id, owner },
            e => Self::Store(e),
        }
    }
}

impl ReconciliationError {
    /// The numeric code reported in the `errors[].code` field of a `failed` status report.
    pub fn code(&self) -> u16 {
        match self {
            Self::InvalidProduct(_) => 400,
            Self::MissingPriorTransaction => 400,
            Self::InvalidEntityReference(_) => 400,
            Self::InvalidNotification(_) => 400,
            Self::OrderNotFound(_) => 404,
            Self::TransactionAlreadyLinked { .. } => 409,
            Self::Store(_) => 500,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthApiError {
    #[error("No credentials were supplied")]
    MissingCredentials,
    #[error("The username or password is incorrect")]
    InvalidCredentials,
    #[error("The session token is not recognised")]
    InvalidToken,
    #[error("The session token has expired")]
    TokenExpired,
    #[error("{0}")]
    Store(#[from] StoreError),
}

impl AuthApiError {
    pub fn code(&self) -> u16 {
        match self {
            Self::Store(_) => 500,
            _ => 401,
        }
    }
}
