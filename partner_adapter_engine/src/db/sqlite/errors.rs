use thiserror::Error;

use crate::pae_api::errors::StoreError;

/// Errors raised while opening or migrating the SQLite store. Query failures are reported as [`StoreError`]s.
#[derive(Debug, Error)]
pub enum SqliteDatabaseError {
    #[error("Database connection error: {0}")]
    DriverError(#[from] sqlx::Error),
    #[error("Could not apply database migrations: {0}")]
    MigrationError(#[from] sqlx::migrate::MigrateError),
}

impl From<SqliteDatabaseError> for StoreError {
    fn from(e: SqliteDatabaseError) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}
