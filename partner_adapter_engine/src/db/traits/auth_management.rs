use chrono::{DateTime, Utc};

use crate::{db_types::User, pae_api::errors::StoreError};

/// The `AuthManagement` trait defines behaviour for looking up partner users and keeping track of their UI sessions.
///
/// Token lifetimes are not enforced here. The record only carries the issue time; consumers of the token compare it
/// against their own lifetime policy (see [`crate::AuthApi::validate_session_token`]).
#[allow(async_fn_in_trait)]
pub trait AuthManagement {
    async fn fetch_user_by_credentials(&self, username: &str, password: &str) -> Result<Option<User>, StoreError>;

    async fn fetch_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError>;

    /// Stores a freshly issued session token for the user and returns the updated record.
    async fn update_user_token(&self, user_id: i64, token: &str, issued_at: DateTime<Utc>) -> Result<User, StoreError>;

    async fn insert_user(&self, username: &str, password: &str) -> Result<User, StoreError>;
}
