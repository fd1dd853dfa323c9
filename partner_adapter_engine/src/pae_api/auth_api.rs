use std::fmt::Debug;

use chrono::{DateTime, Duration, Utc};
use log::*;
use pa_common::Secret;

use crate::{
    db_types::User,
    helpers::new_session_token,
    pae_api::errors::AuthApiError,
    traits::AuthManagement,
};

/// `AuthApi` checks partner-user credentials and manages the session tokens handed out to the partner UI.
pub struct AuthApi<B> {
    db: B,
}

impl<B> Debug for AuthApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AuthApi")
    }
}

impl<B> AuthApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> AuthApi<B>
where B: AuthManagement
{
    /// Checks the username and password against the stored users and, on success, issues a fresh session token.
    ///
    /// The returned user carries the new token and its issue time.
    pub async fn authenticate(&self, username: &str, password: &Secret<String>) -> Result<User, AuthApiError> {
        if username.is_empty() || password.reveal().is_empty() {
            return Err(AuthApiError::MissingCredentials);
        }
        let user = self
            .db
            .fetch_user_by_credentials(username, password.reveal())
            .await?
            .ok_or(AuthApiError::InvalidCredentials)?;
        let token = new_session_token();
        let user = self.db.update_user_token(user.id, &token, Utc::now()).await?;
        debug!("🔑️ User '{}' authenticated. New session token issued.", user.username);
        Ok(user)
    }

    /// Returns the user owning `token`, provided the token was issued less than `lifetime` ago.
    pub async fn validate_session_token(&self, token: &str, lifetime: Duration) -> Result<User, AuthApiError> {
        if token.is_empty() {
            return Err(AuthApiError::InvalidToken);
        }
        let user = self.db.fetch_user_by_token(token).await?.ok_or(AuthApiError::InvalidToken)?;
        match user.token_created {
            Some(issued) if !is_token_expired(issued, Utc::now(), lifetime) => Ok(user),
            _ => {
                debug!("🔑️ Session token for '{}' has expired", user.username);
                Err(AuthApiError::TokenExpired)
            },
        }
    }

    pub async fn create_user(&self, username: &str, password: &str) -> Result<User, AuthApiError> {
        let user = self.db.insert_user(username, password).await?;
        info!("🔑️ User '{username}' created");
        Ok(user)
    }
}

pub fn is_token_expired(issued_at: DateTime<Utc>, now: DateTime<Utc>, lifetime: Duration) -> bool {
    now - issued_at > lifetime
}
