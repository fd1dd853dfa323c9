use chrono::{DateTime, Utc};
use log::debug;
use pa_common::Secret;
use sqlx::{FromRow, SqliteConnection};

use crate::{db_types::User, pae_api::errors::StoreError};

#[derive(FromRow)]
struct UserRow {
    id: i64,
    username: String,
    password: String,
    token: Option<String>,
    token_created: Option<DateTime<Utc>>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        User {
            id: row.id,
            username: row.username,
            password: Secret::new(row.password),
            token: row.token,
            token_created: row.token_created,
        }
    }
}

const USER_COLUMNS: &str = "id, username, password, token, token_created";

pub async fn fetch_user_by_credentials(
    username: &str,
    password: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, StoreError> {
    let q = format!("SELECT {USER_COLUMNS} FROM users WHERE username = ? AND password = ?");
    let user = sqlx::query_as::<_, UserRow>(&q).bind(username).bind(password).fetch_optional(conn).await?;
    Ok(user.map(User::from))
}

pub async fn fetch_user_by_token(token: &str, conn: &mut SqliteConnection) -> Result<Option<User>, StoreError> {
    let q = format!("SELECT {USER_COLUMNS} FROM users WHERE token = ?");
    let user = sqlx::query_as::<_, UserRow>(&q).bind(token).fetch_optional(conn).await?;
    Ok(user.map(User::from))
}

pub async fn update_user_token(
    user_id: i64,
    token: &str,
    issued_at: DateTime<Utc>,
    conn: &mut SqliteConnection,
) -> Result<Option<User>, StoreError> {
    let q = format!("UPDATE users SET token = ?, token_created = ? WHERE id = ? RETURNING {USER_COLUMNS}");
    let user = sqlx::query_as::<_, UserRow>(&q).bind(token).bind(issued_at).bind(user_id).fetch_optional(conn).await?;
    debug!("🗃️ Session token updated for user #{user_id}");
    Ok(user.map(User::from))
}

pub async fn insert_user(username: &str, password: &str, conn: &mut SqliteConnection) -> Result<User, StoreError> {
    let q = format!("INSERT INTO users (username, password) VALUES (?, ?) RETURNING {USER_COLUMNS}");
    let user = sqlx::query_as::<_, UserRow>(&q).bind(username).bind(password).fetch_one(conn).await?;
    debug!("🗃️ User '{username}' created with id #{}", user.id);
    Ok(user.into())
}
