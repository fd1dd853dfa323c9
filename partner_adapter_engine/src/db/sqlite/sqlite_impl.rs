use std::fmt::Debug;

use chrono::{DateTime, Utc};
use log::*;
use serde_json::Value;
use sqlx::{migrate, migrate::MigrateDatabase, Sqlite, SqlitePool};

use super::{db_url, new_pool, orders, products, users, SqliteDatabaseError};
use crate::{
    db_types::{NewOrder, Order, OrderStatusType, OrderUpdate, Product, User},
    pae_api::errors::StoreError,
    traits::{AuthManagement, OrderManagement, PartnerAdapterDatabase, ProductCatalog},
};

const MAX_CONNECTIONS: u32 = 25;

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL in `PA_DATABASE_URL`.
    pub async fn new() -> Result<Self, SqliteDatabaseError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), MAX_CONNECTIONS).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, SqliteDatabaseError> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        if !Sqlite::database_exists(url).await.unwrap_or(false) {
            info!("🗃️ Database {url} does not exist. Creating it.");
            Sqlite::create_database(url).await?;
        }
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Brings the schema up to date. Safe to call on every start-up.
    pub async fn migrate(&self) -> Result<(), SqliteDatabaseError> {
        migrate!("./src/db/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Adds a product to the catalogue (or renames an existing product code).
    pub async fn upsert_product(&self, name: &str, code: &str) -> Result<Product, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::upsert_product(name, code, &mut conn).await
    }

    async fn order_or_not_found(&self, order_id: i64) -> Result<Order, StoreError> {
        self.fetch_order_by_id(order_id).await?.ok_or(StoreError::OrderNotFound(order_id))
    }
}

impl ProductCatalog for SqliteDatabase {
    async fn fetch_all_products(&self) -> Result<Vec<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_all_products(&mut conn).await
    }

    async fn fetch_product_by_id(&self, id: i64) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product_by_id(id, &mut conn).await
    }

    async fn fetch_product_by_code(&self, product_code: &str) -> Result<Option<Product>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        products::fetch_product_by_code(product_code, &mut conn).await
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_id(order_id, &mut conn).await
    }

    async fn fetch_orders_for_loan(&self, loan_guid: &str) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_loan(loan_guid, &mut conn).await
    }

    async fn fetch_order_by_trx_id(&self, trx_id: &str) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::order_id_for_trx_id(trx_id, &mut tx).await? {
            Some(id) => orders::fetch_order_by_id(id, &mut tx).await?,
            None => None,
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order_by_latest_trx_id(&self, trx_id: &str) -> Result<Option<Order>, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = match orders::order_id_for_latest_trx_id(trx_id, &mut tx).await? {
            Some(id) => orders::fetch_order_by_id(id, &mut tx).await?,
            None => None,
        };
        tx.commit().await?;
        Ok(order)
    }

    async fn order_has_event(&self, order_id: i64, event_id: &str) -> Result<bool, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::order_has_event(order_id, event_id, &mut conn).await
    }

    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let id = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        self.order_or_not_found(id).await
    }

    async fn append_transaction(&self, order_id: i64, update: OrderUpdate) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::append_transaction(order_id, update, &mut tx).await?;
        tx.commit().await?;
        self.order_or_not_found(order_id).await
    }

    async fn append_notification(
        &self,
        order_id: i64,
        notification: &Value,
        event_id: Option<&str>,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        orders::append_notification(order_id, notification, event_id, &mut tx).await?;
        tx.commit().await?;
        self.order_or_not_found(order_id).await
    }

    async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_order_status(order_id, status, &mut conn).await?;
        self.order_or_not_found(order_id).await
    }
}

impl AuthManagement for SqliteDatabase {
    async fn fetch_user_by_credentials(&self, username: &str, password: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_credentials(username, password, &mut conn).await
    }

    async fn fetch_user_by_token(&self, token: &str) -> Result<Option<User>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::fetch_user_by_token(token, &mut conn).await
    }

    async fn update_user_token(&self, user_id: i64, token: &str, issued_at: DateTime<Utc>) -> Result<User, StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::update_user_token(user_id, token, issued_at, &mut conn)
            .await?
            .ok_or_else(|| StoreError::DatabaseError(format!("User #{user_id} does not exist")))
    }

    async fn insert_user(&self, username: &str, password: &str) -> Result<User, StoreError> {
        let mut conn = self.pool.acquire().await?;
        users::insert_user(username, password, &mut conn).await
    }
}

impl PartnerAdapterDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn close(&mut self) -> Result<(), StoreError> {
        self.pool.close().await;
        Ok(())
    }
}
