use crate::{
    db_types::{NewOrder, Order, OrderStatusType, OrderUpdate},
    pae_api::errors::StoreError,
};

/// The `OrderManagement` trait defines the behaviour for storing and querying orders in the database backend.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    async fn fetch_order_by_id(&self, order_id: i64) -> Result<Option<Order>, StoreError>;

    /// All orders for the loan, oldest first.
    async fn fetch_orders_for_loan(&self, loan_guid: &str) -> Result<Vec<Order>, StoreError>;

    /// Finds the order that has `trx_id` anywhere in its transaction chain, not only as its latest transaction.
    async fn fetch_order_by_trx_id(&self, trx_id: &str) -> Result<Option<Order>, StoreError>;

    /// Finds the order whose most recent transaction is `trx_id`.
    async fn fetch_order_by_latest_trx_id(&self, trx_id: &str) -> Result<Option<Order>, StoreError>;

    /// Checks whether a notification with the given event id has already been recorded against the order.
    async fn order_has_event(&self, order_id: i64, event_id: &str) -> Result<bool, StoreError>;

    /// Creates the order, its first transaction link and its first notification in one atomic step.
    ///
    /// Fails with [`StoreError::TransactionAlreadyLinked`] if the transaction id already belongs to an order.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    /// Atomically appends the transaction id and notification to the order, replaces the per-transaction data and bumps
    /// the order version.
    ///
    /// Fails with [`StoreError::TransactionAlreadyLinked`] if the transaction id belongs to a *different* order, and
    /// with [`StoreError::OrderNotFound`] if the order does not exist.
    async fn append_transaction(&self, order_id: i64, update: OrderUpdate) -> Result<Order, StoreError>;

    /// Appends a notification to the order's audit trail without touching its transaction chain.
    async fn append_notification(
        &self,
        order_id: i64,
        notification: &serde_json::Value,
        event_id: Option<&str>,
    ) -> Result<Order, StoreError>;

    async fn update_order_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, StoreError>;
}
