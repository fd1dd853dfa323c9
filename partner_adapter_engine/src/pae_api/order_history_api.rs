use std::fmt::Debug;

use crate::{
    db_types::{Order, Product},
    pae_api::errors::StoreError,
    traits::{OrderManagement, ProductCatalog},
};

/// Read-only queries behind the partner UI.
pub struct OrderHistoryApi<B> {
    db: B,
}

impl<B> Debug for OrderHistoryApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderHistoryApi")
    }
}

impl<B> OrderHistoryApi<B> {
    pub fn new(db: B) -> Self {
        Self { db }
    }
}

impl<B> OrderHistoryApi<B>
where B: OrderManagement + ProductCatalog
{
    pub async fn products(&self) -> Result<Vec<Product>, StoreError> {
        self.db.fetch_all_products().await
    }

    pub async fn orders_for_loan(&self, loan_guid: &str) -> Result<Vec<Order>, StoreError> {
        self.db.fetch_orders_for_loan(loan_guid).await
    }

    /// Searches the full transaction chain of every order, not only the latest transaction.
    pub async fn order_by_trx_id(&self, trx_id: &str) -> Result<Option<Order>, StoreError> {
        self.db.fetch_order_by_trx_id(trx_id).await
    }

    pub async fn order_by_id(&self, order_id: i64) -> Result<Option<Order>, StoreError> {
        self.db.fetch_order_by_id(order_id).await
    }
}

/// Picks the order the UI should show for request id `rid`: the order whose latest transaction is `rid`, otherwise the
/// first order with `rid` anywhere in its chain.
pub fn select_order<'a>(orders: &'a [Order], rid: &str) -> Option<&'a Order> {
    orders.iter().find(|o| o.latest_trx_id == rid).or_else(|| orders.iter().find(|o| o.contains_trx_id(rid)))
}
