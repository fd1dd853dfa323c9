use crate::{db_types::Product, pae_api::errors::StoreError};

/// Read access to the product catalogue. Products are reference data and are never modified by the adapter.
#[allow(async_fn_in_trait)]
pub trait ProductCatalog {
    async fn fetch_all_products(&self) -> Result<Vec<Product>, StoreError>;

    async fn fetch_product_by_id(&self, id: i64) -> Result<Option<Product>, StoreError>;

    /// Products are looked up by their code, not their id, when a transaction comes in.
    async fn fetch_product_by_code(&self, product_code: &str) -> Result<Option<Product>, StoreError>;
}
