use crate::{
    pae_api::errors::StoreError,
    traits::{AuthManagement, OrderManagement, ProductCatalog},
};

/// This trait defines the highest level of behaviour for backends supporting the partner adapter.
#[allow(async_fn_in_trait)]
pub trait PartnerAdapterDatabase: Clone + ProductCatalog + OrderManagement + AuthManagement {
    /// The URL of the database
    fn url(&self) -> &str;

    async fn close(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}
