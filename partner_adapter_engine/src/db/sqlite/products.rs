use sqlx::SqliteConnection;

use crate::{db_types::Product, pae_api::errors::StoreError};

pub async fn fetch_all_products(conn: &mut SqliteConnection) -> Result<Vec<Product>, StoreError> {
    let products = sqlx::query_as::<_, Product>("SELECT id, product_name, product_code FROM products ORDER BY id")
        .fetch_all(conn)
        .await?;
    Ok(products)
}

pub async fn fetch_product_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Product>, StoreError> {
    let product = sqlx::query_as::<_, Product>("SELECT id, product_name, product_code FROM products WHERE id = ?")
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(product)
}

pub async fn fetch_product_by_code(code: &str, conn: &mut SqliteConnection) -> Result<Option<Product>, StoreError> {
    let product =
        sqlx::query_as::<_, Product>("SELECT id, product_name, product_code FROM products WHERE product_code = ?")
            .bind(code)
            .fetch_optional(conn)
            .await?;
    Ok(product)
}

/// Adds a product to the catalogue, or renames it if the code already exists.
pub async fn upsert_product(name: &str, code: &str, conn: &mut SqliteConnection) -> Result<Product, StoreError> {
    let product = sqlx::query_as::<_, Product>(
        r#"
            INSERT INTO products (product_name, product_code) VALUES (?, ?)
            ON CONFLICT (product_code) DO UPDATE SET product_name = excluded.product_name
            RETURNING id, product_name, product_code
        "#,
    )
    .bind(name)
    .bind(code)
    .fetch_one(conn)
    .await?;
    Ok(product)
}
