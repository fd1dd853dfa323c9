//! Order queries for the SQLite store.
//!
//! An order document is spread over three tables: `orders` holds the replaceable fields, while `order_transactions` and
//! `order_notifications` hold the append-only `trxIds` and `notifs` sequences. Appending is therefore an `INSERT`, never
//! a read-modify-write of the whole document, and concurrent appends cannot overwrite one another.
//!
//! None of these functions are atomic on their own. Callers that mutate should run them inside a transaction and pass
//! `&mut *tx` as the connection argument.
use chrono::{DateTime, Utc};
use log::{debug, trace};
use serde_json::Value;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, OrderUpdate, Product},
    pae_api::errors::StoreError,
};

#[derive(FromRow)]
struct OrderRow {
    id: i64,
    status: String,
    latest_trx_id: String,
    loan_guid: String,
    entity_reference: String,
    entity: String,
    additional_order_information: String,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    product_id: i64,
    product_name: String,
    product_code: String,
}

const ORDER_SELECT: &str = r#"
    SELECT
        orders.id,
        orders.status,
        orders.latest_trx_id,
        orders.loan_guid,
        orders.entity_reference,
        orders.entity,
        orders.additional_order_information,
        orders.version,
        orders.created_at,
        orders.updated_at,
        products.id AS product_id,
        products.product_name,
        products.product_code
    FROM orders JOIN products ON orders.product_id = products.id
"#;

/// Builds the full order document from its row plus the two append-only sequences.
async fn hydrate(row: OrderRow, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let trx_ids = sqlx::query_scalar::<_, String>("SELECT trx_id FROM order_transactions WHERE order_id = ? ORDER BY id")
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await?;
    let notifs = sqlx::query_scalar::<_, String>("SELECT payload FROM order_notifications WHERE order_id = ? ORDER BY id")
        .bind(row.id)
        .fetch_all(&mut *conn)
        .await?
        .iter()
        .map(|p| serde_json::from_str::<Value>(p))
        .collect::<Result<Vec<Value>, _>>()?;
    Ok(Order {
        id: row.id,
        status: OrderStatusType::from(row.status),
        latest_trx_id: row.latest_trx_id,
        trx_ids,
        loan_guid: row.loan_guid,
        entity_reference: serde_json::from_str(&row.entity_reference)?,
        entity: serde_json::from_str(&row.entity)?,
        product: Product { id: row.product_id, product_name: row.product_name, product_code: row.product_code },
        additional_order_information: serde_json::from_str(&row.additional_order_information)?,
        notifs,
        version: row.version,
        created: row.created_at,
        modified: row.updated_at,
    })
}

pub async fn fetch_order_by_id(order_id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, StoreError> {
    let q = format!("{ORDER_SELECT} WHERE orders.id = ?");
    let row = sqlx::query_as::<_, OrderRow>(&q).bind(order_id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

/// Orders for the loan, oldest first.
pub async fn fetch_orders_for_loan(loan_guid: &str, conn: &mut SqliteConnection) -> Result<Vec<Order>, StoreError> {
    let q = format!("{ORDER_SELECT} WHERE orders.loan_guid = ? ORDER BY orders.id");
    let rows = sqlx::query_as::<_, OrderRow>(&q).bind(loan_guid).fetch_all(&mut *conn).await?;
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(row, conn).await?);
    }
    trace!("🗃️ {} orders found for loan {loan_guid}", orders.len());
    Ok(orders)
}

/// Returns the id of the order that has `trx_id` anywhere in its transaction chain.
pub async fn order_id_for_trx_id(trx_id: &str, conn: &mut SqliteConnection) -> Result<Option<i64>, StoreError> {
    let id = sqlx::query_scalar::<_, i64>("SELECT order_id FROM order_transactions WHERE trx_id = ? ORDER BY id LIMIT 1")
        .bind(trx_id)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

pub async fn order_id_for_latest_trx_id(trx_id: &str, conn: &mut SqliteConnection) -> Result<Option<i64>, StoreError> {
    let id = sqlx::query_scalar::<_, i64>("SELECT id FROM orders WHERE latest_trx_id = ? ORDER BY id DESC LIMIT 1")
        .bind(trx_id)
        .fetch_optional(conn)
        .await?;
    Ok(id)
}

pub async fn order_has_event(order_id: i64, event_id: &str, conn: &mut SqliteConnection) -> Result<bool, StoreError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT count(*) FROM order_notifications WHERE order_id = ? AND event_id = ?",
    )
    .bind(order_id)
    .bind(event_id)
    .fetch_one(conn)
    .await?;
    Ok(count > 0)
}

/// Fails if the transaction is linked to an order other than `order_id`. Pass `None` when creating a new order.
async fn ensure_unowned(trx_id: &str, order_id: Option<i64>, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    match order_id_for_trx_id(trx_id, conn).await? {
        Some(owner) if Some(owner) != order_id => {
            Err(StoreError::TransactionAlreadyLinked { trx_id: trx_id.to_string(), owner })
        },
        _ => Ok(()),
    }
}

async fn link_transaction(order_id: i64, trx_id: &str, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    sqlx::query("INSERT INTO order_transactions (order_id, trx_id) VALUES (?, ?)")
        .bind(order_id)
        .bind(trx_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn insert_notification(
    order_id: i64,
    notification: &Value,
    event_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let payload = serde_json::to_string(notification)?;
    sqlx::query("INSERT INTO order_notifications (order_id, event_id, payload) VALUES (?, ?, ?)")
        .bind(order_id)
        .bind(event_id)
        .bind(payload)
        .execute(conn)
        .await?;
    Ok(())
}

/// Increments the version and modification time. Fails with [`StoreError::OrderNotFound`] if the order is missing.
async fn touch_order(order_id: i64, conn: &mut SqliteConnection) -> Result<(), StoreError> {
    let result =
        sqlx::query("UPDATE orders SET version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?")
            .bind(order_id)
            .execute(conn)
            .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::OrderNotFound(order_id));
    }
    Ok(())
}

/// Inserts the order row, its first transaction link and its first notification. Returns the new order id.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<i64, StoreError> {
    ensure_unowned(&order.trx_id, None, conn).await?;
    let entity_reference = serde_json::to_string(&order.entity_reference)?;
    let entity = serde_json::to_string(&order.entity)?;
    let info = serde_json::to_string(&order.additional_order_information)?;
    let id = sqlx::query_scalar::<_, i64>(
        r#"
            INSERT INTO orders (
                latest_trx_id,
                loan_guid,
                entity_reference,
                entity,
                product_id,
                additional_order_information
            ) VALUES (?, ?, ?, ?, ?, ?)
            RETURNING id;
        "#,
    )
    .bind(&order.trx_id)
    .bind(&order.loan_guid)
    .bind(entity_reference)
    .bind(entity)
    .bind(order.product_id)
    .bind(info)
    .fetch_one(&mut *conn)
    .await?;
    link_transaction(id, &order.trx_id, conn).await?;
    insert_notification(id, &order.notification, order.event_id.as_deref(), conn).await?;
    debug!("🗃️ Order #{id} created for transaction {} (loan {})", order.trx_id, order.loan_guid);
    Ok(id)
}

/// Appends the transaction and notification to the order and replaces its per-transaction fields.
pub async fn append_transaction(
    order_id: i64,
    update: OrderUpdate,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    ensure_unowned(&update.trx_id, Some(order_id), conn).await?;
    let entity = serde_json::to_string(&update.entity)?;
    let info = serde_json::to_string(&update.additional_order_information)?;
    let result = sqlx::query(
        r#"
            UPDATE orders SET
                latest_trx_id = ?,
                product_id = ?,
                additional_order_information = ?,
                entity = ?
            WHERE id = ?
        "#,
    )
    .bind(&update.trx_id)
    .bind(update.product_id)
    .bind(info)
    .bind(entity)
    .bind(order_id)
    .execute(&mut *conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::OrderNotFound(order_id));
    }
    link_transaction(order_id, &update.trx_id, conn).await?;
    insert_notification(order_id, &update.notification, update.event_id.as_deref(), conn).await?;
    touch_order(order_id, conn).await?;
    debug!("🗃️ Transaction {} appended to order #{order_id}", update.trx_id);
    Ok(())
}

/// Appends a notification to the audit trail and bumps the order version.
pub async fn append_notification(
    order_id: i64,
    notification: &Value,
    event_id: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    touch_order(order_id, conn).await?;
    insert_notification(order_id, notification, event_id, conn).await
}

pub async fn update_order_status(
    order_id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<(), StoreError> {
    let status = status.to_string();
    let result = sqlx::query(
        "UPDATE orders SET status = ?, version = version + 1, updated_at = CURRENT_TIMESTAMP WHERE id = ?",
    )
    .bind(&status)
    .bind(order_id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(StoreError::OrderNotFound(order_id));
    }
    debug!("🗃️ Order #{order_id} is now {status}");
    Ok(())
}
