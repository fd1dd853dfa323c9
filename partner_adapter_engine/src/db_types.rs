use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use log::error;
use pa_common::Secret;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{FromRow, Type};
use thiserror::Error;

//--------------------------------------   OrderStatusType     ---------------------------------------------------------
/// The partner-side status of an order. This mirrors, but is distinct from, the platform's transaction status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order has been stored, but nothing has been reported to the platform yet.
    Created,
    /// The platform has been told that the order is being processed.
    Acknowledged,
    /// The partner is waiting on additional data from the lender.
    DataNeeded,
    /// The order has been fulfilled.
    Completed,
    /// Processing failed and the failure was reported.
    Error,
    /// The order was cancelled.
    Canceled,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::Created => write!(f, "Created"),
            OrderStatusType::Acknowledged => write!(f, "Acknowledged"),
            OrderStatusType::DataNeeded => write!(f, "DataNeeded"),
            OrderStatusType::Completed => write!(f, "Completed"),
            OrderStatusType::Error => write!(f, "Error"),
            OrderStatusType::Canceled => write!(f, "Canceled"),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to Error");
            OrderStatusType::Error
        })
    }
}

#[derive(Debug, Clone, Error)]
#[error("Invalid order status: {0}")]
pub struct ConversionError(String);

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Created" => Ok(Self::Created),
            "Acknowledged" => Ok(Self::Acknowledged),
            "DataNeeded" => Ok(Self::DataNeeded),
            "Completed" => Ok(Self::Completed),
            "Error" => Ok(Self::Error),
            "Canceled" => Ok(Self::Canceled),
            s => Err(ConversionError(s.to_string())),
        }
    }
}

//--------------------------------------        Product        ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    #[serde(rename = "_id")]
    pub id: i64,
    pub product_name: String,
    /// Natural lookup key used by incoming transactions.
    pub product_code: String,
}

//--------------------------------------         Order         ---------------------------------------------------------
/// The central persisted entity: one order per chain of platform transactions.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(rename = "_id")]
    pub id: i64,
    pub status: OrderStatusType,
    /// Always the last element of `trx_ids`.
    pub latest_trx_id: String,
    /// Every transaction id linked to this order, in receipt order.
    pub trx_ids: Vec<String>,
    pub loan_guid: String,
    pub entity_reference: Value,
    pub entity: Value,
    pub product: Product,
    pub additional_order_information: Value,
    /// Raw notification payloads, in receipt order.
    pub notifs: Vec<Value>,
    /// Incremented by every mutation.
    pub version: i64,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Order {
    pub fn contains_trx_id(&self, trx_id: &str) -> bool {
        self.trx_ids.iter().any(|t| t == trx_id)
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Order #{} [{}] loan {} ({} transactions, latest {})",
            self.id,
            self.status,
            self.loan_guid,
            self.trx_ids.len(),
            self.latest_trx_id
        )
    }
}

/// Everything needed to open a new order for a new transaction chain.
#[derive(Debug, Clone, PartialEq)]
pub struct NewOrder {
    pub trx_id: String,
    pub loan_guid: String,
    pub entity_reference: Value,
    pub entity: Value,
    pub product_id: i64,
    pub additional_order_information: Value,
    pub notification: Value,
    pub event_id: Option<String>,
}

/// Links another transaction to an existing order.
///
/// The transaction id and the notification are appended; product, order information and entity are replaced.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderUpdate {
    pub trx_id: String,
    pub product_id: i64,
    pub additional_order_information: Value,
    pub entity: Value,
    pub notification: Value,
    pub event_id: Option<String>,
}

//--------------------------------------          User         ---------------------------------------------------------
/// A partner user, matched against the credentials embedded in transactions and origins.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[serde(rename = "_id")]
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: Secret<String>,
    pub token: Option<String>,
    pub token_created: Option<DateTime<Utc>>,
}
