use std::fmt::Display;

use partner_adapter_engine::db_types::{Order, Product, User};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The `{code, msg, detail}` body used for every structured reply.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub code: u16,
    pub msg: String,
    pub detail: String,
}

impl Envelope {
    pub fn new<M: Display, D: Display>(code: u16, msg: M, detail: D) -> Self {
        Self { code, msg: msg.to_string(), detail: detail.to_string() }
    }
}

/// Query string of `GET /ui`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UiQuery {
    pub oid: Option<String>,
    pub pat: Option<String>,
    /// The request (transaction) id the UI was opened for, if any.
    pub rid: Option<String>,
}

/// Query string of `GET /progress`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgressQuery {
    pub oid: Option<String>,
    pub pat: Option<String>,
    pub trxid: Option<String>,
}

/// Body of `GET /ui`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UiInfo {
    pub products: Vec<Product>,
    pub order_history: Vec<Order>,
    /// The origin as returned by the platform, with the embedded password masked.
    pub origin: Value,
    pub user: User,
    /// `{}` when no order matches the request id.
    pub selected_order: Value,
}

/// Body of a successful `GET /progress` or `POST /orders/{order_id}/status`.
#[derive(Debug, Clone, Serialize)]
pub struct OrderResponse {
    pub code: u16,
    pub order: Order,
}

impl OrderResponse {
    pub fn ok(order: Order) -> Self {
        Self { code: 200, order }
    }
}

/// Fulfilment actions a partner user can take on an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum FulfilmentAction {
    Complete,
    Cancel,
    InputRequired {
        #[serde(rename = "missingFields", default)]
        missing_fields: Vec<String>,
    },
}
