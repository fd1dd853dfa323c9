//! Typed view of a platform transaction.
//!
//! The platform client returns raw JSON. Once ownership of a transaction has been taken, it is converted into a
//! [`Transaction`] so that the reconciliation engine never has to poke around in untyped values.
use pa_common::Secret;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    #[serde(default)]
    pub entity_ref: EntityRef,
    pub request: TransactionRequest,
}

/// Opaque reference to the loan the transaction concerns.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityRef {
    #[serde(default)]
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransactionRequest {
    #[serde(rename = "type")]
    pub request_type: RequestType,
    #[serde(default)]
    pub options: RequestOptions,
    #[serde(default)]
    pub loan: Option<Value>,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum RequestType {
    #[serde(rename = "NEW_REQUEST")]
    NewRequest,
    #[serde(rename = "EXISTING_REQUEST")]
    ExistingRequest,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestOptions {
    #[serde(default)]
    pub product_code: Option<String>,
    /// Only present when the request type is `EXISTING_REQUEST`.
    #[serde(default)]
    pub prior_req_id: Option<String>,
    #[serde(default)]
    pub rush: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<Secret<String>>,
}

impl Credentials {
    /// Returns the username and password if both are present and non-empty.
    pub fn pair(&self) -> Option<(&str, &Secret<String>)> {
        let username = self.username.as_deref().filter(|u| !u.is_empty())?;
        let password = self.password.as_ref().filter(|p| !p.reveal().is_empty())?;
        Some((username, password))
    }
}

impl Transaction {
    /// Order metadata carried per transaction.
    pub fn additional_order_information(&self) -> Value {
        serde_json::json!({ "rush": self.request.options.rush })
    }

    /// The entity snapshot to store on the order. Absent loan data is stored as an empty object.
    pub fn entity(&self) -> Value {
        match &self.request.loan {
            Some(v) if !v.is_null() => v.clone(),
            _ => Value::Object(Map::new()),
        }
    }

    pub fn entity_reference(&self) -> Value {
        serde_json::to_value(&self.entity_ref).unwrap_or_else(|_| Value::Object(Map::new()))
    }

    pub fn loan_guid(&self) -> Result<&str, EntityReferenceError> {
        loan_guid_from_entity_id(&self.entity_ref.entity_id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("'{0}' is not a valid entity reference. Expected at least 6 colon-delimited fields")]
pub struct EntityReferenceError(pub String);

/// The entity reference is colon-delimited; the 6th field (index 5) is the loan identifier.
pub fn loan_guid_from_entity_id(entity_id: &str) -> Result<&str, EntityReferenceError> {
    entity_id
        .split(':')
        .nth(5)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EntityReferenceError(entity_id.to_string()))
}
