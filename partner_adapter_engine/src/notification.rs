//! Notification Validator
//!
//! Webhook notifications arrive as loosely-typed JSON. They are checked and converted into a [`Notification`] exactly
//! once, at the boundary, before any side-effecting work begins. Validation is a pure function of the payload: there is
//! no network or store access here.
use std::{fmt::Display, str::FromStr};

use log::*;
use serde_json::Value;
use thiserror::Error;

pub const TRANSACTION_RESOURCE_TYPE: &str = "urn:elli:epc:transaction";
pub const TRANSACTION_EVENT_RESOURCE_TYPE: &str = "urn:elli:epc:transaction:event";

//--------------------------------------       EventType       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    Created,
    Updated,
}

impl Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventType::Created => write!(f, "created"),
            EventType::Updated => write!(f, "updated"),
        }
    }
}

impl FromStr for EventType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Self::Created),
            "updated" => Ok(Self::Updated),
            _ => Err(()),
        }
    }
}

//--------------------------------------      ResourceType     ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceType {
    Transaction,
    TransactionEvent,
}

impl Display for ResourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceType::Transaction => write!(f, "{TRANSACTION_RESOURCE_TYPE}"),
            ResourceType::TransactionEvent => write!(f, "{TRANSACTION_EVENT_RESOURCE_TYPE}"),
        }
    }
}

impl FromStr for ResourceType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            TRANSACTION_RESOURCE_TYPE => Ok(Self::Transaction),
            TRANSACTION_EVENT_RESOURCE_TYPE => Ok(Self::TransactionEvent),
            _ => Err(()),
        }
    }
}

//--------------------------------------    ValidationError    ---------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("The notification payload is empty")]
    MissingPayload,
    #[error("The notification has no eventType")]
    MissingEventType,
    #[error("The notification has no meta section")]
    MissingMeta,
    #[error("The notification has no meta.resourceType")]
    MissingResourceType,
    #[error("The notification has no meta.resourceId")]
    MissingResourceId,
    #[error("The notification has no meta.resourceRef")]
    MissingResourceRef,
    #[error("The notification field {0} is neither a string nor a number")]
    NotText(&'static str),
    #[error("Expected a '{expected}' event, but received '{found}'")]
    UnexpectedEventType { expected: EventType, found: String },
    #[error("Expected a '{expected}' resource, but received '{found}'")]
    UnexpectedResourceType { expected: ResourceType, found: String },
}

//--------------------------------------      Notification     ---------------------------------------------------------
/// A validated webhook notification. The raw payload is kept for the order's audit trail.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub event_id: Option<String>,
    pub event_type: EventType,
    pub resource_type: ResourceType,
    /// The transaction (or event) id.
    pub resource_id: String,
    /// Fetchable locator for the full resource.
    pub resource_ref: String,
    raw: Value,
}

impl Notification {
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    pub fn into_raw(self) -> Value {
        self.raw
    }
}

/// The text of a field, if it holds a truthy scalar. Empty strings, zero, `false` and `null` count as absent. Numbers
/// are rendered as text.
fn field_text(v: &Value, key: &'static str) -> Result<Option<String>, ValidationError> {
    match v.get(key) {
        None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(None),
        Some(Value::String(s)) if s.is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(Value::Number(n)) if n.as_f64() == Some(0.0) => Ok(None),
        Some(Value::Number(n)) => Ok(Some(n.to_string())),
        Some(_) => Err(ValidationError::NotText(key)),
    }
}

fn required_text(v: &Value, key: &'static str, missing: ValidationError) -> Result<String, ValidationError> {
    field_text(v, key)?.ok_or(missing)
}

/// Checks the payload against the expected event and resource types and converts it into a [`Notification`].
///
/// Presence checks run before value checks, so a payload missing `meta.resourceRef` is reported as such even if its
/// event type is also wrong.
pub fn parse_notification(
    payload: Option<&Value>,
    expected_event: EventType,
    expected_resource: ResourceType,
) -> Result<Notification, ValidationError> {
    let payload = match payload {
        None | Some(Value::Null) => return Err(ValidationError::MissingPayload),
        Some(Value::Object(m)) if m.is_empty() => return Err(ValidationError::MissingPayload),
        Some(p) => p,
    };
    let event_type = required_text(payload, "eventType", ValidationError::MissingEventType)?;
    let meta = payload.get("meta").filter(|m| m.is_object()).ok_or(ValidationError::MissingMeta)?;
    let resource_type = required_text(meta, "resourceType", ValidationError::MissingResourceType)?;
    let resource_id = required_text(meta, "resourceId", ValidationError::MissingResourceId)?;
    let resource_ref = required_text(meta, "resourceRef", ValidationError::MissingResourceRef)?;
    if event_type != expected_event.to_string() {
        return Err(ValidationError::UnexpectedEventType { expected: expected_event, found: event_type });
    }
    if resource_type != expected_resource.to_string() {
        return Err(ValidationError::UnexpectedResourceType { expected: expected_resource, found: resource_type });
    }
    let event_id = field_text(payload, "eventId").ok().flatten();
    Ok(Notification {
        event_id,
        event_type: expected_event,
        resource_type: expected_resource,
        resource_id,
        resource_ref,
        raw: payload.clone(),
    })
}

/// Accepts a transaction notification of either event type (`created` or `updated`).
pub fn parse_transaction_notification(payload: Option<&Value>) -> Result<Notification, ValidationError> {
    parse_notification(payload, EventType::Created, ResourceType::Transaction).or_else(|e| match e {
        ValidationError::UnexpectedEventType { .. } => {
            parse_notification(payload, EventType::Updated, ResourceType::Transaction)
        },
        e => Err(e),
    })
}

/// `validate(payload, expectedEventType, expectedResourceType) -> bool`. Never panics; rejections are logged with the
/// reason.
pub fn is_valid_notification(payload: Option<&Value>, expected_event: EventType, expected_resource: ResourceType) -> bool {
    match parse_notification(payload, expected_event, expected_resource) {
        Ok(_) => true,
        Err(e) => {
            info!("📨️ Rejecting notification. {e}");
            false
        },
    }
}

/// Extracts the owning transaction id from a resource reference such as
/// `https://host/partner/v2/transactions/{trxId}/events/{eventId}`.
pub fn transaction_id_from_resource_ref(resource_ref: &str) -> Option<&str> {
    let (_, tail) = resource_ref.split_once("/transactions/")?;
    tail.split(['/', '?', '#']).next().filter(|s| !s.is_empty())
}
