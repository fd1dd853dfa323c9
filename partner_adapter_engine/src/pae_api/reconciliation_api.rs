//! Order Reconciliation Engine
//!
//! Correlates validated notifications and their fetched transactions with stored orders. A `created` notification for a
//! `NEW_REQUEST` opens a new order; a chained `created` notification (`EXISTING_REQUEST`) or an `updated` notification
//! extends the order that already owns the referenced transaction.
//!
//! All work for one loan is serialized through a shared [`KeyedLocks`] table, so two notifications for the same chain
//! never interleave their lookups and appends.
use std::fmt::Debug;

use log::*;

use crate::{
    db_types::{NewOrder, Order, OrderStatusType, OrderUpdate, Product},
    helpers::KeyedLocks,
    notification::{transaction_id_from_resource_ref, EventType, Notification, ResourceType, ValidationError},
    pae_api::errors::ReconciliationError,
    traits::PartnerAdapterDatabase,
    transaction::{RequestType, Transaction},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconciliationKind {
    /// A new order was opened.
    Created,
    /// The transaction or notification was appended to an existing order.
    Appended,
    /// The notification had already been applied. Nothing was changed.
    Replayed,
}

#[derive(Debug, Clone)]
pub struct ReconciliationOutcome {
    pub order: Order,
    pub kind: ReconciliationKind,
}

impl ReconciliationOutcome {
    fn new(order: Order, kind: ReconciliationKind) -> Self {
        Self { order, kind }
    }
}

pub struct ReconciliationApi<B> {
    db: B,
    locks: KeyedLocks,
}

impl<B> Debug for ReconciliationApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ReconciliationApi ({} active locks)", self.locks.active_keys())
    }
}

impl<B> ReconciliationApi<B> {
    /// Every `ReconciliationApi` that shares a store must also share the same `locks` table.
    pub fn new(db: B, locks: KeyedLocks) -> Self {
        Self { db, locks }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> ReconciliationApi<B>
where B: PartnerAdapterDatabase
{
    /// Handles a `created` transaction notification.
    ///
    /// The product is checked first, so an unknown product never creates or mutates an order. A `NEW_REQUEST` opens a
    /// new order keyed on the loan guid in the transaction's entity reference. An `EXISTING_REQUEST` is appended to the
    /// order whose transaction chain contains `priorReqId`.
    ///
    /// Re-delivering a transaction that is already linked is a no-op and returns the existing order.
    pub async fn process_create_notification(
        &self,
        notification: &Notification,
        transaction: &Transaction,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        expect_kind(notification, EventType::Created, ResourceType::Transaction)?;
        let _guard = self.locks.lock(&lock_key(transaction, &transaction.id)).await;
        let product = self.product_for(transaction).await?;
        match transaction.request.request_type {
            RequestType::NewRequest => self.open_order(notification, transaction, product).await,
            RequestType::ExistingRequest => {
                let prior = transaction
                    .request
                    .options
                    .prior_req_id
                    .as_deref()
                    .filter(|s| !s.is_empty())
                    .ok_or(ReconciliationError::MissingPriorTransaction)?;
                let order = self
                    .db
                    .fetch_order_by_trx_id(prior)
                    .await?
                    .ok_or_else(|| ReconciliationError::OrderNotFound(prior.to_string()))?;
                if order.contains_trx_id(&transaction.id) {
                    info!("🔄️ Transaction {} is already linked to order #{}. Ignoring replay.", transaction.id, order.id);
                    return Ok(ReconciliationOutcome::new(order, ReconciliationKind::Replayed));
                }
                self.append(order, notification, transaction, product).await
            },
        }
    }

    /// Handles an `updated` transaction notification. The updated transaction must already belong to an order.
    ///
    /// Re-delivery of a notification with an `eventId` that is already on the order is a no-op.
    pub async fn process_update_notification(
        &self,
        notification: &Notification,
        transaction: &Transaction,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        expect_kind(notification, EventType::Updated, ResourceType::Transaction)?;
        let _guard = self.locks.lock(&lock_key(transaction, &notification.resource_id)).await;
        let product = self.product_for(transaction).await?;
        let order = self
            .db
            .fetch_order_by_trx_id(&notification.resource_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(notification.resource_id.clone()))?;
        if self.already_seen(&order, notification).await? {
            return Ok(ReconciliationOutcome::new(order, ReconciliationKind::Replayed));
        }
        self.append(order, notification, transaction, product).await
    }

    /// Dispatches a transaction notification to the create or update flow according to its event type.
    pub async fn process_transaction_notification(
        &self,
        notification: &Notification,
        transaction: &Transaction,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        match notification.event_type {
            EventType::Created => self.process_create_notification(notification, transaction).await,
            EventType::Updated => self.process_update_notification(notification, transaction).await,
        }
    }

    /// Records an event notification in the audit trail of the order that owns the event's transaction. The transaction
    /// chain is not changed.
    pub async fn process_event_notification(
        &self,
        notification: &Notification,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        expect_kind(notification, EventType::Created, ResourceType::TransactionEvent)?;
        let trx_id = transaction_id_from_resource_ref(&notification.resource_ref)
            .ok_or_else(|| ReconciliationError::OrderNotFound(notification.resource_ref.clone()))?;
        let order = self
            .db
            .fetch_order_by_trx_id(trx_id)
            .await?
            .ok_or_else(|| ReconciliationError::OrderNotFound(trx_id.to_string()))?;
        let _guard = self.locks.lock(&order.loan_guid).await;
        if self.already_seen(&order, notification).await? {
            return Ok(ReconciliationOutcome::new(order, ReconciliationKind::Replayed));
        }
        let order = self.db.append_notification(order.id, notification.raw(), notification.event_id.as_deref()).await?;
        debug!("🔄️ Event {} recorded against order #{}", notification.resource_id, order.id);
        Ok(ReconciliationOutcome::new(order, ReconciliationKind::Appended))
    }

    /// Sets the partner-side status of the order after a status report.
    pub async fn record_status(&self, order_id: i64, status: OrderStatusType) -> Result<Order, ReconciliationError> {
        let order = self.db.update_order_status(order_id, status).await?;
        Ok(order)
    }

    async fn product_for(&self, transaction: &Transaction) -> Result<Product, ReconciliationError> {
        let code = transaction.request.options.product_code.as_deref().unwrap_or_default();
        match self.db.fetch_product_by_code(code).await? {
            Some(p) => Ok(p),
            None => {
                warn!("🔄️ Transaction {} requests unknown product '{code}'", transaction.id);
                Err(ReconciliationError::InvalidProduct(code.to_string()))
            },
        }
    }

    async fn already_seen(&self, order: &Order, notification: &Notification) -> Result<bool, ReconciliationError> {
        let Some(event_id) = notification.event_id.as_deref() else {
            return Ok(false);
        };
        let seen = self.db.order_has_event(order.id, event_id).await?;
        if seen {
            info!("🔄️ Event {event_id} has already been applied to order #{}. Ignoring replay.", order.id);
        }
        Ok(seen)
    }

    async fn open_order(
        &self,
        notification: &Notification,
        transaction: &Transaction,
        product: Product,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        if let Some(order) = self.db.fetch_order_by_trx_id(&transaction.id).await? {
            info!("🔄️ Transaction {} already opened order #{}. Ignoring replay.", transaction.id, order.id);
            return Ok(ReconciliationOutcome::new(order, ReconciliationKind::Replayed));
        }
        let loan_guid = transaction.loan_guid()?;
        let new_order = NewOrder {
            trx_id: transaction.id.clone(),
            loan_guid: loan_guid.to_string(),
            entity_reference: transaction.entity_reference(),
            entity: transaction.entity(),
            product_id: product.id,
            additional_order_information: transaction.additional_order_information(),
            notification: notification.raw().clone(),
            event_id: notification.event_id.clone(),
        };
        let order = self.db.insert_order(new_order).await?;
        info!("🔄️ New order #{} opened for loan {loan_guid} ({})", order.id, product.product_code);
        Ok(ReconciliationOutcome::new(order, ReconciliationKind::Created))
    }

    async fn append(
        &self,
        order: Order,
        notification: &Notification,
        transaction: &Transaction,
        product: Product,
    ) -> Result<ReconciliationOutcome, ReconciliationError> {
        let update = OrderUpdate {
            trx_id: transaction.id.clone(),
            product_id: product.id,
            additional_order_information: transaction.additional_order_information(),
            entity: transaction.entity(),
            notification: notification.raw().clone(),
            event_id: notification.event_id.clone(),
        };
        let order = self.db.append_transaction(order.id, update).await?;
        info!("🔄️ Transaction {} appended to order #{} ({} links)", transaction.id, order.id, order.trx_ids.len());
        Ok(ReconciliationOutcome::new(order, ReconciliationKind::Appended))
    }
}

fn expect_kind(
    notification: &Notification,
    event_type: EventType,
    resource_type: ResourceType,
) -> Result<(), ValidationError> {
    if notification.event_type != event_type {
        return Err(ValidationError::UnexpectedEventType {
            expected: event_type,
            found: notification.event_type.to_string(),
        });
    }
    if notification.resource_type != resource_type {
        return Err(ValidationError::UnexpectedResourceType {
            expected: resource_type,
            found: notification.resource_type.to_string(),
        });
    }
    Ok(())
}

/// Work is serialized per loan. Transactions whose entity reference cannot be parsed fall back to `fallback`.
fn lock_key(transaction: &Transaction, fallback: &str) -> String {
    match transaction.loan_guid() {
        Ok(guid) => guid.to_string(),
        Err(_) => format!("trx:{fallback}"),
    }
}
