//! Post-ownership processing of Partner Connect notifications.
//!
//! By the time anything in this module runs, the webhook has already been answered with a 200. Every failure from here
//! on is therefore reported to the platform as a `failed` transaction response, and a report that cannot be delivered
//! is logged at `error` level. When the failing transaction already belongs to an order (or chains onto one through
//! `priorReqId`), the report refers to that order and the order is moved to `Error`.
use std::{path::PathBuf, sync::Arc};

use epc_tools::{PartnerPlatform, DEFAULT_LOAN_FORMAT};
use log::*;
use partner_adapter_engine::{
    db_types::{Order, OrderStatusType},
    helpers::KeyedLocks,
    notification::Notification,
    traits::{OrderManagement, PartnerAdapterDatabase},
    transaction::Transaction,
    AuthApi,
    ReconciliationApi,
    ReconciliationKind,
    ReconciliationOutcome,
};
use serde_json::Value;

use crate::{
    config::ServerConfig,
    data_objects::FulfilmentAction,
    errors::ServerError,
    response_reporter::{ReportOutcome, ResponseReporter},
};

pub struct TransactionWorkflow<B, P> {
    reconciliation: ReconciliationApi<B>,
    auth: AuthApi<B>,
    reporter: ResponseReporter<P>,
    platform: Arc<P>,
    orders_dir: PathBuf,
    download_request_files: bool,
}

impl<B, P> std::fmt::Debug for TransactionWorkflow<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TransactionWorkflow({:?})", self.reconciliation)
    }
}

impl<B: Clone, P> TransactionWorkflow<B, P> {
    /// All workflows that share a database must share `locks` too.
    pub fn new(db: B, locks: KeyedLocks, platform: Arc<P>, config: &ServerConfig) -> Self {
        let reporter = ResponseReporter::new(
            Arc::clone(&platform),
            config.responding_party.clone(),
            config.orders_dir.clone(),
            DEFAULT_LOAN_FORMAT,
        );
        Self {
            reconciliation: ReconciliationApi::new(db.clone(), locks),
            auth: AuthApi::new(db),
            reporter,
            platform,
            orders_dir: config.orders_dir.clone(),
            download_request_files: config.download_request_files,
        }
    }
}

impl<B, P> TransactionWorkflow<B, P>
where
    B: PartnerAdapterDatabase,
    P: PartnerPlatform,
{
    /// Handles a transaction notification whose transaction has been fetched. Returns the order that was created or
    /// updated, or `None` if the transaction was rejected (and reported as such) or was a replay.
    pub async fn process_request(&self, notification: &Notification, transaction: Value) -> Option<Order> {
        let trx_id = notification.resource_id.as_str();
        let prior_req_id = transaction.pointer("/request/options/priorReqId").and_then(Value::as_str).map(String::from);
        let outcome = match self.reconcile_request(notification, transaction).await {
            Ok(outcome) => outcome,
            Err(failure) => {
                let owner = self.owning_order(trx_id, prior_req_id.as_deref()).await;
                self.report_failure(trx_id, failure, owner.as_ref()).await;
                return None;
            },
        };
        let order = outcome.order;
        if outcome.kind == ReconciliationKind::Replayed {
            info!("📨️ Request {trx_id} was already processed for order #{}. Nothing to report.", order.id);
            return None;
        }
        let ack = ReportOutcome::Acknowledged { reference: order.id.to_string() };
        let order = match self.report_and_record(trx_id, &order, &ack).await {
            Ok(order) => order,
            Err(e) => {
                error!("📨️ Could not acknowledge request {trx_id} for order #{}. {e}", order.id);
                order
            },
        };
        if self.download_request_files {
            self.download_request_resources(&order, trx_id).await;
        }
        Some(order)
    }

    /// Records a fetched event notification against the order that owns its transaction. Events for unknown orders are
    /// logged and dropped.
    pub async fn process_event(&self, notification: &Notification) -> Option<Order> {
        match self.reconciliation.process_event_notification(notification).await {
            Ok(ReconciliationOutcome { order, kind: ReconciliationKind::Replayed }) => {
                debug!("📨️ Event {} is a replay for order #{}", notification.resource_id, order.id);
                Some(order)
            },
            Ok(ReconciliationOutcome { order, .. }) => {
                info!("📨️ Event {} added to the history of order #{}", notification.resource_id, order.id);
                Some(order)
            },
            Err(e) => {
                warn!("📨️ Event {} could not be recorded. {e}", notification.resource_id);
                None
            },
        }
    }

    /// Reports a fulfilment action for `order` against its latest transaction and updates the order status.
    pub async fn fulfil(&self, order: &Order, action: FulfilmentAction) -> Result<Order, ServerError> {
        let reference = order.id.to_string();
        let outcome = match action {
            FulfilmentAction::Complete => ReportOutcome::Completed { reference },
            FulfilmentAction::Cancel => ReportOutcome::Canceled { reference },
            FulfilmentAction::InputRequired { missing_fields } => {
                ReportOutcome::InputRequired { reference, missing_fields }
            },
        };
        self.report_and_record(&order.latest_trx_id, order, &outcome).await
    }

    async fn reconcile_request(
        &self,
        notification: &Notification,
        transaction: Value,
    ) -> Result<ReconciliationOutcome, ReportOutcome> {
        let trx_id = notification.resource_id.as_str();
        if is_empty_value(&transaction) {
            let msg = format!("Trying to download request '{trx_id}' resulted in an empty object.");
            return Err(ReportOutcome::failed(401, msg, None));
        }
        let transaction = serde_json::from_value::<Transaction>(transaction).map_err(|e| {
            ReportOutcome::failed(400, format!("Request '{trx_id}' could not be read. {e}"), None)
        })?;
        let credentials = transaction.request.credentials.as_ref().and_then(|c| c.pair());
        let Some((username, password)) = credentials else {
            let msg = format!("Request '{trx_id}' is missing the credential information.");
            return Err(ReportOutcome::failed(401, msg, None));
        };
        self.auth.authenticate(username, password).await.map_err(|e| {
            debug!("📨️ Request {trx_id} failed authentication. {e}");
            ReportOutcome::failed(e.code(), format!("Request '{trx_id}' could not be authenticated. {e}"), None)
        })?;
        self.reconciliation.process_transaction_notification(notification, &transaction).await.map_err(|e| {
            ReportOutcome::failed(e.code(), format!("Request '{trx_id}' could not be processed. {e}"), None)
        })
    }

    /// The order that owns `trx_id`, or failing that, the order that owns `prior_req_id`.
    async fn owning_order(&self, trx_id: &str, prior_req_id: Option<&str>) -> Option<Order> {
        let candidates = std::iter::once(trx_id).chain(prior_req_id.filter(|s| !s.is_empty()));
        for id in candidates {
            match self.reconciliation.db().fetch_order_by_trx_id(id).await {
                Ok(Some(order)) => return Some(order),
                Ok(None) => {},
                Err(e) => warn!("📨️ Could not look up the order for transaction {id}. {e}"),
            }
        }
        None
    }

    async fn report_failure(&self, trx_id: &str, failure: ReportOutcome, owner: Option<&Order>) {
        let failure = match (failure, owner) {
            (ReportOutcome::Failed { code, description, .. }, Some(order)) => {
                ReportOutcome::failed(code, description, Some(order.id.to_string()))
            },
            (failure, _) => failure,
        };
        warn!("📨️ Request {trx_id} failed: {failure:?}");
        if let Err(e) = self.reporter.report(trx_id, &failure).await {
            error!("📨️ Failure of request {trx_id} could not be reported to the platform. {e}");
        }
        if let Some(order) = owner {
            if let Err(e) = self.reconciliation.record_status(order.id, OrderStatusType::Error).await {
                error!("📨️ Order #{} could not be moved to {}. {e}", order.id, OrderStatusType::Error);
            }
        }
    }

    async fn report_and_record(&self, trx_id: &str, order: &Order, outcome: &ReportOutcome) -> Result<Order, ServerError> {
        self.reporter.report(trx_id, outcome).await?;
        let (_, status) = outcome.statuses();
        let order = self.reconciliation.record_status(order.id, status).await.map_err(|e| {
            ServerError::BackendError(format!("Order #{} was reported as {status}, but not updated. {e}", order.id))
        })?;
        Ok(order)
    }

    async fn download_request_resources(&self, order: &Order, trx_id: &str) {
        let dir = self.orders_dir.join(order.id.to_string()).join("request").join(trx_id).join("files");
        if let Err(e) = tokio::fs::create_dir_all(&dir).await {
            warn!("📨️ Could not create {}. Request files for {trx_id} will not be downloaded. {e}", dir.display());
            return;
        }
        match self.platform.download_resources(trx_id, &dir).await {
            Ok(files) => info!("📨️ {} request file(s) of {trx_id} saved to {}", files.len(), dir.display()),
            Err(e) => warn!("📨️ Could not download the request files of {trx_id}. {e}"),
        }
    }
}

fn is_empty_value(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}
