//! Response Reporter
//!
//! Turns the outcome of a unit of order work into exactly one `PATCH /transactions/{id}/response` call. The mapping
//! from outcome to platform status and partner-side order status is fixed by [`ReportOutcome::statuses`].
//!
//! A `Completed` report carries two optional attachments, both looked up in the order's working directory:
//! * every file in `{orders_dir}/{order_id}/response/files` is uploaded and attached (best-effort: files that fail to
//!   upload are logged and left off the report),
//! * `{orders_dir}/{order_id}/response/loan.json` is attached as the loan data.
//!
//! Missing attachments degrade the report. A loan file that exists but does not parse aborts the report.
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use epc_tools::{
    data_objects::{ResourceDescriptor, RespondingParty, TransactionResponse, TransactionStatus},
    helpers::local_files_in,
    PartnerConnectError,
    PartnerPlatform,
};
use log::*;
use partner_adapter_engine::db_types::OrderStatusType;
use serde_json::Value;
use thiserror::Error;

pub const RESPONSE_FILES_DIR: &str = "response/files";
pub const RESPONSE_LOAN_FILE: &str = "response/loan.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportOutcome {
    /// The order was created or updated. The reference is the order id.
    Acknowledged { reference: String },
    Completed { reference: String },
    InputRequired { reference: String, missing_fields: Vec<String> },
    /// Something failed after ownership of the transaction was taken. There may not be an order to refer to.
    Failed { code: u16, description: String, reference: Option<String> },
    Canceled { reference: String },
}

impl ReportOutcome {
    pub fn failed<S: Into<String>>(code: u16, description: S, reference: Option<String>) -> Self {
        Self::Failed { code, description: description.into(), reference }
    }

    /// The platform transaction status and the partner-side order status for this outcome.
    pub fn statuses(&self) -> (TransactionStatus, OrderStatusType) {
        match self {
            Self::Acknowledged { .. } => (TransactionStatus::Processing, OrderStatusType::Acknowledged),
            Self::Completed { .. } => (TransactionStatus::Completed, OrderStatusType::Completed),
            Self::InputRequired { .. } => (TransactionStatus::InputRequired, OrderStatusType::DataNeeded),
            Self::Failed { .. } => (TransactionStatus::Failed, OrderStatusType::Error),
            Self::Canceled { .. } => (TransactionStatus::Canceled, OrderStatusType::Canceled),
        }
    }

    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Acknowledged { reference } |
            Self::Completed { reference } |
            Self::InputRequired { reference, .. } |
            Self::Canceled { reference } => Some(reference),
            Self::Failed { reference, .. } => reference.as_deref(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("The status report could not be delivered. {0}")]
    Platform(#[from] PartnerConnectError),
    #[error("The loan file {path} could not be parsed. {reason}")]
    LoanFile { path: PathBuf, reason: String },
}

pub struct ResponseReporter<P> {
    platform: Arc<P>,
    responding_party: RespondingParty,
    orders_dir: PathBuf,
    loan_format: String,
}

impl<P> std::fmt::Debug for ResponseReporter<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ResponseReporter({})", self.orders_dir.display())
    }
}

impl<P> ResponseReporter<P> {
    pub fn new<S: Into<String>>(
        platform: Arc<P>,
        responding_party: RespondingParty,
        orders_dir: PathBuf,
        loan_format: S,
    ) -> Self {
        Self { platform, responding_party, orders_dir, loan_format: loan_format.into() }
    }

    /// The working directory of an order.
    pub fn order_dir(&self, reference: &str) -> PathBuf {
        self.orders_dir.join(reference)
    }
}

impl<P> ResponseReporter<P>
where P: PartnerPlatform
{
    /// Sends the report for `outcome` against transaction `trx_id` and returns the body that was sent.
    ///
    /// Only an HTTP 204 from the platform counts as delivery.
    pub async fn report(&self, trx_id: &str, outcome: &ReportOutcome) -> Result<TransactionResponse, ReportError> {
        let (status, order_status) = outcome.statuses();
        let mut response = TransactionResponse::new(status, order_status, self.responding_party.clone())
            .with_reference_number(outcome.reference().map(String::from));
        match outcome {
            ReportOutcome::Completed { reference } => {
                response = self.attach_completion_data(trx_id, reference, response).await?;
            },
            ReportOutcome::InputRequired { missing_fields, .. } => {
                response = response.with_input_required(missing_fields.clone());
            },
            ReportOutcome::Failed { code, description, .. } => {
                response = response.with_error(*code, description.as_str());
            },
            ReportOutcome::Acknowledged { .. } | ReportOutcome::Canceled { .. } => {},
        }
        self.platform.patch_status(trx_id, &response).await?;
        info!("📤️ Transaction {trx_id} reported as {status} ({order_status})");
        Ok(response)
    }

    async fn attach_completion_data(
        &self,
        trx_id: &str,
        reference: &str,
        response: TransactionResponse,
    ) -> Result<TransactionResponse, ReportError> {
        let order_dir = self.order_dir(reference);
        if !is_dir(&order_dir).await {
            warn!("📤️ Order {reference} has no working directory at {}. Completing without attachments.", order_dir.display());
            return Ok(response);
        }
        let resources = self.upload_response_files(trx_id, &order_dir.join(RESPONSE_FILES_DIR)).await;
        let response = response.with_resources(resources);
        match read_loan_file(&order_dir.join(RESPONSE_LOAN_FILE)).await? {
            Some(loan) => Ok(response.with_loan(&self.loan_format, loan)),
            None => Ok(response),
        }
    }

    async fn upload_response_files(&self, trx_id: &str, dir: &Path) -> Vec<ResourceDescriptor> {
        if !is_dir(dir).await {
            debug!("📤️ No response files at {}", dir.display());
            return Vec::new();
        }
        let files = match local_files_in(dir) {
            Ok(files) => files,
            Err(e) => {
                warn!("📤️ Could not list response files in {}. {e}", dir.display());
                return Vec::new();
            },
        };
        if files.is_empty() {
            return Vec::new();
        }
        match self.platform.upload_resource_files(trx_id, &files).await {
            Ok(report) => {
                for (file, reason) in &report.failed {
                    warn!("📤️ Response file {} was not attached to {trx_id}. {reason}", file.name);
                }
                report.uploaded
            },
            Err(e) => {
                warn!("📤️ Could not upload response files for {trx_id}. Completing without them. {e}");
                Vec::new()
            },
        }
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

/// `Ok(None)` if the loan file cannot be read. `Err` if it can be read but is not valid JSON.
async fn read_loan_file(path: &Path) -> Result<Option<Value>, ReportError> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(s) => s,
        Err(e) => {
            debug!("📤️ No loan data attached. {} is not readable. {e}", path.display());
            return Ok(None);
        },
    };
    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|e| ReportError::LoanFile { path: path.to_path_buf(), reason: e.to_string() })
}
