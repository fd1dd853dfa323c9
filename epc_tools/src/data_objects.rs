use std::{fmt::Display, path::PathBuf};

use pa_common::Secret;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Response from the OAuth2 client-credentials token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: Secret<String>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// A request resource as listed by `GET /transactions/{id}/request/resources`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteResource {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub url: String,
}

/// A request resource that made it onto the local disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadedResource {
    pub id: String,
    pub name: String,
    pub mime_type: Option<String>,
    pub local_path: PathBuf,
}

/// A local file that is to be attached to a response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub name: String,
    pub mime_type: String,
    pub path: PathBuf,
}

/// `{name, mimeType}` pair sent to `POST /transactions/{id}/response/resources`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRequest {
    pub name: String,
    pub mime_type: String,
}

/// Per-file upload slot returned by the platform in answer to a [`ResourceRequest`] list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSlot {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    pub url: String,
}

/// Descriptor of an uploaded resource, as attached to a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceDescriptor {
    pub id: String,
    pub name: String,
    pub mime_type: String,
}

#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub uploaded: Vec<ResourceDescriptor>,
    /// Files that could not be uploaded, along with the reason.
    pub failed: Vec<(LocalFile, String)>,
}

impl UploadReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

//--------------------------------------   TransactionStatus     -------------------------------------------------------
/// The transaction status values understood by the platform's response protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TransactionStatus {
    Processing,
    Completed,
    InputRequired,
    Failed,
    Canceled,
}

impl Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Processing => write!(f, "processing"),
            TransactionStatus::Completed => write!(f, "completed"),
            TransactionStatus::InputRequired => write!(f, "inputRequired"),
            TransactionStatus::Failed => write!(f, "failed"),
            TransactionStatus::Canceled => write!(f, "canceled"),
        }
    }
}

//--------------------------------------   RespondingParty       -------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondingParty {
    pub name: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub postal_code: String,
    pub point_of_contact: PointOfContact,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointOfContact {
    pub name: String,
    pub role: String,
    pub email: String,
    pub phone: String,
}

impl Default for RespondingParty {
    fn default() -> Self {
        Self {
            name: "Sample Partner".into(),
            address: "3004 S Alaska St".into(),
            city: "Seattle".into(),
            state: "WA".into(),
            postal_code: "98108".into(),
            point_of_contact: PointOfContact {
                name: "Sample Partner Support".into(),
                role: "Account Management".into(),
                email: "acct.mgr@example.com".into(),
                phone: "(206) 555-1234".into(),
            },
        }
    }
}

//--------------------------------------   TransactionResponse   -------------------------------------------------------
/// Body of the `PATCH /transactions/{id}/response` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub status: TransactionStatus,
    pub partner_status: String,
    pub responding_party: RespondingParty,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reference_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub loan: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub input_required: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub resources: Vec<ResourceDescriptor>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ResponseErrorEntry>,
}

impl TransactionResponse {
    pub fn new<S: Display>(status: TransactionStatus, partner_status: S, responding_party: RespondingParty) -> Self {
        Self {
            status,
            partner_status: partner_status.to_string(),
            responding_party,
            reference_number: None,
            loan_format: None,
            loan: None,
            input_required: Vec::new(),
            resources: Vec::new(),
            errors: Vec::new(),
        }
    }

    pub fn with_reference_number(mut self, reference: Option<String>) -> Self {
        self.reference_number = reference;
        self
    }

    pub fn with_loan(mut self, loan_format: &str, loan: Value) -> Self {
        self.loan_format = Some(loan_format.to_string());
        self.loan = Some(loan);
        self
    }

    pub fn with_input_required(mut self, fields: Vec<String>) -> Self {
        self.input_required = fields;
        self
    }

    pub fn with_resources(mut self, resources: Vec<ResourceDescriptor>) -> Self {
        self.resources = resources;
        self
    }

    pub fn with_error<S: Into<String>>(mut self, code: u16, description: S) -> Self {
        self.errors.push(ResponseErrorEntry {
            code,
            error_type: "system".into(),
            description: description.into(),
            resource_id: "TRANSACTION".into(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseErrorEntry {
    pub code: u16,
    #[serde(rename = "type")]
    pub error_type: String,
    pub description: String,
    pub resource_id: String,
}
