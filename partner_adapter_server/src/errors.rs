use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use epc_tools::PartnerConnectError;
use partner_adapter_engine::{AuthApiError, StoreError};
use thiserror::Error;

use crate::{data_objects::Envelope, response_reporter::ReportError};

/// Errors returned synchronously to HTTP callers. Every variant is rendered as a `{code, msg, detail}` envelope whose
/// `code` equals the HTTP status.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("{msg}")]
    BadRequest { msg: String, detail: String },
    #[error("{msg}")]
    Unauthorized { msg: String, detail: String },
    #[error("{msg}")]
    NotFound { msg: String, detail: String },
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("{msg}")]
    UpstreamError { msg: String, detail: String },
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
}

impl ServerError {
    pub fn bad_request<S: Into<String>, D: Into<String>>(msg: S, detail: D) -> Self {
        Self::BadRequest { msg: msg.into(), detail: detail.into() }
    }

    pub fn unauthorized<S: Into<String>, D: Into<String>>(msg: S, detail: D) -> Self {
        Self::Unauthorized { msg: msg.into(), detail: detail.into() }
    }

    pub fn not_found<S: Into<String>, D: Into<String>>(msg: S, detail: D) -> Self {
        Self::NotFound { msg: msg.into(), detail: detail.into() }
    }

    pub fn envelope(&self) -> Envelope {
        let code = self.status_code().as_u16();
        match self {
            Self::BadRequest { msg, detail } |
            Self::Unauthorized { msg, detail } |
            Self::NotFound { msg, detail } |
            Self::UpstreamError { msg, detail } => Envelope::new(code, msg, detail.as_str()),
            e => Envelope::new(code, "Internal server error", e.to_string()),
        }
    }
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest { .. } => StatusCode::BAD_REQUEST,
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::UpstreamError { .. } => StatusCode::BAD_GATEWAY,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).insert_header(ContentType::json()).json(self.envelope())
    }
}

impl From<StoreError> for ServerError {
    fn from(e: StoreError) -> Self {
        Self::BackendError(format!("Database error: {e}"))
    }
}

impl From<AuthApiError> for ServerError {
    fn from(e: AuthApiError) -> Self {
        match e {
            AuthApiError::Store(e) => e.into(),
            e => Self::unauthorized("Not authorized to load the Partner UI", e.to_string()),
        }
    }
}

impl From<PartnerConnectError> for ServerError {
    fn from(e: PartnerConnectError) -> Self {
        match e {
            PartnerConnectError::Initialization(s) => Self::InitializeError(s),
            e => Self::UpstreamError { msg: "The Partner Connect call failed".into(), detail: e.to_string() },
        }
    }
}

impl From<ReportError> for ServerError {
    fn from(e: ReportError) -> Self {
        match e {
            ReportError::Platform(e) => e.into(),
            e @ ReportError::LoanFile { .. } => Self::BackendError(e.to_string()),
        }
    }
}
