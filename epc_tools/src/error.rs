use thiserror::Error;

#[derive(Debug, Error)]
pub enum PartnerConnectError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not obtain an access token. Error {status}. {body}")]
    UpstreamAuthError { status: u16, body: String },
    #[error("Partner Connect call failed. Error {status}. {body}")]
    UpstreamError { status: u16, body: String },
    #[error("Could not reach Partner Connect: {0}")]
    TransportError(String),
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Local file error: {0}")]
    IoError(String),
    #[error("Resource {name} exceeds the {limit} byte limit")]
    DownloadTooLarge { name: String, limit: u64 },
}

impl PartnerConnectError {
    /// Transport failures and 5xx responses are worth another attempt. Everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::TransportError(_) => true,
            Self::UpstreamError { status, .. } | Self::UpstreamAuthError { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// The upstream HTTP status, if the platform answered at all.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            Self::UpstreamError { status, .. } | Self::UpstreamAuthError { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for PartnerConnectError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::TransportError(e.to_string())
        }
    }
}

impl From<std::io::Error> for PartnerConnectError {
    fn from(e: std::io::Error) -> Self {
        Self::IoError(e.to_string())
    }
}
