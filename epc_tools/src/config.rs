use std::{env, time::Duration};

use log::*;
use pa_common::{parse_env_number, Secret};

pub const DEFAULT_API_URL: &str = "https://api.elliemae.com";
pub const DEFAULT_USER_AGENT: &str = "EllieMae Integrations Team EPC Example in Rust";
pub const DEFAULT_SCOPE: &str = "pc pcapi";
pub const DEFAULT_LOAN_FORMAT: &str = "application/vnd.plm-2.0.0+json";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_MAX_RETRIES: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 250;
const DEFAULT_MAX_TRANSFER_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct PartnerConnectConfig {
    /// Base URL of the platform API, without a trailing slash. e.g. "https://api.elliemae.com"
    pub api_url: String,
    pub client_id: String,
    pub client_secret: Secret<String>,
    pub scope: String,
    pub user_agent: String,
    /// Applied to every outbound request, including file transfers.
    pub timeout: Duration,
    /// Number of additional attempts after a transport failure or a 5xx response.
    pub max_retries: u32,
    pub retry_base_delay: Duration,
    pub max_download_bytes: u64,
    pub max_upload_bytes: u64,
}

impl Default for PartnerConnectConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            client_id: String::default(),
            client_secret: Secret::default(),
            scope: DEFAULT_SCOPE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_download_bytes: DEFAULT_MAX_TRANSFER_BYTES,
            max_upload_bytes: DEFAULT_MAX_TRANSFER_BYTES,
        }
    }
}

impl PartnerConnectConfig {
    pub fn new_from_env_or_default() -> Self {
        let api_url = env::var("PA_EPC_API_URL")
            .map(|s| s.trim_end_matches('/').to_string())
            .unwrap_or_else(|_| {
                warn!("PA_EPC_API_URL not set, using {DEFAULT_API_URL} as default");
                DEFAULT_API_URL.to_string()
            });
        let client_id = env::var("PA_EPC_CLIENT_ID").unwrap_or_else(|_| {
            warn!("PA_EPC_CLIENT_ID not set, using (probably useless) default");
            "<<TBD>>".to_string()
        });
        let client_secret = Secret::new(env::var("PA_EPC_CLIENT_SECRET").unwrap_or_else(|_| {
            warn!("PA_EPC_CLIENT_SECRET not set, using (probably useless) default");
            "<<UPDATE_HERE>>".to_string()
        }));
        let user_agent = env::var("PA_EPC_USER_AGENT").unwrap_or_else(|_| DEFAULT_USER_AGENT.to_string());
        let timeout_secs = number_from_env("PA_EPC_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS);
        let max_retries = number_from_env("PA_EPC_MAX_RETRIES", DEFAULT_MAX_RETRIES);
        let max_download_bytes = number_from_env("PA_EPC_MAX_DOWNLOAD_BYTES", DEFAULT_MAX_TRANSFER_BYTES);
        let max_upload_bytes = number_from_env("PA_EPC_MAX_UPLOAD_BYTES", DEFAULT_MAX_TRANSFER_BYTES);
        Self {
            api_url,
            client_id,
            client_secret,
            scope: DEFAULT_SCOPE.to_string(),
            user_agent,
            timeout: Duration::from_secs(timeout_secs),
            max_retries,
            retry_base_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            max_download_bytes,
            max_upload_bytes,
        }
    }
}

fn number_from_env<T: std::str::FromStr + std::fmt::Display + Copy>(name: &str, default: T) -> T {
    parse_env_number(env::var(name).ok(), default).unwrap_or_else(|v| {
        error!("🪛️ {v} is not a valid value for {name}. Using the default, {default}, instead.");
        default
    })
}
