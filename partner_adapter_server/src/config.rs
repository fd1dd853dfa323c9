use std::{env, path::PathBuf};

use chrono::Duration;
use epc_tools::{data_objects::RespondingParty, PartnerConnectConfig};
use log::*;
use pa_common::{parse_boolean_flag, parse_env_number};

const DEFAULT_PA_HOST: &str = "127.0.0.1";
const DEFAULT_PA_PORT: u16 = 8181;
const DEFAULT_DATABASE_URL: &str = "sqlite://data/partner_adapter.db";
const DEFAULT_ORDERS_DIR: &str = "data/orders";
const DEFAULT_TOKEN_LIFETIME_SECS: i64 = 3600;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    /// Root of the per-order working directories. Order `n` works in `{orders_dir}/{n}`.
    pub orders_dir: PathBuf,
    /// If true, request resources are downloaded into the order's working directory once the request is acknowledged.
    pub download_request_files: bool,
    /// How long a UI session token stays valid after it was issued.
    pub token_lifetime: Duration,
    pub epc: PartnerConnectConfig,
    /// Identifies the partner in every status report.
    pub responding_party: RespondingParty,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_PA_HOST.to_string(),
            port: DEFAULT_PA_PORT,
            database_url: DEFAULT_DATABASE_URL.to_string(),
            orders_dir: PathBuf::from(DEFAULT_ORDERS_DIR),
            download_request_files: true,
            token_lifetime: Duration::seconds(DEFAULT_TOKEN_LIFETIME_SECS),
            epc: PartnerConnectConfig::default(),
            responding_party: RespondingParty::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let host = env::var("PA_HOST").ok().unwrap_or_else(|| DEFAULT_PA_HOST.into());
        let port = parse_env_number(env::var("PA_PORT").ok(), DEFAULT_PA_PORT).unwrap_or_else(|s| {
            error!("🪛️ {s} is not a valid port for PA_PORT. Using the default, {DEFAULT_PA_PORT}, instead.");
            DEFAULT_PA_PORT
        });
        let database_url = env::var("PA_DATABASE_URL").ok().unwrap_or_else(|| {
            warn!("🪛️ PA_DATABASE_URL is not set. Using {DEFAULT_DATABASE_URL}.");
            DEFAULT_DATABASE_URL.to_string()
        });
        let orders_dir = env::var("PA_ORDERS_DIR").map(PathBuf::from).unwrap_or_else(|_| {
            warn!("🪛️ PA_ORDERS_DIR is not set. Order files will be kept in {DEFAULT_ORDERS_DIR}.");
            PathBuf::from(DEFAULT_ORDERS_DIR)
        });
        let download_request_files = parse_boolean_flag(env::var("PA_DOWNLOAD_REQUEST_FILES").ok(), true);
        let lifetime = parse_env_number(env::var("PA_TOKEN_LIFETIME_SECS").ok(), DEFAULT_TOKEN_LIFETIME_SECS)
            .unwrap_or_else(|s| {
                error!(
                    "🪛️ {s} is not a valid value for PA_TOKEN_LIFETIME_SECS. Using the default, \
                     {DEFAULT_TOKEN_LIFETIME_SECS}s, instead."
                );
                DEFAULT_TOKEN_LIFETIME_SECS
            });
        let epc = PartnerConnectConfig::new_from_env_or_default();
        let responding_party = responding_party_from_env();
        Self {
            host,
            port,
            database_url,
            orders_dir,
            download_request_files,
            token_lifetime: Duration::seconds(lifetime),
            epc,
            responding_party,
        }
    }
}

fn responding_party_from_env() -> RespondingParty {
    let mut party = RespondingParty::default();
    if let Ok(name) = env::var("PA_RESPONDING_PARTY_NAME") {
        party.name = name;
    }
    if let Ok(email) = env::var("PA_RESPONDING_PARTY_EMAIL") {
        party.point_of_contact.email = email;
    }
    party
}
