use std::path::Path;

use serde_json::Value;

use crate::{
    data_objects::{DownloadedResource, LocalFile, TransactionResponse, UploadReport},
    PartnerConnectError,
};

/// The calls the partner adapter makes against the Partner Connect platform.
///
/// [`crate::PartnerConnectApi`] is the production implementation. Every call obtains a fresh bearer token immediately
/// before use, so implementations carry no session state.
#[allow(async_fn_in_trait)]
pub trait PartnerPlatform {
    /// Fetches the origin descriptor for a partner UI session. `pat` is the partner access token handed to the UI.
    async fn get_origin(&self, origin_id: &str, pat: &str) -> Result<Value, PartnerConnectError>;

    /// Fetches the full transaction behind a notification's `resourceRef`.
    async fn get_transaction(&self, resource_ref: &str) -> Result<Value, PartnerConnectError>;

    /// Fetches the event behind an event notification's `resourceRef`.
    async fn get_event(&self, resource_ref: &str) -> Result<Value, PartnerConnectError>;

    /// Downloads every request resource of the transaction into `target_dir`.
    ///
    /// Failing to list the resources is an error. Failing to download an individual file is not: the file is logged and
    /// left out of the result.
    async fn download_resources(
        &self,
        trx_id: &str,
        target_dir: &Path,
    ) -> Result<Vec<DownloadedResource>, PartnerConnectError>;

    /// Sends a status report for the transaction. Only an HTTP 204 counts as success.
    async fn patch_status(&self, trx_id: &str, response: &TransactionResponse) -> Result<(), PartnerConnectError>;

    /// Uploads local files as response resources. Every file is attempted; the report lists the ones that failed.
    async fn upload_resource_files(
        &self,
        trx_id: &str,
        files: &[LocalFile],
    ) -> Result<UploadReport, PartnerConnectError>;
}
