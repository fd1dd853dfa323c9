use std::path::Path;

use epc_tools::{
    data_objects::{DownloadedResource, LocalFile, TransactionResponse, UploadReport},
    PartnerConnectError,
    PartnerPlatform,
};
use mockall::mock;
use serde_json::Value;

mock! {
    pub Platform {}
    impl PartnerPlatform for Platform {
        async fn get_origin(&self, origin_id: &str, pat: &str) -> Result<Value, PartnerConnectError>;
        async fn get_transaction(&self, resource_ref: &str) -> Result<Value, PartnerConnectError>;
        async fn get_event(&self, resource_ref: &str) -> Result<Value, PartnerConnectError>;
        async fn download_resources(&self, trx_id: &str, target_dir: &Path) -> Result<Vec<DownloadedResource>, PartnerConnectError>;
        async fn patch_status(&self, trx_id: &str, response: &TransactionResponse) -> Result<(), PartnerConnectError>;
        async fn upload_resource_files(&self, trx_id: &str, files: &[LocalFile]) -> Result<UploadReport, PartnerConnectError>;
    }
}
