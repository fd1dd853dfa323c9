use std::{path::Path, sync::Arc};

use futures_util::StreamExt;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, USER_AGENT},
    multipart::{Form, Part},
    Body,
    Client,
    Response,
    StatusCode,
};
use serde_json::Value;
use tokio::{fs, fs::File, io::AsyncWriteExt};
use tokio_util::io::ReaderStream;

use crate::{
    config::PartnerConnectConfig,
    data_objects::{
        AccessToken,
        DownloadedResource,
        LocalFile,
        RemoteResource,
        ResourceDescriptor,
        ResourceRequest,
        TransactionResponse,
        UploadReport,
        UploadSlot,
    },
    helpers::{resolve_resource_ref, safe_file_name},
    retry::RetryPolicy,
    PartnerConnectError,
    PartnerPlatform,
};

#[derive(Clone)]
pub struct PartnerConnectApi {
    config: PartnerConnectConfig,
    client: Arc<Client>,
    retry: RetryPolicy,
}

impl PartnerConnectApi {
    pub fn new(config: PartnerConnectConfig) -> Result<Self, PartnerConnectError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(config.user_agent.as_str())
            .map_err(|e| PartnerConnectError::Initialization(e.to_string()))?;
        headers.insert(USER_AGENT, val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| PartnerConnectError::Initialization(e.to_string()))?;
        let retry = RetryPolicy::new(config.max_retries, config.retry_base_delay);
        Ok(Self { config, client: Arc::new(client), retry })
    }

    pub fn config(&self) -> &PartnerConnectConfig {
        &self.config
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.config.api_url)
    }

    /// Requests a bearer token with the client-credentials grant. There is no caching; callers fetch a new token for
    /// every operation.
    pub async fn get_token(&self) -> Result<AccessToken, PartnerConnectError> {
        let url = self.url("/oauth2/v1/token");
        let client = self.client.as_ref();
        let url = url.as_str();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.reveal().as_str()),
            ("scope", self.config.scope.as_str()),
        ];
        let form = &form;
        trace!("🏦️ Requesting access token");
        self.retry
            .run("GET Token", move || async move {
                let response = client.post(url).form(form).send().await?;
                let status = response.status();
                if status == StatusCode::OK {
                    response.json::<AccessToken>().await.map_err(|e| PartnerConnectError::JsonError(e.to_string()))
                } else {
                    let body = response.text().await.unwrap_or_default();
                    debug!("🏦️ Token request was rejected with status {status}");
                    Err(PartnerConnectError::UpstreamAuthError { status: status.as_u16(), body })
                }
            })
            .await
    }

    async fn bearer(&self) -> Result<String, PartnerConnectError> {
        let token = self.get_token().await?;
        Ok(format!("Bearer {}", token.access_token.reveal()))
    }

    /// Authorised GET that expects a 200 response with a JSON body. An empty body is returned as an empty object.
    async fn get_json(&self, label: &str, url: &str, extra: &[(&str, &str)]) -> Result<Value, PartnerConnectError> {
        let bearer = self.bearer().await?;
        let client = self.client.as_ref();
        let bearer = bearer.as_str();
        debug!("🏦️ {label}: GET {url}");
        self.retry
            .run(label, move || async move {
                let mut req = client.get(url).header(AUTHORIZATION, bearer);
                for (name, value) in extra {
                    req = req.header(*name, *value);
                }
                let response = expect_status(req.send().await?, StatusCode::OK).await?;
                json_body(response).await
            })
            .await
    }

    async fn download_file(
        &self,
        resource: &RemoteResource,
        target_dir: &Path,
    ) -> Result<DownloadedResource, PartnerConnectError> {
        let name = safe_file_name(&resource.name)
            .ok_or_else(|| PartnerConnectError::IoError(format!("Refusing to write resource named '{}'", resource.name)))?;
        let path = target_dir.join(name);
        let limit = self.config.max_download_bytes;
        let client = self.client.as_ref();
        let url = resource.url.as_str();
        let response = self
            .retry
            .run("Download resource", move || async move {
                let response = client.get(url).send().await?;
                if response.status().is_success() {
                    Ok(response)
                } else {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    Err(PartnerConnectError::UpstreamError { status, body })
                }
            })
            .await?;
        if response.content_length().map(|len| len > limit).unwrap_or(false) {
            return Err(PartnerConnectError::DownloadTooLarge { name: resource.name.clone(), limit });
        }
        if let Err(e) = stream_to_file(response, &path, &resource.name, limit).await {
            if let Err(rm) = fs::remove_file(&path).await {
                debug!("🏦️ Could not clean up partial download {}. {rm}", path.display());
            }
            return Err(e);
        }
        Ok(DownloadedResource {
            id: resource.id.clone(),
            name: resource.name.clone(),
            mime_type: resource.mime_type.clone(),
            local_path: path,
        })
    }

    async fn upload_file(&self, slot: &UploadSlot, file: &LocalFile) -> Result<ResourceDescriptor, PartnerConnectError> {
        let mime_type = slot.mime_type.clone().unwrap_or_else(|| file.mime_type.clone());
        let client = self.client.as_ref();
        let url = slot.url.as_str();
        let path = file.path.as_path();
        let name = slot.name.as_str();
        let mime = mime_type.as_str();
        self.retry
            .run("Upload resource", move || async move {
                let handle = File::open(path).await?;
                let len = handle.metadata().await?.len();
                let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(handle)), len)
                    .file_name(name.to_string())
                    .mime_str(mime)
                    .map_err(|e| PartnerConnectError::IoError(e.to_string()))?;
                let form = Form::new().part("file", part).text("filetype", mime.to_string()).text("filename", name.to_string());
                let response = client.post(url).multipart(form).send().await?;
                if response.status().is_success() {
                    Ok(())
                } else {
                    let status = response.status().as_u16();
                    let body = response.text().await.unwrap_or_default();
                    Err(PartnerConnectError::UpstreamError { status, body })
                }
            })
            .await?;
        Ok(ResourceDescriptor { id: slot.id.clone(), name: slot.name.clone(), mime_type })
    }

    /// Splits the files into those that may be uploaded and those that are missing or too large.
    async fn check_upload_sizes(&self, files: &[LocalFile]) -> (Vec<LocalFile>, Vec<(LocalFile, String)>) {
        let limit = self.config.max_upload_bytes;
        let mut ok = Vec::with_capacity(files.len());
        let mut rejected = Vec::new();
        for file in files {
            match fs::metadata(&file.path).await {
                Ok(m) if m.len() > limit => {
                    warn!("🏦️ {} is {} bytes, which exceeds the {limit} byte upload limit", file.name, m.len());
                    rejected.push((file.clone(), format!("File exceeds the {limit} byte upload limit")));
                },
                Ok(_) => ok.push(file.clone()),
                Err(e) => {
                    warn!("🏦️ Cannot read {}. {e}", file.path.display());
                    rejected.push((file.clone(), e.to_string()));
                },
            }
        }
        (ok, rejected)
    }
}

impl PartnerPlatform for PartnerConnectApi {
    async fn get_origin(&self, origin_id: &str, pat: &str) -> Result<Value, PartnerConnectError> {
        let url = self.url(&format!("/partner/v2/origins/{origin_id}"));
        let origin = self.get_json("GET Origin", &url, &[("X-Elli-PAT", pat)]).await?;
        info!("🏦️ Fetched origin {origin_id}");
        Ok(origin)
    }

    async fn get_transaction(&self, resource_ref: &str) -> Result<Value, PartnerConnectError> {
        let url = resolve_resource_ref(&self.config.api_url, resource_ref);
        let transaction = self.get_json("GET Transaction", &url, &[]).await?;
        info!("🏦️ Fetched transaction {resource_ref}");
        Ok(transaction)
    }

    async fn get_event(&self, resource_ref: &str) -> Result<Value, PartnerConnectError> {
        let url = resolve_resource_ref(&self.config.api_url, resource_ref);
        let event = self.get_json("GET Event", &url, &[]).await?;
        info!("🏦️ Fetched event {resource_ref}");
        Ok(event)
    }

    async fn download_resources(
        &self,
        trx_id: &str,
        target_dir: &Path,
    ) -> Result<Vec<DownloadedResource>, PartnerConnectError> {
        let url = self.url(&format!("/partner/v2/transactions/{trx_id}/request/resources"));
        let listing = self.get_json("GET Request Resources", &url, &[]).await?;
        let resources: Vec<RemoteResource> =
            serde_json::from_value(listing).map_err(|e| PartnerConnectError::JsonError(e.to_string()))?;
        if resources.is_empty() {
            debug!("🏦️ No files were sent with transaction {trx_id}");
            return Ok(Vec::new());
        }
        fs::create_dir_all(target_dir).await?;
        let mut downloaded = Vec::with_capacity(resources.len());
        for resource in &resources {
            match self.download_file(resource, target_dir).await {
                Ok(d) => {
                    debug!("🏦️ Downloaded {} to {}", d.name, d.local_path.display());
                    downloaded.push(d);
                },
                Err(e) => warn!("🏦️ Error transferring file '{}'. It will not be included. {e}", resource.name),
            }
        }
        info!("🏦️ Downloaded {}/{} resources for transaction {trx_id}", downloaded.len(), resources.len());
        Ok(downloaded)
    }

    async fn patch_status(&self, trx_id: &str, response: &TransactionResponse) -> Result<(), PartnerConnectError> {
        let url = self.url(&format!("/partner/v2/transactions/{trx_id}/response"));
        let bearer = self.bearer().await?;
        let client = self.client.as_ref();
        let (url_ref, bearer) = (url.as_str(), bearer.as_str());
        debug!("🏦️ PATCH {url} with status {}", response.status);
        self.retry
            .run("PATCH Response", move || async move {
                let res = client.patch(url_ref).header(AUTHORIZATION, bearer).json(response).send().await?;
                expect_status(res, StatusCode::NO_CONTENT).await.map(|_| ())
            })
            .await?;
        info!("🏦️ Transaction {trx_id} status reported as {}", response.status);
        Ok(())
    }

    async fn upload_resource_files(
        &self,
        trx_id: &str,
        files: &[LocalFile],
    ) -> Result<UploadReport, PartnerConnectError> {
        let (candidates, mut failed) = self.check_upload_sizes(files).await;
        if candidates.is_empty() {
            return Ok(UploadReport { uploaded: Vec::new(), failed });
        }
        let requests = candidates
            .iter()
            .map(|f| ResourceRequest { name: f.name.clone(), mime_type: f.mime_type.clone() })
            .collect::<Vec<_>>();
        let url = self.url(&format!("/partner/v2/transactions/{trx_id}/response/resources"));
        let bearer = self.bearer().await?;
        let client = self.client.as_ref();
        let (url_ref, bearer, body) = (url.as_str(), bearer.as_str(), &requests);
        debug!("🏦️ Requesting {} upload slots for transaction {trx_id}", requests.len());
        let slots = self
            .retry
            .run("POST Response Resources", move || async move {
                let res = client.post(url_ref).header(AUTHORIZATION, bearer).json(body).send().await?;
                if !res.status().is_success() {
                    let status = res.status().as_u16();
                    let body = res.text().await.unwrap_or_default();
                    return Err(PartnerConnectError::UpstreamError { status, body });
                }
                res.json::<Vec<UploadSlot>>().await.map_err(|e| PartnerConnectError::JsonError(e.to_string()))
            })
            .await?;
        let mut uploaded = Vec::with_capacity(slots.len());
        let mut pending = candidates;
        for slot in &slots {
            let Some(pos) = pending.iter().position(|f| f.name == slot.name) else {
                warn!("🏦️ Upload slot {} ({}) does not match any local file", slot.id, slot.name);
                continue;
            };
            let file = pending.remove(pos);
            match self.upload_file(slot, &file).await {
                Ok(descriptor) => uploaded.push(descriptor),
                Err(e) => {
                    warn!("🏦️ Could not upload {}. {e}", file.name);
                    failed.push((file, e.to_string()));
                },
            }
        }
        for file in pending {
            warn!("🏦️ No upload slot was issued for {}", file.name);
            failed.push((file, "No upload slot was issued".to_string()));
        }
        info!("🏦️ Uploaded {} files for transaction {trx_id}. {} failed.", uploaded.len(), failed.len());
        Ok(UploadReport { uploaded, failed })
    }
}

async fn expect_status(response: Response, expected: StatusCode) -> Result<Response, PartnerConnectError> {
    if response.status() == expected {
        Ok(response)
    } else {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        Err(PartnerConnectError::UpstreamError { status, body })
    }
}

async fn json_body(response: Response) -> Result<Value, PartnerConnectError> {
    let bytes = response.bytes().await?;
    if bytes.iter().all(|b| b.is_ascii_whitespace()) {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_slice(&bytes).map_err(|e| PartnerConnectError::JsonError(e.to_string()))
}

async fn stream_to_file(response: Response, path: &Path, name: &str, limit: u64) -> Result<(), PartnerConnectError> {
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        written += chunk.len() as u64;
        if written > limit {
            return Err(PartnerConnectError::DownloadTooLarge { name: name.to_string(), limit });
        }
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    trace!("🏦️ Wrote {written} bytes to {}", path.display());
    Ok(())
}
