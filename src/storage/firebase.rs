use crate::error::UploadError;
use crate::esmp::config::StorageConfig;
use crate::esmp::records::AssetUploader;
use async_trait::async_trait;
use reqwest::{Client, Url};
use serde_json::Value;
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct FirebaseUploader {
    http: Client,
    api_base: String,
    bucket: String,
    auth_token: Option<String>,
    object_prefix: String,
    extension: String,
    content_type: String,
}

impl FirebaseUploader {
    pub fn new(bucket: &str, storage: &StorageConfig) -> Self {
        Self {
            http: Client::new(),
            api_base: storage.api_base.trim_end_matches('/').to_string(),
            bucket: bucket.trim().to_string(),
            auth_token: storage.auth_token.clone(),
            object_prefix: storage.object_prefix.trim_matches('/').to_string(),
            extension: storage.extension.trim_start_matches('.').to_string(),
            content_type: storage.content_type.clone(),
        }
    }

    pub fn object_name(&self, asset_name: &str) -> String {
        if self.object_prefix.is_empty() {
            format!("{asset_name}.{}", self.extension)
        } else {
            format!("{}/{asset_name}.{}", self.object_prefix, self.extension)
        }
    }

    fn bucket_url(&self) -> Result<Url, UploadError> {
        let raw = format!("{}/b/{}/o", self.api_base, self.bucket);
        Url::parse(&raw).map_err(|err| UploadError::InvalidUrl(format!("{raw}: {err}")))
    }

    fn upload_url(&self, object: &str) -> Result<Url, UploadError> {
        let mut url = self.bucket_url()?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("name", object);
        Ok(url)
    }

    /// Object names travel as a single path segment, so `/` is escaped.
    pub fn download_url(&self, object: &str, token: &str) -> Result<String, UploadError> {
        let mut url = self.bucket_url()?;
        url.path_segments_mut()
            .map_err(|_| UploadError::InvalidUrl(self.api_base.clone()))?
            .push(object);
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("token", token);
        Ok(url.to_string())
    }
}

fn first_download_token(metadata: &Value) -> Option<&str> {
    metadata
        .get("downloadTokens")
        .and_then(Value::as_str)
        .and_then(|tokens| tokens.split(',').map(str::trim).find(|t| !t.is_empty()))
}

#[async_trait]
impl AssetUploader for FirebaseUploader {
    async fn upload(
        &self,
        local_path: &Path,
        asset_name: &str,
    ) -> Result<Option<String>, UploadError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|source| UploadError::Read {
                path: local_path.display().to_string(),
                source,
            })?;
        let object = self.object_name(asset_name);
        debug!(object = %object, bytes = bytes.len(), "uploading asset");

        let mut request = self
            .http
            .post(self.upload_url(&object)?)
            .header(reqwest::header::CONTENT_TYPE, &self.content_type)
            .body(bytes);
        if let Some(token) = &self.auth_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|err| UploadError::Network(err.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|err| UploadError::Network(err.to_string()))?;
        if !status.is_success() {
            return Err(UploadError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let metadata: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        match first_download_token(&metadata) {
            Some(token) => self.download_url(&object, token).map(Some),
            None => {
                warn!(object = %object, "upload succeeded without a download token");
                Ok(None)
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct DisabledUploader;

#[async_trait]
impl AssetUploader for DisabledUploader {
    async fn upload(
        &self,
        local_path: &Path,
        _asset_name: &str,
    ) -> Result<Option<String>, UploadError> {
        warn!(
            path = %local_path.display(),
            "no storage bucket configured; skipping asset upload"
        );
        Ok(None)
    }
}
