//! Single-object upload to a Cloud Storage bucket via the JSON API media upload.
use crate::errors::{AppError, AppResult};
use reqwest::Client;
use serde::Deserialize;
use std::path::Path;
use tracing::{debug, info};
use url::Url;

#[derive(Debug, Deserialize)]
struct ObjectResource {
    name: String,
    bucket: String,
    #[serde(default)]
    size: Option<String>,
}

pub struct ObjectUploader {
    http: Client,
    access_token: String,
    base_url: String,
}

impl ObjectUploader {
    pub fn new(access_token: impl Into<String>, base_url: &str) -> Self {
        Self {
            http: Client::new(),
            access_token: access_token.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Uploads `local_path` as `bucket/destination` and returns the `gs://` URI.
    pub async fn upload(
        &self,
        bucket: &str,
        local_path: &Path,
        destination: &str,
    ) -> AppResult<String> {
        let data = tokio::fs::read(local_path)
            .await
            .map_err(|e| AppError::Unexpected(format!("reading {}: {e}", local_path.display())))?;
        let content_type = mime_guess::from_path(local_path)
            .first_or_octet_stream()
            .to_string();
        let url = upload_url(&self.base_url, bucket, destination)?;
        debug!(url = %url, content_type = %content_type, bytes = data.len(), "Uploading object");

        let res = self
            .http
            .post(url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(data)
            .send()
            .await
            .map_err(|e| AppError::Network(format!("objects.insert request failed: {e}")))?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            return Err(AppError::Api {
                operation: "objects.insert",
                status: status.as_u16(),
                body,
            });
        }

        let object: ObjectResource = res
            .json()
            .await
            .map_err(|e| AppError::Unexpected(format!("decoding objects.insert response: {e}")))?;
        let uri = gs_uri(&object.bucket, &object.name);
        info!(
            local = %local_path.display(),
            destination = %uri,
            size = object.size.as_deref().unwrap_or("?"),
            "File uploaded"
        );
        Ok(uri)
    }
}

pub fn gs_uri(bucket: &str, object: &str) -> String {
    format!("gs://{bucket}/{object}")
}

pub fn upload_url(base: &str, bucket: &str, object: &str) -> AppResult<Url> {
    if bucket.is_empty() || object.is_empty() {
        return Err(AppError::Config("bucket and object name are required".into()));
    }
    let mut url = Url::parse(base)
        .map_err(|e| AppError::Config(format!("invalid storage base {base}: {e}")))?;
    url.path_segments_mut()
        .map_err(|_| AppError::Config(format!("storage base {base} cannot take a path")))?
        .pop_if_empty()
        .extend(["upload", "storage", "v1", "b", bucket, "o"]);
    url.query_pairs_mut()
        .append_pair("uploadType", "media")
        .append_pair("name", object);
    Ok(url)
}
