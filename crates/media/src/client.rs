//! Signed REST client for the media account.
//!
//! Uploads stream the staged file to `POST /{cloud}/auto/upload` as
//! multipart, deletions go to `POST /{cloud}/{kind}/destroy`. Every request
//! carries a SHA-256 signature over its sorted parameters.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use vidcat_core::error::CoreError;
use vidcat_core::media::{ExternalRefId, MediaStore, UploadedMedia};

use crate::config::CloudinaryConfig;

/// Upper bound for one request, uploads included.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(300);

/// Errors from the media REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum CloudinaryError {
    /// The HTTP request itself failed (network, DNS, TLS, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The API returned a non-2xx status code.
    #[error("Media API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// The local file could not be read.
    #[error("Cannot read upload source: {0}")]
    Io(#[from] std::io::Error),

    /// A successful upload response without a delivery URL.
    #[error("Upload response carried no URL")]
    MissingUrl,
}

impl From<CloudinaryError> for CoreError {
    fn from(err: CloudinaryError) -> Self {
        CoreError::UpstreamStorage(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
    duration: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// [`MediaStore`] backed by a Cloudinary-compatible API.
pub struct CloudinaryMediaStore {
    client: reqwest::Client,
    config: CloudinaryConfig,
}

impl CloudinaryMediaStore {
    pub fn new(config: CloudinaryConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self { client, config }
    }

    async fn upload_file(&self, local_path: &Path) -> Result<UploadedMedia, CloudinaryError> {
        let file = tokio::fs::File::open(local_path).await?;
        let length = file.metadata().await?.len();
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(&[("timestamp", timestamp.as_str())], &self.config.api_secret);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::stream_with_length(reqwest::Body::from(file), length)
                    .file_name(file_name),
            )
            .text("api_key", self.config.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature", signature)
            .text("signature_algorithm", "sha256");

        let response = self
            .client
            .post(self.config.endpoint("auto", "upload"))
            .multipart(form)
            .send()
            .await?;
        let body: UploadResponse = ensure_success(response).await?.json().await?;

        let url = body.secure_url.or(body.url).ok_or(CloudinaryError::MissingUrl)?;
        Ok(UploadedMedia {
            url,
            duration_seconds: body.duration,
        })
    }

    async fn destroy(&self, id: &ExternalRefId) -> Result<bool, CloudinaryError> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = sign(
            &[
                ("public_id", id.public_id.as_str()),
                ("timestamp", timestamp.as_str()),
            ],
            &self.config.api_secret,
        );

        let params = [
            ("public_id", id.public_id.as_str()),
            ("timestamp", timestamp.as_str()),
            ("api_key", self.config.api_key.as_str()),
            ("signature", signature.as_str()),
            ("signature_algorithm", "sha256"),
        ];

        let response = self
            .client
            .post(self.config.endpoint(id.kind.as_str(), "destroy"))
            .form(&params)
            .send()
            .await?;
        let body: DestroyResponse = ensure_success(response).await?.json().await?;
        Ok(body.result == "ok")
    }
}

#[async_trait]
impl MediaStore for CloudinaryMediaStore {
    async fn upload(&self, local_path: &Path) -> Result<UploadedMedia, CoreError> {
        let result = self.upload_file(local_path).await;

        // The local copy is a temporary staging file either way.
        if let Err(e) = tokio::fs::remove_file(local_path).await {
            tracing::warn!(path = %local_path.display(), error = %e, "Failed to remove staged upload");
        }

        match result {
            Ok(media) => {
                tracing::info!(url = %media.url, "Media uploaded");
                Ok(media)
            }
            Err(e) => {
                tracing::error!(path = %local_path.display(), error = %e, "Media upload failed");
                Err(e.into())
            }
        }
    }

    async fn delete(&self, id: &ExternalRefId) -> Result<bool, CoreError> {
        let deleted = self.destroy(id).await.map_err(|e| {
            tracing::error!(media_id = %id, error = %e, "Media delete failed");
            CoreError::from(e)
        })?;
        tracing::debug!(media_id = %id, deleted, "Media delete finished");
        Ok(deleted)
    }
}

/// Sign request parameters: `k=v` pairs sorted by key, joined with `&`,
/// followed by the secret, hashed with SHA-256 and hex-encoded.
pub fn sign(params: &[(&str, &str)], secret: &str) -> String {
    let mut sorted: Vec<&(&str, &str)> = params.iter().filter(|(_, v)| !v.is_empty()).collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));

    let joined = sorted
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut hasher = Sha256::new();
    hasher.update(joined.as_bytes());
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Return the response unchanged on 2xx, otherwise an [`CloudinaryError::Api`]
/// with the status and body text.
async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, CloudinaryError> {
    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "<unreadable body>".to_string());
        return Err(CloudinaryError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response)
}
