//! Storage provider seam for the asset gateway.
//!
//! The remote asset host is an opaque collaborator behind the
//! [`StorageProvider`] trait; the production implementation streams a
//! multipart POST to the configured upload endpoint.

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

use super::{ResourceKind, StoredAsset};
use crate::config::StorageSettings;

/// Errors from the storage provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider rejected upload: {0}")]
    Rejected(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// A fully-resolved upload, ready for the wire.
#[derive(Debug, Clone)]
pub struct PreparedUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
    pub folder: String,
    pub kind: ResourceKind,
    pub key: String,
    pub overwrite: bool,
    pub format: Option<String>,
}

/// Trait for remote asset hosts
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Human-readable provider name
    fn name(&self) -> &str;

    /// Upload a prepared buffer and return the public URL
    async fn upload(&self, upload: PreparedUpload) -> Result<StoredAsset, ProviderError>;
}

/// Response envelope from the upload endpoint
#[derive(Debug, Deserialize)]
struct UploadEnvelope {
    success: bool,
    #[serde(alias = "secure_url")]
    url: Option<String>,
    error: Option<String>,
}

/// HTTP storage provider using multipart upload
pub struct HttpStorageProvider {
    upload_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HttpStorageProvider {
    pub fn new(upload_url: String, api_key: String) -> Self {
        Self {
            upload_url,
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Build a provider from resolved storage settings
    pub fn from_settings(settings: &StorageSettings) -> anyhow::Result<Self> {
        let api_key = settings.api_key()?;
        Ok(Self::new(settings.upload_url.clone(), api_key))
    }
}

#[async_trait]
impl StorageProvider for HttpStorageProvider {
    fn name(&self) -> &str {
        "http"
    }

    async fn upload(&self, upload: PreparedUpload) -> Result<StoredAsset, ProviderError> {
        let file_part = Part::bytes(upload.bytes)
            .file_name(upload.file_name)
            .mime_str(&upload.content_type)
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let mut form = Form::new()
            .text("folder", upload.folder)
            .text("public_id", upload.key)
            .text("resource_type", upload.kind.as_str())
            .text("overwrite", if upload.overwrite { "true" } else { "false" })
            .part("file", file_part);

        if let Some(format) = upload.format {
            form = form.text("format", format);
        }

        let response = self
            .client
            .post(&self.upload_url)
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        let status = response.status();
        let envelope: UploadEnvelope = response
            .json()
            .await
            .map_err(|e| ProviderError::Transport(e.to_string()))?;

        if !status.is_success() || !envelope.success {
            return Err(ProviderError::Rejected(
                envelope
                    .error
                    .unwrap_or_else(|| format!("HTTP {}", status)),
            ));
        }

        let public_url = envelope
            .url
            .ok_or_else(|| ProviderError::Rejected("Missing URL in response".to_string()))?;

        Ok(StoredAsset { public_url })
    }
}
