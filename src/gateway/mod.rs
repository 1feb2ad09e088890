//! Asset ingestion gateway.
//!
//! One entry point, [`AssetGateway::store`], accepts an in-memory file
//! buffer plus a logical category, maps the category to a remote
//! folder/resource-kind pair through a closed policy table, derives an
//! object key, and performs a single upload via the configured storage
//! provider, returning the asset's public URL.
//!
//! The gateway holds no state between calls. It performs no size or MIME
//! validation (that belongs to the calling surface), no retry, and no URL
//! rewriting: provider URLs pass through unmodified.

pub mod keys;
pub mod ledger;
pub mod provider;
pub mod watcher;

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use ledger::{LedgerEntry, UploadLedger};
use provider::{PreparedUpload, StorageProvider};

/// Errors surfaced by the gateway.
///
/// `UnknownCategory` signals a config/deploy defect (an external category
/// string with no policy) and must never be retried. `Upload` is a
/// transient provider/network failure surfaced to the caller, who may
/// retry the whole operation; the gateway itself never retries.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Unknown upload category: {0}")]
    UnknownCategory(String),

    #[error("Upload failed: {0}")]
    Upload(String),
}

/// Logical category of an uploaded asset.
///
/// Closed set: adding or removing a category is a compile-time-checked
/// change. External inputs (CLI args, config) go through [`FromStr`],
/// which rejects unknown names before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UploadCategory {
    Profile,
    Resume,
    Blog,
    StudyMaterial,
    StudyMaterialThumbnail,
}

impl UploadCategory {
    /// All recognized categories, in policy-table order.
    pub const ALL: [UploadCategory; 5] = [
        UploadCategory::Profile,
        UploadCategory::Resume,
        UploadCategory::Blog,
        UploadCategory::StudyMaterial,
        UploadCategory::StudyMaterialThumbnail,
    ];

    /// Resolve the storage policy for this category.
    ///
    /// Exhaustive by construction: every category has exactly one entry.
    pub fn policy(self) -> CategoryPolicy {
        match self {
            UploadCategory::Profile => CategoryPolicy {
                folder: "placepro/profiles",
                kind: ResourceKind::Image,
                forced_format: None,
            },
            UploadCategory::Resume => CategoryPolicy {
                folder: "placepro/resumes",
                kind: ResourceKind::Binary,
                forced_format: None,
            },
            UploadCategory::Blog => CategoryPolicy {
                folder: "placepro/blog",
                kind: ResourceKind::Image,
                forced_format: None,
            },
            UploadCategory::StudyMaterial => CategoryPolicy {
                folder: "placepro/study-materials",
                kind: ResourceKind::Binary,
                forced_format: Some("pdf"),
            },
            UploadCategory::StudyMaterialThumbnail => CategoryPolicy {
                folder: "placepro/study-materials/thumbnails",
                kind: ResourceKind::Image,
                forced_format: None,
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UploadCategory::Profile => "profile",
            UploadCategory::Resume => "resume",
            UploadCategory::Blog => "blog",
            UploadCategory::StudyMaterial => "study-material",
            UploadCategory::StudyMaterialThumbnail => "study-material-thumbnail",
        }
    }
}

impl fmt::Display for UploadCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UploadCategory {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "profile" => Ok(UploadCategory::Profile),
            "resume" => Ok(UploadCategory::Resume),
            "blog" => Ok(UploadCategory::Blog),
            "study-material" | "studyMaterial" => Ok(UploadCategory::StudyMaterial),
            "study-material-thumbnail" | "studyMaterialThumbnail" => {
                Ok(UploadCategory::StudyMaterialThumbnail)
            }
            other => Err(GatewayError::UnknownCategory(other.to_string())),
        }
    }
}

/// Remote resource kind reported to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Image,
    Binary,
}

impl ResourceKind {
    /// Wire value for the provider's resource_type field.
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Image => "image",
            ResourceKind::Binary => "raw",
        }
    }
}

/// Storage policy for one category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPolicy {
    /// Remote folder path
    pub folder: &'static str,
    /// Resource kind reported to the provider
    pub kind: ResourceKind,
    /// Output format forced regardless of the input's actual format
    pub forced_format: Option<&'static str>,
}

/// A single upload request. Immutable, created per call.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub bytes: Vec<u8>,
    pub file_name: String,
    pub content_type: String,
    pub category: UploadCategory,
    /// Forces a stable object key; takes precedence over the derived key
    pub explicit_key: Option<String>,
}

/// The only durable output of the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredAsset {
    pub public_url: String,
}

/// Outcome of a ledger-backed ingestion.
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    /// Uploaded and recorded
    Stored(StoredAsset),

    /// Identical bytes were already uploaded; no provider call was made
    AlreadyStored(LedgerEntry),
}

/// The asset ingestion gateway.
pub struct AssetGateway {
    provider: Arc<dyn StorageProvider>,
}

impl AssetGateway {
    pub fn new(provider: Arc<dyn StorageProvider>) -> Self {
        Self { provider }
    }

    /// Upload a file and return its public URL.
    ///
    /// One outbound network call per invocation; no local writes. The
    /// overwrite flag is always on: re-uploading to the same key replaces
    /// prior content, there is no versioning.
    #[instrument(skip(self, request), fields(category = %request.category, file = %request.file_name))]
    pub async fn store(&self, request: UploadRequest) -> Result<StoredAsset, GatewayError> {
        let policy = request.category.policy();

        let key = match request.explicit_key {
            Some(key) => key,
            None => keys::object_key(&request.file_name, Utc::now()),
        };

        debug!(folder = policy.folder, kind = policy.kind.as_str(), %key, "Prepared upload");

        let prepared = PreparedUpload {
            bytes: request.bytes,
            file_name: request.file_name,
            content_type: request.content_type,
            folder: policy.folder.to_string(),
            kind: policy.kind,
            key,
            overwrite: true,
            format: policy.forced_format.map(str::to_string),
        };

        let asset = self
            .provider
            .upload(prepared)
            .await
            .map_err(|e| GatewayError::Upload(e.to_string()))?;

        info!(url = %asset.public_url, "Asset stored");
        Ok(asset)
    }

    /// Ingest a file from disk through the upload ledger.
    ///
    /// Re-offering identical bytes reports the recorded URL instead of
    /// re-uploading. Used by the CLI and the drop-folder watcher; plain
    /// `store()` callers bypass the ledger entirely.
    pub async fn ingest_path(
        &self,
        ledger: &UploadLedger,
        path: &Path,
        category: UploadCategory,
        explicit_key: Option<String>,
    ) -> anyhow::Result<IngestOutcome> {
        let bytes = tokio::fs::read(path).await?;
        let hash = ledger::content_hash(&bytes);

        if let Some(entry) = ledger.find(&hash).await? {
            debug!(%hash, url = %entry.public_url, "Content already stored");
            return Ok(IngestOutcome::AlreadyStored(entry));
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());
        let size = bytes.len() as u64;

        let asset = self
            .store(UploadRequest {
                bytes,
                content_type: content_type_for(path).to_string(),
                file_name: file_name.clone(),
                category,
                explicit_key,
            })
            .await?;

        ledger
            .record(&hash, category, &file_name, size, &asset.public_url)
            .await?;

        Ok(IngestOutcome::Stored(asset))
    }
}

/// Guess a MIME type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("doc") => "application/msword",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_category_has_a_policy() {
        for category in UploadCategory::ALL {
            let policy = category.policy();
            assert!(!policy.folder.is_empty());
        }
    }

    #[test]
    fn test_study_material_forces_pdf() {
        assert_eq!(
            UploadCategory::StudyMaterial.policy().forced_format,
            Some("pdf")
        );
        for category in UploadCategory::ALL {
            if category != UploadCategory::StudyMaterial {
                assert_eq!(category.policy().forced_format, None);
            }
        }
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!(
            "profile".parse::<UploadCategory>().unwrap(),
            UploadCategory::Profile
        );
        assert_eq!(
            "studyMaterial".parse::<UploadCategory>().unwrap(),
            UploadCategory::StudyMaterial
        );
        assert!(matches!(
            "avatar".parse::<UploadCategory>(),
            Err(GatewayError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_content_type_guess() {
        assert_eq!(content_type_for(Path::new("a/resume.PDF")), "application/pdf");
        assert_eq!(content_type_for(Path::new("pic.jpeg")), "image/jpeg");
        assert_eq!(
            content_type_for(Path::new("mystery")),
            "application/octet-stream"
        );
    }
}
