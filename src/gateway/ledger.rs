//! Append-only upload ledger.
//!
//! JSONL file recording every completed upload keyed by a short content
//! hash. Replaying the file yields current state, which gives the CLI and
//! the drop-folder watcher idempotent re-ingestion: identical bytes are
//! reported as already stored instead of re-uploaded.

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

use super::UploadCategory;

/// Errors that can occur with the upload ledger
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// One recorded upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// When the upload completed
    pub timestamp: DateTime<Utc>,

    /// Short SHA256 of the uploaded bytes (12 hex chars)
    pub content_hash: String,

    /// Category the bytes were filed under
    pub category: UploadCategory,

    /// Original file name
    pub file_name: String,

    /// Size in bytes
    pub size: u64,

    /// Public URL returned by the provider
    pub public_url: String,
}

/// JSONL-backed upload ledger
pub struct UploadLedger {
    path: PathBuf,
}

impl UploadLedger {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Open the ledger in the default location ($PLACEPRO_HOME/uploads.jsonl)
    pub async fn open_default() -> Result<Self> {
        let path = crate::config::ledger_path()?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        Ok(Self::new(path))
    }

    /// Append an entry under an exclusive file lock.
    ///
    /// The lock guards against a concurrent watcher and CLI upload
    /// interleaving partial lines.
    fn append(&self, entry: &LedgerEntry) -> Result<(), LedgerError> {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;
        let result = (|| -> Result<(), LedgerError> {
            let mut file = &file;
            let json = serde_json::to_string(entry)?;
            file.write_all(format!("{}\n", json).as_bytes())?;
            file.flush()?;
            Ok(())
        })();
        let _ = fs2::FileExt::unlock(&file);

        result
    }

    /// Replay the ledger into current state (last entry per hash wins)
    pub async fn replay(&self) -> Result<HashMap<String, LedgerEntry>, LedgerError> {
        let mut entries: HashMap<String, LedgerEntry> = HashMap::new();

        if !self.path.exists() {
            return Ok(entries);
        }

        let file = std::fs::File::open(&self.path)?;
        let reader = BufReader::new(file);

        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let entry: LedgerEntry = serde_json::from_str(&line)?;
            entries.insert(entry.content_hash.clone(), entry);
        }

        Ok(entries)
    }

    /// Look up a previously recorded upload by content hash
    pub async fn find(&self, content_hash: &str) -> Result<Option<LedgerEntry>, LedgerError> {
        let entries = self.replay().await?;
        Ok(entries.get(content_hash).cloned())
    }

    /// Record a completed upload
    pub async fn record(
        &self,
        content_hash: &str,
        category: UploadCategory,
        file_name: &str,
        size: u64,
        public_url: &str,
    ) -> Result<LedgerEntry, LedgerError> {
        let entry = LedgerEntry {
            timestamp: Utc::now(),
            content_hash: content_hash.to_string(),
            category,
            file_name: file_name.to_string(),
            size,
            public_url: public_url.to_string(),
        };

        self.append(&entry)?;
        Ok(entry)
    }

    /// All entries, most recent first
    pub async fn recent(&self, limit: usize) -> Result<Vec<LedgerEntry>, LedgerError> {
        let entries = self.replay().await?;
        let mut all: Vec<LedgerEntry> = entries.into_values().collect();
        all.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        all.truncate(limit);
        Ok(all)
    }
}

/// Short content hash of a byte buffer (first 12 hex chars of SHA256)
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();
    hex::encode(&result[..6])
}
