//! Drop-folder watcher for bulk asset ingestion.
//!
//! Watches a local directory for new files of a configured category and
//! ingests them through the gateway once they are stable (size unchanged
//! for the stability delay). Accept globs filter which file names qualify.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use glob::Pattern;
use notify::RecursiveMode;
use notify_debouncer_mini::new_debouncer;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::ledger::UploadLedger;
use super::{AssetGateway, IngestOutcome, UploadCategory};

/// Errors that can occur with the watcher
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Watch directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Invalid accept pattern '{pattern}': {source}")]
    BadPattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error("Notify error: {0}")]
    Notify(#[from] notify::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for the drop-folder watcher
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory to watch
    pub watch_path: PathBuf,

    /// Category every ingested file is filed under
    pub category: UploadCategory,

    /// How long a file must be stable before ingestion (seconds)
    pub stability_delay_secs: u64,

    /// Glob patterns a file name must match (any of)
    pub accept_patterns: Vec<String>,
}

impl WatchConfig {
    pub fn new(watch_path: PathBuf, category: UploadCategory) -> Self {
        Self {
            watch_path,
            category,
            stability_delay_secs: 5,
            accept_patterns: vec!["*".to_string()],
        }
    }

    /// Check the watch path and compile accept patterns
    pub fn validate(&self) -> Result<Vec<Pattern>, WatchError> {
        if !self.watch_path.exists() {
            return Err(WatchError::DirectoryNotFound(self.watch_path.clone()));
        }

        self.accept_patterns
            .iter()
            .map(|p| {
                Pattern::new(p).map_err(|source| WatchError::BadPattern {
                    pattern: p.clone(),
                    source,
                })
            })
            .collect()
    }
}

/// Result of a directory scan
#[derive(Debug, Clone, Default)]
pub struct ScanResult {
    pub ingested: usize,
    pub already_stored: usize,
    pub skipped: usize,
    pub errors: usize,
}

impl ScanResult {
    pub fn total_matched(&self) -> usize {
        self.ingested + self.already_stored + self.errors
    }
}

/// Event emitted when a file has been ingested
#[derive(Debug, Clone)]
pub struct IngestedFile {
    pub path: PathBuf,
    pub public_url: String,
}

/// Drop-folder watcher
pub struct DropFolderWatcher {
    config: WatchConfig,
}

impl DropFolderWatcher {
    pub fn new(config: WatchConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &WatchConfig {
        &self.config
    }

    fn accepts(patterns: &[Pattern], path: &Path) -> bool {
        path.file_name()
            .and_then(|n| n.to_str())
            .map(|name| patterns.iter().any(|p| p.matches(name)))
            .unwrap_or(false)
    }

    /// Scan the directory once and ingest every matching file.
    ///
    /// Scanning treats every existing file as stable; the stability delay
    /// only applies to the continuous watch loop.
    pub async fn scan_once(
        &self,
        gateway: &AssetGateway,
        ledger: &UploadLedger,
    ) -> Result<ScanResult> {
        let patterns = self.config.validate()?;
        let mut result = ScanResult::default();

        let mut entries = tokio::fs::read_dir(&self.config.watch_path).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();

            let metadata = match tokio::fs::metadata(&path).await {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }

            if !Self::accepts(&patterns, &path) {
                result.skipped += 1;
                continue;
            }

            match gateway
                .ingest_path(ledger, &path, self.config.category, None)
                .await
            {
                Ok(IngestOutcome::Stored(asset)) => {
                    info!(path = %path.display(), url = %asset.public_url, "Ingested");
                    result.ingested += 1;
                }
                Ok(IngestOutcome::AlreadyStored(_)) => {
                    debug!(path = %path.display(), "Already stored");
                    result.already_stored += 1;
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ingestion failed");
                    result.errors += 1;
                }
            }
        }

        Ok(result)
    }

    /// Watch the directory and ingest new stable files until stopped
    pub async fn watch(
        &self,
        gateway: Arc<AssetGateway>,
        ledger: Arc<UploadLedger>,
    ) -> Result<(mpsc::Receiver<IngestedFile>, WatchHandle)> {
        self.config.validate()?;

        let (event_tx, event_rx) = mpsc::channel::<IngestedFile>(100);
        let (stop_tx, mut stop_rx) = mpsc::channel::<()>(1);

        let config = self.config.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = run_watch_loop(config, gateway, ledger, event_tx, &mut stop_rx).await {
                tracing::error!("Watcher error: {}", e);
            }
        });

        Ok((
            event_rx,
            WatchHandle {
                stop_tx,
                task: handle,
            },
        ))
    }
}

/// Handle to control the watcher
pub struct WatchHandle {
    stop_tx: mpsc::Sender<()>,
    task: tokio::task::JoinHandle<()>,
}

impl WatchHandle {
    /// Stop the watcher
    pub async fn stop(self) -> Result<()> {
        let _ = self.stop_tx.send(()).await;
        self.task.await?;
        Ok(())
    }
}

/// Internal watch loop: debounced notifications feed a stability map,
/// stable files are ingested and removed.
async fn run_watch_loop(
    config: WatchConfig,
    gateway: Arc<AssetGateway>,
    ledger: Arc<UploadLedger>,
    event_tx: mpsc::Sender<IngestedFile>,
    stop_rx: &mut mpsc::Receiver<()>,
) -> Result<()> {
    let patterns = config.validate()?;

    // path -> (size at last sighting, when last seen)
    let mut pending: HashMap<PathBuf, (u64, Instant)> = HashMap::new();

    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_secs(2), tx)?;
    debouncer
        .watcher()
        .watch(&config.watch_path, RecursiveMode::NonRecursive)?;

    let stability_delay = Duration::from_secs(config.stability_delay_secs);

    info!(
        path = %config.watch_path.display(),
        category = %config.category,
        "Watching drop folder"
    );

    loop {
        if stop_rx.try_recv().is_ok() {
            info!("Watcher stopping");
            break;
        }

        match rx.recv_timeout(Duration::from_millis(500)) {
            Ok(Ok(events)) => {
                for event in events {
                    let path = event.path;

                    if !DropFolderWatcher::accepts(&patterns, &path) {
                        continue;
                    }

                    if let Ok(metadata) = std::fs::metadata(&path) {
                        if metadata.is_file() {
                            pending.insert(path, (metadata.len(), Instant::now()));
                        }
                    }
                }
            }
            Ok(Err(e)) => {
                warn!("Notify error: {:?}", e);
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
            Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => {
                tracing::error!("Watcher channel disconnected");
                break;
            }
        }

        // Collect files whose size has not changed across the delay
        let now = Instant::now();
        let mut stable = Vec::new();
        let mut resized = Vec::new();

        for (path, (last_size, last_seen)) in pending.iter() {
            if now.duration_since(*last_seen) < stability_delay {
                continue;
            }
            match std::fs::metadata(path) {
                Ok(metadata) if metadata.len() == *last_size && metadata.len() > 0 => {
                    stable.push(path.clone());
                }
                Ok(metadata) => {
                    resized.push((path.clone(), metadata.len()));
                }
                Err(_) => {
                    // File disappeared; forget it
                    stable.push(path.clone());
                }
            }
        }

        for (path, size) in resized {
            pending.insert(path, (size, Instant::now()));
        }

        for path in stable {
            pending.remove(&path);

            if !path.exists() {
                continue;
            }

            match gateway
                .ingest_path(&ledger, &path, config.category, None)
                .await
            {
                Ok(IngestOutcome::Stored(asset)) => {
                    info!(path = %path.display(), url = %asset.public_url, "Ingested");
                    let _ = event_tx
                        .send(IngestedFile {
                            path,
                            public_url: asset.public_url,
                        })
                        .await;
                }
                Ok(IngestOutcome::AlreadyStored(_)) => {
                    debug!(path = %path.display(), "Already stored");
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Ingestion failed");
                }
            }
        }

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    Ok(())
}
