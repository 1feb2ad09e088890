//! Command-line interface for placepro.
//!
//! Provides commands for uploading assets, scanning and watching drop
//! folders, running guided interview sessions, and inspecting state.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use crate::config;
use crate::gateway::ledger::UploadLedger;
use crate::gateway::provider::HttpStorageProvider;
use crate::gateway::watcher::{DropFolderWatcher, WatchConfig};
use crate::gateway::{AssetGateway, IngestOutcome, UploadCategory};

pub mod interview;

/// placepro - asset ingestion and guided interviews for campus placement
#[derive(Parser, Debug)]
#[command(name = "placepro")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Upload a single file to remote storage
    Upload {
        /// File to upload
        file: PathBuf,

        /// Upload category (profile, resume, blog, study-material,
        /// study-material-thumbnail)
        #[arg(short, long)]
        category: UploadCategory,

        /// Explicit object key (overrides the derived timestamped key)
        #[arg(short, long)]
        key: Option<String>,

        /// Skip the upload ledger and force a fresh upload
        #[arg(long)]
        force: bool,
    },

    /// Scan a drop folder once and ingest matching files
    Scan {
        /// Directory to scan
        dir: PathBuf,

        /// Upload category for every ingested file
        #[arg(short, long)]
        category: UploadCategory,

        /// Glob patterns a file name must match (repeatable)
        #[arg(short, long)]
        pattern: Vec<String>,
    },

    /// Watch a drop folder and ingest new files as they stabilize
    Watch {
        /// Directory to watch
        dir: PathBuf,

        /// Upload category for every ingested file
        #[arg(short, long)]
        category: UploadCategory,

        /// Glob patterns a file name must match (repeatable)
        #[arg(short, long)]
        pattern: Vec<String>,

        /// Seconds a file's size must hold steady before ingestion
        #[arg(long, default_value = "5")]
        stability: u64,
    },

    /// List recent uploads from the ledger
    Uploads {
        /// Maximum number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },

    /// Guided interview sessions
    Interview {
        #[command(subcommand)]
        command: interview::InterviewCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Upload {
                file,
                category,
                key,
                force,
            } => upload_file(&file, category, key, force).await,
            Commands::Scan {
                dir,
                category,
                pattern,
            } => scan_drop_folder(dir, category, pattern).await,
            Commands::Watch {
                dir,
                category,
                pattern,
                stability,
            } => watch_drop_folder(dir, category, pattern, stability).await,
            Commands::Uploads { limit } => list_uploads(limit).await,
            Commands::Interview { command } => interview::execute(command).await,
            Commands::Config => show_config().await,
        }
    }
}

/// Build the gateway from resolved configuration
fn build_gateway() -> Result<AssetGateway> {
    let cfg = config::config()?;
    let provider = HttpStorageProvider::from_settings(&cfg.storage)?;
    Ok(AssetGateway::new(Arc::new(provider)))
}

/// Upload a single file
async fn upload_file(
    file: &PathBuf,
    category: UploadCategory,
    key: Option<String>,
    force: bool,
) -> Result<()> {
    let gateway = build_gateway()?;

    if force {
        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read file: {}", file.display()))?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "upload".to_string());

        let asset = gateway
            .store(crate::gateway::UploadRequest {
                content_type: crate::gateway::content_type_for(file).to_string(),
                bytes,
                file_name,
                category,
                explicit_key: key,
            })
            .await?;

        println!("Uploaded: {}", asset.public_url);
        return Ok(());
    }

    let ledger = UploadLedger::open_default().await?;
    match gateway.ingest_path(&ledger, file, category, key).await? {
        IngestOutcome::Stored(asset) => {
            println!("Uploaded: {}", asset.public_url);
        }
        IngestOutcome::AlreadyStored(entry) => {
            println!("Already uploaded ({}): {}", entry.timestamp, entry.public_url);
        }
    }

    Ok(())
}

/// Scan a drop folder once
async fn scan_drop_folder(
    dir: PathBuf,
    category: UploadCategory,
    patterns: Vec<String>,
) -> Result<()> {
    let gateway = build_gateway()?;
    let ledger = UploadLedger::open_default().await?;

    let mut config = WatchConfig::new(dir, category);
    if !patterns.is_empty() {
        config.accept_patterns = patterns;
    }

    let watcher = DropFolderWatcher::new(config);
    let result = watcher.scan_once(&gateway, &ledger).await?;

    println!(
        "Scan complete: {} ingested, {} already stored, {} skipped, {} errors",
        result.ingested, result.already_stored, result.skipped, result.errors
    );

    if result.errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// Watch a drop folder until Ctrl-C
async fn watch_drop_folder(
    dir: PathBuf,
    category: UploadCategory,
    patterns: Vec<String>,
    stability: u64,
) -> Result<()> {
    let gateway = Arc::new(build_gateway()?);
    let ledger = Arc::new(UploadLedger::open_default().await?);

    let mut config = WatchConfig::new(dir, category);
    config.stability_delay_secs = stability;
    if !patterns.is_empty() {
        config.accept_patterns = patterns;
    }

    let watcher = DropFolderWatcher::new(config);
    let (mut events, handle) = watcher.watch(gateway, ledger).await?;

    println!("Watching for new files (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            event = events.recv() => {
                match event {
                    Some(ingested) => {
                        println!("{} -> {}", ingested.path.display(), ingested.public_url);
                    }
                    None => break,
                }
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping watcher...");
                handle.stop().await?;
                break;
            }
        }
    }

    Ok(())
}

/// List recent ledger entries
async fn list_uploads(limit: usize) -> Result<()> {
    let ledger = UploadLedger::open_default().await?;
    let entries = ledger.recent(limit).await?;

    if entries.is_empty() {
        println!("No uploads recorded. Use 'placepro upload <file>' to add one.");
        return Ok(());
    }

    println!(
        "{:<14} {:<26} {:<28} {}",
        "HASH", "CATEGORY", "FILE", "URL"
    );
    println!("{}", "-".repeat(100));

    for entry in entries {
        println!(
            "{:<14} {:<26} {:<28} {}",
            entry.content_hash, entry.category, entry.file_name, entry.public_url
        );
    }

    Ok(())
}

/// Show the resolved configuration (for debugging)
async fn show_config() -> Result<()> {
    let cfg = config::config()?;

    println!("placepro configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:         {}", cfg.home.display());
    println!("  Ledger:       {}", config::ledger_path()?.display());
    println!("  Session logs: {}", config::sessions_dir()?.display());
    println!();
    println!("Storage:");
    println!("  Upload URL:   {}", cfg.storage.upload_url);
    println!("  API key env:  ${}", cfg.storage.api_key_env);
    println!();
    println!("Categories:");
    for category in UploadCategory::ALL {
        let policy = category.policy();
        let format = policy
            .forced_format
            .map(|f| format!(" (forced {})", f))
            .unwrap_or_default();
        println!(
            "  {:<26} {} [{}]{}",
            category,
            policy.folder,
            policy.kind.as_str(),
            format
        );
    }
    println!();
    println!("Session:");
    println!("  Backend API:    {}", cfg.session.api_base);
    println!("  Answer timeout: {}s", cfg.session.answer_timeout_secs);
    println!("  Prompt delay:   {}ms", cfg.session.prompt_delay_ms);
    println!();
    println!("Speech:");
    println!(
        "  Synthesizer: {}",
        cfg.speech.synthesizer_cmd.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Capture:     {}",
        cfg.speech.capture_cmd.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Transcriber: {} (model {})",
        cfg.speech.transcriber_cmd.as_deref().unwrap_or("(none)"),
        cfg.speech.transcriber_model
    );

    Ok(())
}
