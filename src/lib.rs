//! placepro - asset ingestion and guided interviews for campus placement
//!
//! Two subsystems share this crate:
//!
//! - The asset gateway maps a logical upload category (profile photo,
//!   resume, blog image, study material, thumbnail) onto a remote storage
//!   folder and resource kind through a closed policy table, and performs
//!   a single multipart upload. A local JSONL ledger makes re-offered
//!   content idempotent, and a drop-folder watcher feeds the gateway in
//!   bulk.
//! - The interview runner fetches an AI interview from the placement
//!   backend, speaks each question aloud, captures spoken answers with a
//!   timeout bound, and submits one dense response array at the end. A
//!   pure state machine owns the capture lifecycle; async engines only
//!   post events.
//!
//! # Modules
//!
//! - `gateway`: category policies, storage provider, ledger, watcher
//! - `interview`: session state machine, speech engines, media, driver
//! - `api`: HTTP client for the placement backend
//! - `cli`: command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Upload a resume
//! placepro upload cv.pdf --category resume
//!
//! # Ingest a folder of study materials
//! placepro scan ./materials --category study-material --pattern '*.pdf'
//!
//! # Take an interview
//! placepro interview run <interview-id>
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod gateway;
pub mod interview;

// Re-export main types at crate root for convenience
pub use api::{ApiError, InterviewApi};
pub use gateway::{
    AssetGateway, GatewayError, IngestOutcome, StoredAsset, UploadCategory, UploadRequest,
};
pub use interview::{
    CaptureState, CapturedAnswer, InterviewSession, QuestionPrompt, SentinelAnswer,
    SessionDriver, SessionEvent, SubmissionPayload,
};
