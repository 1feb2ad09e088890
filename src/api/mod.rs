//! Placement backend API surface.
//!
//! The interview endpoints live under `/api/user/ai-interview` on the
//! placement backend. Both responses come wrapped in the usual
//! `{success, data, message}` envelope.

pub mod client;

pub use client::InterviewApi;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Request to placement backend failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Placement backend rejected the request: {0}")]
    Rejected(String),

    #[error("Interview {0} not found")]
    InterviewNotFound(String),
}
