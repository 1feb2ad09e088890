//! Guided interview session.
//!
//! A client-side state machine that sequences question playback (speech
//! synthesis), answer capture (speech recognition bounded by a timeout),
//! response persistence, and final submission, coordinating five
//! asynchronous event sources in one event loop:
//!
//! 1. Media-device acquisition (one-shot, at session start)
//! 2. Speech-synthesis completion
//! 3. Speech-recognition results/errors
//! 4. The listen timeout
//! 5. User-initiated navigation
//!
//! The machine itself ([`session::InterviewSession`]) is pure: it consumes
//! [`session::SessionEvent`]s and emits [`session::Effect`]s, which the
//! async [`driver`] executes against the engine traits in [`speech`] and
//! [`media`]. Recognition results and timeouts carry the question index
//! snapshotted at listen-start, so a stale callback from a previous
//! question can never corrupt the current one.

pub mod driver;
pub mod log;
pub mod media;
pub mod session;
pub mod speech;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use driver::SessionDriver;
pub use session::{CaptureState, Effect, InterviewSession, SessionEvent};

/// One question in the ordered interview script
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPrompt {
    /// Backend identifier for the question
    #[serde(rename = "_id")]
    pub id: String,

    /// Text spoken to the candidate
    pub text: String,
}

/// Placeholder written into a response slot when no genuine answer was
/// captured, keeping the submitted array dense.
///
/// The three values carry distinct meanings:
/// - `NotProvided`: the slot was never answered and is back-filled at
///   submission time.
/// - `NotRecorded`: listening timed out with no speech.
/// - `NoClearSpeech`: the recognizer finished but produced an empty or
///   unusable transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentinelAnswer {
    NotProvided,
    NotRecorded,
    NoClearSpeech,
}

impl SentinelAnswer {
    /// Exact wire string sent to the backend
    pub fn as_str(self) -> &'static str {
        match self {
            SentinelAnswer::NotProvided => "No response provided",
            SentinelAnswer::NotRecorded => "No response recorded",
            SentinelAnswer::NoClearSpeech => "No clear speech detected",
        }
    }
}

/// A captured answer: either a genuine transcript or a sentinel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum CapturedAnswer {
    Genuine(String),
    Sentinel(SentinelAnswer),
}

impl CapturedAnswer {
    pub fn is_genuine(&self) -> bool {
        matches!(self, CapturedAnswer::Genuine(_))
    }

    /// The answer text as submitted
    pub fn text(&self) -> &str {
        match self {
            CapturedAnswer::Genuine(text) => text,
            CapturedAnswer::Sentinel(sentinel) => sentinel.as_str(),
        }
    }
}

/// A persisted response for one question index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub question_id: String,
    pub answer: CapturedAnswer,
    pub captured_at: DateTime<Utc>,
}

/// One entry of the submission body (camelCase wire shape)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEntry {
    pub question_index: usize,
    pub question_id: String,
    pub answer: String,
    pub timestamp: DateTime<Utc>,
}

/// Full submission body: dense across every question index, with a
/// terminal status flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionPayload {
    pub responses: Vec<ResponseEntry>,
    pub status: String,
}
