//! Append-only session logs.
//!
//! Each interview run writes a JSONL file under
//! `$PLACEPRO_HOME/sessions/<session_id>.jsonl`. Events are appended as
//! they happen and the full file replays into a [`SessionRecord`] for the
//! history and show commands. Appends never rewrite existing lines.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum SessionLogError {
    #[error("Session log I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session log serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Session log not found: {0}")]
    NotFound(String),
}

/// One logged moment in a session
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionLogEvent {
    Started {
        interview_id: String,
        question_count: usize,
    },
    QuestionStarted {
        index: usize,
        question_id: String,
    },
    AnswerCaptured {
        index: usize,
        answer: String,
        genuine: bool,
    },
    MicError {
        index: usize,
        reason: String,
    },
    SubmissionAttempted {
        genuine_answers: usize,
    },
    SubmissionSucceeded,
    SubmissionFailed {
        reason: String,
    },
    Exited,
}

/// A log line: timestamp plus event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionLogEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: SessionLogEvent,
}

/// A session reconstructed from its log file
#[derive(Debug, Clone)]
pub struct SessionRecord {
    pub session_id: String,
    pub interview_id: String,
    pub started_at: Option<DateTime<Utc>>,
    pub question_count: usize,
    pub answers_captured: usize,
    pub genuine_answers: usize,
    pub submitted: bool,
    pub entries: Vec<SessionLogEntry>,
}

/// Append-only writer for one session's log
pub struct SessionLog {
    session_id: String,
    path: PathBuf,
}

impl SessionLog {
    /// Create a log for a new session under `sessions_dir`
    pub fn create(sessions_dir: &Path, session_id: &str) -> Result<Self, SessionLogError> {
        fs::create_dir_all(sessions_dir)?;
        let path = sessions_dir.join(format!("{}.jsonl", session_id));
        debug!(path = %path.display(), "Opened session log");

        Ok(Self {
            session_id: session_id.to_string(),
            path,
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event with the current timestamp
    pub fn append(&self, event: SessionLogEvent) -> Result<(), SessionLogError> {
        let entry = SessionLogEntry {
            timestamp: Utc::now(),
            event,
        };
        let line = serde_json::to_string(&entry)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }
}

/// Replay one session log into a record
pub fn replay_session(sessions_dir: &Path, session_id: &str) -> Result<SessionRecord, SessionLogError> {
    let path = sessions_dir.join(format!("{}.jsonl", session_id));
    if !path.exists() {
        return Err(SessionLogError::NotFound(session_id.to_string()));
    }

    let file = fs::File::open(&path)?;
    let reader = BufReader::new(file);

    let mut record = SessionRecord {
        session_id: session_id.to_string(),
        interview_id: String::new(),
        started_at: None,
        question_count: 0,
        answers_captured: 0,
        genuine_answers: 0,
        submitted: false,
        entries: Vec::new(),
    };

    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let entry: SessionLogEntry = serde_json::from_str(&line)?;

        match &entry.event {
            SessionLogEvent::Started {
                interview_id,
                question_count,
            } => {
                record.interview_id = interview_id.clone();
                record.question_count = *question_count;
                record.started_at = Some(entry.timestamp);
            }
            SessionLogEvent::AnswerCaptured { genuine, .. } => {
                record.answers_captured += 1;
                if *genuine {
                    record.genuine_answers += 1;
                }
            }
            SessionLogEvent::SubmissionSucceeded => record.submitted = true,
            _ => {}
        }

        record.entries.push(entry);
    }

    Ok(record)
}

/// List session records, most recent first
pub fn list_sessions(sessions_dir: &Path, limit: usize) -> Result<Vec<SessionRecord>, SessionLogError> {
    if !sessions_dir.exists() {
        return Ok(Vec::new());
    }

    let mut ids: Vec<(std::time::SystemTime, String)> = Vec::new();
    for entry in fs::read_dir(sessions_dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("jsonl") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let modified = entry
            .metadata()?
            .modified()
            .unwrap_or(std::time::SystemTime::UNIX_EPOCH);
        ids.push((modified, stem.to_string()));
    }

    ids.sort_by(|a, b| b.0.cmp(&a.0));

    let mut records = Vec::new();
    for (_, id) in ids.into_iter().take(limit) {
        records.push(replay_session(sessions_dir, &id)?);
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_append_and_replay() {
        let temp = TempDir::new().unwrap();
        let log = SessionLog::create(temp.path(), "sess-1").unwrap();

        log.append(SessionLogEvent::Started {
            interview_id: "iv-9".to_string(),
            question_count: 3,
        })
        .unwrap();
        log.append(SessionLogEvent::QuestionStarted {
            index: 0,
            question_id: "q0".to_string(),
        })
        .unwrap();
        log.append(SessionLogEvent::AnswerCaptured {
            index: 0,
            answer: "spoken answer".to_string(),
            genuine: true,
        })
        .unwrap();
        log.append(SessionLogEvent::AnswerCaptured {
            index: 1,
            answer: "No response recorded".to_string(),
            genuine: false,
        })
        .unwrap();
        log.append(SessionLogEvent::SubmissionSucceeded).unwrap();

        let record = replay_session(temp.path(), "sess-1").unwrap();
        assert_eq!(record.interview_id, "iv-9");
        assert_eq!(record.question_count, 3);
        assert_eq!(record.answers_captured, 2);
        assert_eq!(record.genuine_answers, 1);
        assert!(record.submitted);
        assert_eq!(record.entries.len(), 5);
    }

    #[test]
    fn test_replay_missing_session() {
        let temp = TempDir::new().unwrap();
        let result = replay_session(temp.path(), "nope");
        assert!(matches!(result, Err(SessionLogError::NotFound(_))));
    }

    #[test]
    fn test_list_sessions_most_recent_first() {
        let temp = TempDir::new().unwrap();

        for (id, iv) in [("a", "iv-a"), ("b", "iv-b")] {
            let log = SessionLog::create(temp.path(), id).unwrap();
            log.append(SessionLogEvent::Started {
                interview_id: iv.to_string(),
                question_count: 1,
            })
            .unwrap();
        }

        // Backdate the first file so ordering is deterministic
        let early = filetime::FileTime::from_unix_time(1_600_000_000, 0);
        filetime::set_file_mtime(temp.path().join("a.jsonl"), early).unwrap();

        let records = list_sessions(temp.path(), 10).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].session_id, "b");
        assert_eq!(records[1].session_id, "a");

        let limited = list_sessions(temp.path(), 1).unwrap();
        assert_eq!(limited.len(), 1);
    }

    #[test]
    fn test_list_sessions_empty_dir() {
        let temp = TempDir::new().unwrap();
        let missing = temp.path().join("sessions");
        assert!(list_sessions(&missing, 5).unwrap().is_empty());
    }
}
