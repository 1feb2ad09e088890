//! Interview subcommands: run a guided session, browse past sessions.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Subcommand;
use uuid::Uuid;

use crate::api::InterviewApi;
use crate::config;
use crate::interview::log::{self, SessionLog};
use crate::interview::media::CommandMediaSource;
use crate::interview::session::{EngineCapabilities, SessionTimings};
use crate::interview::speech::{
    CommandRecognizer, CommandSynthesizer, SpeechRecognizer, SpeechSynthesizer,
};
use crate::interview::{InterviewSession, SessionDriver};

#[derive(Subcommand, Debug)]
pub enum InterviewCommands {
    /// Take an interview: questions are spoken aloud, answers captured
    /// from the microphone
    Run {
        /// Interview ID assigned by the placement backend
        interview_id: String,
    },

    /// List recent interview sessions
    History {
        /// Maximum number of sessions to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the event log of one session
    Show {
        /// Session ID (as shown by history)
        session_id: String,
    },
}

pub async fn execute(command: InterviewCommands) -> Result<()> {
    match command {
        InterviewCommands::Run { interview_id } => run_session(&interview_id).await,
        InterviewCommands::History { limit } => show_history(limit).await,
        InterviewCommands::Show { session_id } => show_session(&session_id).await,
    }
}

/// Fetch the interview, wire up the engines, and drive the session
async fn run_session(interview_id: &str) -> Result<()> {
    let cfg = config::config()?;

    let api = Arc::new(InterviewApi::new(cfg.session.api_base.clone()));
    let document = api
        .fetch_interview(interview_id)
        .await
        .context("Failed to fetch interview")?;

    if let Some(status) = document.status.as_deref() {
        if status == "completed" {
            anyhow::bail!("Interview {} has already been completed", interview_id);
        }
    }

    let synthesizer: Arc<dyn SpeechSynthesizer> =
        Arc::new(CommandSynthesizer::from_settings(&cfg.speech));
    let recognizer: Arc<dyn SpeechRecognizer> =
        Arc::new(CommandRecognizer::from_settings(&cfg.speech));

    let capabilities = EngineCapabilities {
        synthesis: synthesizer.is_supported(),
        recognition: recognizer.is_supported(),
    };
    let timings = SessionTimings {
        prompt_delay: std::time::Duration::from_millis(cfg.session.prompt_delay_ms),
        answer_timeout: std::time::Duration::from_secs(cfg.session.answer_timeout_secs),
    };

    let session = InterviewSession::new(
        document.id.clone(),
        document.questions,
        capabilities,
        timings,
    )?;

    let session_id = Uuid::new_v4().to_string();
    let sessions_dir = config::sessions_dir()?;
    let session_log = SessionLog::create(&sessions_dir, &session_id)?;

    let media_source = Arc::new(CommandMediaSource::from_settings(&cfg.speech));

    let mut driver = SessionDriver::new(
        session,
        synthesizer,
        recognizer,
        media_source,
        api,
        session_log,
    );
    driver.run().await?;

    eprintln!("[Session {} logged]", session_id);
    Ok(())
}

/// List recent sessions from the log directory
async fn show_history(limit: usize) -> Result<()> {
    let sessions_dir = config::sessions_dir()?;
    let records = log::list_sessions(&sessions_dir, limit)?;

    if records.is_empty() {
        println!("No interview sessions recorded.");
        return Ok(());
    }

    println!(
        "{:<38} {:<26} {:>5} {:>8} {:>9}",
        "SESSION", "INTERVIEW", "QS", "ANSWERS", "SUBMITTED"
    );
    println!("{}", "-".repeat(92));

    for record in records {
        println!(
            "{:<38} {:<26} {:>5} {:>3}/{:<4} {:>9}",
            record.session_id,
            record.interview_id,
            record.question_count,
            record.genuine_answers,
            record.answers_captured,
            if record.submitted { "yes" } else { "no" }
        );
    }

    Ok(())
}

/// Print the full event log of one session
async fn show_session(session_id: &str) -> Result<()> {
    let sessions_dir = config::sessions_dir()?;
    let record = log::replay_session(&sessions_dir, session_id)?;

    println!("Session: {}", record.session_id);
    println!("Interview: {}", record.interview_id);
    if let Some(started) = record.started_at {
        println!("Started: {}", started);
    }
    println!(
        "Answers: {} captured ({} genuine) of {} questions",
        record.answers_captured, record.genuine_answers, record.question_count
    );
    println!("Submitted: {}", if record.submitted { "yes" } else { "no" });
    println!();

    for entry in &record.entries {
        println!("{}  {:?}", entry.timestamp, entry.event);
    }

    Ok(())
}
