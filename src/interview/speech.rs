//! Speech engine adapters.
//!
//! Both engines run as subprocesses configured in `.placepro/config.yaml`:
//! the synthesizer receives the question text as its final argument, the
//! recognizer records microphone audio to a temp file and pipes it through
//! a whisper-style transcriber that emits JSON with a `text` field.

use std::process::Stdio;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::SpeechSettings;

/// Plays question text aloud. A session degrades gracefully without one.
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether an engine is actually configured and runnable
    fn is_supported(&self) -> bool;

    /// Speak the text to completion. Cancellation is done by aborting the
    /// task driving this future; the subprocess is killed on drop.
    async fn speak(&self, text: &str) -> Result<()>;
}

/// Captures one spoken answer. Required for a session to start.
#[async_trait]
pub trait SpeechRecognizer: Send + Sync {
    fn name(&self) -> &str;

    fn is_supported(&self) -> bool;

    /// Record and transcribe until speech resolves or `deadline` elapses.
    /// Returns `Ok(None)` on deadline, `Ok(Some(text))` on a transcript
    /// (possibly empty when nothing intelligible was heard).
    async fn listen(&self, deadline: Duration) -> Result<Option<String>>;
}

/// Synthesizer spawning a configured command (e.g. `say`, `espeak-ng`)
pub struct CommandSynthesizer {
    command: Option<String>,
    args: Vec<String>,
}

impl CommandSynthesizer {
    pub fn from_settings(settings: &SpeechSettings) -> Self {
        Self {
            command: settings.synthesizer_cmd.clone(),
            args: settings.synthesizer_args.clone(),
        }
    }

    #[cfg(test)]
    pub fn with_command(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: Some(command.into()),
            args,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for CommandSynthesizer {
    fn name(&self) -> &str {
        "command-synthesizer"
    }

    fn is_supported(&self) -> bool {
        self.command.is_some()
    }

    async fn speak(&self, text: &str) -> Result<()> {
        let command = self
            .command
            .as_ref()
            .context("No speech synthesizer configured")?;

        debug!(command = %command, chars = text.len(), "Speaking question");

        let mut child = Command::new(command)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn synthesizer '{}'", command))?;

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for synthesizer '{}'", command))?;

        if !status.success() {
            anyhow::bail!(
                "Synthesizer '{}' exited with code {}",
                command,
                status.code().unwrap_or(-1)
            );
        }

        Ok(())
    }
}

/// Whisper-style transcriber JSON output
#[derive(Debug, Deserialize)]
struct TranscriptOutput {
    text: String,
}

/// Recognizer that records audio with a capture command and transcribes
/// the recording with a whisper-style CLI.
pub struct CommandRecognizer {
    capture_cmd: Option<String>,
    capture_args: Vec<String>,
    transcriber_cmd: Option<String>,
    model: String,
}

impl CommandRecognizer {
    pub fn from_settings(settings: &SpeechSettings) -> Self {
        Self {
            capture_cmd: settings.capture_cmd.clone(),
            capture_args: settings.capture_args.clone(),
            transcriber_cmd: settings.transcriber_cmd.clone(),
            model: settings.transcriber_model.clone(),
        }
    }

    /// Record microphone audio into `audio_path` until the capture
    /// command exits (silence-detection is the capture command's job).
    async fn record(&self, command: &str, audio_path: &std::path::Path) -> Result<()> {
        let mut child = Command::new(command)
            .args(&self.capture_args)
            .arg(audio_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to spawn capture command '{}'", command))?;

        let status = child
            .wait()
            .await
            .with_context(|| format!("Failed to wait for capture command '{}'", command))?;

        if !status.success() {
            anyhow::bail!(
                "Capture command '{}' exited with code {}",
                command,
                status.code().unwrap_or(-1)
            );
        }

        Ok(())
    }

    async fn transcribe(&self, command: &str, audio_path: &std::path::Path) -> Result<String> {
        let output = Command::new(command)
            .arg("--model")
            .arg(&self.model)
            .arg("--output_format")
            .arg("json")
            .arg(audio_path)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run transcriber '{}'", command))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "Transcriber '{}' failed with code {}: {}",
                command,
                output.status.code().unwrap_or(-1),
                stderr.trim()
            );
        }

        let stdout =
            String::from_utf8(output.stdout).context("Transcriber output is not valid UTF-8")?;

        parse_transcript(&stdout)
    }
}

/// Pull the `text` field out of transcriber JSON; falls back to raw
/// stdout for transcribers that print plain text.
fn parse_transcript(stdout: &str) -> Result<String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(String::new());
    }

    match serde_json::from_str::<TranscriptOutput>(trimmed) {
        Ok(parsed) => Ok(parsed.text.trim().to_string()),
        Err(e) => {
            if trimmed.starts_with('{') {
                anyhow::bail!("Transcriber JSON missing 'text' field: {}", e);
            }
            Ok(trimmed.to_string())
        }
    }
}

#[async_trait]
impl SpeechRecognizer for CommandRecognizer {
    fn name(&self) -> &str {
        "command-recognizer"
    }

    fn is_supported(&self) -> bool {
        self.capture_cmd.is_some() && self.transcriber_cmd.is_some()
    }

    async fn listen(&self, deadline: Duration) -> Result<Option<String>> {
        let capture_cmd = self
            .capture_cmd
            .as_ref()
            .context("No capture command configured")?;
        let transcriber_cmd = self
            .transcriber_cmd
            .as_ref()
            .context("No transcriber command configured")?;

        let temp = tempfile::Builder::new()
            .prefix("placepro-answer-")
            .suffix(".wav")
            .tempfile()
            .context("Failed to create temp audio file")?;
        let audio_path = temp.path().to_path_buf();

        // The deadline covers recording only; transcription of audio that
        // arrived in time is allowed to finish.
        match timeout(deadline, self.record(capture_cmd, &audio_path)).await {
            Ok(result) => result?,
            Err(_) => {
                warn!(seconds = deadline.as_secs(), "Answer capture hit deadline");
                return Ok(None);
            }
        }

        let text = self.transcribe(transcriber_cmd, &audio_path).await?;
        debug!(chars = text.len(), "Transcript ready");
        Ok(Some(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synthesizer_unsupported_without_command() {
        let synth = CommandSynthesizer {
            command: None,
            args: Vec::new(),
        };
        assert!(!synth.is_supported());
    }

    #[test]
    fn test_recognizer_requires_both_commands() {
        let rec = CommandRecognizer {
            capture_cmd: Some("rec".to_string()),
            capture_args: Vec::new(),
            transcriber_cmd: None,
            model: "base".to_string(),
        };
        assert!(!rec.is_supported());

        let rec = CommandRecognizer {
            capture_cmd: Some("rec".to_string()),
            capture_args: Vec::new(),
            transcriber_cmd: Some("whisper".to_string()),
            model: "base".to_string(),
        };
        assert!(rec.is_supported());
    }

    #[test]
    fn test_parse_transcript_json() {
        let text = parse_transcript(r#"{"text": "  hello there  "}"#).unwrap();
        assert_eq!(text, "hello there");
    }

    #[test]
    fn test_parse_transcript_plain() {
        let text = parse_transcript("plain transcript\n").unwrap();
        assert_eq!(text, "plain transcript");
    }

    #[test]
    fn test_parse_transcript_empty() {
        assert_eq!(parse_transcript("").unwrap(), "");
        assert_eq!(parse_transcript("   \n").unwrap(), "");
    }

    #[test]
    fn test_parse_transcript_bad_json() {
        assert!(parse_transcript(r#"{"segments": []}"#).is_err());
    }

    #[tokio::test]
    async fn test_speak_with_true_command() {
        let synth = CommandSynthesizer::with_command("true", Vec::new());
        synth.speak("anything").await.unwrap();
    }

    #[tokio::test]
    async fn test_speak_failure_propagates() {
        let synth = CommandSynthesizer::with_command("false", Vec::new());
        assert!(synth.speak("anything").await.is_err());
    }
}
