//! Camera/microphone stream lifecycle.
//!
//! A session acquires exactly one [`MediaStream`] up front and releases it
//! on submission or exit. The stream is a configured subprocess (camera
//! preview, mic monitor) kept alive for the whole session; releasing it
//! kills the process so the device indicator goes off.

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::config::SpeechSettings;

/// Hands out media streams. One stream per session.
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn name(&self) -> &str;

    /// Acquire camera and microphone access for a session
    async fn acquire(&self) -> Result<MediaStream>;
}

/// A live capture stream. [`MediaStream::release`] is idempotent and also
/// runs on drop, so the devices are freed on every exit path.
pub struct MediaStream {
    process: Option<Child>,
    label: String,
}

impl MediaStream {
    /// A stream without a backing process, for setups where capture is
    /// handled entirely by the recognizer's capture command.
    pub fn passthrough() -> Self {
        Self {
            process: None,
            label: "passthrough".to_string(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Stop the backing process and free the devices
    pub async fn release(&mut self) {
        if let Some(mut child) = self.process.take() {
            debug!(stream = %self.label, "Releasing media stream");
            if let Err(e) = child.kill().await {
                warn!(stream = %self.label, error = %e, "Failed to kill media process");
            }
        }
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        // Fallback for paths that skipped release(); kill_on_drop on the
        // Child covers the actual process teardown.
        if self.process.is_some() {
            warn!(stream = %self.label, "Media stream dropped without release");
        }
    }
}

/// Media source backed by a configured command (e.g. an ffplay preview)
pub struct CommandMediaSource {
    command: Option<String>,
    args: Vec<String>,
}

impl CommandMediaSource {
    pub fn from_settings(settings: &SpeechSettings) -> Self {
        Self {
            command: settings.media_cmd.clone(),
            args: settings.media_args.clone(),
        }
    }
}

#[async_trait]
impl MediaSource for CommandMediaSource {
    fn name(&self) -> &str {
        "command-media"
    }

    async fn acquire(&self) -> Result<MediaStream> {
        let Some(command) = self.command.as_ref() else {
            debug!("No media command configured, using passthrough stream");
            return Ok(MediaStream::passthrough());
        };

        let child = Command::new(command)
            .args(&self.args)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("Failed to start media stream '{}'", command))?;

        debug!(command = %command, "Media stream acquired");
        Ok(MediaStream {
            process: Some(child),
            label: command.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_passthrough_source_without_command() {
        let source = CommandMediaSource {
            command: None,
            args: Vec::new(),
        };
        let mut stream = source.acquire().await.unwrap();
        assert_eq!(stream.label(), "passthrough");
        stream.release().await;
    }

    #[tokio::test]
    async fn test_command_stream_release() {
        let source = CommandMediaSource {
            command: Some("sleep".to_string()),
            args: vec!["30".to_string()],
        };
        let mut stream = source.acquire().await.unwrap();
        assert_eq!(stream.label(), "sleep");

        stream.release().await;
        // Second release is a no-op
        stream.release().await;
    }

    #[tokio::test]
    async fn test_missing_command_errors() {
        let source = CommandMediaSource {
            command: Some("placepro-no-such-binary".to_string()),
            args: Vec::new(),
        };
        assert!(source.acquire().await.is_err());
    }
}
