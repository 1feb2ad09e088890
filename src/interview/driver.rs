//! Session runtime.
//!
//! [`SessionDriver`] owns the event loop: every async source (synthesis
//! completion, recognition results, the answer-cue timer, keyboard input,
//! submission results) posts [`SessionEvent`]s into one channel, the
//! state machine decides, and the driver performs the returned effects.
//! Speak/listen/timer work runs on spawned tasks whose handles the driver
//! keeps so Cancel/Stop effects can abort them.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::log::{SessionLog, SessionLogEvent};
use super::media::{MediaSource, MediaStream};
use super::session::{CaptureState, Effect, InterviewSession, SessionEvent};
use super::speech::{SpeechRecognizer, SpeechSynthesizer};
use crate::api::InterviewApi;

/// Drives one interview session to completion
pub struct SessionDriver {
    session: InterviewSession,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    recognizer: Arc<dyn SpeechRecognizer>,
    media_source: Arc<dyn MediaSource>,
    api: Arc<InterviewApi>,
    log: SessionLog,

    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,

    speak_task: Option<JoinHandle<()>>,
    listen_task: Option<JoinHandle<()>>,
    prompt_task: Option<JoinHandle<()>>,
    submit_task: Option<JoinHandle<()>>,

    media: Option<MediaStream>,
}

impl SessionDriver {
    pub fn new(
        session: InterviewSession,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        recognizer: Arc<dyn SpeechRecognizer>,
        media_source: Arc<dyn MediaSource>,
        api: Arc<InterviewApi>,
        log: SessionLog,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            session,
            synthesizer,
            recognizer,
            media_source,
            api,
            log,
            events_tx,
            events_rx,
            speak_task: None,
            listen_task: None,
            prompt_task: None,
            submit_task: None,
            media: None,
        }
    }

    /// Run the session until submission succeeds or the user exits
    #[instrument(skip(self), fields(interview_id = %self.session.interview_id()))]
    pub async fn run(&mut self) -> Result<()> {
        // Camera and microphone are acquired once, before any question.
        // Acquisition failure degrades to an audio-only session; answer
        // capture still goes through the recognizer's own capture command.
        match self.media_source.acquire().await {
            Ok(stream) => {
                info!(stream = stream.label(), "Media stream ready");
                self.media = Some(stream);
            }
            Err(e) => {
                warn!(error = %e, "Proceeding without a media stream");
                println!("! Camera/microphone preview unavailable: {}", e);
            }
        }

        self.log.append(SessionLogEvent::Started {
            interview_id: self.session.interview_id().to_string(),
            question_count: self.session.question_count(),
        })?;

        println!(
            "Interview started: {} questions. Press Enter for the next question, 'r' to retry after a mic error, 'q' to quit.",
            self.session.question_count()
        );

        let _input = spawn_input_reader(self.events_tx.clone());

        self.events_tx
            .send(SessionEvent::Begin)
            .context("Event channel closed before start")?;

        let mut finished = false;
        while !finished {
            let Some(event) = self.events_rx.recv().await else {
                break;
            };
            debug!(?event, state = ?self.session.state(), "Session event");

            self.log_event(&event)?;
            let effects = self.session.handle_event(event);

            for effect in effects {
                if self.perform(effect).await? {
                    finished = true;
                }
            }
        }

        self.teardown().await;
        Ok(())
    }

    /// Perform one effect; returns true when the session loop should end
    async fn perform(&mut self, effect: Effect) -> Result<bool> {
        match effect {
            Effect::CancelSpeech => {
                if let Some(task) = self.speak_task.take() {
                    task.abort();
                }
            }

            Effect::Speak { text } => {
                let index = self.session.current_index();
                println!(
                    "\nQuestion {}/{}: {}",
                    index + 1,
                    self.session.question_count(),
                    text
                );
                self.log.append(SessionLogEvent::QuestionStarted {
                    index,
                    question_id: self.session.current_question().id.clone(),
                })?;

                let synthesizer = Arc::clone(&self.synthesizer);
                let tx = self.events_tx.clone();
                self.speak_task = Some(tokio::spawn(async move {
                    let event = match synthesizer.speak(&text).await {
                        Ok(()) => SessionEvent::SynthesisFinished,
                        Err(e) => SessionEvent::SynthesisFailed {
                            reason: e.to_string(),
                        },
                    };
                    let _ = tx.send(event);
                }));
            }

            Effect::ScheduleAnswerPrompt { index, delay } => {
                // No playback happened for this question (synthesis
                // unavailable); show the text instead
                if self.speak_task.is_none() {
                    println!(
                        "\nQuestion {}/{}: {}",
                        index + 1,
                        self.session.question_count(),
                        self.session.current_question().text
                    );
                    self.log.append(SessionLogEvent::QuestionStarted {
                        index,
                        question_id: self.session.current_question().id.clone(),
                    })?;
                }

                if let Some(task) = self.prompt_task.take() {
                    task.abort();
                }
                let tx = self.events_tx.clone();
                self.prompt_task = Some(tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = tx.send(SessionEvent::PromptDelayElapsed { index });
                }));
            }

            Effect::StartListening { index, timeout } => {
                println!("Listening... answer now.");
                let recognizer = Arc::clone(&self.recognizer);
                let tx = self.events_tx.clone();
                self.listen_task = Some(tokio::spawn(async move {
                    // The index rides along so a result that lands after
                    // the user moved on cannot touch the wrong question
                    let event = match recognizer.listen(timeout).await {
                        Ok(Some(text)) => SessionEvent::TranscriptReceived { index, text },
                        Ok(None) => SessionEvent::ListenTimedOut { index },
                        Err(e) => SessionEvent::RecognitionFailed {
                            index,
                            reason: e.to_string(),
                        },
                    };
                    let _ = tx.send(event);
                }));
            }

            Effect::StopListening => {
                if let Some(task) = self.listen_task.take() {
                    task.abort();
                }
                if let Some(task) = self.prompt_task.take() {
                    task.abort();
                }
            }

            Effect::Warn { message } => {
                warn!("{}", message);
                println!("! {}", message);
            }

            Effect::Submit { payload } => {
                println!("Submitting responses...");
                self.log.append(SessionLogEvent::SubmissionAttempted {
                    genuine_answers: self.session.genuine_count(),
                })?;

                let api = Arc::clone(&self.api);
                let interview_id = self.session.interview_id().to_string();
                let tx = self.events_tx.clone();
                self.submit_task = Some(tokio::spawn(async move {
                    let event = match api.submit_responses(&interview_id, &payload).await {
                        Ok(()) => SessionEvent::SubmissionSucceeded,
                        Err(e) => SessionEvent::SubmissionFailed {
                            reason: e.to_string(),
                        },
                    };
                    let _ = tx.send(event);
                }));
            }

            Effect::ReleaseMedia => {
                if let Some(mut stream) = self.media.take() {
                    stream.release().await;
                }
            }

            Effect::Finished => {
                if self.session.state() == CaptureState::Submitted {
                    println!("Responses submitted. Session complete.");
                } else {
                    println!("Session ended.");
                }
                return Ok(true);
            }
        }

        Ok(false)
    }

    /// Mirror session-shaping events into the log
    fn log_event(&self, event: &SessionEvent) -> Result<()> {
        match event {
            SessionEvent::TranscriptReceived { index, text } => {
                self.log.append(SessionLogEvent::AnswerCaptured {
                    index: *index,
                    answer: text.trim().to_string(),
                    genuine: !text.trim().is_empty(),
                })?;
            }
            SessionEvent::ListenTimedOut { index } => {
                self.log.append(SessionLogEvent::AnswerCaptured {
                    index: *index,
                    answer: "No response recorded".to_string(),
                    genuine: false,
                })?;
            }
            SessionEvent::RecognitionFailed { index, reason } => {
                self.log.append(SessionLogEvent::MicError {
                    index: *index,
                    reason: reason.clone(),
                })?;
            }
            SessionEvent::SubmissionSucceeded => {
                self.log.append(SessionLogEvent::SubmissionSucceeded)?;
            }
            SessionEvent::SubmissionFailed { reason } => {
                self.log.append(SessionLogEvent::SubmissionFailed {
                    reason: reason.clone(),
                })?;
            }
            SessionEvent::ExitRequested => {
                self.log.append(SessionLogEvent::Exited)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Abort every outstanding task and free the devices. Runs on every
    /// exit path, including submission success (which already released
    /// the stream via its effect).
    async fn teardown(&mut self) {
        for task in [
            self.speak_task.take(),
            self.listen_task.take(),
            self.prompt_task.take(),
            self.submit_task.take(),
        ]
        .into_iter()
        .flatten()
        {
            task.abort();
        }

        if let Some(mut stream) = self.media.take() {
            stream.release().await;
        }

        debug!("Session teardown complete");
    }
}

/// Read control keys from stdin on a blocking thread:
/// Enter advances, 'r' retries after a mic error, 'q' exits.
fn spawn_input_reader(tx: mpsc::UnboundedSender<SessionEvent>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let stdin = std::io::stdin();
        let mut line = String::new();

        loop {
            line.clear();
            match stdin.read_line(&mut line) {
                Ok(0) => break,
                Ok(_) => {}
                Err(_) => break,
            }

            let event = match line.trim() {
                "" | "n" => SessionEvent::NextRequested,
                "r" => SessionEvent::RetryRequested,
                "q" => SessionEvent::ExitRequested,
                other => {
                    debug!(input = other, "Ignoring unrecognized control key");
                    continue;
                }
            };

            let quit = matches!(event, SessionEvent::ExitRequested);
            if tx.send(event).is_err() || quit {
                break;
            }
        }
    })
}
