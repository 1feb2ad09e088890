//! Interview session state machine.
//!
//! Pure transition core: [`InterviewSession::handle_event`] consumes one
//! [`SessionEvent`], mutates the single `state` field, and returns the
//! side effects the runtime must perform. All async sources (synthesis,
//! recognition, timers, user input) are funneled through the same event
//! type, and every listen-scoped event carries the question index
//! snapshotted when listening started, so a result arriving after the
//! user has advanced is filtered here rather than racing a live variable.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tracing::debug;

use super::{
    CapturedAnswer, QuestionPrompt, ResponseEntry, ResponseRecord, SentinelAnswer,
    SubmissionPayload,
};

/// Errors raised when constructing a session
#[derive(Debug, Error)]
pub enum SessionError {
    /// There is no text-input fallback, so a missing recognizer blocks
    /// the session entirely.
    #[error("Speech recognition is not available; the interview cannot be taken")]
    RecognitionUnsupported,

    #[error("Interview has no questions")]
    NoQuestions,
}

/// Transient per-question capture phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    /// Waiting for the session to begin
    Idle,

    /// Question playback in progress
    Speaking,

    /// Short "now answer" cue before capture starts
    PromptingAnswer,

    /// Capturing; carries the question index snapshotted at listen-start
    Listening { index: usize },

    /// An answer (genuine or sentinel) resolved for the current question
    Captured,

    /// Listening ended with no speech within the bound
    TimedOut,

    /// Recognizer fault; a retry re-enters Listening without replaying
    MicError,

    /// Final POST in flight
    Submitting,

    /// Terminal: responses accepted by the backend
    Submitted,
}

/// What the engines can do. Checked once at session start.
#[derive(Debug, Clone, Copy)]
pub struct EngineCapabilities {
    pub synthesis: bool,
    pub recognition: bool,
}

/// Timing knobs (see config::SessionSettings)
#[derive(Debug, Clone, Copy)]
pub struct SessionTimings {
    pub prompt_delay: Duration,
    pub answer_timeout: Duration,
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self {
            prompt_delay: Duration::from_millis(500),
            answer_timeout: Duration::from_secs(60),
        }
    }
}

/// Everything that can happen to a session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Question list and media stream are both available
    Begin,

    /// Speech synthesis finished playing the current question
    SynthesisFinished,

    /// Speech synthesis failed or was unavailable mid-question
    SynthesisFailed { reason: String },

    /// The "now answer" cue delay elapsed for the given question
    PromptDelayElapsed { index: usize },

    /// The recognizer produced a transcript for the question that was
    /// active when listening started
    TranscriptReceived { index: usize, text: String },

    /// Recognizer engine fault while capturing the given question
    RecognitionFailed { index: usize, reason: String },

    /// No transcript arrived within the answer timeout
    ListenTimedOut { index: usize },

    /// User pressed "next question" (or "submit" on the last question)
    NextRequested,

    /// User asked to retry listening after a mic error
    RetryRequested,

    /// The final POST succeeded
    SubmissionSucceeded,

    /// The final POST failed; the session stays live for resubmission
    SubmissionFailed { reason: String },

    /// User is leaving the session
    ExitRequested,
}

/// Side effects the runtime must perform after a transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Cancel any in-flight utterance (only one may be active at a time)
    CancelSpeech,

    /// Play the given question text
    Speak { text: String },

    /// Deliver `PromptDelayElapsed { index }` after `delay`
    ScheduleAnswerPrompt { index: usize, delay: Duration },

    /// Start capture for `index`, bounded by `timeout`. Results and the
    /// timeout must be reported with this same index.
    StartListening { index: usize, timeout: Duration },

    /// Stop the recognizer and clear the pending timeout
    StopListening,

    /// Non-blocking user notification
    Warn { message: String },

    /// Perform the final POST
    Submit { payload: SubmissionPayload },

    /// Tear down the camera/microphone stream
    ReleaseMedia,

    /// Session is over; the runtime should exit its loop
    Finished,
}

/// The interview session: ordered questions, a dense-on-submit response
/// map, and one mutable capture state.
pub struct InterviewSession {
    interview_id: String,
    questions: Vec<QuestionPrompt>,
    current: usize,
    responses: BTreeMap<usize, ResponseRecord>,
    state: CaptureState,
    timings: SessionTimings,
    capabilities: EngineCapabilities,
}

impl InterviewSession {
    /// Create a session. Fails fast when recognition is unavailable or
    /// the question list is empty.
    pub fn new(
        interview_id: String,
        questions: Vec<QuestionPrompt>,
        capabilities: EngineCapabilities,
        timings: SessionTimings,
    ) -> Result<Self, SessionError> {
        if !capabilities.recognition {
            return Err(SessionError::RecognitionUnsupported);
        }
        if questions.is_empty() {
            return Err(SessionError::NoQuestions);
        }

        Ok(Self {
            interview_id,
            questions,
            current: 0,
            responses: BTreeMap::new(),
            state: CaptureState::Idle,
            timings,
            capabilities,
        })
    }

    pub fn interview_id(&self) -> &str {
        &self.interview_id
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn current_question(&self) -> &QuestionPrompt {
        &self.questions[self.current]
    }

    pub fn is_last_question(&self) -> bool {
        self.current + 1 == self.questions.len()
    }

    pub fn responses(&self) -> &BTreeMap<usize, ResponseRecord> {
        &self.responses
    }

    /// Number of genuine (non-sentinel) answers captured so far
    pub fn genuine_count(&self) -> usize {
        self.responses
            .values()
            .filter(|r| r.answer.is_genuine())
            .count()
    }

    /// Apply one event and return the effects to perform
    pub fn handle_event(&mut self, event: SessionEvent) -> Vec<Effect> {
        match event {
            SessionEvent::Begin => self.on_begin(),
            SessionEvent::SynthesisFinished => self.on_synthesis_finished(),
            SessionEvent::SynthesisFailed { reason } => self.on_synthesis_failed(reason),
            SessionEvent::PromptDelayElapsed { index } => self.on_prompt_delay(index),
            SessionEvent::TranscriptReceived { index, text } => self.on_transcript(index, text),
            SessionEvent::RecognitionFailed { index, reason } => {
                self.on_recognition_failed(index, reason)
            }
            SessionEvent::ListenTimedOut { index } => self.on_listen_timeout(index),
            SessionEvent::NextRequested => self.on_next(),
            SessionEvent::RetryRequested => self.on_retry(),
            SessionEvent::SubmissionSucceeded => self.on_submission_succeeded(),
            SessionEvent::SubmissionFailed { reason } => self.on_submission_failed(reason),
            SessionEvent::ExitRequested => self.on_exit(),
        }
    }

    fn on_begin(&mut self) -> Vec<Effect> {
        if self.state != CaptureState::Idle {
            return Vec::new();
        }
        self.start_current_question()
    }

    /// Enter Speaking for the current question, or degrade straight to
    /// the answer prompt when synthesis cannot play it.
    fn start_current_question(&mut self) -> Vec<Effect> {
        let text = self.questions[self.current].text.clone();

        if !self.capabilities.synthesis || text.trim().is_empty() {
            self.state = CaptureState::PromptingAnswer;
            return vec![
                Effect::CancelSpeech,
                Effect::Warn {
                    message: "Question playback unavailable; answer when ready".to_string(),
                },
                Effect::ScheduleAnswerPrompt {
                    index: self.current,
                    delay: self.timings.prompt_delay,
                },
            ];
        }

        self.state = CaptureState::Speaking;
        vec![Effect::CancelSpeech, Effect::Speak { text }]
    }

    fn on_synthesis_finished(&mut self) -> Vec<Effect> {
        if self.state != CaptureState::Speaking {
            return Vec::new();
        }

        self.state = CaptureState::PromptingAnswer;
        vec![Effect::ScheduleAnswerPrompt {
            index: self.current,
            delay: self.timings.prompt_delay,
        }]
    }

    fn on_synthesis_failed(&mut self, reason: String) -> Vec<Effect> {
        if self.state != CaptureState::Speaking {
            return Vec::new();
        }

        self.state = CaptureState::PromptingAnswer;
        vec![
            Effect::Warn {
                message: format!("Question playback failed: {}", reason),
            },
            Effect::ScheduleAnswerPrompt {
                index: self.current,
                delay: self.timings.prompt_delay,
            },
        ]
    }

    fn on_prompt_delay(&mut self, index: usize) -> Vec<Effect> {
        // A cue scheduled for an earlier question must not start capture
        if self.state != CaptureState::PromptingAnswer || index != self.current {
            debug!(index, current = self.current, "Ignoring stale answer cue");
            return Vec::new();
        }

        self.state = CaptureState::Listening { index };
        vec![Effect::StartListening {
            index,
            timeout: self.timings.answer_timeout,
        }]
    }

    fn on_transcript(&mut self, index: usize, text: String) -> Vec<Effect> {
        let live = matches!(self.state, CaptureState::Listening { index: active } if active == index);

        if !live {
            // Stale result: apply to the slot it was captured for, and
            // only if that slot is still unanswered. Never the live slot.
            if index < self.questions.len() && !self.responses.contains_key(&index) {
                let answer = Self::classify_transcript(&text);
                debug!(index, "Applying late transcript to its original slot");
                self.record_answer(index, answer);
            } else {
                debug!(index, "Discarding stale transcript");
            }
            return Vec::new();
        }

        let answer = Self::classify_transcript(&text);
        let mut effects = vec![Effect::StopListening];

        if !answer.is_genuine() {
            effects.push(Effect::Warn {
                message: "No clear speech detected".to_string(),
            });
        }

        self.record_answer(index, answer);
        self.state = CaptureState::Captured;
        effects
    }

    fn classify_transcript(text: &str) -> CapturedAnswer {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            CapturedAnswer::Sentinel(SentinelAnswer::NoClearSpeech)
        } else {
            CapturedAnswer::Genuine(trimmed.to_string())
        }
    }

    fn on_recognition_failed(&mut self, index: usize, reason: String) -> Vec<Effect> {
        let relevant = match self.state {
            CaptureState::Listening { index: active } => active == index,
            CaptureState::PromptingAnswer => index == self.current,
            _ => false,
        };
        if !relevant {
            return Vec::new();
        }

        self.state = CaptureState::MicError;
        vec![
            Effect::StopListening,
            Effect::Warn {
                message: format!("Microphone error: {}. Retry to answer again.", reason),
            },
        ]
    }

    fn on_listen_timeout(&mut self, index: usize) -> Vec<Effect> {
        let live = matches!(self.state, CaptureState::Listening { index: active } if active == index);
        if !live {
            debug!(index, "Ignoring stale listen timeout");
            return Vec::new();
        }

        self.record_answer(index, CapturedAnswer::Sentinel(SentinelAnswer::NotRecorded));
        self.state = CaptureState::TimedOut;
        vec![
            Effect::StopListening,
            Effect::Warn {
                message: "No response recorded for this question".to_string(),
            },
        ]
    }

    fn on_next(&mut self) -> Vec<Effect> {
        match self.state {
            // Advancing mid-speech or mid-capture is rejected, not queued
            CaptureState::Speaking | CaptureState::Listening { .. } => {
                return vec![Effect::Warn {
                    message: "Please wait for the current question to finish".to_string(),
                }];
            }
            CaptureState::Submitting | CaptureState::Submitted => return Vec::new(),
            _ => {}
        }

        if self.is_last_question() {
            return self.try_submit();
        }

        self.current += 1;
        self.start_current_question()
    }

    fn on_retry(&mut self) -> Vec<Effect> {
        if self.state != CaptureState::MicError {
            return Vec::new();
        }

        // Re-enter Listening without replaying the question
        let index = self.current;
        self.state = CaptureState::Listening { index };
        vec![Effect::StartListening {
            index,
            timeout: self.timings.answer_timeout,
        }]
    }

    /// Build the dense payload and submit, unless no genuine answer exists
    fn try_submit(&mut self) -> Vec<Effect> {
        if self.genuine_count() == 0 {
            return vec![Effect::Warn {
                message: "Cannot submit: no answers were recorded".to_string(),
            }];
        }

        let payload = self.build_payload();
        self.state = CaptureState::Submitting;
        vec![Effect::Submit { payload }]
    }

    /// Dense response array across every question index; still-missing
    /// slots are back-filled with the "no response provided" sentinel.
    pub fn build_payload(&self) -> SubmissionPayload {
        let responses = self
            .questions
            .iter()
            .enumerate()
            .map(|(index, question)| match self.responses.get(&index) {
                Some(record) => ResponseEntry {
                    question_index: index,
                    question_id: record.question_id.clone(),
                    answer: record.answer.text().to_string(),
                    timestamp: record.captured_at,
                },
                None => ResponseEntry {
                    question_index: index,
                    question_id: question.id.clone(),
                    answer: SentinelAnswer::NotProvided.as_str().to_string(),
                    timestamp: Utc::now(),
                },
            })
            .collect();

        SubmissionPayload {
            responses,
            status: "completed".to_string(),
        }
    }

    fn on_submission_succeeded(&mut self) -> Vec<Effect> {
        if self.state != CaptureState::Submitting {
            return Vec::new();
        }

        self.state = CaptureState::Submitted;
        vec![Effect::ReleaseMedia, Effect::Finished]
    }

    fn on_submission_failed(&mut self, reason: String) -> Vec<Effect> {
        if self.state != CaptureState::Submitting {
            return Vec::new();
        }

        // Responses are preserved; pressing next again resubmits
        self.state = CaptureState::Captured;
        vec![Effect::Warn {
            message: format!("Submission failed: {}. Press next to retry.", reason),
        }]
    }

    /// Teardown: cancel everything, release the stream, end the loop
    fn on_exit(&mut self) -> Vec<Effect> {
        vec![
            Effect::CancelSpeech,
            Effect::StopListening,
            Effect::ReleaseMedia,
            Effect::Finished,
        ]
    }

    fn record_answer(&mut self, index: usize, answer: CapturedAnswer) {
        let question_id = self.questions[index].id.clone();
        self.responses.insert(
            index,
            ResponseRecord {
                question_id,
                answer,
                captured_at: Utc::now(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(n: usize) -> Vec<QuestionPrompt> {
        (0..n)
            .map(|i| QuestionPrompt {
                id: format!("q{}", i),
                text: format!("Question number {}", i),
            })
            .collect()
    }

    fn full_caps() -> EngineCapabilities {
        EngineCapabilities {
            synthesis: true,
            recognition: true,
        }
    }

    fn session(n: usize) -> InterviewSession {
        InterviewSession::new(
            "iv-1".to_string(),
            questions(n),
            full_caps(),
            SessionTimings::default(),
        )
        .unwrap()
    }

    /// Drive a session from question start to Listening
    fn drive_to_listening(session: &mut InterviewSession) {
        session.handle_event(SessionEvent::SynthesisFinished);
        session.handle_event(SessionEvent::PromptDelayElapsed {
            index: session.current_index(),
        });
    }

    #[test]
    fn test_recognition_required() {
        let result = InterviewSession::new(
            "iv-1".to_string(),
            questions(2),
            EngineCapabilities {
                synthesis: true,
                recognition: false,
            },
            SessionTimings::default(),
        );
        assert!(matches!(result, Err(SessionError::RecognitionUnsupported)));
    }

    #[test]
    fn test_begin_speaks_first_question() {
        let mut s = session(2);
        let effects = s.handle_event(SessionEvent::Begin);

        assert_eq!(s.state(), CaptureState::Speaking);
        assert!(effects.contains(&Effect::CancelSpeech));
        assert!(matches!(
            &effects[1],
            Effect::Speak { text } if text == "Question number 0"
        ));
    }

    #[test]
    fn test_no_synthesis_degrades_to_prompt() {
        let mut s = InterviewSession::new(
            "iv-1".to_string(),
            questions(1),
            EngineCapabilities {
                synthesis: false,
                recognition: true,
            },
            SessionTimings::default(),
        )
        .unwrap();

        let effects = s.handle_event(SessionEvent::Begin);
        assert_eq!(s.state(), CaptureState::PromptingAnswer);
        assert!(effects
            .iter()
            .any(|e| matches!(e, Effect::ScheduleAnswerPrompt { index: 0, .. })));
        assert!(effects.iter().any(|e| matches!(e, Effect::Warn { .. })));
    }

    #[test]
    fn test_prompt_delay_starts_listening_with_snapshot() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        s.handle_event(SessionEvent::SynthesisFinished);
        assert_eq!(s.state(), CaptureState::PromptingAnswer);

        let effects = s.handle_event(SessionEvent::PromptDelayElapsed { index: 0 });
        assert_eq!(s.state(), CaptureState::Listening { index: 0 });
        assert!(matches!(
            effects[0],
            Effect::StartListening { index: 0, .. }
        ));
    }

    #[test]
    fn test_stale_prompt_delay_ignored() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        s.handle_event(SessionEvent::SynthesisFinished);

        let effects = s.handle_event(SessionEvent::PromptDelayElapsed { index: 1 });
        assert!(effects.is_empty());
        assert_eq!(s.state(), CaptureState::PromptingAnswer);
    }

    #[test]
    fn test_transcript_captures_answer() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        let effects = s.handle_event(SessionEvent::TranscriptReceived {
            index: 0,
            text: "  I enjoy systems work  ".to_string(),
        });

        assert_eq!(s.state(), CaptureState::Captured);
        assert!(effects.contains(&Effect::StopListening));
        assert_eq!(
            s.responses()[&0].answer,
            CapturedAnswer::Genuine("I enjoy systems work".to_string())
        );
    }

    #[test]
    fn test_empty_transcript_is_no_clear_speech() {
        let mut s = session(1);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        s.handle_event(SessionEvent::TranscriptReceived {
            index: 0,
            text: "   ".to_string(),
        });

        assert_eq!(s.state(), CaptureState::Captured);
        assert_eq!(
            s.responses()[&0].answer,
            CapturedAnswer::Sentinel(SentinelAnswer::NoClearSpeech)
        );
        assert_eq!(s.genuine_count(), 0);
    }

    #[test]
    fn test_advance_rejected_while_speaking() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        assert_eq!(s.state(), CaptureState::Speaking);

        let effects = s.handle_event(SessionEvent::NextRequested);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.state(), CaptureState::Speaking);
        assert!(matches!(effects[0], Effect::Warn { .. }));
    }

    #[test]
    fn test_advance_rejected_while_listening() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        let effects = s.handle_event(SessionEvent::NextRequested);
        assert_eq!(s.current_index(), 0);
        assert_eq!(s.state(), CaptureState::Listening { index: 0 });
        assert!(matches!(effects[0], Effect::Warn { .. }));
    }

    #[test]
    fn test_timeout_records_sentinel_and_allows_advance() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        s.handle_event(SessionEvent::ListenTimedOut { index: 0 });
        assert_eq!(s.state(), CaptureState::TimedOut);
        assert_eq!(
            s.responses()[&0].answer,
            CapturedAnswer::Sentinel(SentinelAnswer::NotRecorded)
        );

        let effects = s.handle_event(SessionEvent::NextRequested);
        assert_eq!(s.current_index(), 1);
        assert!(effects.iter().any(|e| matches!(e, Effect::Speak { .. })));
    }

    #[test]
    fn test_stale_timeout_ignored() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        s.handle_event(SessionEvent::TranscriptReceived {
            index: 0,
            text: "an answer".to_string(),
        });
        // Timeout for question 0 fires after capture resolved
        let effects = s.handle_event(SessionEvent::ListenTimedOut { index: 0 });
        assert!(effects.is_empty());
        assert_eq!(
            s.responses()[&0].answer,
            CapturedAnswer::Genuine("an answer".to_string())
        );
    }

    #[test]
    fn test_stale_transcript_never_touches_current_slot() {
        let mut s = session(3);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        // Question 0 times out, user advances, question 1 starts listening
        s.handle_event(SessionEvent::ListenTimedOut { index: 0 });
        s.handle_event(SessionEvent::NextRequested);
        drive_to_listening(&mut s);
        assert_eq!(s.state(), CaptureState::Listening { index: 1 });

        // Late transcript for question 0 arrives now
        s.handle_event(SessionEvent::TranscriptReceived {
            index: 0,
            text: "late answer".to_string(),
        });

        // Slot 0 already held the timeout sentinel, so the late result is
        // discarded; slot 1 is untouched and still listening
        assert_eq!(
            s.responses()[&0].answer,
            CapturedAnswer::Sentinel(SentinelAnswer::NotRecorded)
        );
        assert!(!s.responses().contains_key(&1));
        assert_eq!(s.state(), CaptureState::Listening { index: 1 });
    }

    #[test]
    fn test_stale_transcript_fills_vacant_original_slot() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        // Mic error leaves slot 0 vacant; user advances past it
        s.handle_event(SessionEvent::RecognitionFailed {
            index: 0,
            reason: "no-speech".to_string(),
        });
        s.handle_event(SessionEvent::NextRequested);
        drive_to_listening(&mut s);

        // Late result for question 0 lands in slot 0, not slot 1
        s.handle_event(SessionEvent::TranscriptReceived {
            index: 0,
            text: "delayed answer".to_string(),
        });

        assert_eq!(
            s.responses()[&0].answer,
            CapturedAnswer::Genuine("delayed answer".to_string())
        );
        assert!(!s.responses().contains_key(&1));
    }

    #[test]
    fn test_mic_error_retry_relists_without_replay() {
        let mut s = session(1);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        s.handle_event(SessionEvent::RecognitionFailed {
            index: 0,
            reason: "permission denied".to_string(),
        });
        assert_eq!(s.state(), CaptureState::MicError);

        let effects = s.handle_event(SessionEvent::RetryRequested);
        assert_eq!(s.state(), CaptureState::Listening { index: 0 });
        // No Speak effect: the question is not replayed
        assert!(!effects.iter().any(|e| matches!(e, Effect::Speak { .. })));
        assert!(matches!(
            effects[0],
            Effect::StartListening { index: 0, .. }
        ));
    }

    #[test]
    fn test_submission_rejected_with_zero_genuine_answers() {
        let mut s = session(1);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);
        s.handle_event(SessionEvent::ListenTimedOut { index: 0 });

        let effects = s.handle_event(SessionEvent::NextRequested);
        assert!(matches!(effects[0], Effect::Warn { .. }));
        assert!(!effects.iter().any(|e| matches!(e, Effect::Submit { .. })));
        assert_ne!(s.state(), CaptureState::Submitting);
    }

    #[test]
    fn test_submission_payload_is_dense() {
        let mut s = session(3);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);
        s.handle_event(SessionEvent::TranscriptReceived {
            index: 0,
            text: "first".to_string(),
        });
        // Skip straight past questions 1 and 2 without capturing
        s.handle_event(SessionEvent::NextRequested);
        s.handle_event(SessionEvent::SynthesisFinished);
        s.handle_event(SessionEvent::NextRequested);
        s.handle_event(SessionEvent::SynthesisFinished);

        let effects = s.handle_event(SessionEvent::NextRequested);
        let payload = match &effects[0] {
            Effect::Submit { payload } => payload.clone(),
            other => panic!("expected Submit, got {:?}", other),
        };

        assert_eq!(payload.responses.len(), 3);
        for (i, entry) in payload.responses.iter().enumerate() {
            assert_eq!(entry.question_index, i);
        }
        assert_eq!(payload.responses[0].answer, "first");
        assert_eq!(payload.responses[1].answer, "No response provided");
        assert_eq!(payload.responses[2].answer, "No response provided");
        assert_eq!(payload.status, "completed");
    }

    #[test]
    fn test_submission_failure_keeps_session_alive() {
        let mut s = session(1);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);
        s.handle_event(SessionEvent::TranscriptReceived {
            index: 0,
            text: "answer".to_string(),
        });

        s.handle_event(SessionEvent::NextRequested);
        assert_eq!(s.state(), CaptureState::Submitting);

        s.handle_event(SessionEvent::SubmissionFailed {
            reason: "network".to_string(),
        });
        assert_eq!(s.state(), CaptureState::Captured);
        assert_eq!(s.genuine_count(), 1);

        // Retrying submission works with preserved answers
        let effects = s.handle_event(SessionEvent::NextRequested);
        assert!(matches!(effects[0], Effect::Submit { .. }));
    }

    #[test]
    fn test_submission_success_releases_media() {
        let mut s = session(1);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);
        s.handle_event(SessionEvent::TranscriptReceived {
            index: 0,
            text: "answer".to_string(),
        });
        s.handle_event(SessionEvent::NextRequested);

        let effects = s.handle_event(SessionEvent::SubmissionSucceeded);
        assert_eq!(s.state(), CaptureState::Submitted);
        assert_eq!(effects, vec![Effect::ReleaseMedia, Effect::Finished]);
    }

    #[test]
    fn test_exit_tears_everything_down() {
        let mut s = session(2);
        s.handle_event(SessionEvent::Begin);
        drive_to_listening(&mut s);

        let effects = s.handle_event(SessionEvent::ExitRequested);
        assert!(effects.contains(&Effect::CancelSpeech));
        assert!(effects.contains(&Effect::StopListening));
        assert!(effects.contains(&Effect::ReleaseMedia));
        assert!(effects.contains(&Effect::Finished));
    }
}
