//! HTTP client for the interview endpoints.

use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::ApiError;
use crate::interview::{QuestionPrompt, SubmissionPayload};

/// `{success, data, message}` envelope used by the placement backend
#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    success: bool,
    data: Option<T>,
    message: Option<String>,
}

/// Interview document as returned by the backend
#[derive(Debug, Clone, Deserialize)]
pub struct InterviewDocument {
    #[serde(rename = "_id")]
    pub id: String,
    pub questions: Vec<QuestionPrompt>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Client for `/api/user/ai-interview`
pub struct InterviewApi {
    base_url: String,
    client: reqwest::Client,
}

impl InterviewApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }

        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    fn interview_url(&self, interview_id: &str) -> String {
        format!("{}/api/user/ai-interview/{}", self.base_url, interview_id)
    }

    /// Fetch an interview with its ordered question list
    #[instrument(skip(self))]
    pub async fn fetch_interview(&self, interview_id: &str) -> Result<InterviewDocument, ApiError> {
        let response = self
            .client
            .get(self.interview_url(interview_id))
            .send()
            .await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::InterviewNotFound(interview_id.to_string()));
        }

        let envelope: ApiEnvelope<InterviewDocument> = response.json().await?;
        let document = unwrap_envelope(envelope)?;

        debug!(
            interview_id,
            questions = document.questions.len(),
            "Fetched interview"
        );
        Ok(document)
    }

    /// Submit the dense response array for an interview
    #[instrument(skip(self, payload), fields(responses = payload.responses.len()))]
    pub async fn submit_responses(
        &self,
        interview_id: &str,
        payload: &SubmissionPayload,
    ) -> Result<(), ApiError> {
        let url = format!("{}/response", self.interview_url(interview_id));

        let response = self.client.post(url).json(payload).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(ApiError::InterviewNotFound(interview_id.to_string()));
        }

        let envelope: ApiEnvelope<serde_json::Value> = response.json().await?;
        unwrap_envelope(envelope)?;

        debug!(interview_id, "Responses submitted");
        Ok(())
    }
}

fn unwrap_envelope<T>(envelope: ApiEnvelope<T>) -> Result<T, ApiError>
where
    T: Default,
{
    if !envelope.success {
        return Err(ApiError::Rejected(
            envelope
                .message
                .unwrap_or_else(|| "unknown backend error".to_string()),
        ));
    }

    Ok(envelope.data.unwrap_or_default())
}

impl Default for InterviewDocument {
    fn default() -> Self {
        Self {
            id: String::new(),
            questions: Vec::new(),
            status: None,
        }
    }
}
