//! OpenAI-compatible inference adapter
//!
//! Talks to a `/chat/completions` endpoint such as GitHub Models or Azure AI
//! Inference. Image parts are forwarded natively.

use super::{ErrorCode, ProviderAdapter, ProviderError};
use crate::catalog::{ModelCandidate, ProviderKind};
use crate::message::{ImageRef, NormalizedMessage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

const TEMPERATURE: f64 = 0.7;
const TOP_P: f64 = 1.0;
const UNEXPECTED_RESPONSE: &str = "Unexpected response from AI API";

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    messages: &'a [NormalizedMessage],
    temperature: f64,
    top_p: f64,
    model: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: Option<ErrorBody>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<ErrorCode>,
    message: Option<String>,
}

/// Adapter for OpenAI-compatible chat completion endpoints
pub struct InferenceAdapter {
    http: reqwest::Client,
    endpoint: String,
    token: String,
}

impl InferenceAdapter {
    pub fn new(http: reqwest::Client, endpoint: &str, token: &str) -> Self {
        Self {
            http,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.endpoint)
    }

    /// Map a non-success response into the classifier triple
    ///
    /// The error code falls back to the HTTP status when the body has none.
    fn error_from_response(status: u16, body: &str) -> ProviderError {
        let parsed = serde_json::from_str::<ErrorEnvelope>(body)
            .ok()
            .and_then(|envelope| envelope.error);

        let (code, message) = match parsed {
            Some(error) => (error.code, error.message),
            None => (None, None),
        };

        let message = message
            .filter(|m| !m.trim().is_empty())
            .or_else(|| (!body.trim().is_empty()).then(|| body.trim().to_string()))
            .unwrap_or_else(|| UNEXPECTED_RESPONSE.to_string());

        ProviderError::new(message)
            .with_status(status)
            .with_code(code.unwrap_or(ErrorCode::Numeric(i64::from(status))))
    }
}

#[async_trait]
impl ProviderAdapter for InferenceAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Inference
    }

    async fn invoke(
        &self,
        candidate: &ModelCandidate,
        messages: &[NormalizedMessage],
        _image_refs: &[ImageRef],
    ) -> Result<String, ProviderError> {
        let body = CompletionRequest {
            messages,
            temperature: TEMPERATURE,
            top_p: TOP_P,
            model: candidate.upstream_model(),
        };

        tracing::debug!(
            model_id = %candidate.id(),
            upstream_model = %candidate.upstream_model(),
            message_count = messages.len(),
            "Sending chat completion request"
        );

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let status = response.status();
        if !status.is_success() {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        status = status.as_u16(),
                        model_id = %candidate.id(),
                        "Failed to read error response body"
                    );
                    String::new()
                }
            };
            return Err(Self::error_from_response(status.as_u16(), &text));
        }

        let completion: CompletionResponse =
            response.json().await.map_err(ProviderError::transport)?;

        Ok(completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message)
            .and_then(|message| message.content)
            .unwrap_or_default())
    }
}
