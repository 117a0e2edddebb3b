//! Bytez adapter
//!
//! Bytez-hosted models take text-only messages. Multi-part messages are
//! collapsed to their text with a note counting the attached images.

use super::{ErrorCode, ProviderAdapter, ProviderError};
use crate::catalog::{ModelCandidate, ProviderKind};
use crate::message::{ImageRef, MessageContent, NormalizedMessage, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
struct TextMessage {
    role: Role,
    content: String,
}

#[derive(Debug, Serialize)]
struct RunRequest {
    messages: Vec<TextMessage>,
}

#[derive(Debug, Default, Deserialize)]
struct RunResponse {
    #[serde(default)]
    error: Option<Value>,
    #[serde(default)]
    output: Option<Value>,
}

/// Adapter for Bytez model runs
pub struct BytezAdapter {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl BytezAdapter {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn run_url(&self, candidate: &ModelCandidate) -> String {
        format!("{}/{}", self.base_url, candidate.upstream_model())
    }

    /// Flatten a message to plain text, noting any images it carried
    fn to_text_message(message: &NormalizedMessage) -> TextMessage {
        let content = match &message.content {
            MessageContent::Text(text) => text.clone(),
            parts @ MessageContent::Parts(_) => {
                let image_count = parts.image_count();
                if image_count > 0 {
                    format!(
                        "{}\n\n[{} image(s) attached - image analysis may be limited]",
                        parts.text(),
                        image_count
                    )
                } else {
                    parts.text().to_string()
                }
            }
        };
        TextMessage {
            role: message.role,
            content,
        }
    }

    /// Map the Bytez `error` value into the classifier triple
    ///
    /// The value is either a bare string or an object carrying `message` and
    /// a `code` or `status`.
    fn error_from_value(error: &Value, http_status: Option<u16>) -> ProviderError {
        let (message, code) = match error {
            Value::String(text) => (text.clone(), None),
            Value::Object(fields) => {
                let message = fields
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string());
                let code = fields
                    .get("code")
                    .filter(|v| !v.is_null())
                    .or_else(|| fields.get("status"))
                    .and_then(code_from_value);
                (message, code)
            }
            other => (other.to_string(), None),
        };

        let mut err = ProviderError::new(message);
        if let Some(code) = code {
            err = err.with_code(code);
        }
        if let Some(status) = http_status {
            err = err.with_status(status);
        }
        err
    }

    /// Pull reply text out of `output`
    ///
    /// Objects are searched for `content`, `message`, then `text`; anything
    /// else is returned as its JSON text.
    fn text_from_output(output: Option<Value>) -> String {
        match output {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text,
            Some(Value::Object(fields)) => ["content", "message", "text"]
                .iter()
                .find_map(|key| fields.get(*key).and_then(Value::as_str))
                .map(str::to_string)
                .unwrap_or_else(|| Value::Object(fields).to_string()),
            Some(other) => other.to_string(),
        }
    }
}

fn code_from_value(value: &Value) -> Option<ErrorCode> {
    match value {
        Value::Number(n) => n.as_i64().map(ErrorCode::Numeric),
        Value::String(s) => Some(ErrorCode::Text(s.clone())),
        _ => None,
    }
}

#[async_trait]
impl ProviderAdapter for BytezAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Bytez
    }

    async fn invoke(
        &self,
        candidate: &ModelCandidate,
        messages: &[NormalizedMessage],
        image_refs: &[ImageRef],
    ) -> Result<String, ProviderError> {
        let body = RunRequest {
            messages: messages.iter().map(Self::to_text_message).collect(),
        };

        tracing::debug!(
            model_id = %candidate.id(),
            upstream_model = %candidate.upstream_model(),
            message_count = messages.len(),
            dropped_images = image_refs.len(),
            "Sending Bytez run request"
        );

        let response = self
            .http
            .post(self.run_url(candidate))
            .header("Authorization", format!("Key {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(ProviderError::transport)?;

        let status = response.status();
        let text = response.text().await.map_err(ProviderError::transport)?;
        let parsed: RunResponse = match serde_json::from_str(&text) {
            Ok(parsed) => parsed,
            Err(_) if !status.is_success() => {
                let message = if text.trim().is_empty() {
                    status.to_string()
                } else {
                    text.trim().to_string()
                };
                return Err(ProviderError::new(message).with_status(status.as_u16()));
            }
            Err(e) => {
                return Err(ProviderError::new(format!(
                    "Bytez returned an unreadable response: {}",
                    e
                )));
            }
        };

        if let Some(error) = parsed.error.as_ref().filter(|e| !e.is_null()) {
            let http_status = (!status.is_success()).then_some(status.as_u16());
            return Err(Self::error_from_value(error, http_status));
        }

        if !status.is_success() {
            return Err(ProviderError::new(status.to_string()).with_status(status.as_u16()));
        }

        Ok(Self::text_from_output(parsed.output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parts_message_collapses_to_text_with_image_note() {
        let msg = NormalizedMessage::user_with_images(
            "describe",
            &[ImageRef::new("https://a/1.png"), ImageRef::new("https://a/2.png")],
        );
        let flat = BytezAdapter::to_text_message(&msg);
        assert_eq!(
            flat.content,
            "describe\n\n[2 image(s) attached - image analysis may be limited]"
        );
    }

    #[test]
    fn test_text_message_passes_through() {
        let flat = BytezAdapter::to_text_message(&NormalizedMessage::system("be brief"));
        assert_eq!(flat.content, "be brief");
        assert_eq!(flat.role, Role::System);
    }

    #[test]
    fn test_output_string() {
        assert_eq!(
            BytezAdapter::text_from_output(Some(json!("hello"))),
            "hello"
        );
    }

    #[test]
    fn test_output_object_field_precedence() {
        assert_eq!(
            BytezAdapter::text_from_output(Some(json!({"role": "assistant", "content": "from content"}))),
            "from content"
        );
        assert_eq!(
            BytezAdapter::text_from_output(Some(json!({"message": "from message", "text": "t"}))),
            "from message"
        );
        assert_eq!(
            BytezAdapter::text_from_output(Some(json!({"text": "from text"}))),
            "from text"
        );
    }

    #[test]
    fn test_output_unknown_object_is_json_text() {
        assert_eq!(
            BytezAdapter::text_from_output(Some(json!({"tokens": 3}))),
            r#"{"tokens":3}"#
        );
    }

    #[test]
    fn test_output_missing_is_empty() {
        assert_eq!(BytezAdapter::text_from_output(None), "");
        assert_eq!(BytezAdapter::text_from_output(Some(Value::Null)), "");
    }

    #[test]
    fn test_error_string() {
        let err = BytezAdapter::error_from_value(&json!("Rate limit exceeded"), None);
        assert_eq!(err.message(), "Rate limit exceeded");
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_error_object_uses_status_when_code_missing() {
        let err = BytezAdapter::error_from_value(&json!({"message": "slow", "status": 429}), None);
        assert_eq!(err.code(), Some(&ErrorCode::Numeric(429)));
        assert!(err.is_rate_limited());
    }

    #[test]
    fn test_error_object_hard_failure() {
        let err = BytezAdapter::error_from_value(
            &json!({"message": "model is loading", "code": "MODEL_LOADING"}),
            None,
        );
        assert_eq!(err.message(), "model is loading");
        assert!(!err.is_rate_limited());
    }
}
