use crate::error::ApiError;
use base64::{engine::general_purpose, Engine as _};
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_MODEL: &str = "gemini-1.5-flash-latest";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

const PROMPT: &str = r#"Analyze the plant in this image and provide a structured response.
1. Identify the single, most prominent plant.
2. Determine if this plant is commonly known to have medicinal uses.

Respond with ONLY a single JSON object using this exact format:
{"label": "plant_name", "isMedicinal": boolean}

For example: {"label": "Neem", "isMedicinal": true} or {"label": "Common Rose", "isMedicinal": false}.

If you are unsure or cannot identify a plant, use {"label": "Unknown", "isMedicinal": false}."#;

/// Outcome of the classification collaborator. `Unidentifiable` is a normal
/// best-effort answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Identified { label: String, is_medicinal: bool },
    Unidentifiable,
}

/// Client for the Gemini image classification service.
pub struct Classifier {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

#[derive(Deserialize)]
struct RawClassification {
    label: String,
    #[serde(rename = "isMedicinal")]
    is_medicinal: bool,
}

impl Classifier {
    /// Startup-time construction; a client that cannot be built (so the
    /// request timeout would be silently lost) is fatal here, like a missing
    /// environment variable.
    pub fn new(api_key: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("failed to build classifier HTTP client");
        Self {
            http,
            api_key,
            model: DEFAULT_MODEL.to_string(),
        }
    }

    /// Send image bytes to the classifier and parse its suggested label.
    /// Any transport or payload problem is a collaborator failure, never a
    /// panic and never a lifecycle-state change.
    pub async fn classify(
        &self,
        image: &[u8],
        content_type: &str,
    ) -> Result<Classification, ApiError> {
        let url = format!(
            "https://generativelanguage.googleapis.com/v1beta/models/{}:generateContent?key={}",
            self.model, self.api_key
        );

        let payload = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": PROMPT },
                    {
                        "inline_data": {
                            "mime_type": content_type,
                            "data": general_purpose::STANDARD.encode(image),
                        }
                    }
                ]
            }]
        });

        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Classification request failed: {}", e);
                ApiError::Collaborator(format!("classification service unreachable: {e}"))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            tracing::error!("Classification service returned {}", status);
            return Err(ApiError::Collaborator(format!(
                "classification service returned {status}"
            )));
        }

        let body: serde_json::Value = response.json().await.map_err(|e| {
            ApiError::Collaborator(format!("classification response unreadable: {e}"))
        })?;

        let text = body
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                ApiError::Collaborator("classification response missing text".to_string())
            })?;

        parse_classification(text)
    }
}

/// Parse the model's reply, tolerating the ```json fences it likes to add.
fn parse_classification(text: &str) -> Result<Classification, ApiError> {
    let cleaned = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    let raw: RawClassification = serde_json::from_str(cleaned).map_err(|e| {
        ApiError::Collaborator(format!("classification response malformed: {e}"))
    })?;

    let label = raw.label.trim().to_string();
    if label.is_empty() || label.eq_ignore_ascii_case("unknown") {
        return Ok(Classification::Unidentifiable);
    }

    Ok(Classification::Identified {
        label,
        is_medicinal: raw.is_medicinal,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_builds_with_timeout() {
        let classifier = Classifier::new("test-key".to_string());
        assert_eq!(classifier.model, DEFAULT_MODEL);
    }

    #[test]
    fn test_parse_plain_json() {
        let result = parse_classification(r#"{"label": "Neem", "isMedicinal": true}"#).unwrap();
        assert_eq!(
            result,
            Classification::Identified {
                label: "Neem".to_string(),
                is_medicinal: true
            }
        );
    }

    #[test]
    fn test_parse_fenced_json() {
        let fenced = "```json\n{\"label\": \"Common Rose\", \"isMedicinal\": false}\n```";
        let result = parse_classification(fenced).unwrap();
        assert_eq!(
            result,
            Classification::Identified {
                label: "Common Rose".to_string(),
                is_medicinal: false
            }
        );
    }

    #[test]
    fn test_unknown_label_is_unidentifiable() {
        let result = parse_classification(r#"{"label": "Unknown", "isMedicinal": false}"#).unwrap();
        assert_eq!(result, Classification::Unidentifiable);

        let result = parse_classification(r#"{"label": "  ", "isMedicinal": false}"#).unwrap();
        assert_eq!(result, Classification::Unidentifiable);
    }

    #[test]
    fn test_malformed_reply_is_collaborator_error() {
        let result = parse_classification("the plant appears to be basil");
        assert!(matches!(result, Err(ApiError::Collaborator(_))));

        let result = parse_classification(r#"{"label": "Neem"}"#);
        assert!(matches!(result, Err(ApiError::Collaborator(_))));
    }
}
