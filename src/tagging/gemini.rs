//! Gemini-backed tagging capability.
//!
//! Calls `POST {endpoint}/models/{model}:generateContent` with a prompt that
//! lists the closed vocabulary and asks for a JSON object `{"tags": [...]}`.
//! The credential is sent in the `x-goog-api-key` header.

use async_trait::async_trait;
use serde_json::Value;

use super::TaggingCapability;
use crate::config::TaggingConfig;
use crate::error::CapabilityError;
use crate::models::{Domain, ProcessingMethod};

pub struct GeminiTagger {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
    max_input_chars: usize,
}

impl GeminiTagger {
    /// The request timeout is left to the caller; see [`super::infer_tags`].
    pub fn new(config: &TaggingConfig, api_key: String) -> Result<Self, CapabilityError> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| CapabilityError::Unavailable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key,
            max_input_chars: config.max_input_chars,
        })
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }
}

#[async_trait]
impl TaggingCapability for GeminiTagger {
    fn name(&self) -> &str {
        "gemini"
    }

    fn method(&self) -> ProcessingMethod {
        ProcessingMethod::AiEnhanced
    }

    async fn tag(&self, text: &str, vocabulary: &[Domain]) -> Result<Vec<String>, CapabilityError> {
        let body = serde_json::json!({
            "contents": [{
                "parts": [{ "text": build_prompt(text, vocabulary, self.max_input_chars) }]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "temperature": 0.0,
            },
        });

        let response = self
            .client
            .post(self.url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(CapabilityError::Status {
                status: status.as_u16(),
                body: body_text,
            });
        }

        let json: Value = response.json().await?;
        let answer = response_text(&json)?;
        parse_tag_response(&answer)
    }
}

/// Build the tagging prompt. Only the first `max_chars` characters of the
/// chunk are sent.
pub fn build_prompt(text: &str, vocabulary: &[Domain], max_chars: usize) -> String {
    let excerpt: String = text.chars().take(max_chars).collect();
    let labels = vocabulary
        .iter()
        .map(|d| d.as_str())
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "Classify the following government/compliance document excerpt.\n\
         Choose every relevant tag from this closed list and no others: {labels}.\n\
         Respond with JSON only, in the form {{\"tags\": [\"tag1\", \"tag2\"]}}.\n\n\
         Text:\n{excerpt}"
    )
}

/// Concatenate the text parts of the first candidate.
fn response_text(json: &Value) -> Result<String, CapabilityError> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| {
            CapabilityError::MalformedResponse("missing candidates[0].content.parts".to_string())
        })?;

    let text: String = parts
        .iter()
        .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
        .collect();

    if text.trim().is_empty() {
        return Err(CapabilityError::Empty);
    }
    Ok(text)
}

/// Parse the model's answer: `{"tags": [...]}` or a bare array, optionally
/// wrapped in a markdown code block. Non-string entries are ignored.
pub fn parse_tag_response(answer: &str) -> Result<Vec<String>, CapabilityError> {
    let json: Value = serde_json::from_str(&strip_code_fence(answer))?;

    let items = match &json {
        Value::Array(items) => items,
        Value::Object(obj) => obj
            .get("tags")
            .and_then(|t| t.as_array())
            .ok_or_else(|| CapabilityError::MalformedResponse("missing 'tags' array".to_string()))?,
        _ => {
            return Err(CapabilityError::MalformedResponse(
                "expected JSON object or array".to_string(),
            ))
        }
    };

    Ok(items
        .iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect())
}

fn strip_code_fence(answer: &str) -> String {
    let trimmed = answer.trim();
    if !trimmed.starts_with("```") {
        return trimmed.to_string();
    }
    let lines: Vec<&str> = trimmed.lines().collect();
    let end = if lines.len() > 1 && lines[lines.len() - 1].trim_start().starts_with("```") {
        lines.len() - 1
    } else {
        lines.len()
    };
    lines[1.min(end)..end].join("\n")
}
