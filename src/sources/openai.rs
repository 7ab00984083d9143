//! Chat-completions client implementing [`StructuredExtractor`].
//!
//! Builds the system prompt from the field schema, sends the page text at
//! temperature zero, and returns the raw assistant reply. Parsing the
//! reply stays in the pipeline; this client only classifies transport and
//! status failures into the extractor taxonomy.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::credentials::ApiKey;
use crate::error::{ExtractorError, ExtractorResult};
use crate::traits::StructuredExtractor;
use crate::types::FieldSchema;

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o";

/// The extraction backend over a chat-completions API.
///
/// # Example
///
/// ```rust,ignore
/// use scholar_harvest::sources::OpenAiExtractor;
/// use scholar_harvest::types::FieldSchema;
///
/// let extractor = OpenAiExtractor::from_env()?.with_model("gpt-4o-mini");
/// let reply = extractor.extract(text, &FieldSchema::research_profile()).await?;
/// ```
pub struct OpenAiExtractor {
    client: Client,
    api_key: ApiKey,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

impl OpenAiExtractor {
    pub fn new(api_key: impl Into<ApiKey>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }

    /// Create from `OPENAI_API_KEY`, honoring an optional `OPENAI_MODEL`
    /// override.
    pub fn from_env() -> ExtractorResult<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| ExtractorError::Auth {
            reason: "OPENAI_API_KEY environment variable not set".to_string(),
        })?;
        let mut extractor = Self::new(api_key);
        if let Ok(model) = std::env::var("OPENAI_MODEL") {
            extractor.model = model;
        }
        Ok(extractor)
    }

    /// Set the chat model (default: gpt-4o).
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set a custom base URL (for proxies or compatible servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl StructuredExtractor for OpenAiExtractor {
    async fn extract(&self, text: &str, schema: &FieldSchema) -> ExtractorResult<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt(schema),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt(text, schema),
                },
            ],
            temperature: 0.0,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key.expose()))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| ExtractorError::Unavailable(Box::new(e)))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ExtractorError::Auth {
                reason: format!("HTTP {status}"),
            });
        }
        if !status.is_success() {
            return Err(ExtractorError::Unavailable(Box::new(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("chat API returned HTTP {status}"),
            ))));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| ExtractorError::Unavailable(Box::new(e)))?;

        chat.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| ExtractorError::Payload {
                reason: "reply carried no choices".to_string(),
            })
    }
}

/// Frames the task and enumerates the reply keys from the schema, with
/// the classification rubric spelled out.
fn system_prompt(schema: &FieldSchema) -> String {
    let mut prompt = String::from(
        "You are a research profile analyzer assessing academic profiles for \
         PhD opportunities.\nReturn ONLY a JSON object with these exact keys:\n",
    );
    for field in schema.text_fields() {
        prompt.push_str(&format!("- {field}\n"));
    }
    prompt.push_str(&format!(
        "- {} (one of {})\n\nFor {} assessment:\n\
         - \"High\": full professors at top universities, or researchers in well-funded fields\n\
         - \"Medium\": associate professors, or professors at mid-tier institutions\n\
         - \"Low\": non-faculty positions or institutions with limited research funding\n\
         Leave out any key the content does not support.",
        schema.category_field(),
        schema
            .category_labels()
            .iter()
            .map(|label| format!("\"{label}\""))
            .collect::<Vec<_>>()
            .join(", "),
        schema.category_field(),
    ));
    prompt
}

fn user_prompt(text: &str, schema: &FieldSchema) -> String {
    format!(
        "Extract information from this webpage content, paying attention to \
         details that indicate funding availability: the institution's research \
         standing, the researcher's seniority, the department's prominence, and \
         the field's typical funding.\n\nContent: {text}\n\nReturn all supported \
         fields, ensuring {} is one of the listed labels.",
        schema.category_field()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_lists_every_schema_key() {
        let schema = FieldSchema::research_profile();
        let prompt = system_prompt(&schema);
        for field in schema.text_fields() {
            assert!(prompt.contains(&format!("- {field}")), "missing {field}");
        }
        assert!(prompt.contains("funding_likelihood"));
        assert!(prompt.contains("\"High\", \"Medium\", \"Low\""));
    }

    #[test]
    fn model_override_sticks() {
        let extractor = OpenAiExtractor::new("sk-test").with_model("gpt-4o-mini");
        assert_eq!(extractor.model(), "gpt-4o-mini");
    }

    #[test]
    fn key_never_leaks_through_debug() {
        let extractor = OpenAiExtractor::new("sk-secret");
        assert_eq!(format!("{}", extractor.api_key), "[REDACTED]");
    }
}
