//! Anthropic Claude client.

use super::{CompletionService, ImageData, LlmHttpConfig, build_http_client, classify_status};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Anthropic Claude completion client.
pub struct AnthropicClient {
    /// API key.
    api_key: Option<String>,
    /// API endpoint.
    endpoint: String,
    /// Model to use.
    model: String,
    /// HTTP client.
    client: reqwest::blocking::Client,
}

impl AnthropicClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.anthropic.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "claude-sonnet-4-20250514";

    /// Creates a new Anthropic client.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var("ANTHROPIC_API_KEY").ok();
        Self {
            api_key,
            endpoint: Self::DEFAULT_ENDPOINT.to_string(),
            model: Self::DEFAULT_MODEL.to_string(),
            client: build_http_client(LlmHttpConfig::from_env()),
        }
    }

    /// Sets the API key.
    #[must_use]
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Sets the API endpoint.
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets HTTP client timeouts for LLM requests.
    #[must_use]
    pub fn with_http_config(mut self, config: LlmHttpConfig) -> Self {
        self.client = build_http_client(config);
        self
    }

    /// Validates that the client is configured with a plausible API key.
    ///
    /// Catches obviously malformed keys before making network requests that
    /// would fail with 401 errors.
    fn validate(&self) -> Result<()> {
        let key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::OperationFailed {
                operation: "anthropic_request".to_string(),
                cause: "ANTHROPIC_API_KEY not set".to_string(),
            })?;

        if !Self::is_valid_api_key_format(key) {
            return Err(Error::OperationFailed {
                operation: "anthropic_request".to_string(),
                cause: "Invalid API key format: expected 'sk-ant-' prefix".to_string(),
            });
        }

        Ok(())
    }

    fn is_valid_api_key_format(key: &str) -> bool {
        const MIN_KEY_LENGTH: usize = 40;
        const PREFIX: &str = "sk-ant-";

        if !key.starts_with(PREFIX) || key.len() < MIN_KEY_LENGTH {
            return false;
        }

        key.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }

    fn request(&self, content: Vec<ContentPart>) -> Result<String> {
        self.validate()?;

        tracing::info!(provider = "anthropic", model = %self.model, "Making LLM request");

        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::OperationFailed {
                operation: "anthropic_request".to_string(),
                cause: "API key not configured".to_string(),
            })?;

        let request = MessagesRequest {
            model: self.model.clone(),
            max_tokens: 8192,
            messages: vec![Message {
                role: "user".to_string(),
                content,
            }],
        };

        let response = self
            .client
            .post(format!("{}/messages", self.endpoint))
            .header("x-api-key", api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(&request)
            .send()
            .map_err(|e| {
                tracing::error!(
                    provider = "anthropic",
                    model = %self.model,
                    error = %e,
                    is_timeout = e.is_timeout(),
                    "LLM request failed"
                );
                if e.is_timeout() || e.is_connect() {
                    Error::Overloaded {
                        operation: "anthropic_request".to_string(),
                        cause: e.to_string(),
                    }
                } else {
                    Error::OperationFailed {
                        operation: "anthropic_request".to_string(),
                        cause: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = "anthropic",
                model = %self.model,
                status = %status,
                body = %body,
                "LLM API returned error status"
            );
            return Err(classify_status("anthropic_request", status, &body));
        }

        let response: MessagesResponse = response.json().map_err(|e| Error::OperationFailed {
            operation: "anthropic_response".to_string(),
            cause: e.to_string(),
        })?;

        response
            .content
            .first()
            .and_then(|block| {
                if block.block_type == "text" {
                    Some(block.text.clone())
                } else {
                    None
                }
            })
            .ok_or_else(|| Error::OperationFailed {
                operation: "anthropic_response".to_string(),
                cause: "No text content in response".to_string(),
            })
    }
}

impl Default for AnthropicClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionService for AnthropicClient {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    fn generate(&self, prompt: &str, images: &[ImageData]) -> Result<String> {
        let mut content: Vec<ContentPart> = images
            .iter()
            .map(|img| ContentPart::Image {
                source: ImageSource {
                    source_type: "base64".to_string(),
                    media_type: img.media_type.clone(),
                    data: img.data.clone(),
                },
            })
            .collect();
        content.push(ContentPart::Text {
            text: prompt.to_string(),
        });

        self.request(content)
    }
}

/// Request to the Messages API.
#[derive(Debug, Serialize)]
struct MessagesRequest {
    model: String,
    max_tokens: u32,
    messages: Vec<Message>,
}

/// A message in the conversation.
#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: Vec<ContentPart>,
}

/// A content part: text or an inline image.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ContentPart {
    Text { text: String },
    Image { source: ImageSource },
}

#[derive(Debug, Serialize)]
struct ImageSource {
    #[serde(rename = "type")]
    source_type: String,
    media_type: String,
    data: String,
}

/// Response from the Messages API.
#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

/// A content block in the response.
#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    block_type: String,
    #[serde(default)]
    text: String,
}
