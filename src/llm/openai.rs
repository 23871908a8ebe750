//! `OpenAI` completion client.

use super::{CompletionService, ImageData, LlmHttpConfig, build_http_client, classify_status};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// `OpenAI` chat-completions client.
pub struct OpenAiClient {
    api_key: Option<String>,
    endpoint: String,
    model: String,
    client: reqwest::blocking::Client,
}

impl OpenAiClient {
    /// Default API endpoint.
    pub const DEFAULT_ENDPOINT: &'static str = "https://api.openai.com/v1";

    /// Default model.
    pub const DEFAULT_MODEL: &'static str = "gpt-4o";

    /// Creates a new `OpenAI` client.
    #[must_use]
    pub fn new() -> Self {
        let api_key = std::env::var("OPENAI_API_KEY").ok();
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

    fn request(&self, content: Vec<ContentPart>) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .ok_or_else(|| Error::OperationFailed {
                operation: "openai_request".to_string(),
                cause: "OPENAI_API_KEY not set".to_string(),
            })?;

        tracing::info!(provider = "openai", model = %self.model, "Making LLM request");

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content,
            }],
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.endpoint))
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .map_err(|e| {
                if e.is_timeout() || e.is_connect() {
                    Error::Overloaded {
                        operation: "openai_request".to_string(),
                        cause: e.to_string(),
                    }
                } else {
                    Error::OperationFailed {
                        operation: "openai_request".to_string(),
                        cause: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().unwrap_or_default();
            tracing::error!(
                provider = "openai",
                model = %self.model,
                status = %status,
                "LLM API returned error status"
            );
            return Err(classify_status("openai_request", status, &body));
        }

        let response: ChatResponse = response.json().map_err(|e| Error::OperationFailed {
            operation: "openai_response".to_string(),
            cause: e.to_string(),
        })?;

        response
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::OperationFailed {
                operation: "openai_response".to_string(),
                cause: "No choices in response".to_string(),
            })
    }
}

impl Default for OpenAiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionService for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn generate(&self, prompt: &str, images: &[ImageData]) -> Result<String> {
        let mut content: Vec<ContentPart> = images
            .iter()
            .map(|img| ContentPart::ImageUrl {
                image_url: ImageUrl {
                    url: format!("data:{};base64,{}", img.media_type, img.data),
                },
            })
            .collect();
        content.push(ContentPart::Text {
            text: prompt.to_string(),
        });

        self.request(content)
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: String,
}
