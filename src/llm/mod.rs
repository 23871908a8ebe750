//! LLM client abstraction.
//!
//! Provides a unified interface for completion backends. Providers classify
//! transient overload conditions into [`crate::Error::Overloaded`] at the
//! HTTP boundary; [`RetryingClient`] is the only place those are retried.

mod anthropic;
mod openai;
mod retry;

pub use anthropic::AnthropicClient;
pub use openai::OpenAiClient;
pub use retry::{RetryConfig, RetryingClient};

use crate::Result;
use std::time::Duration;

/// A base64-encoded image attachment for multimodal completion calls.
#[derive(Debug, Clone)]
pub struct ImageData {
    /// MIME type, e.g. `image/png`.
    pub media_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
}

impl ImageData {
    /// Encodes raw image bytes, inferring the MIME type from the file name.
    #[must_use]
    pub fn from_bytes(file_name: &str, bytes: &[u8]) -> Self {
        use base64::Engine as _;
        let media_type = match file_name.rsplit('.').next().map(str::to_ascii_lowercase) {
            Some(ext) if ext == "jpg" || ext == "jpeg" => "image/jpeg",
            Some(ext) if ext == "gif" => "image/gif",
            Some(ext) if ext == "webp" => "image/webp",
            _ => "image/png",
        };
        Self {
            media_type: media_type.to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

/// Trait for completion backends.
pub trait CompletionService: Send + Sync {
    /// The provider name.
    fn name(&self) -> &'static str;

    /// Generates a completion for the given prompt, with optional image
    /// attachments.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Overloaded`] for transient backend overload
    /// and [`crate::Error::OperationFailed`] for everything else.
    fn generate(&self, prompt: &str, images: &[ImageData]) -> Result<String>;
}

/// HTTP client configuration for LLM providers.
#[derive(Debug, Clone, Copy)]
pub struct LlmHttpConfig {
    /// Request timeout in milliseconds (0 to disable).
    pub timeout_ms: u64,
    /// Connect timeout in milliseconds (0 to disable).
    pub connect_timeout_ms: u64,
}

impl Default for LlmHttpConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 120_000,
            connect_timeout_ms: 3_000,
        }
    }
}

impl LlmHttpConfig {
    /// Loads HTTP configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Ok(v) = std::env::var("ATOMNOTE_LLM_TIMEOUT_MS") {
            if let Ok(timeout_ms) = v.parse::<u64>() {
                settings.timeout_ms = timeout_ms;
            }
        }
        if let Ok(v) = std::env::var("ATOMNOTE_LLM_CONNECT_TIMEOUT_MS") {
            if let Ok(connect_timeout_ms) = v.parse::<u64>() {
                settings.connect_timeout_ms = connect_timeout_ms;
            }
        }
        settings
    }
}

/// Builds a blocking HTTP client for LLM requests with configured timeouts.
#[must_use]
pub fn build_http_client(config: LlmHttpConfig) -> reqwest::blocking::Client {
    let mut builder = reqwest::blocking::Client::builder();
    if config.timeout_ms > 0 {
        builder = builder.timeout(Duration::from_millis(config.timeout_ms));
    }
    if config.connect_timeout_ms > 0 {
        builder = builder.connect_timeout(Duration::from_millis(config.connect_timeout_ms));
    }

    builder.build().unwrap_or_else(|err| {
        tracing::warn!("Failed to build LLM HTTP client: {err}");
        reqwest::blocking::Client::new()
    })
}

/// Classifies an HTTP error status into the crate error taxonomy.
///
/// 429, 503, and 529 mark the backend as transiently overloaded; anything
/// else is a plain operation failure. This is the boundary where the
/// machine-checkable transient flag is set.
pub(crate) fn classify_status(
    operation: &str,
    status: reqwest::StatusCode,
    body: &str,
) -> crate::Error {
    let transient = matches!(status.as_u16(), 429 | 503 | 529)
        || body.contains("overloaded_error")
        || body.contains("rate_limit_error");
    if transient {
        crate::Error::Overloaded {
            operation: operation.to_string(),
            cause: format!("status {status}: {body}"),
        }
    } else {
        crate::Error::OperationFailed {
            operation: operation.to_string(),
            cause: format!("API returned status: {status} - {body}"),
        }
    }
}
