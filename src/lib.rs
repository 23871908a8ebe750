//! # Atomnote
//!
//! Turns raw notes and transcripts in a markdown vault into a structured
//! graph of atomic notes, using an LLM backend for content generation.
//!
//! The heart of the crate is the plan/generate orchestration pipeline:
//!
//! 1. [`plan::PlanPipeline`] extracts raw source text from a note, calls the
//!    LLM once to produce a structured plan of atomic notes, resolves a
//!    template for the suggested note kind, and persists a plan document.
//! 2. [`generate::GenerationPipeline`] re-parses the plan document and, for
//!    each planned note, builds a dynamic prompt from the template's
//!    placeholders, calls the LLM, repairs and validates the JSON response,
//!    renders it through the template engine, and persists the file.
//!
//! The backend is unreliable free text; [`repair`], [`schema`], and the
//! bounded-retry wrapper in [`llm`] turn it into schema-valid, durable
//! markdown artifacts with per-note failure isolation and a resume path.
//!
//! ## Example
//!
//! ```rust,ignore
//! use atomnote::{AtomnoteConfig, generate::GenerationPipeline};
//!
//! let pipeline = GenerationPipeline::new(store, llm, config);
//! let summary = pipeline.generate_from_plan("Plans/ML - Ensembles.md", &|_| {})?;
//! println!("{}/{} notes generated", summary.generated, summary.total);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

// Module declarations
pub mod activity;
pub mod config;
pub mod generate;
pub mod hierarchy;
pub mod llm;
pub mod plan;
pub mod repair;
pub mod schema;
pub mod template;
pub mod vault;

// Re-exports for convenience
pub use config::AtomnoteConfig;
pub use generate::{GenerationPipeline, GenerationSummary};
pub use llm::{CompletionService, RetryingClient};
pub use plan::{PlanDocument, PlanPipeline, PlanProposal};
pub use schema::{BulletNode, ValidationError};
pub use vault::{DirStore, FileStore, MemoryStore, NoteIndex};

/// Error type for atomnote operations.
///
/// Uses `thiserror` for automatic `Display` and `Error` trait implementations.
///
/// # Error Variant Triggers
///
/// | Variant | Raised When |
/// |---------|-------------|
/// | `InvalidInput` | Empty proposal titles, malformed plan documents, bad config values |
/// | `NotFound` | Missing template file, missing source section, missing plan |
/// | `Overloaded` | LLM backend returned a transient overload condition (retryable) |
/// | `UnparsableResponse` | LLM output is not valid JSON even after repair |
/// | `Validation` | Repaired JSON fails the per-kind schema |
/// | `OperationFailed` | I/O errors, non-transient backend errors, everything else |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A required resource could not be located.
    ///
    /// Raised when:
    /// - A note kind has no matching `{kind} Template.md`
    /// - The target file has no recognized source section heading
    /// - The plan document does not exist
    #[error("not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// The LLM backend is transiently overloaded.
    ///
    /// Set by the provider adapters at the HTTP boundary (status 429/503/529
    /// or an overload error body). This is the only error kind the retry
    /// wrapper will retry; see [`llm::RetryingClient`].
    #[error("backend overloaded during '{operation}': {cause}")]
    Overloaded {
        /// The operation that hit the overload.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The LLM response could not be parsed as JSON even after repair.
    ///
    /// Carries the raw response text for diagnostics. Never auto-retried;
    /// surfaces as a per-proposal failure eligible for the resume pathway.
    #[error("unparsable response during '{operation}': {raw}")]
    UnparsableResponse {
        /// The operation whose response failed to parse.
        operation: String,
        /// The raw LLM response text.
        raw: String,
    },

    /// The parsed JSON failed schema validation.
    #[error(transparent)]
    Validation(#[from] schema::ValidationError),

    /// An operation failed.
    ///
    /// Raised when:
    /// - Filesystem I/O errors occur
    /// - The backend returns a non-transient error
    /// - Frontmatter or config parsing fails
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },
}

impl Error {
    /// Whether this error represents a transient backend condition that the
    /// retry wrapper may retry.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Overloaded { .. })
    }
}

/// Result type alias for atomnote operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("empty title".to_string());
        assert_eq!(err.to_string(), "invalid input: empty title");

        let err = Error::NotFound {
            resource: "Core Template.md".to_string(),
        };
        assert_eq!(err.to_string(), "not found: Core Template.md");

        let err = Error::OperationFailed {
            operation: "write_plan".to_string(),
            cause: "disk full".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'write_plan' failed: disk full");
    }

    #[test]
    fn test_transient_classification() {
        let overloaded = Error::Overloaded {
            operation: "generate".to_string(),
            cause: "status 529".to_string(),
        };
        assert!(overloaded.is_transient());

        let failed = Error::OperationFailed {
            operation: "generate".to_string(),
            cause: "status 401".to_string(),
        };
        assert!(!failed.is_transient());

        let unparsable = Error::UnparsableResponse {
            operation: "generate_note".to_string(),
            raw: "not json".to_string(),
        };
        assert!(!unparsable.is_transient());
    }

    #[test]
    fn test_unparsable_preserves_raw_text() {
        let err = Error::UnparsableResponse {
            operation: "generate_note".to_string(),
            raw: "Sure! Here is the note you asked for".to_string(),
        };
        assert!(err.to_string().contains("Here is the note"));
    }
}
