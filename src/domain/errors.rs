use std::fmt;

use thiserror::Error;

/// Which leg of the Punjabi round trip a translation failure happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranslationDirection {
    /// Query translated into English before retrieval.
    Inbound,
    /// Answer translated back into the caller's language.
    Outbound,
}

impl fmt::Display for TranslationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TranslationDirection::Inbound => f.write_str("query"),
            TranslationDirection::Outbound => f.write_str("response"),
        }
    }
}

/// Domain-level errors shared across application components.
///
/// The chat pipeline variants mirror its stages one to one so callers can
/// tell exactly where a request stopped.
#[derive(Debug, Error)]
pub enum DomainError {
    /// The incoming payload missed a required field or violated invariants.
    #[error("validation error: {0}")]
    Validation(String),

    /// Input exceeded guard rails such as maximum length.
    #[error("limit exceeded: {0}")]
    LimitExceeded(String),

    #[error("language detection failed: {0}")]
    DetectionFailed(String),

    #[error("translation of {direction} failed: {message}")]
    TranslationFailed {
        direction: TranslationDirection,
        message: String,
    },

    #[error("retrieval failed: {0}")]
    RetrievalFailed(String),

    #[error("generation failed: {0}")]
    GenerationFailed(String),

    #[error("audio synthesis failed: {0}")]
    AudioSynthesisFailed(String),

    /// A requested audio file name that could escape the audio directory.
    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    /// Requested entity was not found locally.
    #[error("not found: {0}")]
    NotFound(String),

    /// Catch-all for storage-related failures we don't want to leak directly.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Vector store incompatibility (e.g., dimension or model mismatch).
    #[error("embedding mismatch: {0}")]
    Embedding(String),

    #[error("configuration error: {0}")]
    Configuration(String),

    /// Any other unexpected failure.
    #[error("unexpected error: {0}")]
    Other(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn limit(msg: impl Into<String>) -> Self {
        Self::LimitExceeded(msg.into())
    }

    pub fn detection(msg: impl Into<String>) -> Self {
        Self::DetectionFailed(msg.into())
    }

    pub fn translation(direction: TranslationDirection, msg: impl Into<String>) -> Self {
        Self::TranslationFailed {
            direction,
            message: msg.into(),
        }
    }

    pub fn retrieval(msg: impl Into<String>) -> Self {
        Self::RetrievalFailed(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::GenerationFailed(msg.into())
    }

    pub fn synthesis(msg: impl Into<String>) -> Self {
        Self::AudioSynthesisFailed(msg.into())
    }

    pub fn invalid_file_name(msg: impl Into<String>) -> Self {
        Self::InvalidFileName(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn embedding(msg: impl Into<String>) -> Self {
        Self::Embedding(msg.into())
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    /// Re-tag an error raised below the retrieval stage (embedding, storage)
    /// as a retrieval failure, keeping validation errors intact.
    pub fn into_retrieval(self) -> Self {
        match self {
            err @ (DomainError::RetrievalFailed(_) | DomainError::Validation(_)) => err,
            other => DomainError::RetrievalFailed(other.to_string()),
        }
    }

    /// Short, user-facing sentence describing which step failed.
    pub fn public_message(&self) -> &'static str {
        match self {
            DomainError::Validation(_) => "Query is required!",
            DomainError::LimitExceeded(_) => "Query is too long.",
            DomainError::DetectionFailed(_) => "Failed to detect language.",
            DomainError::TranslationFailed {
                direction: TranslationDirection::Inbound,
                ..
            } => "Failed to translate query.",
            DomainError::TranslationFailed {
                direction: TranslationDirection::Outbound,
                ..
            } => "Failed to translate response.",
            DomainError::RetrievalFailed(_) => "Failed to retrieve relevant context.",
            DomainError::GenerationFailed(_) => "Failed to generate AI response.",
            DomainError::AudioSynthesisFailed(_) => "Failed to generate audio response.",
            DomainError::InvalidFileName(_)
            | DomainError::NotFound(_)
            | DomainError::Storage(_) => "Failed to send audio file.",
            DomainError::Embedding(_) | DomainError::Configuration(_) | DomainError::Other(_) => {
                "Internal server error."
            }
        }
    }
}

impl From<std::io::Error> for DomainError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => DomainError::NotFound(err.to_string()),
            _ => DomainError::Storage(err.to_string()),
        }
    }
}
