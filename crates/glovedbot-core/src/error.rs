//! Error types for the memory engine and its remote calls.

use autoagents_llm::error::LLMError;
use glovedbot_config::ConfigError;
use glovedbot_memory::StorageError;
use thiserror::Error;

/// Provider messages that mark a server-side failure worth retrying.
const TRANSIENT_MARKERS: &[&str] = &[
    "500",
    "502",
    "503",
    "504",
    "server error",
    "bad gateway",
    "service unavailable",
    "gateway timeout",
    "overloaded",
    "connection reset",
    "connection closed",
];

/// Outcome classes reported back to the chat surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionStatus {
    Ok,
    TooLong,
    InvalidRequest,
    OtherError,
}

/// Failure of an embedding or completion call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteServiceError {
    /// Provider reported an error not covered by a more specific variant.
    #[error("provider error: {0}")]
    Provider(String),
    /// Provider throttled the request.
    #[error("rate limited: {0}")]
    RateLimited(String),
    /// Prompt exceeds the model's context window.
    #[error("context too long: {0}")]
    ContextTooLong(String),
    /// Provider rejected the request as malformed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    /// No answer within the per-attempt timeout.
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },
    /// Provider answered with nothing usable.
    #[error("empty {0} response")]
    EmptyResponse(String),
}

impl RemoteServiceError {
    /// Classify a provider error message.
    pub fn from_provider_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        if lower.contains("maximum context length")
            || lower.contains("context_length_exceeded")
            || lower.contains("context length")
        {
            RemoteServiceError::ContextTooLong(message)
        } else if lower.contains("429") || lower.contains("rate limit") {
            RemoteServiceError::RateLimited(message)
        } else if lower.contains("invalid request") || lower.contains("400 bad request") {
            RemoteServiceError::InvalidRequest(message)
        } else {
            RemoteServiceError::Provider(message)
        }
    }

    /// True when the same request may succeed on a later attempt.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteServiceError::RateLimited(_) | RemoteServiceError::Timeout { .. } => true,
            RemoteServiceError::Provider(message) => {
                let lower = message.to_lowercase();
                TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
            }
            RemoteServiceError::ContextTooLong(_)
            | RemoteServiceError::InvalidRequest(_)
            | RemoteServiceError::EmptyResponse(_) => false,
        }
    }

    /// Result code reported to the chat session.
    pub fn status(&self) -> CompletionStatus {
        match self {
            RemoteServiceError::ContextTooLong(_) => CompletionStatus::TooLong,
            RemoteServiceError::InvalidRequest(_) => CompletionStatus::InvalidRequest,
            _ => CompletionStatus::OtherError,
        }
    }
}

impl From<LLMError> for RemoteServiceError {
    fn from(err: LLMError) -> Self {
        RemoteServiceError::from_provider_message(err.to_string())
    }
}

/// Errors returned by engine and session operations.
#[derive(Debug, Error)]
pub enum GlovedBotError {
    /// Embedding or completion call failed.
    #[error(transparent)]
    Remote(#[from] RemoteServiceError),
    /// Memory store failed.
    #[error("memory store error: {0}")]
    Storage(#[from] StorageError),
    /// Configuration is missing or invalid.
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    /// Writing to the reply surface failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl GlovedBotError {
    /// Remote failures keep their class; everything else is `OtherError`.
    pub fn status(&self) -> CompletionStatus {
        match self {
            GlovedBotError::Remote(err) => err.status(),
            _ => CompletionStatus::OtherError,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{CompletionStatus, RemoteServiceError};
    use pretty_assertions::assert_eq;

    #[test]
    fn context_length_message_maps_to_too_long() {
        let err = RemoteServiceError::from_provider_message(
            "This model's maximum context length is 8192 tokens",
        );
        assert!(matches!(err, RemoteServiceError::ContextTooLong(_)));
        assert_eq!(err.status(), CompletionStatus::TooLong);
        assert!(!err.is_transient());
    }

    #[test]
    fn rate_limits_and_server_errors_are_transient() {
        let throttled =
            RemoteServiceError::from_provider_message("HTTP 429 Too Many Requests: rate limit");
        assert!(matches!(throttled, RemoteServiceError::RateLimited(_)));
        assert!(throttled.is_transient());

        let unavailable = RemoteServiceError::from_provider_message("503 Service Unavailable");
        assert!(matches!(unavailable, RemoteServiceError::Provider(_)));
        assert!(unavailable.is_transient());

        let timeout = RemoteServiceError::Timeout {
            operation: "embedding".to_string(),
            timeout_ms: 10,
        };
        assert!(timeout.is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        let unauthorized = RemoteServiceError::from_provider_message("401 Unauthorized");
        assert!(!unauthorized.is_transient());
        assert_eq!(unauthorized.status(), CompletionStatus::OtherError);

        let invalid = RemoteServiceError::from_provider_message("Invalid request: missing model");
        assert!(matches!(invalid, RemoteServiceError::InvalidRequest(_)));
        assert_eq!(invalid.status(), CompletionStatus::InvalidRequest);
        assert!(!invalid.is_transient());
    }
}
