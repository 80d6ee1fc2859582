use std::time::Duration;

use thiserror::Error;

use crate::providers::base::ProviderKind;

/// A vendor rejected or failed a call.
///
/// The layer never retries on its own; `retryable` and `retry_after` are hints
/// for the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{provider} API error ({status_code}{}): {message}", type_suffix(.vendor_type))]
pub struct ApiError {
    pub provider: ProviderKind,
    pub status_code: u16,
    /// The vendor's own error type string, empty when the body did not carry one
    pub vendor_type: String,
    pub message: String,
    pub retryable: bool,
    pub retry_after: Duration,
}

fn type_suffix(vendor_type: &str) -> String {
    if vendor_type.is_empty() {
        String::new()
    } else {
        format!(", {}", vendor_type)
    }
}

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum LlmError {
    /// Bad caller input. Never involves the network.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error("Exceeded max tool iterations ({0})")]
    MaxToolIterations(usize),

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP transport error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not decode provider response: {0}")]
    Decode(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl LlmError {
    pub fn validation<F: Into<String>, M: Into<String>>(field: F, message: M) -> Self {
        LlmError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// The offending field name for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            LlmError::Validation { field, .. } => Some(field),
            _ => None,
        }
    }

    pub fn as_api_error(&self) -> Option<&ApiError> {
        match self {
            LlmError::Api(err) => Some(err),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.as_api_error().is_some_and(|err| err.retryable)
    }
}

impl From<serde_json::Error> for LlmError {
    fn from(err: serde_json::Error) -> Self {
        LlmError::Decode(err.to_string())
    }
}

impl From<config::ConfigError> for LlmError {
    fn from(err: config::ConfigError) -> Self {
        LlmError::Config(err.to_string())
    }
}

pub type LlmResult<T> = Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_field() {
        let err = LlmError::validation("top_k", "not supported by openai");
        assert_eq!(err.field(), Some("top_k"));
        assert_eq!(err.to_string(), "Invalid top_k: not supported by openai");
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_api_error_display() {
        let err = ApiError {
            provider: ProviderKind::Anthropic,
            status_code: 529,
            vendor_type: "overloaded_error".to_string(),
            message: "Overloaded".to_string(),
            retryable: true,
            retry_after: Duration::ZERO,
        };
        assert_eq!(
            err.to_string(),
            "anthropic API error (529, overloaded_error): Overloaded"
        );
        assert!(LlmError::from(err).is_retryable());
    }

    #[test]
    fn test_api_error_display_without_vendor_type() {
        let err = ApiError {
            provider: ProviderKind::Google,
            status_code: 503,
            vendor_type: String::new(),
            message: "HTTP 503".to_string(),
            retryable: true,
            retry_after: Duration::ZERO,
        };
        assert_eq!(err.to_string(), "google API error (503): HTTP 503");
        let source: &dyn std::error::Error = &err;
        assert!(source.source().is_none());
    }
}
