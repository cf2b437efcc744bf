//! Weather-specific error types.

use thiserror::Error;

/// A provider payload did not have the structure the normalizer expects.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct ParseError {
    message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// The generic "unrecognized shape" error.
    pub fn malformed() -> Self {
        Self::new("malformed payload")
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Errors from fetching and normalizing provider data.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Provider reported an unsuccessful response")]
    Unsuccessful,

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl WeatherError {
    /// Whether retrying the same request later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_timeout() || e.is_connect(),
            Self::Api { status, .. } => *status >= 500 || *status == 429,
            Self::Unsuccessful => true,
            Self::MissingApiKey | Self::Parse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        assert_eq!(ParseError::malformed().to_string(), "malformed payload");
        assert_eq!(ParseError::new("no locations").message(), "no locations");
    }

    #[test]
    fn test_is_retryable() {
        assert!(WeatherError::Api {
            status: 503,
            message: "down".into()
        }
        .is_retryable());
        assert!(!WeatherError::Api {
            status: 401,
            message: "bad key".into()
        }
        .is_retryable());
        assert!(!WeatherError::Parse(ParseError::malformed()).is_retryable());
        assert!(!WeatherError::MissingApiKey.is_retryable());
    }
}
