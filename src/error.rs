//! Error taxonomy shared by the API client, the transforms and the dashboard.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("HTTP error! status: {status}. {body}")]
    Fetch { status: u16, body: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl FeedError {
    /// Errors the user can plausibly fix by retrying the same action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. } | Self::Transport(_) | Self::Parse(_)
        )
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Failed to parse API response: {0}")]
    Malformed(String),
    #[error("unsupported payload shape: {0}")]
    UnsupportedShape(String),
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Reasoning is required")]
    ReasoningRequired,
    #[error("Confidence score must be between 1 and 10 (got {0})")]
    ConfidenceOutOfRange(i64),
    #[error("Confidence score must be a whole number (got '{0}')")]
    ConfidenceNotANumber(String),
    #[error("response is missing required field: {0}")]
    MissingResponseField(&'static str),
    #[error("Cannot run analysis: No previous token report available. Please create an initial token report first.")]
    NoAnalyzableReport,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("API key is missing or empty")]
    MissingApiKey,
    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: &'static str, value: String },
}
