use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChoreError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("entity not ready: {0}")]
    NotReady(String),

    #[error("invalid override token `{token}`: {reason}")]
    InvalidToken { token: String, reason: String },
}

impl ChoreError {
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn invalid_token(token: &str, reason: impl Into<String>) -> Self {
        Self::InvalidToken {
            token: token.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = ChoreError> = std::result::Result<T, E>;
