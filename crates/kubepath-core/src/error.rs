use thiserror::Error;

/// Top-level error type for kubepath.
#[derive(Error, Debug)]
pub enum KubepathError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<config::ConfigError> for KubepathError {
    fn from(err: config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}
