use thiserror::Error;

/// Error reported by an external sink. Storage only ever logs these.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    #[error("Sink write failed for query {query}: {reason}")]
    Write { query: String, reason: String },

    #[error("Sink close failed: {0}")]
    Close(String),

    #[error("Sink is closed")]
    Closed,
}

/// Custom error type for result store operations.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Sink {sink} failed to initialize: {reason}")]
    SinkInit { sink: String, reason: String },

    #[error("Label not found for query {query}: {label}")]
    LabelNotFound { query: String, label: String },

    #[error("Value index out of range: index={index}, len={len}")]
    IndexOutOfRange { index: usize, len: usize },

    #[error(transparent)]
    Sink(#[from] SinkError),

    #[error("Query source failed: {0}")]
    Source(String),
}

impl From<::config::ConfigError> for StoreError {
    fn from(err: ::config::ConfigError) -> Self {
        StoreError::Config(err.to_string())
    }
}
