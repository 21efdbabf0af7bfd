//! Error types for Interview Notify.

/// Top-level error type for the pipeline.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Input source error: {0}")]
    Source(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Notifier error: {0}")]
    Notify(#[from] NotifyError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Mode not implemented: {0}")]
    UnimplementedMode(String),
}

/// Tabular input source errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Missing required column: {0}")]
    MissingColumn(String),

    #[error("Input has no header row")]
    NoHeader,

    #[error("Malformed row at line {line}: {message}")]
    MalformedRow { line: usize, message: String },
}

/// Outcome store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Store API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode store response: {0}")]
    Decode(String),

    #[error("Schema provisioning failed: {0}")]
    Provisioning(String),
}

/// Notifier errors. Quota exhaustion is distinguished because it is the
/// sole trigger for batch backpressure.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("send quota exhausted")]
    QuotaExceeded,

    #[error("send failed: {0}")]
    Send(String),
}

/// Result type alias for the pipeline.
pub type Result<T> = std::result::Result<T, Error>;
