use thiserror::Error;

#[derive(Error, Debug)]
pub enum RillError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Opaque failure talking to the remote service. Transport errors,
    /// malformed catalog responses and rejected strict commands all end up here.
    #[error("Service failure: {0}")]
    ServiceFailure(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Source not found: {0}")]
    SourceNotFound(String),

    #[error("Item not found: {0}")]
    ItemNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("{0}")]
    Other(String),
}

impl RillError {
    pub fn service(msg: impl Into<String>) -> Self {
        Self::ServiceFailure(msg.into())
    }

    pub fn is_service_failure(&self) -> bool {
        matches!(self, Self::ServiceFailure(_))
    }
}

impl From<crate::config::ConfigError> for RillError {
    fn from(e: crate::config::ConfigError) -> Self {
        Self::Config(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RillError>;
