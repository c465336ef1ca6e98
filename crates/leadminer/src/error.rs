use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LeadMinerError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

impl From<crate::db::DatabaseError> for LeadMinerError {
    fn from(err: crate::db::DatabaseError) -> Self {
        LeadMinerError::Store(StoreError::Database(err))
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config JSON: {0}")]
    ParseJson(#[from] serde_json::Error),

    #[error("Config validation failed: {message}")]
    Validation { message: String },
}

/// Rejections raised before a job is created. No state is written.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required filter field '{0}' is missing")]
    MissingField(&'static str),

    #[error("Target count must be greater than zero")]
    ZeroTargetCount,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] crate::db::DatabaseError),

    #[error("Failed to serialize collection '{key}': {source}")]
    Serialize {
        key: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failures of a discovery provider call. All variants are transient from
/// the engine's point of view: they are counted and retried on the next tick.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    #[error("Discovery request failed: {0}")]
    Request(String),

    #[error("Discovery response could not be parsed: {0}")]
    InvalidResponse(String),

    #[error("Discovery provider rate limited the request")]
    RateLimited,
}

pub type Result<T> = std::result::Result<T, LeadMinerError>;
