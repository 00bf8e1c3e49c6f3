use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] ballast_core::Error),
    #[error(transparent)]
    Sync(#[from] ballast_core::SyncError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Entry ID cannot be empty")]
    EmptyEntryId,
    #[error("Entry not found for id/prefix: {0}")]
    EntryNotFound(String),
    #[error("{0}")]
    AmbiguousEntryId(String),
    #[error("Invalid timestamp '{0}': use RFC 3339, YYYY-MM-DD [HH:MM], or Unix milliseconds")]
    InvalidTimestamp(String),
    #[error("Nothing to change: pass at least one field")]
    EmptyChange,
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("An auth token is required. Pass --token or set BALLAST_TOKEN.")]
    TokenRequired,
    #[error(
        "Sync is not configured. Run `ballast config init --api-url <URL>` or set BALLAST_API_URL."
    )]
    SyncNotConfigured,
}
