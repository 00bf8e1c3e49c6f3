//! Remote replay of the mutation queue.
//!
//! [`SyncEngine`] drains queued intents against the `/v1/mass` collection
//! through [`MassApiClient`] and reconciles each outcome back into the
//! [`LocalStore`](crate::store::LocalStore).

mod client;
mod engine;
mod flight;
#[cfg(test)]
pub(crate) mod test_support;

use thiserror::Error;

pub use client::MassApiClient;
pub use engine::{SeedReport, SkipReason, SyncEngine, SyncReport};
pub use flight::{FlightGuard, SingleFlight};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid sync configuration: {0}")]
    InvalidConfiguration(String),
    #[error("No remote endpoint configured")]
    NotConfigured,
    #[error("Please sign in: an auth token is required")]
    AuthRequired,
    #[error("Sync HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Sync API error: {message}")]
    Api { status: u16, message: String },
    #[error(transparent)]
    Store(#[from] crate::Error),
}

impl SyncError {
    /// HTTP status of a rejected request, if the server answered.
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}

pub type SyncResult<T> = Result<T, SyncError>;
