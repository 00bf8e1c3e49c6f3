//! ballast-core - Core library for Ballast
//!
//! Offline-first body mass tracking: the local store with its mutation
//! queue, the sync engine that replays queued intents against the remote
//! `/v1/mass` service, and the connectivity scheduler that decides when.

pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod models;
pub mod scheduler;
pub mod store;
pub mod sync;
pub mod util;

pub use config::SyncConfig;
pub use error::{Error, Result};
pub use models::{EntryId, EntryStatus, MassEntry, MassUnit, NewMassEntry};
pub use scheduler::{ConnectivityScheduler, NetworkStatus, SchedulerConfig, SchedulerState};
pub use store::{LocalStore, StorageKind, StoreBackend};
pub use sync::{SyncEngine, SyncError, SyncReport};
