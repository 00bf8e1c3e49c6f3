pub mod add;
pub mod common;
pub mod completions;
pub mod config;
pub mod delete;
pub mod edit;
pub mod export;
pub mod list;
pub mod profile;
pub mod queue;
pub mod seed;
pub mod settings;
pub mod sync;
pub mod watch;
