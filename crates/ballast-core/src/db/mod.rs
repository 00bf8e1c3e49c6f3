//! Database layer for Ballast

mod connection;
mod migrations;

pub use connection::Database;
pub use migrations::CURRENT_VERSION;
