//! Local libSQL database backing the persisted queue storage

mod connection;
mod migrations;

pub use connection::Database;
