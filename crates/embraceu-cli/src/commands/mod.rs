pub mod common;
pub mod config;
pub mod dead_letters;
pub mod queue;
pub mod save;
pub mod status;
pub mod sync;
pub mod watch;
