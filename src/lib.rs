pub mod booking;
pub mod compactor;
pub mod config;
pub mod engine;
pub mod limits;
pub mod model;
pub mod notify;
pub mod observability;
pub mod schedule;
pub mod source;
pub mod sql;
pub mod wal;
pub mod watch;
pub mod wire;
