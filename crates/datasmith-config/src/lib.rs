//! Data-directory and path resolution for DataSmith.
//!
//! All persistent state (the preferences database and log files) lives in a
//! single per-user data directory.

pub mod dirs;

pub use dirs::{ConfigError, DataDir};
