//! Dirwatch Core - shared types for the dirwatch notifier
//!
//! This crate provides the vocabulary the watcher is built from:
//! - Lifecycle states
//! - Change batches (deduplicated sets of directories)
//! - Path-like input conversion and flattening
//! - TOML configuration
//! - The error taxonomy

pub mod batch;
pub mod config;
pub mod error;
pub mod paths;
pub mod state;

// Re-export main types for convenience
pub use batch::ChangeBatch;
pub use config::{example_config, latency_duration, Backend, NotifierConfig, DEFAULT_LATENCY};
pub use error::{Error, ErrorKind};
pub use paths::{flatten, PathSpec};
pub use state::State;

/// Common result type used throughout dirwatch
pub type Result<T> = std::result::Result<T, Error>;
