//! Error types for notifier configuration, lifecycle and watching

use crate::state::State;
use std::path::PathBuf;
use thiserror::Error;

/// Errors from notifier operations.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Failed to read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {source}")]
    ConfigParse {
        #[from]
        source: toml::de::Error,
    },

    #[error("Directories must be given as a path or a list of paths (found {found})")]
    InvalidPathEntry { found: &'static str },

    #[error("Cannot watch {path}: not an existing directory")]
    MissingDirectory { path: PathBuf },

    #[error("Cannot watch {path}: {reason}")]
    WatchFailed { path: PathBuf, reason: String },

    #[error("File system notification backend unavailable: {reason}")]
    BackendUnavailable { reason: String },

    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: State,
    },

    #[error("Could not obtain a run loop: {reason}")]
    RunLoopUnavailable { reason: String },

    #[error("Event source error: {details}")]
    Source { details: String },

    #[error("Change handler panicked: {message}")]
    HandlerPanicked { message: String },
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Empty or invalid path list, non-positive latency, unreadable config
    Configuration,
    /// A path entry could not be interpreted as a path
    Type,
    /// The event source could not begin observation
    Watch,
    /// The operation is invalid for the current lifecycle state
    Lifecycle,
    /// The process-wide run loop handle could not be obtained
    RunLoopUnavailable,
    /// The event source failed while a run was active
    Source,
    /// The registered change handler failed while a run was active
    Handler,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidConfig { .. } | Error::ConfigRead { .. } | Error::ConfigParse { .. } => {
                ErrorKind::Configuration
            }
            Error::InvalidPathEntry { .. } => ErrorKind::Type,
            Error::MissingDirectory { .. }
            | Error::WatchFailed { .. }
            | Error::BackendUnavailable { .. } => ErrorKind::Watch,
            Error::InvalidState { .. } => ErrorKind::Lifecycle,
            Error::RunLoopUnavailable { .. } => ErrorKind::RunLoopUnavailable,
            Error::Source { .. } => ErrorKind::Source,
            Error::HandlerPanicked { .. } => ErrorKind::Handler,
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Error::InvalidConfig {
            reason: reason.into(),
        }
    }
}
