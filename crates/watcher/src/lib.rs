//! Directory change notification with latency-coalesced batches
//!
//! This crate provides:
//! - A [`Notifier`] facade with start/stop/restart lifecycle
//! - A background run loop delivering one batch per latency window
//! - Coalescing of raw signals into changed directories, one window per burst
//! - Native and polling event sources built on `notify`
//! - A process-wide host loop handle, injectable for tests

pub mod coalesce;
pub mod host;
pub mod notifier;
pub mod platform;
pub mod run_loop;
pub mod source;

pub use coalesce::{Coalescer, Recorded};
pub use host::HostLoop;
pub use notifier::{Notifier, NotifierBuilder};
pub use platform::NotifySource;
pub use run_loop::{RunLoop, WatchSet};
pub use source::{EventSource, SignalSink, Watch, WatchHandle};

pub use dirwatch_core::{
    example_config, Backend, ChangeBatch, Error, ErrorKind, NotifierConfig, PathSpec, Result, State,
    DEFAULT_LATENCY,
};
