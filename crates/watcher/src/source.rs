//! Event source boundary
//!
//! An event source turns OS-level observation into raw "this path changed"
//! signals. It is strictly a producer: signals are pushed into a
//! [`SignalSink`] from whatever thread the source runs its own machinery
//! on, and the run loop never calls back into the source except to end
//! the watch.

use crate::coalesce::{Coalescer, Recorded};
use crossbeam_channel::Sender;
use dirwatch_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// A platform (or fake) file system observation primitive
pub trait EventSource: Send + Sync {
    /// Short name for log messages
    fn name(&self) -> &str;

    /// Start recursive observation of `paths`
    ///
    /// Fails if any path is missing or is not a directory. Duplicate
    /// signals are fine; every distinct change must be signalled at
    /// least once.
    fn begin_watch(
        &self,
        paths: &[PathBuf],
        latency_hint: Duration,
        sink: SignalSink,
    ) -> Result<WatchHandle>;

    /// Stop observation
    ///
    /// Valid whether or not any signal was ever produced.
    fn end_watch(&self, handle: WatchHandle) -> Result<()> {
        handle.end()
    }
}

/// An active observation owned by a [`WatchHandle`]
pub trait Watch: Send {
    /// Tear down the observation
    fn end(self: Box<Self>) -> Result<()>;
}

/// Opaque handle to an active observation
pub struct WatchHandle {
    inner: Box<dyn Watch>,
}

impl WatchHandle {
    /// Wrap an active observation
    pub fn new(watch: impl Watch + 'static) -> Self {
        Self {
            inner: Box::new(watch),
        }
    }

    /// Tear down the wrapped observation
    pub fn end(self) -> Result<()> {
        self.inner.end()
    }
}

impl std::fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("WatchHandle")
    }
}

/// Push interface handed to an event source
///
/// Cloning is cheap. Signals recorded after the owning run has stopped are
/// accepted and discarded with the run.
#[derive(Clone)]
pub struct SignalSink {
    coalescer: Arc<Coalescer>,
    /// Bounded(1); one pending wake is enough to open the window
    wake: Sender<()>,
    errors: Sender<Error>,
}

impl SignalSink {
    pub(crate) fn new(coalescer: Arc<Coalescer>, wake: Sender<()>, errors: Sender<Error>) -> Self {
        Self {
            coalescer,
            wake,
            errors,
        }
    }

    /// Report that `path` changed
    pub fn changed(&self, path: &Path) {
        if self.coalescer.record(path) == Recorded::Opened {
            // Full means a wake is already queued.
            let _ = self.wake.try_send(());
        }
    }

    /// Report a failure that happened while watching
    pub fn failed(&self, error: Error) {
        if self.errors.send(error).is_err() {
            tracing::debug!("Run loop gone, dropping event source error");
        }
    }
}
