//! Process-wide host loop handle
//!
//! Notifiers are driven by a host event source that is obtained once per
//! process. `HostLoop::acquire` initialises it on first use (probing the
//! native backend so an unusable platform fails loudly at construction
//! time) and hands out shared references afterwards. The handle is passed
//! into each notifier explicitly, so a test or an embedding application
//! can build its own with `HostLoop::new` instead.

use crate::platform::NotifySource;
use crate::source::EventSource;
use dirwatch_core::{Error, Result};
use parking_lot::Mutex;
use std::sync::Arc;

/// Process-wide handle, set by the first successful `acquire`
static PROCESS_HOST: Mutex<Option<Arc<HostLoop>>> = Mutex::new(None);

/// Shared event source that notifiers start their runs on
pub struct HostLoop {
    source: Arc<dyn EventSource>,
}

impl HostLoop {
    /// Build a standalone host around `source`
    ///
    /// Does not touch the process-wide handle.
    pub fn new(source: impl EventSource + 'static) -> Arc<Self> {
        Arc::new(Self {
            source: Arc::new(source),
        })
    }

    /// Obtain the process-wide host, initialising it on first use
    ///
    /// Fails with [`Error::RunLoopUnavailable`] when the native backend
    /// cannot be created.
    pub fn acquire() -> Result<Arc<Self>> {
        let mut slot = PROCESS_HOST.lock();
        if let Some(host) = slot.as_ref() {
            return Ok(Arc::clone(host));
        }

        let source = NotifySource::native();
        source.probe().map_err(|e| Error::RunLoopUnavailable {
            reason: e.to_string(),
        })?;

        let host = Self::new(source);
        *slot = Some(Arc::clone(&host));
        tracing::info!("Initialised process host loop (native backend)");
        Ok(host)
    }

    /// Release the process-wide handle
    ///
    /// Notifiers already holding the host keep working; the next
    /// `acquire` initialises a fresh one. Returns whether a handle was
    /// released.
    pub fn teardown() -> bool {
        let released = PROCESS_HOST.lock().take().is_some();
        if released {
            tracing::info!("Released process host loop");
        }
        released
    }

    /// Whether the process-wide handle is currently initialised
    pub fn is_initialized() -> bool {
        PROCESS_HOST.lock().is_some()
    }

    /// Event source runs are started on
    pub fn source(&self) -> Arc<dyn EventSource> {
        Arc::clone(&self.source)
    }
}

impl std::fmt::Debug for HostLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostLoop")
            .field("source", &self.source.name())
            .finish()
    }
}
