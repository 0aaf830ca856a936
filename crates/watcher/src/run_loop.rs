//! Background run loop
//!
//! One thread per active notifier. The thread begins the watch, then
//! waits on four things at once:
//! - the stop channel (the only cancellation path)
//! - the event source's error channel
//! - the wake channel, signalled by the first change after a flush
//! - the latency window, armed by that wake
//!
//! When the window closes the coalescer is flushed and a non-empty batch
//! is handed to the change handler on this thread. No window is open while
//! the handler runs, so batches never overlap, and an idle watch never
//! wakes up.

use crate::coalesce::Coalescer;
use crate::source::{EventSource, SignalSink};
use crossbeam_channel::{after, bounded, never, select, unbounded, Receiver, Sender, TryRecvError};
use dirwatch_core::{ChangeBatch, Error, Result};
use parking_lot::Mutex;
use std::cell::Cell;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle, ThreadId};
use std::time::{Duration, Instant};

/// Registered change handler, shared with the run loop
pub(crate) type ChangeHandler = Arc<Mutex<Box<dyn FnMut(ChangeBatch) + Send>>>;

/// Registered error handler, shared with the run loop
pub(crate) type ErrorHandler = Arc<Mutex<Box<dyn FnMut(Error) + Send>>>;

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    /// Id of the run whose thread this is, if any
    static CURRENT_RUN: Cell<Option<u64>> = const { Cell::new(None) };
}

/// Allocate an id for a new run
pub(crate) fn next_run_id() -> u64 {
    NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed)
}

/// Id of the run executing on the calling thread
pub(crate) fn current_run() -> Option<u64> {
    CURRENT_RUN.with(Cell::get)
}

/// Paths and latency frozen for the lifetime of one run
#[derive(Debug, Clone, PartialEq)]
pub struct WatchSet {
    /// Absolute directories to observe
    pub paths: Vec<PathBuf>,
    /// Latency window
    pub latency: Duration,
}

/// Handlers a run delivers to
#[derive(Clone)]
pub(crate) struct Handlers {
    pub(crate) on_change: ChangeHandler,
    pub(crate) on_error: ErrorHandler,
}

/// Handle to a running background thread
pub struct RunLoop {
    stop_tx: Option<Sender<()>>,
    thread: Option<JoinHandle<()>>,
    thread_id: ThreadId,
    watch_set: WatchSet,
}

impl RunLoop {
    /// Spawn the background thread and begin watching
    ///
    /// Blocks until the event source has accepted (or rejected) the watch,
    /// so a failure here leaves nothing running.
    pub(crate) fn start(
        run_id: u64,
        source: Arc<dyn EventSource>,
        watch_set: WatchSet,
        handlers: Handlers,
    ) -> Result<Self> {
        let (stop_tx, stop_rx) = bounded::<()>(1);
        let (ready_tx, ready_rx) = bounded::<Result<()>>(1);

        let thread_set = watch_set.clone();
        let thread = thread::Builder::new()
            .name("dirwatch-run-loop".to_string())
            .spawn(move || {
                CURRENT_RUN.with(|run| run.set(Some(run_id)));
                run(source, thread_set, handlers, stop_rx, ready_tx)
            })
            .map_err(|e| Error::RunLoopUnavailable {
                reason: format!("failed to spawn run loop thread: {e}"),
            })?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                stop_tx: Some(stop_tx),
                thread_id: thread.thread().id(),
                thread: Some(thread),
                watch_set,
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                // Thread ended without reporting, i.e. begin_watch panicked.
                let _ = thread.join();
                Err(Error::Source {
                    details: "event source panicked while beginning the watch".to_string(),
                })
            }
        }
    }

    /// Snapshot this run was started with
    pub fn watch_set(&self) -> &WatchSet {
        &self.watch_set
    }

    /// True once the background thread has exited
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// True when called from the run loop's own thread
    pub fn is_current_thread(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Signal the thread and wait for it to exit
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            // Full or disconnected both mean the thread already knows.
            let _ = stop_tx.try_send(());
        }

        let Some(thread) = self.thread.take() else {
            return;
        };

        if self.is_current_thread() {
            tracing::warn!("Run loop dropped from its own thread, not joining");
            return;
        }

        if thread.join().is_err() {
            tracing::error!("Run loop thread panicked during shutdown");
        }
    }
}

impl Drop for RunLoop {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for RunLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLoop")
            .field("watch_set", &self.watch_set)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// What woke the loop up
enum Wake {
    Stop,
    SourceError(Option<Error>),
    Changed,
    Window,
}

/// Body of the background thread
fn run(
    source: Arc<dyn EventSource>,
    watch_set: WatchSet,
    handlers: Handlers,
    stop_rx: Receiver<()>,
    ready_tx: Sender<Result<()>>,
) {
    let coalescer = Arc::new(Coalescer::new(watch_set.paths.clone()));
    let (error_tx, error_rx) = unbounded();
    let (wake_tx, wake_rx) = bounded(1);
    // Held for the whole run so neither receiver disconnects.
    let sink = SignalSink::new(Arc::clone(&coalescer), wake_tx, error_tx);

    let handle = match source.begin_watch(&watch_set.paths, watch_set.latency, sink.clone()) {
        Ok(handle) => handle,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };
    let _ = ready_tx.send(Ok(()));

    tracing::info!(
        "Run loop started: {} directories, latency {:?}, {} source",
        watch_set.paths.len(),
        watch_set.latency,
        source.name()
    );

    let mut window: Option<Receiver<Instant>> = None;
    loop {
        let deadline = window.clone().unwrap_or_else(never);
        let wake = select! {
            recv(stop_rx) -> _ => Wake::Stop,
            recv(error_rx) -> msg => Wake::SourceError(msg.ok()),
            recv(wake_rx) -> _ => Wake::Changed,
            recv(deadline) -> _ => Wake::Window,
        };

        match wake {
            Wake::Stop => break,
            Wake::SourceError(Some(e)) => report(&handlers.on_error, e),
            Wake::SourceError(None) => {}
            Wake::Changed => {
                if window.is_none() {
                    window = Some(after(watch_set.latency));
                }
            }
            Wake::Window => {
                window = None;
                let batch = coalescer.flush();
                if batch.is_empty() {
                    continue;
                }
                // A stop that raced the window wins; the batch is dropped.
                if stop_requested(&stop_rx) {
                    tracing::debug!("Discarding {} pending directories on stop", batch.len());
                    break;
                }
                tracing::debug!("Delivering batch of {} directories", batch.len());
                if let Err(e) = deliver(&handlers.on_change, batch) {
                    tracing::error!("{}", e);
                    report(&handlers.on_error, e);
                    break;
                }
            }
        }
    }

    if let Err(e) = source.end_watch(handle) {
        tracing::warn!("Failed to end watch cleanly: {}", e);
    }
    drop(sink);

    let discarded = coalescer.pending_count();
    if discarded > 0 {
        tracing::debug!("Run loop exited with {} undelivered directories", discarded);
    }
    tracing::info!("Run loop stopped");
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    !matches!(stop_rx.try_recv(), Err(TryRecvError::Empty))
}

/// Invoke the change handler, turning a panic into an error
fn deliver(handler: &ChangeHandler, batch: ChangeBatch) -> Result<()> {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut on_change = handler.lock();
        (*on_change)(batch);
    }));

    outcome.map_err(|payload| Error::HandlerPanicked {
        message: panic_message(payload.as_ref()),
    })
}

/// Invoke the error handler; a panic there is only logged
fn report(handler: &ErrorHandler, error: Error) {
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        let mut on_error = handler.lock();
        (*on_error)(error);
    }));

    if let Err(payload) = outcome {
        tracing::error!("Error handler panicked: {}", panic_message(payload.as_ref()));
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
