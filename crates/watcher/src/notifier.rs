//! Public notifier facade
//!
//! A `Notifier` holds the configuration (paths and latency), the registered
//! handlers, and at most one [`RunLoop`]. All methods take `&self`, so one
//! notifier can be shared across threads behind an `Arc`; lifecycle
//! transitions are serialised by a mutex and a condvar.

use crate::host::HostLoop;
use crate::run_loop::{self, ChangeHandler, ErrorHandler, Handlers, RunLoop, WatchSet};
use dirwatch_core::{
    flatten, latency_duration, Backend, ChangeBatch, Error, NotifierConfig, PathSpec, Result,
    State, DEFAULT_LATENCY,
};
use parking_lot::{Condvar, Mutex, MutexGuard};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Directory change notifier
///
/// ```no_run
/// use dirwatch::Notifier;
///
/// let notifier = Notifier::new(vec!["/srv/site", "/srv/assets"], 0.25)?;
/// notifier.on_change(|batch| {
///     for dir in batch {
///         println!("changed: {}", dir.display());
///     }
/// })?;
/// notifier.start()?;
/// // ...
/// notifier.stop()?;
/// # Ok::<(), dirwatch::Error>(())
/// ```
///
/// The change handler runs on the notifier's background thread. A slow
/// handler delays the next batch; it does not cause batches to be
/// delivered concurrently.
pub struct Notifier {
    host: Arc<HostLoop>,
    inner: Mutex<Inner>,
    /// Signalled whenever `state` leaves Starting or Stopping
    transition: Condvar,
}

struct Inner {
    state: State,
    paths: Vec<PathBuf>,
    latency: f64,
    on_change: Option<ChangeHandler>,
    on_error: ErrorHandler,
    run_loop: Option<RunLoop>,
    /// Id of the run being started or running
    run_id: Option<u64>,
    /// Set by `stop` while a start is in flight
    stop_requested: bool,
}

impl Notifier {
    /// Create a notifier on the process host loop
    ///
    /// Fails with `RunLoopUnavailable` if the host loop cannot be obtained,
    /// with a configuration error if `paths` flattens to nothing or
    /// `latency` is not positive, and with a type error for non-path
    /// entries.
    pub fn new(paths: impl Into<PathSpec>, latency: f64) -> Result<Self> {
        Self::builder().paths(paths).latency(latency).build()
    }

    /// Create a builder with the default latency
    pub fn builder() -> NotifierBuilder {
        NotifierBuilder::new()
    }

    /// Create a notifier from a loaded configuration
    ///
    /// The native backend uses the process host loop; the poll backend
    /// gets a standalone one.
    pub fn from_config(config: &NotifierConfig) -> Result<Self> {
        let builder = Self::builder()
            .paths(PathSpec::List(config.paths.clone()))
            .latency(config.latency);

        match config.backend {
            Backend::Native => builder.build(),
            Backend::Poll => builder
                .host(HostLoop::new(crate::platform::NotifySource::poll()))
                .build(),
        }
    }

    /// Configure, register `handler` and start in one call
    pub fn spawn<F>(paths: impl Into<PathSpec>, latency: f64, handler: F) -> Result<Self>
    where
        F: FnMut(ChangeBatch) + Send + 'static,
    {
        let notifier = Self::new(paths, latency)?;
        notifier.on_change(handler)?;
        notifier.start()?;
        Ok(notifier)
    }

    /// Currently configured directories
    pub fn paths(&self) -> Vec<PathBuf> {
        self.inner.lock().paths.clone()
    }

    /// Currently configured latency in seconds
    pub fn latency(&self) -> f64 {
        self.inner.lock().latency
    }

    /// Change the latency used by the next start
    ///
    /// Validated when the next run starts.
    pub fn set_latency(&self, latency: f64) {
        self.inner.lock().latency = latency;
    }

    /// Replace the watched directories used by the next start
    ///
    /// Accepts a single path, a list, or nested lists; null and empty
    /// entries are dropped. A running watch is not affected.
    pub fn watch(&self, paths: impl Into<PathSpec>) -> Result<()> {
        let paths = flatten(paths)?;
        if paths.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "no directories to watch".to_string(),
            });
        }

        let mut inner = self.inner.lock();
        if inner.state != State::Stopped {
            tracing::debug!("Directories updated while {}; applied on next start", inner.state);
        }
        inner.paths = paths;
        Ok(())
    }

    /// Register the change handler
    ///
    /// Only allowed while stopped.
    pub fn on_change<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(ChangeBatch) + Send + 'static,
    {
        let mut inner = self.lock_settled();
        ensure_stopped(&inner, "replace the change handler")?;
        inner.on_change = Some(Arc::new(Mutex::new(Box::new(handler))));
        Ok(())
    }

    /// Register the handler for errors raised on the background thread
    ///
    /// Only allowed while stopped. Without one, errors are logged.
    pub fn on_error<F>(&self, handler: F) -> Result<()>
    where
        F: FnMut(Error) + Send + 'static,
    {
        let mut inner = self.lock_settled();
        ensure_stopped(&inner, "replace the error handler")?;
        inner.on_error = Arc::new(Mutex::new(Box::new(handler)));
        Ok(())
    }

    /// Current lifecycle state
    ///
    /// A run that ended on its own (a panicking handler) reads as stopped.
    pub fn state(&self) -> State {
        self.lock_settled().state
    }

    /// True while a run loop is alive and delivering
    pub fn is_running(&self) -> bool {
        self.lock_settled().state == State::Running
    }

    /// Snapshot the active run was started with
    pub fn active_watch_set(&self) -> Option<WatchSet> {
        self.inner
            .lock()
            .run_loop
            .as_ref()
            .map(|r| r.watch_set().clone())
    }

    /// Host loop this notifier starts its runs on
    pub fn host(&self) -> &Arc<HostLoop> {
        &self.host
    }

    /// Start watching
    ///
    /// Valid only while stopped; a concurrent second `start` fails with a
    /// lifecycle error. Returns once the event source has accepted the
    /// watch. On failure the notifier is left stopped.
    pub fn start(&self) -> Result<()> {
        let (run_id, watch_set, handlers) = {
            let mut inner = self.lock_settled();
            ensure_stopped(&inner, "start")?;

            let (watch_set, handlers) = prepare_run(&inner)?;
            let run_id = run_loop::next_run_id();
            inner.state = State::Starting;
            inner.run_id = Some(run_id);
            (run_id, watch_set, handlers)
        };

        let started = RunLoop::start(run_id, self.host.source(), watch_set, handlers);

        let mut inner = self.inner.lock();
        let result = match started {
            Ok(run_loop) if inner.stop_requested => {
                tracing::info!("Stop requested during start, tearing down");
                inner.state = State::Stopping;
                MutexGuard::unlocked(&mut inner, || run_loop.stop());
                inner.state = State::Stopped;
                inner.run_id = None;
                Ok(())
            }
            Ok(run_loop) => {
                tracing::info!("Notifier started on {} directories", run_loop.watch_set().paths.len());
                inner.run_loop = Some(run_loop);
                inner.state = State::Running;
                Ok(())
            }
            Err(e) => {
                tracing::warn!("Notifier failed to start: {}", e);
                inner.state = State::Stopped;
                inner.run_id = None;
                Err(e)
            }
        };
        inner.stop_requested = false;
        self.transition.notify_all();
        result
    }

    /// Stop watching and wait for the background thread to exit
    ///
    /// No change handler call is in flight once this returns. Changes
    /// recorded but not yet delivered are discarded. Stopping a stopped
    /// notifier is a no-op. Calling this from the notifier's own change
    /// handler fails with a lifecycle error, since it would have to wait
    /// for itself.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        loop {
            match inner.state {
                State::Stopped => return Ok(()),
                _ if inner.run_id.is_some() && inner.run_id == run_loop::current_run() => {
                    return Err(Error::InvalidState {
                        operation: "stop from inside its own handler",
                        state: inner.state,
                    });
                }
                State::Starting => {
                    inner.stop_requested = true;
                    self.transition.wait(&mut inner);
                }
                State::Stopping => {
                    self.transition.wait(&mut inner);
                }
                State::Running => {
                    inner.state = State::Stopping;
                    let run_loop = inner.run_loop.take();
                    MutexGuard::unlocked(&mut inner, || {
                        if let Some(run_loop) = run_loop {
                            run_loop.stop();
                        }
                    });
                    inner.state = State::Stopped;
                    inner.run_id = None;
                    self.transition.notify_all();
                    tracing::info!("Notifier stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Lock the state, first clearing out a run whose thread has exited
    fn lock_settled(&self) -> MutexGuard<'_, Inner> {
        let mut inner = self.inner.lock();
        if reap_crashed_run(&mut inner) {
            self.transition.notify_all();
        }
        inner
    }

    /// Stop, then start again with the current configuration
    pub fn restart(&self) -> Result<()> {
        self.stop()?;
        self.start()
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        if let Some(run_loop) = inner.run_loop.take() {
            run_loop.stop();
        }
        inner.state = State::Stopped;
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Notifier")
            .field("state", &inner.state)
            .field("paths", &inner.paths)
            .field("latency", &inner.latency)
            .field("host", &self.host)
            .finish()
    }
}

/// Builder for constructing a Notifier
pub struct NotifierBuilder {
    paths: Vec<PathSpec>,
    latency: f64,
    host: Option<Arc<HostLoop>>,
    on_change: Option<ChangeHandler>,
    on_error: Option<ErrorHandler>,
}

impl NotifierBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        Self {
            paths: Vec::new(),
            latency: DEFAULT_LATENCY,
            host: None,
            on_change: None,
            on_error: None,
        }
    }

    /// Add directories to watch
    pub fn paths(mut self, paths: impl Into<PathSpec>) -> Self {
        self.paths.push(paths.into());
        self
    }

    /// Set the latency window in seconds
    pub fn latency(mut self, latency: f64) -> Self {
        self.latency = latency;
        self
    }

    /// Use `host` instead of the process host loop
    pub fn host(mut self, host: Arc<HostLoop>) -> Self {
        self.host = Some(host);
        self
    }

    /// Register the change handler
    pub fn on_change<F>(mut self, handler: F) -> Self
    where
        F: FnMut(ChangeBatch) + Send + 'static,
    {
        self.on_change = Some(Arc::new(Mutex::new(Box::new(handler))));
        self
    }

    /// Register the error handler
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: FnMut(Error) + Send + 'static,
    {
        self.on_error = Some(Arc::new(Mutex::new(Box::new(handler))));
        self
    }

    /// Validate and build the notifier
    pub fn build(self) -> Result<Notifier> {
        let host = match self.host {
            Some(host) => host,
            None => HostLoop::acquire()?,
        };

        let paths = flatten(PathSpec::List(self.paths))?;
        if paths.is_empty() {
            return Err(Error::InvalidConfig {
                reason: "no directories to watch".to_string(),
            });
        }
        latency_duration(self.latency)?;

        let inner = Inner {
            state: State::Stopped,
            paths,
            latency: self.latency,
            on_change: self.on_change,
            on_error: self.on_error.unwrap_or_else(default_error_handler),
            run_loop: None,
            run_id: None,
            stop_requested: false,
        };

        Ok(Notifier {
            host,
            inner: Mutex::new(inner),
            transition: Condvar::new(),
        })
    }
}

impl Default for NotifierBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_error_handler() -> ErrorHandler {
    Arc::new(Mutex::new(Box::new(|e: Error| {
        tracing::error!("Notifier error: {}", e);
    })))
}

fn ensure_stopped(inner: &Inner, operation: &'static str) -> Result<()> {
    if inner.state == State::Stopped {
        Ok(())
    } else {
        Err(Error::InvalidState {
            operation,
            state: inner.state,
        })
    }
}

/// Clear out a run whose thread died on its own, so the notifier can
/// start again
fn reap_crashed_run(inner: &mut Inner) -> bool {
    if inner.state != State::Running {
        return false;
    }
    if !inner.run_loop.as_ref().is_some_and(RunLoop::is_finished) {
        return false;
    }

    tracing::warn!("Previous run loop exited unexpectedly, resetting to stopped");
    if let Some(run_loop) = inner.run_loop.take() {
        run_loop.stop();
    }
    inner.state = State::Stopped;
    inner.run_id = None;
    true
}

/// Freeze the configuration into a watch set
fn prepare_run(inner: &Inner) -> Result<(WatchSet, Handlers)> {
    if inner.paths.is_empty() {
        return Err(Error::InvalidConfig {
            reason: "no directories to watch".to_string(),
        });
    }
    let latency = latency_duration(inner.latency)?;
    let on_change = inner.on_change.clone().ok_or_else(|| Error::InvalidConfig {
        reason: "no change handler registered".to_string(),
    })?;

    let paths = inner
        .paths
        .iter()
        .map(|p| absolutize(p))
        .collect::<Result<Vec<_>>>()?;

    Ok((
        WatchSet { paths, latency },
        Handlers {
            on_change,
            on_error: Arc::clone(&inner.on_error),
        },
    ))
}

fn absolutize(path: &Path) -> Result<PathBuf> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|e| Error::WatchFailed {
            path: path.to_path_buf(),
            reason: format!("cannot resolve relative path: {e}"),
        })
}
