//! Notification backends built on the `notify` crate
//!
//! `Backend::Native` picks the platform primitive (inotify, FSEvents,
//! kqueue, ReadDirectoryChangesW). `Backend::Poll` scans the watched trees
//! every latency interval and works anywhere, including filesystems the
//! kernel cannot watch.

use crate::source::{EventSource, SignalSink, Watch, WatchHandle};
use dirwatch_core::{Backend, Error, Result};
use notify::{Event, EventKind, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

type BoxedWatcher = Box<dyn Watcher + Send>;

/// Event source backed by a `notify` watcher
#[derive(Debug, Clone, Copy)]
pub struct NotifySource {
    backend: Backend,
}

impl NotifySource {
    /// Create a source for the given backend
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Platform-native source
    pub fn native() -> Self {
        Self::new(Backend::Native)
    }

    /// Polling source
    pub fn poll() -> Self {
        Self::new(Backend::Poll)
    }

    /// Backend this source creates watchers with
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Check that a watcher can be created in this process
    pub fn probe(&self) -> Result<()> {
        let watcher = self.create_watcher(|_: notify::Result<Event>| {}, Duration::from_secs(1))?;
        drop(watcher);
        Ok(())
    }

    fn create_watcher<F>(&self, handler: F, latency: Duration) -> Result<BoxedWatcher>
    where
        F: notify::EventHandler,
    {
        let created: notify::Result<BoxedWatcher> = match self.backend {
            Backend::Native => notify::RecommendedWatcher::new(handler, notify::Config::default())
                .map(|w| Box::new(w) as BoxedWatcher),
            Backend::Poll => notify::PollWatcher::new(
                handler,
                notify::Config::default().with_poll_interval(latency),
            )
            .map(|w| Box::new(w) as BoxedWatcher),
        };

        created.map_err(|e| Error::BackendUnavailable {
            reason: e.to_string(),
        })
    }
}

impl Default for NotifySource {
    fn default() -> Self {
        Self::native()
    }
}

impl EventSource for NotifySource {
    fn name(&self) -> &str {
        match self.backend {
            Backend::Native => "native",
            Backend::Poll => "poll",
        }
    }

    fn begin_watch(
        &self,
        paths: &[PathBuf],
        latency_hint: Duration,
        sink: SignalSink,
    ) -> Result<WatchHandle> {
        let mut roots = Vec::with_capacity(paths.len());
        for path in paths {
            if !path.is_dir() {
                return Err(Error::MissingDirectory { path: path.clone() });
            }
            let canonical = path.canonicalize().map_err(|e| Error::WatchFailed {
                path: path.clone(),
                reason: e.to_string(),
            })?;
            roots.push(Root {
                configured: path.clone(),
                canonical,
            });
        }
        let roots = Arc::new(roots);

        let handler_roots = Arc::clone(&roots);
        let handler = move |res: notify::Result<Event>| match res {
            Ok(event) => forward(&handler_roots, &sink, event),
            Err(e) => {
                tracing::warn!("File watch error: {}", e);
                sink.failed(Error::Source {
                    details: e.to_string(),
                });
            }
        };

        let mut watcher = self.create_watcher(handler, latency_hint)?;
        for root in roots.iter() {
            watcher
                .watch(&root.canonical, RecursiveMode::Recursive)
                .map_err(|e| Error::WatchFailed {
                    path: root.configured.clone(),
                    reason: e.to_string(),
                })?;
            tracing::debug!("Watching {} ({} backend)", root.configured.display(), self.name());
        }

        Ok(WatchHandle::new(NotifyWatch { watcher, roots }))
    }
}

/// A watched root as configured and as the kernel reports it
#[derive(Debug)]
struct Root {
    configured: PathBuf,
    canonical: PathBuf,
}

/// Live `notify` watcher plus the roots it observes
struct NotifyWatch {
    watcher: BoxedWatcher,
    roots: Arc<Vec<Root>>,
}

impl Watch for NotifyWatch {
    fn end(mut self: Box<Self>) -> Result<()> {
        for root in self.roots.iter() {
            // Fails when the root was deleted mid-run; nothing left to undo.
            if let Err(e) = self.watcher.unwatch(&root.canonical) {
                tracing::debug!("Unwatch {} failed: {}", root.configured.display(), e);
            }
        }
        Ok(())
    }
}

/// Translate one notify event into sink signals
fn forward(roots: &[Root], sink: &SignalSink, event: Event) {
    if matches!(event.kind, EventKind::Access(_)) {
        return;
    }

    // Overflowed queues lose paths; report every root instead.
    if event.need_rescan() {
        tracing::warn!("Event queue overflow, reporting all watched roots");
        for root in roots {
            sink.changed(&root.configured);
        }
        return;
    }

    for path in &event.paths {
        let path = to_configured(roots, path);
        tracing::debug!("Raw change {:?}: {}", event.kind, path.display());
        sink.changed(&path);
    }
}

/// Map a reported path back onto the configured spelling of its root
///
/// FSEvents reports resolved paths (`/private/tmp/..` for `/tmp/..`);
/// clients should see paths under the roots they asked for.
fn to_configured(roots: &[Root], path: &Path) -> PathBuf {
    for root in roots {
        if let Ok(rest) = path.strip_prefix(&root.canonical) {
            return if rest.as_os_str().is_empty() {
                root.configured.clone()
            } else {
                root.configured.join(rest)
            };
        }
    }
    path.to_path_buf()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roots() -> Vec<Root> {
        vec![Root {
            configured: PathBuf::from("/tmp/x"),
            canonical: PathBuf::from("/private/tmp/x"),
        }]
    }

    #[test]
    fn test_to_configured_maps_canonical_prefix() {
        let roots = roots();
        assert_eq!(
            to_configured(&roots, Path::new("/private/tmp/x/a.txt")),
            PathBuf::from("/tmp/x/a.txt")
        );
        assert_eq!(
            to_configured(&roots, Path::new("/private/tmp/x")),
            PathBuf::from("/tmp/x")
        );
        assert_eq!(
            to_configured(&roots, Path::new("/elsewhere/f")),
            PathBuf::from("/elsewhere/f")
        );
    }

    #[test]
    fn test_source_names() {
        assert_eq!(NotifySource::native().name(), "native");
        assert_eq!(NotifySource::poll().name(), "poll");
        assert_eq!(NotifySource::default().backend(), Backend::Native);
    }

    #[test]
    fn test_poll_backend_probe() {
        NotifySource::poll().probe().unwrap();
    }
}
