//! Time-windowed change coalescing
//!
//! Raw signals name individual paths. The coalescer reduces each one to the
//! directory that contains it and keeps a set per latency window, so a burst
//! of writes into one directory becomes a single entry.

use ahash::AHashSet;
use dirwatch_core::ChangeBatch;
use parking_lot::Mutex;
use std::path::{Path, PathBuf};

/// Outcome of [`Coalescer::record`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recorded {
    /// Outside every watched root
    Dropped,
    /// Added to a window that is already open
    Pending,
    /// First change since the last flush; opens a new window
    Opened,
}

impl Recorded {
    /// Whether the signal was kept
    pub fn is_kept(self) -> bool {
        self != Recorded::Dropped
    }
}

/// Accumulates changed directories between flushes
///
/// `record` may be called from the event source's own thread while the run
/// loop calls `flush`; both go through one mutex and `flush` swaps the whole
/// set out, so a signal lands in exactly one batch.
#[derive(Debug)]
pub struct Coalescer {
    /// Watched roots, absolute
    roots: Vec<PathBuf>,
    /// Directories changed since the last flush
    pending: Mutex<AHashSet<PathBuf>>,
}

impl Coalescer {
    /// Create a coalescer for the given watched roots
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            pending: Mutex::new(AHashSet::new()),
        }
    }

    /// Record a change to `path`
    ///
    /// Reports [`Recorded::Opened`] exactly once per window, for the
    /// signal that found the pending set empty.
    pub fn record(&self, path: &Path) -> Recorded {
        let Some(dir) = self.directory_for(path) else {
            tracing::debug!("Dropping signal outside watched roots: {}", path.display());
            return Recorded::Dropped;
        };

        let mut pending = self.pending.lock();
        let opened = pending.is_empty();
        pending.insert(dir);
        if opened {
            Recorded::Opened
        } else {
            Recorded::Pending
        }
    }

    /// Swap out the pending set and return it as a batch
    pub fn flush(&self) -> ChangeBatch {
        let taken = std::mem::take(&mut *self.pending.lock());
        ChangeBatch::from(taken)
    }

    /// Number of directories waiting for the next flush
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Watched roots this coalescer accepts
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Directory to report for a changed path
    ///
    /// A root reports itself; anything else reports its parent, provided
    /// the parent is inside a root.
    fn directory_for(&self, path: &Path) -> Option<PathBuf> {
        if self.roots.iter().any(|root| root == path) {
            return Some(path.to_path_buf());
        }

        let dir = path.parent()?;
        if self.roots.iter().any(|root| dir.starts_with(root)) {
            Some(dir.to_path_buf())
        } else {
            None
        }
    }
}
