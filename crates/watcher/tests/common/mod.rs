//! Common utilities for notifier integration tests
//!
//! `FakeSource` stands in for the OS notification layer. Tests push raw
//! signals with `emit`, inject failures with `fail` and `reject_next`, and
//! inspect how the run loop drove the source.

#![allow(dead_code)]

use crossbeam_channel::{unbounded, Receiver};
use dirwatch::{ChangeBatch, Error, EventSource, HostLoop, Notifier, SignalSink, Watch, WatchHandle};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Default)]
struct FakeState {
    sink: Option<SignalSink>,
    begun: usize,
    ended: usize,
    reject_next: Option<String>,
    begin_delay: Option<Duration>,
    last_watch: Option<(Vec<PathBuf>, Duration)>,
}

/// Scripted event source
#[derive(Clone, Default)]
pub struct FakeSource {
    state: Arc<Mutex<FakeState>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host loop backed by this source
    pub fn host(&self) -> Arc<HostLoop> {
        HostLoop::new(self.clone())
    }

    /// Push a raw change signal into the active watch
    pub fn emit(&self, path: impl AsRef<Path>) {
        let sink = self.state.lock().sink.clone();
        sink.expect("no active watch").changed(path.as_ref());
    }

    /// Report a mid-run failure
    pub fn fail(&self, error: Error) {
        let sink = self.state.lock().sink.clone();
        sink.expect("no active watch").failed(error);
    }

    /// Make the next `begin_watch` fail
    pub fn reject_next(&self, reason: &str) {
        self.state.lock().reject_next = Some(reason.to_string());
    }

    /// Make every `begin_watch` take this long
    pub fn delay_begin(&self, delay: Duration) {
        self.state.lock().begin_delay = Some(delay);
    }

    pub fn begun(&self) -> usize {
        self.state.lock().begun
    }

    pub fn ended(&self) -> usize {
        self.state.lock().ended
    }

    /// Watches begun and not yet ended
    pub fn active(&self) -> usize {
        let state = self.state.lock();
        state.begun - state.ended
    }

    pub fn last_watch(&self) -> Option<(Vec<PathBuf>, Duration)> {
        self.state.lock().last_watch.clone()
    }
}

impl EventSource for FakeSource {
    fn name(&self) -> &str {
        "fake"
    }

    fn begin_watch(
        &self,
        paths: &[PathBuf],
        latency_hint: Duration,
        sink: SignalSink,
    ) -> dirwatch::Result<WatchHandle> {
        let delay = self.state.lock().begin_delay;
        if let Some(delay) = delay {
            thread::sleep(delay);
        }

        let mut state = self.state.lock();
        if let Some(reason) = state.reject_next.take() {
            return Err(Error::WatchFailed {
                path: paths[0].clone(),
                reason,
            });
        }

        state.begun += 1;
        state.sink = Some(sink);
        state.last_watch = Some((paths.to_vec(), latency_hint));
        Ok(WatchHandle::new(FakeWatch {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeWatch {
    state: Arc<Mutex<FakeState>>,
}

impl Watch for FakeWatch {
    fn end(self: Box<Self>) -> dirwatch::Result<()> {
        let mut state = self.state.lock();
        state.ended += 1;
        state.sink = None;
        Ok(())
    }
}

/// Notifier on a fake host whose batches arrive on the returned channel
pub fn notifier_with_channel(
    source: &FakeSource,
    paths: &[&str],
    latency: f64,
) -> (Notifier, Receiver<ChangeBatch>) {
    let (tx, rx) = unbounded();
    let notifier = Notifier::builder()
        .host(source.host())
        .paths(paths.to_vec())
        .latency(latency)
        .on_change(move |batch| {
            let _ = tx.send(batch);
        })
        .build()
        .unwrap();
    (notifier, rx)
}

/// Poll `condition` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}
