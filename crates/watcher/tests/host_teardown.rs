//! Process host loop lifetime
//!
//! Kept in its own test binary because it resets process-wide state.

use crossbeam_channel::unbounded;
use dirwatch::{HostLoop, Notifier};
use std::fs;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_teardown_releases_handle_without_breaking_notifiers() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().to_path_buf();

    let notifier = Notifier::new(root.clone(), 0.1).unwrap();
    let first = Arc::clone(notifier.host());
    assert!(HostLoop::is_initialized());
    assert!(Arc::ptr_eq(&first, &HostLoop::acquire().unwrap()));

    assert!(HostLoop::teardown());
    assert!(!HostLoop::is_initialized());
    assert!(!HostLoop::teardown());

    // The notifier keeps its own reference to the released host
    let (tx, rx) = unbounded();
    notifier
        .on_change(move |batch| {
            let _ = tx.send(batch);
        })
        .unwrap();
    notifier.start().unwrap();
    thread::sleep(Duration::from_millis(200));
    fs::write(root.join("after-teardown.txt"), "x").unwrap();
    let batch = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(batch.contains(&root));
    notifier.stop().unwrap();

    let second = HostLoop::acquire().unwrap();
    assert!(!Arc::ptr_eq(&first, &second));
    assert!(HostLoop::is_initialized());
}
