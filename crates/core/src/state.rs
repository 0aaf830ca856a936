//! Notifier lifecycle states

use std::fmt;

/// Lifecycle state of a notifier
///
/// ```text
/// Stopped -> Starting -> Running -> Stopping -> Stopped
///               |                       ^
///               +-----------------------+  (stop requested while starting)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum State {
    /// No run loop exists
    Stopped,
    /// A run loop is being created; watches are not yet confirmed
    Starting,
    /// A run loop is active and delivering batches
    Running,
    /// The run loop has been signalled and is being joined
    Stopping,
}

impl State {
    /// Lowercase name used in messages
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Stopped => "stopped",
            State::Starting => "starting",
            State::Running => "running",
            State::Stopping => "stopping",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
