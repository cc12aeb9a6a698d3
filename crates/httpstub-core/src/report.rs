//! Failure reporting seam between the engine and the host test harness.

use std::sync::{Arc, Mutex, PoisonError};

/// Receives failure messages as the engine records them.
///
/// The engine never decides what a failure does to the test run; it only
/// delivers messages here. Route misses arrive the moment they happen,
/// everything else at teardown. Implementations must tolerate delivery
/// from concurrent server workers.
pub trait FailureSink: Send + Sync {
    fn failure(&self, message: &str);
}

/// Shared sinks forward, so a test can keep a handle to the sink it
/// installs and read it back after teardown.
impl<S: FailureSink + ?Sized> FailureSink for Arc<S> {
    fn failure(&self, message: &str) {
        (**self).failure(message);
    }
}

/// Thread-safe collecting sink, the default wiring: the server drains it
/// at teardown and fails the test once with every message. Also handy in
/// tests that want to assert on reported messages directly.
#[derive(Debug, Default)]
pub struct FailureLog {
    messages: Mutex<Vec<String>>,
}

impl FailureLog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of messages collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Drain every collected message, in arrival order.
    #[must_use]
    pub fn take(&self) -> Vec<String> {
        std::mem::take(&mut *self.lock())
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.messages.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FailureSink for FailureLog {
    fn failure(&self, message: &str) {
        self.lock().push(message.to_string());
    }
}
