use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

/// Cooperative cancellation shared between the runner and running actions.
///
/// Cloning shares the flag. Reads are lock-free; a running action notices a
/// cancel within one poll interval.
#[derive(Debug, Clone)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    poll_interval: Duration,
}

/// Result of a cancellable wait.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    /// The full duration elapsed with no cancel and the deadline not reached.
    Continue,
    /// Cancelled or past the deadline; the caller should return early.
    Abort,
}

impl Wait {
    pub fn is_abort(self) -> bool {
        self == Wait::Abort
    }
}

/// How a choreography ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Aborted,
}

impl CancelToken {
    pub fn new(poll_interval: Duration) -> Self {
        // A zero interval would turn every wait into a busy loop.
        let poll_interval = poll_interval.max(Duration::from_millis(1));
        Self { flag: Arc::new(AtomicBool::new(false)), poll_interval }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub(crate) fn reset(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Sleep for `duration` in poll-sized steps.
    ///
    /// Returns [`Wait::Abort`] as soon as the token is cancelled or `deadline`
    /// is reached, including when that is already true on entry.
    pub fn wait(&self, duration: Duration, deadline: Instant) -> Wait {
        let end = Instant::now() + duration;
        loop {
            let now = Instant::now();
            if self.is_cancelled() || now >= deadline {
                return Wait::Abort;
            }
            if now >= end {
                return Wait::Continue;
            }
            thread::sleep(self.poll_interval.min(end - now));
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new(Duration::from_millis(30))
    }
}
