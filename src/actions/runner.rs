//! Background execution of action batches.
//!
//! One worker thread owns the hardware for motion; producers only touch the
//! queue. The queue mutex also serializes `interrupt` against the worker
//! picking up a new batch: an interrupt either drains a batch before it
//! starts or cancels it while it runs. The stop that follows an interrupt is
//! issued after the lock is released.
//!
//! Nothing a batch does can end the worker: driver calls and the state
//! observer both run under `catch_unwind`.

use super::action::Action;
use super::cancel::{CancelToken, Outcome};
use super::hardware::Hardware;
use crate::api::RunnerOptions;
use crate::error::HardwareError;
use std::any::Any;
use std::collections::VecDeque;
use std::fmt;
use std::io;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Upper bound on one idle wait of the worker, so it can notice shutdown.
const QUEUE_WAIT: Duration = Duration::from_millis(250);

/// Observable runner state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunnerState {
    Idle,
    ExecActions,
}

impl RunnerState {
    pub fn as_str(self) -> &'static str {
        match self {
            RunnerState::Idle => "IDLE",
            RunnerState::ExecActions => "EXEC_ACTIONS",
        }
    }
}

impl fmt::Display for RunnerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

type Observer = Box<dyn Fn(RunnerState) + Send + Sync>;

#[derive(Default)]
struct Queue {
    batches: VecDeque<Vec<String>>,
    busy: bool,
    shutdown: bool,
}

struct Shared {
    queue: Mutex<Queue>,
    /// Signalled when a batch is queued or shutdown starts.
    ready: Condvar,
    /// Signalled when the worker finishes a batch.
    idle: Condvar,
    cancel: CancelToken,
    hardware: Arc<dyn Hardware>,
    observer: Option<Observer>,
}

/// FIFO of action batches executed by one worker thread.
///
/// Dropping the runner cancels the running batch, discards queued ones and
/// joins the worker.
pub struct ActionRunner {
    shared: Arc<Shared>,
    worker: Option<JoinHandle<()>>,
}

impl ActionRunner {
    pub fn new(hardware: Arc<dyn Hardware>, options: RunnerOptions) -> io::Result<Self> {
        Self::spawn(hardware, options, None)
    }

    /// Like [`new`](Self::new), calling `observer` from the worker on every
    /// state change.
    pub fn with_observer(
        hardware: Arc<dyn Hardware>,
        options: RunnerOptions,
        observer: impl Fn(RunnerState) + Send + Sync + 'static,
    ) -> io::Result<Self> {
        Self::spawn(hardware, options, Some(Box::new(observer)))
    }

    fn spawn(hardware: Arc<dyn Hardware>, options: RunnerOptions, observer: Option<Observer>) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            queue: Mutex::new(Queue::default()),
            ready: Condvar::new(),
            idle: Condvar::new(),
            cancel: CancelToken::new(options.poll_interval),
            hardware,
            observer,
        });
        let worker_shared = Arc::clone(&shared);
        let worker = thread::Builder::new().name("parley-actions".into()).spawn(move || worker_shared.run())?;
        Ok(Self { shared, worker: Some(worker) })
    }

    /// Queue a batch. Empty batches are ignored; never blocks on execution.
    pub fn enqueue(&self, batch: Vec<String>) {
        if batch.is_empty() {
            return;
        }
        let mut queue = self.shared.lock();
        if queue.shutdown {
            warn!(?batch, "runner shut down, batch dropped");
            return;
        }
        debug!(?batch, "batch queued");
        queue.batches.push_back(batch);
        drop(queue);
        self.shared.ready.notify_one();
    }

    /// Cancel the running batch, drop everything queued and stop the robot.
    ///
    /// A failing stop is logged and otherwise ignored.
    pub fn interrupt(&self) {
        let mut queue = self.shared.lock();
        self.shared.cancel.cancel();
        let dropped = queue.batches.len();
        queue.batches.clear();
        drop(queue);
        info!(dropped, "action interrupt");
        self.shared.safe_stop("interrupt");
    }

    /// Batches waiting behind the current one.
    pub fn pending(&self) -> usize {
        self.shared.lock().batches.len()
    }

    /// Whether the worker is in the middle of a batch.
    pub fn is_busy(&self) -> bool {
        self.shared.lock().busy
    }

    /// Block until the queue is empty and no batch runs, or `timeout` passes.
    /// Returns `true` when idle.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let guard = self.shared.lock();
        let (guard, _) = self
            .shared
            .idle
            .wait_timeout_while(guard, timeout, |q| q.busy || !q.batches.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        !guard.busy && guard.batches.is_empty()
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.shared.cancel
    }

    /// Cancel, discard queued batches and join the worker. Idempotent.
    pub fn shutdown(&mut self) {
        let Some(worker) = self.worker.take() else {
            return;
        };
        {
            let mut queue = self.shared.lock();
            queue.shutdown = true;
            queue.batches.clear();
            self.shared.cancel.cancel();
        }
        self.shared.ready.notify_all();
        if worker.join().is_err() {
            error!("action worker panicked");
        }
        debug!("action runner shut down");
    }
}

impl Drop for ActionRunner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl fmt::Debug for ActionRunner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let queue = self.shared.lock();
        f.debug_struct("ActionRunner")
            .field("pending", &queue.batches.len())
            .field("busy", &queue.busy)
            .field("cancelled", &self.shared.cancel.is_cancelled())
            .finish()
    }
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, state: RunnerState) {
        let Some(observer) = &self.observer else {
            return;
        };
        if let Err(payload) = catch_unwind(AssertUnwindSafe(|| observer(state))) {
            error!(state = %state, "state observer panicked: {}", panic_message(payload.as_ref()));
        }
    }

    fn run(&self) {
        while let Some(batch) = self.next_batch() {
            if let Err(payload) = catch_unwind(AssertUnwindSafe(|| self.run_batch(&batch))) {
                error!("batch aborted by panic: {}", panic_message(payload.as_ref()));
                self.safe_stop("worker panic");
            }
            self.notify(RunnerState::Idle);
            self.lock().busy = false;
            self.idle.notify_all();
        }
    }

    /// Block for the next batch; `None` once shut down. Clears the cancel
    /// flag under the queue lock when a batch is taken.
    fn next_batch(&self) -> Option<Vec<String>> {
        let mut queue = self.lock();
        loop {
            if queue.shutdown {
                return None;
            }
            if let Some(batch) = queue.batches.pop_front() {
                queue.busy = true;
                self.cancel.reset();
                return Some(batch);
            }
            queue = self.ready.wait_timeout(queue, QUEUE_WAIT).unwrap_or_else(PoisonError::into_inner).0;
        }
    }

    fn run_batch(&self, batch: &[String]) {
        self.notify(RunnerState::ExecActions);
        for (idx, token) in batch.iter().enumerate() {
            if self.cancel.is_cancelled() {
                debug!(abandoned = batch.len() - idx, "batch cancelled");
                break;
            }
            let Some(action) = Action::from_token(token) else {
                warn!(token = %token, "unknown action ignored");
                continue;
            };
            self.run_action(action);
        }
    }

    /// Run one action. Aborts and faults both end with a stop.
    fn run_action(&self, action: Action) {
        let budget = action.budget();
        info!(action = action.name(), budget_s = budget.as_secs_f32(), "action start");
        let deadline = Instant::now() + budget;

        let hardware = self.hardware.as_ref();
        let result = catch_unwind(AssertUnwindSafe(|| action.perform(hardware, &self.cancel, deadline)))
            .unwrap_or_else(|payload| Err(HardwareError::Panicked(panic_message(payload.as_ref()))));

        match result {
            Ok(Outcome::Completed) => debug!(action = action.name(), "action completed"),
            Ok(Outcome::Aborted) => {
                debug!(action = action.name(), cancelled = self.cancel.is_cancelled(), "action aborted");
                self.safe_stop("abort");
            }
            Err(err) => {
                error!(action = action.name(), "action failed: {err}");
                self.safe_stop("fault");
            }
        }
    }

    fn safe_stop(&self, context: &'static str) {
        match catch_unwind(AssertUnwindSafe(|| self.hardware.stop())) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => error!(context, "stop failed: {err}"),
            Err(payload) => error!(context, "stop panicked: {}", panic_message(payload.as_ref())),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_labels() {
        assert_eq!(RunnerState::Idle.to_string(), "IDLE");
        assert_eq!(RunnerState::ExecActions.as_str(), "EXEC_ACTIONS");
    }

    #[test]
    fn panic_payloads_become_messages() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(format!("code {}", 7));
        assert_eq!(panic_message(payload.as_ref()), "code 7");
        let payload: Box<dyn Any + Send> = Box::new(7_u8);
        assert_eq!(panic_message(payload.as_ref()), "unknown panic");
    }
}
