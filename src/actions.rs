//! Action runner.
//!
//! Rendered output can carry `<action>` tokens. This module turns batches of
//! those tokens into timed hardware choreographies, one batch at a time, on a
//! single background worker.
//!
//! ## How the parts work together
//!
//! ```text
//! enqueue(["head_yes", "dance90"]) ──▶ FIFO ──▶ worker thread         (runner.rs)
//!                                                 │ clear cancel flag
//!                                                 │ per token:
//!                                                 │   Action::from_token   (action.rs)
//!                                                 │   Action::perform ──▶ Hardware (hardware.rs)
//!                                                 │     cancellable waits  (cancel.rs)
//!                                                 v
//! interrupt() ── lock { set flag, drain FIFO, stop() }
//! ```
//!
//! ## Responsibilities by module
//!
//! - `cancel.rs`: shared cancellation flag and the deadline-bounded wait.
//! - `hardware.rs`: the hardware capability trait plus a logging simulator and
//!   a recording double.
//! - `action.rs`: the closed set of actions, their budgets and choreographies.
//! - `runner.rs`: the queue, the worker loop and `interrupt`.

#[path = "actions/action.rs"]
mod action;
#[path = "actions/cancel.rs"]
mod cancel;
#[path = "actions/hardware.rs"]
mod hardware;
#[path = "actions/runner.rs"]
mod runner;

pub use action::Action;
pub use cancel::{CancelToken, Outcome, Wait};
pub use hardware::{Hardware, HardwareCall, RecordingHardware, SimulatedHardware};
pub use runner::{ActionRunner, RunnerState};
