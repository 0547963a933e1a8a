use super::cancel::{CancelToken, Outcome};
use super::hardware::Hardware;
use crate::error::HardwareError;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::error;

/// Return early from a choreography when a cancellable wait aborts.
macro_rules! pause {
    ($cancel:expr, $deadline:expr, $millis:expr) => {
        if $cancel.wait(Duration::from_millis($millis), $deadline).is_abort() {
            return Ok(Outcome::Aborted);
        }
    };
}

/// The actions a script may request with `<token>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    HeadYes,
    HeadNo,
    ArmRaise,
    Dance90,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::HeadYes, Action::HeadNo, Action::ArmRaise, Action::Dance90];

    /// Action for a token as it appears in output, without the angle brackets.
    pub fn from_token(token: &str) -> Option<Action> {
        match token {
            "head_yes" => Some(Action::HeadYes),
            "head_no" => Some(Action::HeadNo),
            "arm_raise" => Some(Action::ArmRaise),
            "dance90" => Some(Action::Dance90),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Action::HeadYes => "head_yes",
            Action::HeadNo => "head_no",
            Action::ArmRaise => "arm_raise",
            Action::Dance90 => "dance90",
        }
    }

    /// Wall-clock budget from the start of the action.
    pub fn budget(self) -> Duration {
        match self {
            Action::HeadYes | Action::HeadNo => Duration::from_secs(3),
            Action::ArmRaise => Duration::from_secs(4),
            Action::Dance90 => Duration::from_secs(6),
        }
    }

    /// Whether the choreography drives the wheels.
    pub fn engages_wheels(self) -> bool {
        matches!(self, Action::Dance90)
    }

    /// Run the choreography, giving up at `deadline` or on cancel.
    ///
    /// Wheel actions stop the wheels on every exit, including an error or a
    /// panic in the driver.
    pub fn perform(self, hw: &dyn Hardware, cancel: &CancelToken, deadline: Instant) -> Result<Outcome, HardwareError> {
        match self {
            Action::HeadYes => {
                hw.head_tilt(6400)?;
                pause!(cancel, deadline, 400);
                hw.head_tilt(4200)?;
                pause!(cancel, deadline, 400);
                hw.head_tilt(5000)?;
                pause!(cancel, deadline, 200);
                Ok(Outcome::Completed)
            }
            Action::HeadNo => {
                hw.head_pan(6400)?;
                pause!(cancel, deadline, 350);
                hw.head_pan(3600)?;
                pause!(cancel, deadline, 450);
                hw.head_pan(5000)?;
                pause!(cancel, deadline, 200);
                Ok(Outcome::Completed)
            }
            Action::ArmRaise => hw.arm_raise_sequence(deadline, cancel),
            Action::Dance90 => {
                let _wheels = WheelGuard { hw };
                hw.turn_left(1000)?;
                pause!(cancel, deadline, 600);
                hw.stop()?;
                pause!(cancel, deadline, 150);
                hw.turn_right(1000)?;
                pause!(cancel, deadline, 600);
                Ok(Outcome::Completed)
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Stops the wheels when dropped.
struct WheelGuard<'a> {
    hw: &'a dyn Hardware,
}

impl Drop for WheelGuard<'_> {
    fn drop(&mut self) {
        if let Err(err) = self.hw.stop() {
            error!("wheel stop failed: {err}");
        }
    }
}
