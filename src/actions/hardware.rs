use super::cancel::{CancelToken, Outcome};
use crate::error::HardwareError;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Servo targets are on a 2000..=8000 scale, centre 5000.
const SERVO_MIN: u16 = 2000;
const SERVO_MAX: u16 = 8000;
/// Wheel speeds are deltas from neutral; below 800 the wheels do not move.
const DRIVE_MIN: u16 = 800;
const DRIVE_MAX: u16 = 1600;

/// Capabilities the action runner needs from the robot.
///
/// Implementations are shared with the worker thread, so every call takes
/// `&self`. A call either completes or returns an error; it never retries.
pub trait Hardware: Send + Sync {
    /// Halt wheels and bring motion to neutral. Must be safe to call at any time.
    fn stop(&self) -> Result<(), HardwareError>;
    fn turn_left(&self, speed: u16) -> Result<(), HardwareError>;
    fn turn_right(&self, speed: u16) -> Result<(), HardwareError>;
    fn head_pan(&self, value: u16) -> Result<(), HardwareError>;
    fn head_tilt(&self, value: u16) -> Result<(), HardwareError>;
    /// Multi-step arm motion. Must give up at `deadline` or when `cancel`
    /// fires, reporting [`Outcome::Aborted`].
    fn arm_raise_sequence(&self, deadline: Instant, cancel: &CancelToken) -> Result<Outcome, HardwareError>;
}

/// Hardware that only logs, with the drive and servo limits a real
/// controller enforces. Used by the CLI.
#[derive(Debug, Default)]
pub struct SimulatedHardware;

impl SimulatedHardware {
    pub fn new() -> Self {
        Self
    }
}

impl Hardware for SimulatedHardware {
    fn stop(&self) -> Result<(), HardwareError> {
        info!("hw: stop/neutral");
        Ok(())
    }

    fn turn_left(&self, speed: u16) -> Result<(), HardwareError> {
        info!(speed = speed.clamp(DRIVE_MIN, DRIVE_MAX), "hw: turn left");
        Ok(())
    }

    fn turn_right(&self, speed: u16) -> Result<(), HardwareError> {
        info!(speed = speed.clamp(DRIVE_MIN, DRIVE_MAX), "hw: turn right");
        Ok(())
    }

    fn head_pan(&self, value: u16) -> Result<(), HardwareError> {
        info!(value = value.clamp(SERVO_MIN, SERVO_MAX), "hw: head pan");
        Ok(())
    }

    fn head_tilt(&self, value: u16) -> Result<(), HardwareError> {
        info!(value = value.clamp(SERVO_MIN, SERVO_MAX), "hw: head tilt");
        Ok(())
    }

    fn arm_raise_sequence(&self, deadline: Instant, cancel: &CancelToken) -> Result<Outcome, HardwareError> {
        let steps = [("shoulder up", 1200), ("elbow out", 800), ("hold", 600), ("lower", 1000)];
        for (step, millis) in steps {
            info!(step, "hw: arm");
            if cancel.wait(Duration::from_millis(millis), deadline).is_abort() {
                debug!(step, "hw: arm sequence aborted");
                return Ok(Outcome::Aborted);
            }
        }
        Ok(Outcome::Completed)
    }
}

/// One call made on a [`RecordingHardware`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareCall {
    Stop,
    TurnLeft(u16),
    TurnRight(u16),
    HeadPan(u16),
    HeadTilt(u16),
    ArmRaise,
}

impl HardwareCall {
    /// Method name of the call, e.g. `"head_tilt"`.
    pub fn name(&self) -> &'static str {
        match self {
            HardwareCall::Stop => "stop",
            HardwareCall::TurnLeft(_) => "turn_left",
            HardwareCall::TurnRight(_) => "turn_right",
            HardwareCall::HeadPan(_) => "head_pan",
            HardwareCall::HeadTilt(_) => "head_tilt",
            HardwareCall::ArmRaise => "arm_raise_sequence",
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Fault {
    Error,
    Panic,
}

/// Hardware double that records every call in order.
///
/// Faults can be injected per method name: [`fail_on`](Self::fail_on) makes
/// the call return an error, [`panic_on`](Self::panic_on) makes it unwind.
/// The call is recorded either way. `--dry-run` also uses it.
#[derive(Debug)]
pub struct RecordingHardware {
    calls: Mutex<Vec<HardwareCall>>,
    faults: Mutex<HashMap<&'static str, Fault>>,
    arm_duration: Duration,
}

impl Default for RecordingHardware {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingHardware {
    pub fn new() -> Self {
        Self::with_arm_duration(Duration::ZERO)
    }

    /// How long `arm_raise_sequence` takes when not cancelled.
    pub fn with_arm_duration(arm_duration: Duration) -> Self {
        Self { calls: Mutex::new(Vec::new()), faults: Mutex::new(HashMap::new()), arm_duration }
    }

    pub fn fail_on(&self, method: &'static str) {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner).insert(method, Fault::Error);
    }

    pub fn panic_on(&self, method: &'static str) {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner).insert(method, Fault::Panic);
    }

    pub fn clear_faults(&self) {
        self.faults.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    /// Calls so far, oldest first.
    pub fn calls(&self) -> Vec<HardwareCall> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn stop_count(&self) -> usize {
        self.calls().iter().filter(|call| **call == HardwareCall::Stop).count()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    fn record(&self, call: HardwareCall) -> Result<(), HardwareError> {
        self.calls.lock().unwrap_or_else(PoisonError::into_inner).push(call);
        let fault = self.faults.lock().unwrap_or_else(PoisonError::into_inner).get(call.name()).copied();
        match fault {
            None => Ok(()),
            Some(Fault::Error) => Err(HardwareError::Write(format!("injected fault in {}", call.name()))),
            Some(Fault::Panic) => panic!("injected panic in {}", call.name()),
        }
    }
}

impl Hardware for RecordingHardware {
    fn stop(&self) -> Result<(), HardwareError> {
        self.record(HardwareCall::Stop)
    }

    fn turn_left(&self, speed: u16) -> Result<(), HardwareError> {
        self.record(HardwareCall::TurnLeft(speed))
    }

    fn turn_right(&self, speed: u16) -> Result<(), HardwareError> {
        self.record(HardwareCall::TurnRight(speed))
    }

    fn head_pan(&self, value: u16) -> Result<(), HardwareError> {
        self.record(HardwareCall::HeadPan(value))
    }

    fn head_tilt(&self, value: u16) -> Result<(), HardwareError> {
        self.record(HardwareCall::HeadTilt(value))
    }

    fn arm_raise_sequence(&self, deadline: Instant, cancel: &CancelToken) -> Result<Outcome, HardwareError> {
        self.record(HardwareCall::ArmRaise)?;
        if cancel.wait(self.arm_duration, deadline).is_abort() {
            return Ok(Outcome::Aborted);
        }
        Ok(Outcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_calls_in_order() {
        let hw = RecordingHardware::new();
        hw.head_tilt(6400).unwrap();
        hw.turn_left(1000).unwrap();
        hw.stop().unwrap();
        assert_eq!(hw.calls(), vec![HardwareCall::HeadTilt(6400), HardwareCall::TurnLeft(1000), HardwareCall::Stop]);
        assert_eq!(hw.stop_count(), 1);
    }

    #[test]
    fn injected_error_is_returned_and_still_recorded() {
        let hw = RecordingHardware::new();
        hw.fail_on("head_pan");
        let err = hw.head_pan(3600).unwrap_err();
        assert!(matches!(err, HardwareError::Write(_)));
        assert_eq!(hw.calls(), vec![HardwareCall::HeadPan(3600)]);
        hw.clear_faults();
        assert!(hw.head_pan(3600).is_ok());
    }

    #[test]
    fn arm_sequence_honours_cancel() {
        let hw = RecordingHardware::with_arm_duration(Duration::from_secs(5));
        let cancel = CancelToken::new(Duration::from_millis(2));
        cancel.cancel();
        let out = hw.arm_raise_sequence(Instant::now() + Duration::from_secs(10), &cancel).unwrap();
        assert_eq!(out, Outcome::Aborted);
    }

    #[test]
    fn simulated_arm_sequence_stops_at_deadline() {
        let cancel = CancelToken::new(Duration::from_millis(2));
        let started = Instant::now();
        let out = SimulatedHardware::new().arm_raise_sequence(started + Duration::from_millis(20), &cancel).unwrap();
        assert_eq!(out, Outcome::Aborted);
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
