//! One conversation: a dialogue engine feeding an action runner.

use crate::actions::ActionRunner;
use crate::api::TurnResult;
use crate::engine::DialogueEngine;
use crate::text::sanitize_speech;
use std::fmt;
use tracing::debug;

/// Receives the text a turn wants spoken, already sanitized for TTS.
pub trait Speaker: Send {
    fn speak(&self, text: &str);
}

impl<F: Fn(&str) + Send> Speaker for F {
    fn speak(&self, text: &str) {
        self(text)
    }
}

/// Glue between a [`DialogueEngine`] and an [`ActionRunner`].
///
/// Each turn is run synchronously; actions go to the runner's queue and the
/// call returns without waiting for them. An interrupt word also interrupts
/// the runner.
pub struct Session {
    dialogue: DialogueEngine,
    runner: ActionRunner,
    speaker: Option<Box<dyn Speaker>>,
}

impl Session {
    pub fn new(dialogue: DialogueEngine, runner: ActionRunner) -> Self {
        Self { dialogue, runner, speaker: None }
    }

    pub fn with_speaker(mut self, speaker: impl Speaker + 'static) -> Self {
        self.speaker = Some(Box::new(speaker));
        self
    }

    pub fn handle_input(&mut self, text: &str) -> TurnResult {
        let result = self.dialogue.handle_input(text);

        if result.interrupt {
            self.runner.interrupt();
        } else if !result.actions.is_empty() {
            self.runner.enqueue(result.actions.clone());
        }

        if let Some(speaker) = &self.speaker {
            let spoken = sanitize_speech(&result.spoken_text);
            if !spoken.is_empty() {
                debug!(text = %spoken, "speak");
                speaker.speak(&spoken);
            }
        }

        result
    }

    pub fn dialogue(&self) -> &DialogueEngine {
        &self.dialogue
    }

    pub fn dialogue_mut(&mut self) -> &mut DialogueEngine {
        &mut self.dialogue
    }

    pub fn runner(&self) -> &ActionRunner {
        &self.runner
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.dialogue.state())
            .field("runner", &self.runner)
            .field("speaker", &self.speaker.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DialogueOptions, HardwareCall, RecordingHardware, RunnerOptions};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const SCRIPT: &str = "\
u: (hello) : hi\tthere <head_yes> <moonwalk>
u: (spin) : spinning <dance90>
";

    fn session(hw: &Arc<RecordingHardware>) -> Session {
        let options = RunnerOptions { poll_interval: Duration::from_millis(2) };
        let runner = ActionRunner::new(hw.clone(), options).unwrap();
        Session::new(DialogueEngine::from_source("s.top", SCRIPT, DialogueOptions::seeded(1)), runner)
    }

    #[test]
    fn actions_are_queued_and_text_is_spoken() {
        let hw = Arc::new(RecordingHardware::new());
        let said = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&said);
        let mut session = session(&hw).with_speaker(move |text: &str| sink.lock().unwrap().push(text.to_string()));

        let out = session.handle_input("Hello!");
        assert_eq!(out.actions, vec!["head_yes", "moonwalk"]);
        assert!(session.runner().wait_idle(Duration::from_secs(5)));

        assert_eq!(*said.lock().unwrap(), vec!["hi there".to_string()]);
        assert_eq!(hw.calls().iter().filter(|c| matches!(c, HardwareCall::HeadTilt(_))).count(), 3);
    }

    #[test]
    fn interrupt_word_stops_the_runner() {
        let hw = Arc::new(RecordingHardware::new());
        let mut session = session(&hw);

        let out = session.handle_input("stop");
        assert!(out.interrupt);
        assert_eq!(hw.calls(), vec![HardwareCall::Stop]);
        assert_eq!(session.runner().pending(), 0);
    }

    #[test]
    fn no_match_speaks_nothing() {
        let hw = Arc::new(RecordingHardware::new());
        let said = Arc::new(Mutex::new(0));
        let sink = Arc::clone(&said);
        let mut session = session(&hw).with_speaker(move |_: &str| *sink.lock().unwrap() += 1);

        assert!(!session.handle_input("nothing here").matched);
        assert_eq!(*said.lock().unwrap(), 0);
        assert!(hw.calls().is_empty());
    }
}
