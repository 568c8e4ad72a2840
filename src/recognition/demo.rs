//! Scripted fingerprint engine
//!
//! Stands in for the platform recognition engine, which is hardware
//! and vendor specific. The CLI `listen` command and the session tests
//! both drive the controller through this engine.

use std::collections::VecDeque;
use std::time::Duration;

use super::{EngineError, FingerprintEngine, RecognitionMatch, Verdict};

/// Engine that replays a fixed sequence of verdicts
pub struct ScriptedEngine {
    script: VecDeque<Result<Verdict, EngineError>>,
    begin_error: Option<String>,
    step_delay: Duration,
    capturing: bool,
}

impl ScriptedEngine {
    /// Replay `script` in order, then report no-match
    pub fn new(script: Vec<Result<Verdict, EngineError>>) -> Self {
        Self {
            script: script.into(),
            begin_error: None,
            step_delay: Duration::ZERO,
            capturing: false,
        }
    }

    /// Engine that keeps reporting "insufficient data" until cancelled
    pub fn endless() -> Self {
        let mut engine = Self::new(vec![]);
        engine.step_delay = Duration::from_millis(5);
        engine
    }

    /// Make `begin` fail with a capture fault
    pub fn fail_begin(&mut self, message: &str) {
        self.begin_error = Some(message.to_string());
    }

    /// Pause between verdicts, to mimic audio accumulating
    pub fn with_step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    /// Whether the audio tap is currently open
    pub fn is_capturing(&self) -> bool {
        self.capturing
    }
}

impl FingerprintEngine for ScriptedEngine {
    fn begin(&mut self) -> Result<(), EngineError> {
        if let Some(message) = &self.begin_error {
            return Err(EngineError::Capture(message.clone()));
        }
        self.capturing = true;
        Ok(())
    }

    fn advance(&mut self) -> Result<Verdict, EngineError> {
        if !self.step_delay.is_zero() {
            std::thread::sleep(self.step_delay);
        }
        match self.script.pop_front() {
            Some(step) => step,
            // Scripts created by `endless` never run out
            None if self.step_delay > Duration::ZERO => Ok(Verdict::Insufficient),
            None => Ok(Verdict::NoMatch),
        }
    }

    fn finish(&mut self) {
        self.capturing = false;
    }
}

/// Scripted engine for the CLI demo: a few seconds of "listening",
/// then a match against a sample track
pub fn demo_engine() -> ScriptedEngine {
    ScriptedEngine::new(vec![
        Ok(Verdict::Insufficient),
        Ok(Verdict::Insufficient),
        Ok(Verdict::Insufficient),
        Ok(Verdict::Match(RecognitionMatch {
            title: Some("Blackbird".to_string()),
            artist: Some("The Beatles".to_string()),
            artwork_url: Some(
                "https://upload.wikimedia.org/wikipedia/commons/9/9e/TheBeatles68LP.jpg"
                    .to_string(),
            ),
            provider_track_id: Some("track-40769540".to_string()),
        })),
    ])
    .with_step_delay(Duration::from_millis(600))
}
