// SessionRunner - the five strictly ordered steps of one guided session
//
//   1. say inhale prompt, wait inhale duration
//   2. say exhale prompt, wait exhale duration
//   3. say chant prompt
//   4. blocking microphone capture (up to max listen time)
//   5. classify the capture with the ChantDetector
//
// Pause and stop requests are not checked here; a session always runs to
// completion once started. The microphone is held exclusively for step 4.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::config::BreathingConfig;
use crate::detectors::ChantDetector;
use crate::engine::backend::{Microphone, SpeechSynthesizer, TimeSource, Transcriber};
use crate::error::SessionError;

use super::record::ChantSession;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStep {
    Inhale,
    Exhale,
    ChantPrompt,
    Capture,
    Classify,
}

impl SessionStep {
    pub fn name(&self) -> &'static str {
        match self {
            SessionStep::Inhale => "inhale",
            SessionStep::Exhale => "exhale",
            SessionStep::ChantPrompt => "chant_prompt",
            SessionStep::Capture => "capture",
            SessionStep::Classify => "classify",
        }
    }
}

/// Prompt texts and step timings
#[derive(Debug, Clone)]
pub struct SessionScript {
    pub id: String,
    pub inhale_prompt: String,
    pub exhale_prompt: String,
    pub chant_prompt: String,
    pub inhale: Duration,
    pub exhale: Duration,
    pub max_listen: Duration,
}

impl SessionScript {
    pub fn from_config(config: &BreathingConfig) -> Self {
        Self {
            id: config.prompt_script_id.clone(),
            inhale_prompt: config.inhale_prompt.clone(),
            exhale_prompt: config.exhale_prompt.clone(),
            chant_prompt: config.chant_prompt.clone(),
            inhale: config.inhale_duration(),
            exhale: config.exhale_duration(),
            max_listen: config.max_listen(),
        }
    }
}

pub struct SessionRunner {
    script: SessionScript,
    speaker: Arc<dyn SpeechSynthesizer>,
    microphone: Mutex<Arc<dyn Microphone>>,
    transcriber: Arc<dyn Transcriber>,
    detector: Mutex<ChantDetector>,
    clock: Arc<dyn TimeSource>,
}

/// A panic in an earlier session must not wedge every later one.
fn recover<'a, T>(
    result: Result<MutexGuard<'a, T>, PoisonError<MutexGuard<'a, T>>>,
    what: &str,
) -> MutexGuard<'a, T> {
    result.unwrap_or_else(|poisoned| {
        log::warn!("[SessionRunner] Recovering {} lock after a failed session", what);
        poisoned.into_inner()
    })
}

impl SessionRunner {
    pub fn new(
        script: SessionScript,
        detector: ChantDetector,
        speaker: Arc<dyn SpeechSynthesizer>,
        microphone: Arc<dyn Microphone>,
        transcriber: Arc<dyn Transcriber>,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        Self {
            script,
            speaker,
            microphone: Mutex::new(microphone),
            transcriber,
            detector: Mutex::new(detector),
            clock,
        }
    }

    pub fn script(&self) -> &SessionScript {
        &self.script
    }

    /// Run all five steps and return the populated record.
    ///
    /// # Errors
    /// * `SessionError::Fault` - the microphone failed during capture
    pub fn run(&self, sequence_number: u64, forced: bool) -> Result<ChantSession, SessionError> {
        let started_at = self.clock.now();

        log::debug!("[SessionRunner] #{} step {}", sequence_number, SessionStep::Inhale.name());
        self.speaker.say(&self.script.inhale_prompt);
        self.clock.sleep(self.script.inhale);

        log::debug!("[SessionRunner] #{} step {}", sequence_number, SessionStep::Exhale.name());
        self.speaker.say(&self.script.exhale_prompt);
        self.clock.sleep(self.script.exhale);

        log::debug!("[SessionRunner] #{} step {}", sequence_number, SessionStep::ChantPrompt.name());
        self.speaker.say(&self.script.chant_prompt);

        log::debug!("[SessionRunner] #{} step {}", sequence_number, SessionStep::Capture.name());
        let capture = {
            let microphone = recover(self.microphone.lock(), "microphone");
            microphone
                .capture_audio(self.script.max_listen, self.script.max_listen)
                .map_err(|err| SessionError::Fault {
                    step: SessionStep::Capture.name().to_string(),
                    reason: err.to_string(),
                })?
        };

        log::debug!("[SessionRunner] #{} step {}", sequence_number, SessionStep::Classify.name());
        let outcome = {
            let mut detector = recover(self.detector.lock(), "chant detector");
            detector.evaluate(&capture, self.transcriber.as_ref())
        };

        Ok(ChantSession {
            sequence_number,
            prompt_script_id: self.script.id.clone(),
            detected: outcome.detected,
            duration: outcome.duration_secs,
            started_at,
            ended_at: self.clock.now(),
            forced,
            verdict: outcome.verdict,
        })
    }

    pub fn reset_detector_stats(&self) {
        recover(self.detector.lock(), "chant detector").reset_stats();
    }
}
