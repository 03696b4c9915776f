//! Collaborator abstractions for the monitor core.
//!
//! Camera, landmark models, microphone, speech recognition and speech
//! synthesis live outside the core; these traits are the minimal contracts the
//! detectors and the session scheduler consume.

use std::thread;
use std::time::{Duration, Instant};

use crate::analysis::features::{FaceKeypoints, FrameSize, PoseKeypoints};
use crate::audio::AudioBuffer;
use crate::error::SensorError;

mod stub;
pub use stub::{
    tone_buffer, ManualClock, RecordingSpeaker, ScriptedCamera, ScriptedFaceModel,
    ScriptedMicrophone, ScriptedPoseModel, ScriptedTranscriber, SyntheticSubject,
};

/// One captured camera frame.
///
/// The core never inspects pixels; `sequence` identifies the frame for
/// models that replay recorded or synthetic landmarks.
#[derive(Debug, Clone)]
pub struct Frame {
    pub size: FrameSize,
    pub sequence: u64,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(size: FrameSize, sequence: u64) -> Self {
        Self {
            size,
            sequence,
            data: Vec::new(),
        }
    }
}

/// Camera contract. `Ok(None)` means the stream ended.
pub trait FrameSource: Send {
    fn get_frame(&mut self) -> Result<Option<Frame>, SensorError>;
}

/// Pose landmark model: `None` when no body was found in the frame.
pub trait PoseModel: Send + Sync {
    fn extract_pose_keypoints(&self, frame: &Frame) -> Option<PoseKeypoints>;
}

/// Face landmark model: `None` when no face was found in the frame.
pub trait FaceModel: Send + Sync {
    fn extract_face_keypoints(&self, frame: &Frame) -> Option<FaceKeypoints>;
}

/// Result of one blocking microphone capture.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Captured(AudioBuffer),
    /// Nobody started speaking before the timeout
    TimedOut,
}

/// Microphone contract. Blocks the calling thread for up to `phrase_limit`.
pub trait Microphone: Send + Sync {
    fn capture_audio(
        &self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<CaptureOutcome, SensorError>;

    /// Sample room noise for `duration` and raise the speech energy floor to
    /// match. Devices without an adjustable floor accept this as a no-op.
    fn calibrate_ambient(&self, _duration: Duration) -> Result<(), SensorError> {
        Ok(())
    }
}

/// Speech-to-text outcome.
#[derive(Debug, Clone, PartialEq)]
pub enum Transcription {
    Text(String),
    /// Audio was heard but could not be understood
    Unrecognized,
    /// Recognition service failed or could not be reached
    ApiError(String),
}

/// Speech recognizer contract. May block on network I/O.
pub trait Transcriber: Send + Sync {
    fn transcribe(&self, audio: &AudioBuffer) -> Transcription;
}

/// Fire-and-forget speech output used by guided sessions.
pub trait SpeechSynthesizer: Send + Sync {
    fn say(&self, text: &str);

    /// Speak and wait until done. Returns false when the utterance failed.
    fn speak_sync(&self, text: &str) -> bool {
        self.say(text);
        true
    }
}

/// Text-to-speech driver wrapped by [`crate::audio::SpeechEngine`].
///
/// Implementations block until the utterance has been spoken.
pub trait SpeechBackend: Send {
    fn speak_blocking(&mut self, text: &str) -> Result<(), String>;

    /// Pick a voice from a preference list; returns the chosen voice name.
    fn select_voice(&mut self, _preferences: &[String]) -> Option<String> {
        None
    }

    /// Speaking rate in words per minute.
    fn set_rate(&mut self, _words_per_minute: u32) {}

    fn stop(&mut self) {}
}

/// Trait representing a monotonic time source.
///
/// Sleeping goes through the same source so guided sessions and the
/// scheduler poll loop can run against a manual clock.
pub trait TimeSource: Send + Sync {
    fn now(&self) -> Instant;
    fn sleep(&self, duration: Duration);

    /// True when `sleep` returns immediately because time is simulated.
    fn is_simulated(&self) -> bool {
        false
    }
}

/// Default time source backed by `Instant::now`.
#[derive(Default)]
pub struct SystemTimeSource {
    _unit: (),
}

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            thread::sleep(duration);
        }
    }
}
