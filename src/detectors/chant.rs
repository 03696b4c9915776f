// ChantDetector - one captured utterance to chant detected / not detected
//
// Loudness is classified against a preset silence threshold (no calibration
// window). Voiced captures are transcribed and matched against the keyword
// set. The two ambiguous recognizer outcomes (heard but not understood, and
// service failure) resolve through configurable lenient policies.

use std::sync::Arc;

use serde::Serialize;

use crate::analysis::features::{AudioFeatureExtractor, FeatureExtractor, KeywordMatcher};
use crate::analysis::{DetectorState, DetectorStats, SignalClassifier, ThresholdRule};
use crate::calibration::{CalibrationInfo, CalibrationTrigger};
use crate::config::ChantConfig;
use crate::engine::backend::{CaptureOutcome, TimeSource, Transcriber, Transcription};
use crate::error::{ErrorCode, SessionError};

/// Voiced iff RMS reaches the configured silence threshold
#[derive(Debug, Clone)]
pub struct LoudnessRule {
    silence_threshold: f64,
}

impl LoudnessRule {
    pub fn new(silence_threshold: f64) -> Self {
        Self { silence_threshold }
    }
}

impl ThresholdRule for LoudnessRule {
    type Sample = f64;
    type Reference = ();
    type Threshold = f64;

    fn reduce(&self, _samples: &[f64]) -> Option<()> {
        None
    }

    fn derive_threshold(&self, _reference: Option<&()>) -> Option<f64> {
        Some(self.silence_threshold)
    }

    fn is_positive(&self, rms: &f64, threshold: &f64) -> bool {
        *rms >= *threshold
    }
}

/// Why a capture was or was not accepted as a chant
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ChantVerdict {
    KeywordMatched { keyword: String },
    NoKeyword,
    Silent,
    /// Nobody spoke before the microphone gave up
    TimedOut,
    /// Voiced but the recognizer could not understand it
    Unrecognized,
    TranscriptionFailed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChantOutcome {
    pub detected: bool,
    /// Seconds of captured audio (0.0 when nothing was captured)
    pub duration_secs: f64,
    pub rms: Option<f64>,
    pub transcript: Option<String>,
    pub verdict: ChantVerdict,
}

pub struct ChantDetector {
    extractor: AudioFeatureExtractor,
    classifier: SignalClassifier<LoudnessRule>,
    matcher: KeywordMatcher,
    unrecognized_counts_as_detected: bool,
    transcription_error_counts_as_detected: bool,
}

impl ChantDetector {
    pub fn new(config: &ChantConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            extractor: AudioFeatureExtractor::new(config.silence_threshold),
            classifier: SignalClassifier::new(
                "ChantDetector",
                LoudnessRule::new(config.silence_threshold),
                CalibrationTrigger::Preset,
                Default::default(),
                clock,
            ),
            matcher: KeywordMatcher::new(&config.keywords),
            unrecognized_counts_as_detected: config.unrecognized_counts_as_detected,
            transcription_error_counts_as_detected: config.transcription_error_counts_as_detected,
        }
    }

    /// Classify one capture. The transcriber is only consulted for voiced
    /// audio.
    pub fn evaluate(&mut self, capture: &CaptureOutcome, transcriber: &dyn Transcriber) -> ChantOutcome {
        let buffer = match capture {
            CaptureOutcome::Captured(buffer) => buffer,
            CaptureOutcome::TimedOut => {
                log::info!("No chant: microphone timed out waiting for speech");
                return ChantOutcome {
                    detected: false,
                    duration_secs: 0.0,
                    rms: None,
                    transcript: None,
                    verdict: ChantVerdict::TimedOut,
                };
            }
        };

        let features = self.extractor.extract(buffer);
        let duration_secs = features.map(|f| f.duration_secs).unwrap_or(0.0);
        let rms = features.map(|f| f.rms);
        let loudness = self.classifier.observe(rms, false);
        if loudness.state != DetectorState::Positive {
            log::info!("No chant detected (silence, rms {:?})", rms);
            return ChantOutcome {
                detected: false,
                duration_secs,
                rms,
                transcript: None,
                verdict: ChantVerdict::Silent,
            };
        }

        let (detected, transcript, verdict) = match transcriber.transcribe(buffer) {
            Transcription::Text(text) => {
                let text = text.trim().to_lowercase();
                match self.matcher.find(&text) {
                    Some(keyword) => {
                        let keyword = keyword.to_string();
                        (true, Some(text), ChantVerdict::KeywordMatched { keyword })
                    }
                    None => (false, Some(text), ChantVerdict::NoKeyword),
                }
            }
            Transcription::Unrecognized => {
                log::warn!("Could not understand chant audio");
                (
                    self.unrecognized_counts_as_detected,
                    None,
                    ChantVerdict::Unrecognized,
                )
            }
            Transcription::ApiError(reason) => {
                let err = SessionError::TranscriptionUnavailable {
                    reason: reason.clone(),
                };
                log::warn!(
                    "Transcription unavailable: code={}, message={}",
                    err.code(),
                    err.message()
                );
                (
                    self.transcription_error_counts_as_detected,
                    None,
                    ChantVerdict::TranscriptionFailed { reason },
                )
            }
        };

        if detected {
            log::info!("Om detected | Duration: {} seconds", duration_secs);
        } else {
            log::info!(
                "Chant not recognized as Om | Duration: {} seconds",
                duration_secs
            );
        }

        ChantOutcome {
            detected,
            duration_secs,
            rms,
            transcript,
            verdict,
        }
    }

    pub fn silence_threshold(&self) -> f64 {
        self.classifier
            .threshold()
            .copied()
            .unwrap_or_else(|| self.extractor.silence_threshold())
    }

    /// Voiced vs. silent captures seen so far
    pub fn loudness_stats(&self) -> DetectorStats {
        self.classifier.get_stats()
    }

    pub fn reset_stats(&mut self) {
        self.classifier.reset_stats();
    }

    pub fn reset_calibration(&mut self) {
        self.classifier.reset_calibration();
    }

    pub fn get_calibration_info(&self) -> CalibrationInfo<(), f64> {
        self.classifier.calibration_info()
    }
}
