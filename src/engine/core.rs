//! WellnessMonitor: the orchestration layer.
//!
//! Owns the posture and eye detectors plus the breathing scheduler (which in
//! turn owns the chant detector). The frame path is synchronous and never
//! touches audio: posture and eye classification run inline once per frame,
//! guided sessions run on the scheduler's own worker thread.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::broadcast;

use crate::analysis::DetectorStats;
use crate::config::AppConfig;
use crate::detectors::{ChantDetector, EyeDetector, EyeReport, PostureDetector, PostureReport};
use crate::engine::backend::{
    CaptureOutcome, FaceModel, Frame, FrameSource, Microphone, PoseModel, SpeechSynthesizer,
    TimeSource, Transcriber, Transcription,
};
use crate::error::{
    log_calibration_error, log_sensor_error, CalibrationError, SensorError, SessionError,
};
use crate::session::{
    ChantSession, ChantStats, SchedulerStatus, SessionRunner, SessionScheduler, SessionScript,
    TickOutcome,
};

/// External collaborators the monitor drives.
pub struct Collaborators {
    pub pose_model: Arc<dyn PoseModel>,
    pub face_model: Arc<dyn FaceModel>,
    pub microphone: Arc<dyn Microphone>,
    pub transcriber: Arc<dyn Transcriber>,
    pub speaker: Arc<dyn SpeechSynthesizer>,
    pub clock: Arc<dyn TimeSource>,
}

/// Everything the UI needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FrameReport {
    pub sequence: u64,
    pub posture: PostureReport,
    pub eyes: EyeReport,
    pub chant: ChantStats,
    /// Seconds until the next scheduled session; `None` unless breathing is running
    pub next_session_secs: Option<f64>,
}

/// End-of-run summary.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorSummary {
    pub total_time_secs: f64,
    pub frames_processed: u64,
    pub calibration_complete: bool,
    pub eye_threshold: Option<f64>,
    pub posture: DetectorStats,
    pub eyes: DetectorStats,
    pub chant: ChantStats,
    pub breathing: SchedulerStatus,
}

/// Listening window for the microphone self-test
const SELF_TEST_LISTEN: Duration = Duration::from_secs(3);

const SELF_TEST_PHRASE: &str = "Testing speech engine";

/// Outcome of [`WellnessMonitor::self_test`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SelfTestReport {
    pub microphone_ok: bool,
    /// What the recognizer made of the test capture
    pub heard: Option<String>,
    pub speech_ok: bool,
}

impl SelfTestReport {
    pub fn passed(&self) -> bool {
        self.microphone_ok && self.speech_ok
    }
}

/// How guided sessions get their timer ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BreathingDriver {
    /// Scheduler worker thread
    Thread,
    /// `run()` polls the scheduler after every frame (offline simulation)
    FrameLoop,
}

pub struct WellnessMonitor {
    posture: PostureDetector,
    eyes: EyeDetector,
    pose_model: Arc<dyn PoseModel>,
    face_model: Arc<dyn FaceModel>,
    microphone: Arc<dyn Microphone>,
    transcriber: Arc<dyn Transcriber>,
    speaker: Arc<dyn SpeechSynthesizer>,
    ambient_noise: Duration,
    scheduler: SessionScheduler,
    clock: Arc<dyn TimeSource>,
    started_at: Instant,
    frames_processed: u64,
    calibration_complete: bool,
    driver: BreathingDriver,
}

impl WellnessMonitor {
    pub fn new(config: &AppConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            pose_model,
            face_model,
            microphone,
            transcriber,
            speaker,
            clock,
        } = collaborators;

        let runner = SessionRunner::new(
            SessionScript::from_config(&config.breathing),
            ChantDetector::new(&config.chant, Arc::clone(&clock)),
            Arc::clone(&speaker),
            Arc::clone(&microphone),
            Arc::clone(&transcriber),
            Arc::clone(&clock),
        );
        let scheduler = SessionScheduler::new(runner, &config.breathing, Arc::clone(&clock));

        Self {
            posture: PostureDetector::new(&config.posture, Arc::clone(&clock)),
            eyes: EyeDetector::new(&config.eye, Arc::clone(&clock)),
            pose_model,
            face_model,
            microphone,
            transcriber,
            speaker,
            ambient_noise: config.chant.ambient_noise_duration(),
            scheduler,
            started_at: clock.now(),
            clock,
            frames_processed: 0,
            calibration_complete: false,
            driver: BreathingDriver::Thread,
        }
    }

    /// Feed one frame to the calibration windows.
    ///
    /// The eye window collects EAR samples; posture keeps auto-calibrating
    /// exactly as it does on regular frames.
    pub fn calibration_frame(&mut self, frame: &Frame) -> FrameReport {
        let pose = self.pose_model.extract_pose_keypoints(frame);
        let face = self.face_model.extract_face_keypoints(frame);
        let posture_calibrating = !self.posture.is_calibrated();
        let posture = self.posture.observe(pose.as_ref(), posture_calibrating);
        let eyes = self.eyes.observe(face.as_ref(), true);
        self.report(frame.sequence, posture, eyes)
    }

    /// Close the eye calibration window and mark setup complete.
    ///
    /// Returns the eye threshold in use (the fallback constant when the window
    /// saw no face).
    ///
    /// # Errors
    /// * `CalibrationError` - the eye threshold could not be derived
    pub fn finish_calibration(&mut self) -> Result<f64, CalibrationError> {
        self.eyes.set_threshold(None).map_err(|err| {
            log_calibration_error(&err, "finish_calibration");
            err
        })?;
        let threshold = self.eyes.threshold()?;
        self.calibration_complete = true;
        log::info!("Eye EAR threshold set to {:.3}", threshold);
        log::info!("System calibration complete");
        Ok(threshold)
    }

    /// Classify one frame. Synchronous and audio-free.
    pub fn process_frame(&mut self, frame: &Frame) -> FrameReport {
        let pose = self.pose_model.extract_pose_keypoints(frame);
        let face = self.face_model.extract_face_keypoints(frame);
        let posture_calibrating = !self.posture.is_calibrated();
        let posture = self.posture.observe(pose.as_ref(), posture_calibrating);
        let eyes = self.eyes.observe(face.as_ref(), false);
        self.frames_processed += 1;
        self.report(frame.sequence, posture, eyes)
    }

    fn report(&self, sequence: u64, posture: PostureReport, eyes: EyeReport) -> FrameReport {
        FrameReport {
            sequence,
            posture,
            eyes,
            chant: self.scheduler.stats(),
            next_session_secs: self
                .scheduler
                .time_until_next_session()
                .map(|d| d.as_secs_f64()),
        }
    }

    /// Adjust the microphone to room noise.
    ///
    /// Failure is logged and tolerated: sessions still run with the
    /// device's previous energy floor. Returns whether calibration succeeded.
    pub fn calibrate_microphone(&self) -> bool {
        log::info!("Calibrating microphone for {:?}", self.ambient_noise);
        match self.microphone.calibrate_ambient(self.ambient_noise) {
            Ok(()) => {
                log::info!("Microphone calibration complete");
                true
            }
            Err(err) => {
                log_sensor_error(&err, "calibrate_microphone");
                false
            }
        }
    }

    /// Check the microphone and recognizer with one short capture, then
    /// speak a test phrase synchronously. Meant to run before `start`.
    pub fn self_test(&self) -> SelfTestReport {
        let heard = match self
            .microphone
            .capture_audio(SELF_TEST_LISTEN, SELF_TEST_LISTEN)
        {
            Ok(CaptureOutcome::Captured(audio)) => match self.transcriber.transcribe(&audio) {
                Transcription::Text(text) => Some(text),
                other => {
                    log::warn!("Microphone test: recognizer returned {:?}", other);
                    None
                }
            },
            Ok(CaptureOutcome::TimedOut) => {
                log::warn!("Microphone test: nothing heard");
                None
            }
            Err(err) => {
                log_sensor_error(&err, "self_test");
                None
            }
        };
        let speech_ok = self.speaker.speak_sync(SELF_TEST_PHRASE);
        if !speech_ok {
            log::warn!("Speech engine test failed");
        }

        let report = SelfTestReport {
            microphone_ok: heard.is_some(),
            heard,
            speech_ok,
        };
        log::info!(
            "Component test: microphone {}, speech {}",
            if report.microphone_ok { "ok" } else { "failed" },
            if report.speech_ok { "ok" } else { "failed" }
        );
        report
    }

    fn prepare_breathing(&self) {
        if self.scheduler.status() == SchedulerStatus::Idle {
            self.calibrate_microphone();
        }
    }

    /// Calibrate the microphone, then start guided sessions on the
    /// scheduler's worker thread.
    ///
    /// # Errors
    /// * `SessionError::AlreadyStarted` / `SessionError::Stopped`
    pub fn start(&mut self) -> Result<(), SessionError> {
        self.prepare_breathing();
        self.scheduler.start()?;
        self.driver = BreathingDriver::Thread;
        self.started_at = self.clock.now();
        log::info!("Session started");
        Ok(())
    }

    /// Start guided sessions without a worker; [`WellnessMonitor::run`]
    /// polls the timer after each frame, so a due session runs inside the
    /// frame loop. Only accepted with a simulated clock, where a session
    /// completes instantly.
    ///
    /// # Errors
    /// * `SessionError::RealTimeClock` - the monitor runs on a wall clock
    /// * otherwise the same as [`WellnessMonitor::start`]
    pub fn start_stepped(&mut self) -> Result<(), SessionError> {
        self.prepare_breathing();
        self.scheduler.start_stepped()?;
        self.driver = BreathingDriver::FrameLoop;
        self.started_at = self.clock.now();
        log::info!("Session started (stepped breathing)");
        Ok(())
    }

    /// Stop scheduling sessions. An in-flight session still completes.
    pub fn stop(&self) {
        self.scheduler.stop();
        let stats = self.scheduler.stats();
        log::info!(
            "Session ended: {} frames, chant {}/{} successful",
            self.frames_processed,
            stats.successful_detections,
            stats.total_sessions
        );
    }

    /// Pause when running, resume when paused. Returns the new paused state.
    ///
    /// # Errors
    /// * `SessionError::NotRunning` - breathing never started or stopped
    pub fn toggle_breathing_pause(&self) -> Result<bool, SessionError> {
        if self.scheduler.is_paused() {
            self.scheduler.resume()?;
            Ok(false)
        } else {
            self.scheduler.pause()?;
            Ok(true)
        }
    }

    /// Run a session now on its own thread.
    ///
    /// # Errors
    /// * `SessionError::NotRunning` - breathing is not running or is paused
    pub fn force_session(&self) -> Result<std::thread::JoinHandle<()>, SessionError> {
        self.scheduler.force_session()
    }

    /// # Errors
    /// * `SessionError::InvalidInterval` - outside the configured bounds
    pub fn set_breathing_interval(&self, secs: u64) -> Result<(), SessionError> {
        self.scheduler.set_interval(secs)
    }

    pub fn set_session_callback<F>(&self, callback: F)
    where
        F: Fn(bool, f64) + Send + Sync + 'static,
    {
        self.scheduler.set_session_callback(callback);
    }

    pub fn subscribe_sessions(&self) -> broadcast::Receiver<ChantSession> {
        self.scheduler.subscribe()
    }

    /// Zero every detector's counters and the chant statistics.
    pub fn reset_stats(&mut self) {
        self.posture.reset_stats();
        self.eyes.reset_stats();
        self.scheduler.reset_stats();
        self.frames_processed = 0;
        self.started_at = self.clock.now();
        log::info!("Statistics reset");
    }

    pub fn summary(&self) -> MonitorSummary {
        MonitorSummary {
            total_time_secs: self
                .clock
                .now()
                .saturating_duration_since(self.started_at)
                .as_secs_f64(),
            frames_processed: self.frames_processed,
            calibration_complete: self.calibration_complete,
            eye_threshold: self.eyes.threshold().ok(),
            posture: self.posture.get_stats(),
            eyes: self.eyes.get_stats(),
            chant: self.scheduler.stats(),
            breathing: self.scheduler.status(),
        }
    }

    /// Pull frames until the source ends or `max_frames` were read.
    ///
    /// Frames go to the calibration windows until the eye window closes; the
    /// rest are classified. Returns the number of frames read.
    ///
    /// # Errors
    /// * `SensorError` - the frame source failed; the monitor cannot recover
    pub fn run(
        &mut self,
        source: &mut dyn FrameSource,
        max_frames: Option<u64>,
    ) -> Result<u64, SensorError> {
        let mut read = 0u64;
        while max_frames.map_or(true, |max| read < max) {
            let frame = match source.get_frame() {
                Ok(Some(frame)) => frame,
                Ok(None) => break,
                Err(err) => {
                    log_sensor_error(&err, "WellnessMonitor::run");
                    return Err(err);
                }
            };
            read += 1;

            if self.calibration_complete {
                let report = self.process_frame(&frame);
                log::debug!(
                    "frame {}: posture {:?}, eyes {:?}",
                    report.sequence,
                    report.posture.state,
                    report.eyes.state
                );
            } else {
                self.calibration_frame(&frame);
                if self.eyes.is_calibrated() {
                    if let Err(err) = self.finish_calibration() {
                        log::warn!("Calibration not finished: {}", err);
                    }
                }
            }

            if self.driver == BreathingDriver::FrameLoop {
                if let TickOutcome::Faulted(err) = self.scheduler.poll() {
                    log::warn!("Breathing session faulted: {}", err);
                }
            }
        }
        Ok(read)
    }

    pub fn is_calibration_complete(&self) -> bool {
        self.calibration_complete
    }

    pub fn posture(&self) -> &PostureDetector {
        &self.posture
    }

    pub fn eyes(&self) -> &EyeDetector {
        &self.eyes
    }

    pub fn scheduler(&self) -> &SessionScheduler {
        &self.scheduler
    }
}

#[cfg(test)]
mod tests;
