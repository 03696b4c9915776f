use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::analysis::features::{EyeKeypoints, FaceKeypoints, FrameSize, Point2, PoseKeypoints};
use crate::audio::AudioBuffer;
use crate::error::SensorError;

use super::{
    CaptureOutcome, FaceModel, Frame, FrameSource, Microphone, PoseModel, SpeechBackend,
    SpeechSynthesizer, TimeSource, Transcriber, Transcription,
};

/// Deterministic time source for tests and offline simulation.
///
/// Time only moves when `advance` or `sleep` is called, so a guided session
/// that "waits" six seconds completes instantly.
pub struct ManualClock {
    start: Instant,
    offset_us: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset_us: AtomicU64::new(0),
        }
    }

    pub fn advance(&self, duration: Duration) {
        self.offset_us
            .fetch_add(duration.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn elapsed(&self) -> Duration {
        Duration::from_micros(self.offset_us.load(Ordering::SeqCst))
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        self.advance(duration);
    }

    fn is_simulated(&self) -> bool {
        true
    }
}

/// Camera that yields a fixed number of blank frames, optionally failing
/// at one sequence number.
///
/// With a clock attached, every frame first sleeps one frame period on that
/// clock, like a real camera blocking until the next exposure.
pub struct ScriptedCamera {
    size: FrameSize,
    total: u64,
    next: u64,
    fail_at: Option<u64>,
    pacing: Option<(Arc<dyn TimeSource>, Duration)>,
}

impl ScriptedCamera {
    pub fn new(size: FrameSize, total: u64) -> Self {
        Self {
            size,
            total,
            next: 0,
            fail_at: None,
            pacing: None,
        }
    }

    pub fn with_failure_at(mut self, sequence: u64) -> Self {
        self.fail_at = Some(sequence);
        self
    }

    pub fn paced(mut self, clock: Arc<dyn TimeSource>, fps: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
        self.pacing = Some((clock, period));
        self
    }
}

impl FrameSource for ScriptedCamera {
    fn get_frame(&mut self) -> Result<Option<Frame>, SensorError> {
        if self.fail_at == Some(self.next) {
            return Err(SensorError::ReadFailed {
                device: "camera".to_string(),
                reason: format!("scripted failure at frame {}", self.next),
            });
        }
        if self.next >= self.total {
            return Ok(None);
        }
        if let Some((clock, period)) = &self.pacing {
            clock.sleep(*period);
        }
        let frame = Frame::new(self.size, self.next);
        self.next += 1;
        Ok(Some(frame))
    }
}

/// Pose model replaying pre-computed keypoints by frame sequence.
pub struct ScriptedPoseModel {
    poses: Vec<Option<PoseKeypoints>>,
}

impl ScriptedPoseModel {
    pub fn new(poses: Vec<Option<PoseKeypoints>>) -> Self {
        Self { poses }
    }
}

impl PoseModel for ScriptedPoseModel {
    fn extract_pose_keypoints(&self, frame: &Frame) -> Option<PoseKeypoints> {
        self.poses.get(frame.sequence as usize).cloned().flatten()
    }
}

/// Face model replaying pre-computed keypoints by frame sequence.
pub struct ScriptedFaceModel {
    faces: Vec<Option<FaceKeypoints>>,
}

impl ScriptedFaceModel {
    pub fn new(faces: Vec<Option<FaceKeypoints>>) -> Self {
        Self { faces }
    }
}

impl FaceModel for ScriptedFaceModel {
    fn extract_face_keypoints(&self, frame: &Frame) -> Option<FaceKeypoints> {
        self.faces.get(frame.sequence as usize).cloned().flatten()
    }
}

/// Microphone that pops queued outcomes, then repeats a fallback.
pub struct ScriptedMicrophone {
    queue: Mutex<VecDeque<Result<CaptureOutcome, SensorError>>>,
    fallback: CaptureOutcome,
    captures: AtomicUsize,
    ambient: Mutex<Vec<Duration>>,
    ambient_failure: Mutex<Option<SensorError>>,
}

impl ScriptedMicrophone {
    pub fn new(fallback: CaptureOutcome) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
            captures: AtomicUsize::new(0),
            ambient: Mutex::new(Vec::new()),
            ambient_failure: Mutex::new(None),
        }
    }

    /// Make the next ambient calibration fail with `err`.
    pub fn fail_ambient_calibration(&self, err: SensorError) {
        *self
            .ambient_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(err);
    }

    /// Durations of every ambient calibration requested so far.
    pub fn ambient_calibrations(&self) -> Vec<Duration> {
        self.ambient
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn push(&self, outcome: Result<CaptureOutcome, SensorError>) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(outcome);
    }

    pub fn capture_count(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }
}

impl Microphone for ScriptedMicrophone {
    fn capture_audio(
        &self,
        _timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<CaptureOutcome, SensorError> {
        self.captures.fetch_add(1, Ordering::SeqCst);
        let next = self
            .queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front();
        next.unwrap_or_else(|| Ok(self.fallback.clone()))
    }

    fn calibrate_ambient(&self, duration: Duration) -> Result<(), SensorError> {
        self.ambient
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(duration);
        match self
            .ambient_failure
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Recognizer that pops queued transcriptions, then repeats a fallback.
pub struct ScriptedTranscriber {
    queue: Mutex<VecDeque<Transcription>>,
    fallback: Transcription,
}

impl ScriptedTranscriber {
    pub fn new(fallback: Transcription) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback,
        }
    }

    pub fn push(&self, transcription: Transcription) {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(transcription);
    }
}

impl Transcriber for ScriptedTranscriber {
    fn transcribe(&self, _audio: &AudioBuffer) -> Transcription {
        self.queue
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }
}

/// Speech output that records every utterance instead of playing it.
#[derive(Default)]
pub struct RecordingSpeaker {
    spoken: Mutex<Vec<String>>,
}

impl RecordingSpeaker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spoken(&self) -> Vec<String> {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, text: &str) {
        self.spoken
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(text.to_string());
    }
}

impl SpeechSynthesizer for RecordingSpeaker {
    fn say(&self, text: &str) {
        self.record(text);
    }
}

impl SpeechBackend for Arc<RecordingSpeaker> {
    fn speak_blocking(&mut self, text: &str) -> Result<(), String> {
        self.record(text);
        Ok(())
    }

    fn select_voice(&mut self, preferences: &[String]) -> Option<String> {
        preferences.first().cloned()
    }
}

/// Frames per synthetic blink
pub const BLINK_FRAMES: u64 = 3;

/// Seeded generator of plausible pose and face landmarks.
///
/// Upright poses sit centred in the frame with a slight shoulder slope and
/// the head leaning a little to the right, so head tilt never crosses the
/// +/-180 degree seam. Slouched poses drop the shoulders towards the hips and
/// push the ears forward. Every coordinate gets a small uniform jitter.
pub struct SyntheticSubject {
    rng: StdRng,
    jitter_px: f64,
}

impl SyntheticSubject {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            jitter_px: 1.0,
        }
    }

    fn jittered(&mut self, x: f64, y: f64) -> Point2 {
        let j = self.jitter_px;
        Point2::new(
            x + self.rng.gen_range(-j..=j),
            y + self.rng.gen_range(-j..=j),
        )
    }

    pub fn pose(&mut self, frame: FrameSize, slouched: bool) -> PoseKeypoints {
        let w = frame.width as f64;
        let h = frame.height as f64;
        let cx = w / 2.0;
        let half_span = w * 0.16;
        let shoulder_y = if slouched { h * 0.75 } else { h * 0.625 };
        let hip_y = h * 0.96;
        let ear_forward = if slouched { w * 0.1 } else { w * 0.045 };

        let left_shoulder = self.jittered(cx - half_span, shoulder_y - 3.0);
        let right_shoulder = self.jittered(cx + half_span, shoulder_y + 3.0);
        PoseKeypoints {
            nose: self.jittered(cx + w * 0.02, shoulder_y - h * 0.25),
            left_ear: self.jittered(cx - half_span * 0.4 + ear_forward, shoulder_y - h * 0.27),
            right_ear: self.jittered(cx + half_span * 0.4 + ear_forward, shoulder_y - h * 0.27),
            left_shoulder,
            right_shoulder,
            left_hip: self.jittered(cx - half_span * 0.8, hip_y),
            right_hip: self.jittered(cx + half_span * 0.8, hip_y),
            frame,
        }
    }

    pub fn face(&mut self, eyes_open: bool) -> FaceKeypoints {
        let opening = if eyes_open { 9.0 } else { 2.0 };
        let left = self.eye(250.0, 200.0, opening);
        let right = self.eye(360.0, 200.0, opening);
        FaceKeypoints {
            left_eye: Some(left),
            right_eye: Some(right),
        }
    }

    /// Pre-compute `frames` poses and faces for replay.
    ///
    /// Eyes close for the last `BLINK_FRAMES` frames of every `blink_period`
    /// (never when the period is 0); posture slouches from `slouch_after` on.
    pub fn recording(
        &mut self,
        size: FrameSize,
        frames: u64,
        slouch_after: Option<u64>,
        blink_period: u64,
    ) -> (Vec<Option<PoseKeypoints>>, Vec<Option<FaceKeypoints>>) {
        let mut poses = Vec::with_capacity(frames as usize);
        let mut faces = Vec::with_capacity(frames as usize);
        for i in 0..frames {
            let slouched = slouch_after.is_some_and(|k| i >= k);
            let blinking =
                blink_period > BLINK_FRAMES && i % blink_period >= blink_period - BLINK_FRAMES;
            poses.push(Some(self.pose(size, slouched)));
            faces.push(Some(self.face(!blinking)));
        }
        (poses, faces)
    }

    fn eye(&mut self, x: f64, y: f64, opening: f64) -> EyeKeypoints {
        let j = self.jitter_px * 0.3;
        let lid = |dy: f64, rng: &mut StdRng| dy + rng.gen_range(-j..=j);
        let upper_outer = Point2::new(x + 10.0, y - lid(opening / 2.0, &mut self.rng));
        let upper_inner = Point2::new(x + 20.0, y - lid(opening / 2.0, &mut self.rng));
        let lower_outer = Point2::new(x + 10.0, y + lid(opening / 2.0, &mut self.rng));
        let lower_inner = Point2::new(x + 20.0, y + lid(opening / 2.0, &mut self.rng));
        EyeKeypoints {
            outer_corner: Point2::new(x, y),
            upper_outer,
            upper_inner,
            inner_corner: Point2::new(x + 30.0, y),
            lower_inner,
            lower_outer,
        }
    }
}

/// 16-bit mono square wave whose RMS equals `amplitude`.
pub fn tone_buffer(amplitude: i16, secs: f64, sample_rate: u32) -> AudioBuffer {
    let count = (secs * sample_rate as f64).round() as usize;
    let samples: Vec<i16> = (0..count)
        .map(|i| if i % 2 == 0 { amplitude } else { -amplitude })
        .collect();
    AudioBuffer::from_i16_samples(&samples, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_only_moves_when_told() {
        let clock = ManualClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);
        clock.sleep(Duration::from_millis(100));
        assert_eq!(clock.now() - t0, Duration::from_millis(100));
        clock.advance(Duration::from_secs(2));
        assert_eq!(clock.elapsed(), Duration::from_millis(2100));
    }

    #[test]
    fn scripted_camera_ends_and_fails_on_cue() {
        let size = FrameSize::new(640, 480);
        let mut camera = ScriptedCamera::new(size, 2);
        assert_eq!(camera.get_frame().unwrap().unwrap().sequence, 0);
        assert_eq!(camera.get_frame().unwrap().unwrap().sequence, 1);
        assert!(camera.get_frame().unwrap().is_none());

        let mut failing = ScriptedCamera::new(size, 5).with_failure_at(1);
        assert!(failing.get_frame().is_ok());
        assert!(failing.get_frame().is_err());
    }

    #[test]
    fn paced_camera_advances_the_clock() {
        let clock = Arc::new(ManualClock::new());
        let mut camera =
            ScriptedCamera::new(FrameSize::new(640, 480), 10).paced(clock.clone(), 20);
        while camera.get_frame().unwrap().is_some() {}
        assert_eq!(clock.elapsed(), Duration::from_millis(500));
    }

    #[test]
    fn scripted_microphone_falls_back_after_queue() {
        let mic = ScriptedMicrophone::new(CaptureOutcome::TimedOut);
        mic.push(Ok(CaptureOutcome::Captured(tone_buffer(1000, 0.1, 8000))));
        let limit = Duration::from_secs(1);
        assert!(matches!(
            mic.capture_audio(limit, limit),
            Ok(CaptureOutcome::Captured(_))
        ));
        assert_eq!(mic.capture_audio(limit, limit), Ok(CaptureOutcome::TimedOut));
        assert_eq!(mic.capture_count(), 2);
    }

    #[test]
    fn tone_buffer_has_requested_length() {
        let buffer = tone_buffer(500, 0.5, 16000);
        assert_eq!(buffer.sample_width, 2);
        assert_eq!(buffer.data.len(), 16000);
    }

    #[test]
    fn recording_blinks_and_slouches_on_schedule() {
        let size = FrameSize::new(640, 480);
        let (poses, faces) = SyntheticSubject::new(1).recording(size, 90, Some(60), 45);
        assert_eq!(poses.len(), 90);
        let closed: Vec<usize> = faces
            .iter()
            .enumerate()
            .filter(|(_, f)| {
                let eye = f.as_ref().unwrap().left_eye.as_ref().unwrap();
                (eye.upper_outer.y - eye.lower_outer.y).abs() < 5.0
            })
            .map(|(i, _)| i)
            .collect();
        assert_eq!(closed, vec![42, 43, 44, 87, 88, 89]);
        let upright_shoulder = poses[0].as_ref().unwrap().left_shoulder.y;
        let slouched_shoulder = poses[60].as_ref().unwrap().left_shoulder.y;
        assert!(slouched_shoulder > upright_shoulder + 40.0);
    }

    #[test]
    fn synthetic_subject_is_deterministic() {
        let size = FrameSize::new(640, 480);
        let a = SyntheticSubject::new(7).pose(size, false);
        let b = SyntheticSubject::new(7).pose(size, false);
        assert_eq!(a, b);
    }
}
