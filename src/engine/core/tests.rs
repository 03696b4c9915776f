use super::*;
use crate::analysis::features::FrameSize;
use crate::analysis::DetectorState;
use crate::engine::backend::{
    tone_buffer, CaptureOutcome, ManualClock, RecordingSpeaker, ScriptedCamera, ScriptedFaceModel,
    ScriptedMicrophone, ScriptedPoseModel, ScriptedTranscriber, SyntheticSubject,
    SystemTimeSource, Transcription,
};
use std::time::Duration;

const SIZE: FrameSize = FrameSize {
    width: 640,
    height: 480,
};

struct Rig {
    monitor: WellnessMonitor,
    clock: Arc<ManualClock>,
    speaker: Arc<RecordingSpeaker>,
    microphone: Arc<ScriptedMicrophone>,
    transcriber: Arc<ScriptedTranscriber>,
    camera: ScriptedCamera,
}

fn rig(frames: u64, slouch_after: Option<u64>) -> Rig {
    let config = AppConfig::default();
    let clock = Arc::new(ManualClock::new());
    let speaker = Arc::new(RecordingSpeaker::new());
    let microphone = Arc::new(ScriptedMicrophone::new(CaptureOutcome::Captured(
        tone_buffer(1500, 4.0, 16000),
    )));
    let transcriber = Arc::new(ScriptedTranscriber::new(Transcription::Text("om".into())));
    let (poses, faces) = SyntheticSubject::new(42).recording(SIZE, frames, slouch_after, 45);
    let monitor = WellnessMonitor::new(
        &config,
        Collaborators {
            pose_model: Arc::new(ScriptedPoseModel::new(poses)),
            face_model: Arc::new(ScriptedFaceModel::new(faces)),
            microphone: microphone.clone(),
            transcriber: transcriber.clone(),
            speaker: speaker.clone(),
            clock: clock.clone(),
        },
    );
    let camera = ScriptedCamera::new(SIZE, frames).paced(clock.clone(), config.camera.fps);
    Rig {
        monitor,
        clock,
        speaker,
        microphone,
        transcriber,
        camera,
    }
}

#[test]
fn run_calibrates_then_classifies() {
    let mut rig = rig(300, None);
    let read = rig.monitor.run(&mut rig.camera, None).unwrap();
    assert_eq!(read, 300);
    assert!(rig.monitor.is_calibration_complete());
    assert!(rig.monitor.posture().is_calibrated());

    let summary = rig.monitor.summary();
    let threshold = summary.eye_threshold.unwrap();
    assert!(threshold > 0.1 && threshold < 0.25, "threshold {}", threshold);

    // the 3 s eye window at 30 fps consumes about 90 frames
    assert!(summary.frames_processed > 180 && summary.frames_processed < 220);
    assert_eq!(summary.posture.negative_count, 0);
    assert!(summary.posture.positive_count > 0);
    assert!(summary.eyes.negative_count > 0);
    assert!(summary.eyes.positive_count > summary.eyes.negative_count * 5);
}

#[test]
fn slouching_after_calibration_is_bad_posture() {
    let mut rig = rig(300, Some(150));
    rig.monitor.run(&mut rig.camera, None).unwrap();
    let stats = rig.monitor.summary().posture;
    assert_eq!(stats.negative_count, 150);
    assert!(stats.positive_count > 0);
}

#[test]
fn process_frame_reports_violations_and_chant_stats() {
    let mut rig = rig(200, Some(100));
    rig.monitor.run(&mut rig.camera, Some(100)).unwrap();
    assert!(rig.monitor.is_calibration_complete());

    let report = rig.monitor.process_frame(&Frame::new(SIZE, 150));
    assert_eq!(report.posture.state, DetectorState::Negative);
    assert!(report
        .posture
        .violations
        .contains(&crate::detectors::PostureViolation::Slouching));
    assert_eq!(report.chant, ChantStats::default());
    assert_eq!(report.next_session_secs, None);
}

#[test]
fn camera_failure_is_fatal() {
    let Rig { mut monitor, .. } = rig(50, None);
    let mut camera = ScriptedCamera::new(SIZE, 50).with_failure_at(10);
    let err = monitor.run(&mut camera, None).unwrap_err();
    assert!(matches!(err, SensorError::ReadFailed { .. }));
    assert_eq!(monitor.summary().frames_processed, 0);
}

#[test]
fn max_frames_limits_run() {
    let mut rig = rig(100, None);
    assert_eq!(rig.monitor.run(&mut rig.camera, Some(40)).unwrap(), 40);
    assert!(!rig.monitor.is_calibration_complete());
}

#[test]
fn stepped_breathing_runs_sessions_between_frames() {
    let mut rig = rig(2000, None);
    rig.monitor.start_stepped().unwrap();
    rig.monitor.run(&mut rig.camera, None).unwrap();

    let chant = rig.monitor.summary().chant;
    assert!(chant.total_sessions >= 2);
    assert_eq!(chant.successful_detections, chant.total_sessions);
    assert!(rig
        .speaker
        .spoken()
        .starts_with(&["Inhale...".to_string(), "Exhale...".to_string()]));
}

#[test]
fn breathing_controls_delegate_to_scheduler() {
    let mut rig = rig(10, None);
    assert_eq!(
        rig.monitor.toggle_breathing_pause(),
        Err(SessionError::NotRunning)
    );
    rig.monitor.start_stepped().unwrap();
    assert_eq!(rig.monitor.toggle_breathing_pause(), Ok(true));
    assert_eq!(rig.monitor.summary().breathing, SchedulerStatus::Paused);
    assert_eq!(rig.monitor.toggle_breathing_pause(), Ok(false));

    assert!(rig.monitor.set_breathing_interval(3).is_err());
    rig.monitor.set_breathing_interval(30).unwrap();
    assert_eq!(rig.monitor.scheduler().interval(), Duration::from_secs(30));

    rig.monitor.force_session().unwrap().join().unwrap();
    assert_eq!(rig.monitor.summary().chant.total_sessions, 1);

    rig.monitor.stop();
    assert_eq!(rig.monitor.summary().breathing, SchedulerStatus::Stopped);
    assert!(rig.monitor.force_session().is_err());
}

#[test]
fn reset_stats_clears_everything() {
    let mut rig = rig(200, None);
    rig.monitor.start_stepped().unwrap();
    rig.monitor.run(&mut rig.camera, None).unwrap();
    rig.monitor.force_session().unwrap().join().unwrap();

    rig.monitor.reset_stats();
    let summary = rig.monitor.summary();
    assert_eq!(summary.frames_processed, 0);
    assert_eq!(summary.posture.total, 0);
    assert_eq!(summary.eyes.total, 0);
    assert_eq!(summary.chant, ChantStats::default());
    assert!(summary.calibration_complete);
    assert_eq!(summary.total_time_secs, 0.0);
    assert!(rig.clock.elapsed() > Duration::from_secs(6));
}

#[test]
fn starting_breathing_calibrates_the_microphone() {
    let mut rig = rig(10, None);
    rig.monitor.start_stepped().unwrap();
    assert_eq!(
        rig.microphone.ambient_calibrations(),
        vec![Duration::from_secs(2)]
    );
    // a second start is rejected before touching the microphone again
    assert_eq!(rig.monitor.start_stepped(), Err(SessionError::AlreadyStarted));
    assert_eq!(rig.microphone.ambient_calibrations().len(), 1);
}

#[test]
fn failed_microphone_calibration_does_not_block_breathing() {
    let mut rig = rig(10, None);
    rig.microphone.fail_ambient_calibration(SensorError::Busy {
        device: "microphone".into(),
    });
    assert!(!rig.monitor.calibrate_microphone());
    assert!(rig.monitor.calibrate_microphone());

    rig.microphone.fail_ambient_calibration(SensorError::Unavailable {
        device: "microphone".into(),
        reason: "unplugged".into(),
    });
    rig.monitor.start_stepped().unwrap();
    assert_eq!(rig.monitor.summary().breathing, SchedulerStatus::Running);
    rig.monitor.force_session().unwrap().join().unwrap();
    assert_eq!(rig.monitor.summary().chant.total_sessions, 1);
}

#[test]
fn self_test_checks_microphone_and_speech() {
    let rig = rig(10, None);
    rig.transcriber.push(Transcription::Text("hello".into()));
    let report = rig.monitor.self_test();
    assert!(report.passed());
    assert_eq!(report.heard.as_deref(), Some("hello"));
    assert_eq!(rig.speaker.spoken(), vec!["Testing speech engine"]);
    assert_eq!(rig.microphone.capture_count(), 1);

    rig.microphone.push(Ok(CaptureOutcome::TimedOut));
    let report = rig.monitor.self_test();
    assert!(!report.microphone_ok);
    assert!(report.speech_ok);
    assert!(!report.passed());

    rig.transcriber.push(Transcription::Unrecognized);
    assert_eq!(rig.monitor.self_test().heard, None);
}

#[test]
fn stepped_breathing_needs_a_simulated_clock() {
    let config = AppConfig::default();
    let mut monitor = WellnessMonitor::new(
        &config,
        Collaborators {
            pose_model: Arc::new(ScriptedPoseModel::new(Vec::new())),
            face_model: Arc::new(ScriptedFaceModel::new(Vec::new())),
            microphone: Arc::new(ScriptedMicrophone::new(CaptureOutcome::TimedOut)),
            transcriber: Arc::new(ScriptedTranscriber::new(Transcription::Unrecognized)),
            speaker: Arc::new(RecordingSpeaker::new()),
            clock: Arc::new(SystemTimeSource::default()),
        },
    );
    assert_eq!(monitor.start_stepped(), Err(SessionError::RealTimeClock));
    assert_eq!(monitor.summary().breathing, SchedulerStatus::Idle);
}
