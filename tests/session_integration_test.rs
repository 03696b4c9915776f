// Breathing scheduler end to end with scripted collaborators

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use wellness_monitor::config::{BreathingConfig, ChantConfig};
use wellness_monitor::detectors::{ChantDetector, ChantVerdict};
use wellness_monitor::engine::backend::{
    tone_buffer, CaptureOutcome, ManualClock, RecordingSpeaker, ScriptedMicrophone,
    ScriptedTranscriber, Transcription,
};
use wellness_monitor::error::SensorError;
use wellness_monitor::session::{
    SchedulerStatus, SessionRunner, SessionScheduler, SessionScript, TickOutcome,
};

struct Setup {
    scheduler: SessionScheduler,
    microphone: Arc<ScriptedMicrophone>,
    transcriber: Arc<ScriptedTranscriber>,
    speaker: Arc<RecordingSpeaker>,
    clock: Arc<ManualClock>,
}

fn setup(config: BreathingConfig) -> Setup {
    let clock = Arc::new(ManualClock::new());
    let microphone = Arc::new(ScriptedMicrophone::new(CaptureOutcome::Captured(
        tone_buffer(2000, 5.0, 16000),
    )));
    let transcriber = Arc::new(ScriptedTranscriber::new(Transcription::Text("aum".into())));
    let speaker = Arc::new(RecordingSpeaker::new());
    let runner = SessionRunner::new(
        SessionScript::from_config(&config),
        ChantDetector::new(&ChantConfig::default(), clock.clone()),
        speaker.clone(),
        microphone.clone(),
        transcriber.clone(),
        clock.clone(),
    );
    Setup {
        scheduler: SessionScheduler::new(runner, &config, clock.clone()),
        microphone,
        transcriber,
        speaker,
        clock,
    }
}

#[test]
fn forced_sessions_accumulate_success_rate() {
    let s = setup(BreathingConfig::default());
    s.scheduler.start_stepped().unwrap();
    for text in ["om", "nothing here", "ohm"] {
        s.transcriber.push(Transcription::Text(text.into()));
        s.scheduler.force_session().unwrap().join().unwrap();
    }
    let stats = s.scheduler.stats();
    assert_eq!(stats.total_sessions, 3);
    assert_eq!(stats.successful_detections, 2);
    assert!((stats.success_rate - 66.7).abs() <= 0.1);
    assert_eq!(stats.average_chant_duration, 7.5);
}

#[test]
fn scheduled_sessions_keep_the_interval() {
    let s = setup(BreathingConfig::default());
    let mut sessions = s.scheduler.subscribe();
    s.scheduler.start_stepped().unwrap();

    for _ in 0..100 {
        s.scheduler.poll();
        s.clock.advance(Duration::from_millis(100));
    }
    // 100 ticks cover 10 s: too early for the first 20 s interval
    assert_eq!(s.scheduler.stats().total_sessions, 0);

    for _ in 0..2000 {
        s.scheduler.poll();
        s.clock.advance(Duration::from_millis(100));
    }
    let mut previous = None;
    let mut count = 0;
    while let Ok(session) = sessions.try_recv() {
        if let Some(prev) = previous {
            assert!(session.started_at - prev >= Duration::from_secs(20));
        }
        previous = Some(session.started_at);
        assert!(!session.forced);
        count += 1;
    }
    assert!(count >= 5);
    assert_eq!(s.scheduler.stats().total_sessions, count);
}

#[test]
fn session_speaks_prompts_in_order() {
    let s = setup(BreathingConfig {
        chant_prompt: "Chant now".into(),
        ..BreathingConfig::default()
    });
    s.scheduler.start_stepped().unwrap();
    s.clock.advance(Duration::from_secs(20));
    match s.scheduler.poll() {
        TickOutcome::Completed(session) => {
            assert!(session.detected);
            assert_eq!(session.duration, 5.0);
            assert_eq!(
                session.verdict,
                ChantVerdict::KeywordMatched {
                    keyword: "aum".into()
                }
            );
        }
        other => panic!("expected a session, got {:?}", other),
    }
    assert_eq!(
        s.speaker.spoken(),
        vec!["Inhale...", "Exhale...", "Chant now"]
    );
}

#[test]
fn microphone_fault_is_isolated_and_retried() {
    let s = setup(BreathingConfig::default());
    let callbacks = Arc::new(AtomicU64::new(0));
    let seen = Arc::clone(&callbacks);
    s.scheduler.set_session_callback(move |_, _| {
        seen.fetch_add(1, Ordering::SeqCst);
    });
    s.scheduler.start_stepped().unwrap();
    s.microphone.push(Err(SensorError::Busy {
        device: "microphone".into(),
    }));
    s.clock.advance(Duration::from_secs(20));

    assert!(matches!(s.scheduler.poll(), TickOutcome::Faulted(_)));
    assert_eq!(callbacks.load(Ordering::SeqCst), 0);
    assert_eq!(s.scheduler.status(), SchedulerStatus::Running);

    assert!(matches!(s.scheduler.poll(), TickOutcome::Completed(_)));
    assert_eq!(callbacks.load(Ordering::SeqCst), 1);
    assert_eq!(s.microphone.capture_count(), 2);
}

#[test]
fn pause_and_resume_gate_the_timer() {
    let s = setup(BreathingConfig::default());
    s.scheduler.start_stepped().unwrap();
    s.scheduler.pause().unwrap();
    s.clock.advance(Duration::from_secs(120));
    assert_eq!(s.scheduler.poll(), TickOutcome::Waiting);
    assert_eq!(s.scheduler.time_until_next_session(), None);

    s.scheduler.resume().unwrap();
    assert_eq!(
        s.scheduler.time_until_next_session(),
        Some(Duration::ZERO)
    );
    assert!(matches!(s.scheduler.poll(), TickOutcome::Completed(_)));
}

#[test]
fn worker_thread_drives_sessions() {
    let config = BreathingConfig {
        default_interval_secs: 10,
        inhale_secs: 0.01,
        exhale_secs: 0.01,
        poll_interval_ms: 5,
        ..BreathingConfig::default()
    };
    let clock = Arc::new(ManualClock::new());
    let runner = SessionRunner::new(
        SessionScript::from_config(&config),
        ChantDetector::new(&ChantConfig::default(), clock.clone()),
        Arc::new(RecordingSpeaker::new()),
        Arc::new(ScriptedMicrophone::new(CaptureOutcome::TimedOut)),
        Arc::new(ScriptedTranscriber::new(Transcription::Unrecognized)),
        clock.clone(),
    );
    let scheduler = SessionScheduler::new(runner, &config, clock.clone());
    let outcomes = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&outcomes);
    scheduler.set_session_callback(move |detected, duration| {
        sink.lock().unwrap().push((detected, duration));
    });

    // the worker's sleeps drive the manual clock, so sessions come quickly
    scheduler.start().unwrap();
    let deadline = std::time::Instant::now() + Duration::from_secs(10);
    while outcomes.lock().unwrap().len() < 2 && std::time::Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    scheduler.shutdown();

    let outcomes = outcomes.lock().unwrap();
    assert!(outcomes.len() >= 2);
    assert!(outcomes.iter().all(|&(detected, duration)| !detected && duration == 0.0));
    assert!(clock.elapsed() >= Duration::from_secs(20));
    assert_eq!(scheduler.status(), SchedulerStatus::Stopped);
}
