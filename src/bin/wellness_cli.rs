use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use wellness_monitor::analysis::features::FrameSize;
use wellness_monitor::audio::{AudioBuffer, SpeechEngine};
use wellness_monitor::config::AppConfig;
use wellness_monitor::detectors::{ChantDetector, ChantOutcome};
use wellness_monitor::engine::backend::{
    tone_buffer, CaptureOutcome, ManualClock, ScriptedCamera, ScriptedFaceModel,
    ScriptedMicrophone, ScriptedPoseModel, ScriptedTranscriber, SpeechBackend, SyntheticSubject,
    Transcription,
};
use wellness_monitor::engine::{Collaborators, MonitorSummary, SelfTestReport, WellnessMonitor};

#[derive(Parser, Debug)]
#[command(
    name = "wellness_cli",
    about = "Offline harness for the wellness monitor core"
)]
struct Cli {
    /// Log debug output to stderr
    #[arg(long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Replay a synthetic subject through calibration and monitoring
    Simulate {
        #[arg(long, default_value_t = 900)]
        frames: u64,
        /// Frame index from which the subject slouches
        #[arg(long)]
        slouch_after: Option<u64>,
        /// Frames per blink cycle (0 disables blinking)
        #[arg(long, default_value_t = 45)]
        blink_period: u64,
        #[arg(long, default_value_t = 7)]
        seed: u64,
        /// Run guided breathing sessions between frames
        #[arg(long)]
        breathing: bool,
        /// Recognizer result for every simulated chant
        #[arg(long, default_value = "om")]
        transcript: String,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Classify one recorded chant (mono PCM WAV)
    Chant {
        #[arg(long)]
        wav: PathBuf,
        /// Pretend the recognizer heard this; omitted means "not understood"
        #[arg(long)]
        transcript: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Print the default configuration, or write it to a file
    Config {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Check a configuration file; exits with 2 when problems are found
    Validate {
        #[arg(long)]
        config: PathBuf,
    },
    /// Exercise the microphone and speech paths; exits with 3 on failure
    SelfTest {
        /// Recognizer result for the test capture
        #[arg(long, default_value = "testing")]
        transcript: String,
        /// Simulate a microphone that hears nothing
        #[arg(long)]
        silent: bool,
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    match run(cli.command) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run(command: Commands) -> Result<ExitCode> {
    match command {
        Commands::Simulate {
            frames,
            slouch_after,
            blink_period,
            seed,
            breathing,
            transcript,
            config,
        } => run_simulate(
            load_config(config),
            SimulationPlan {
                frames,
                slouch_after,
                blink_period,
                seed,
                breathing,
                transcript,
            },
        ),
        Commands::Chant {
            wav,
            transcript,
            config,
        } => run_chant(load_config(config), wav, transcript),
        Commands::Config { output } => run_config(output),
        Commands::Validate { config } => run_validate(config),
        Commands::SelfTest {
            transcript,
            silent,
            config,
        } => run_self_test(load_config(config), transcript, silent),
    }
}

fn load_config(path: Option<PathBuf>) -> AppConfig {
    path.map(AppConfig::load_from_file).unwrap_or_default()
}

struct SimulationPlan {
    frames: u64,
    slouch_after: Option<u64>,
    blink_period: u64,
    seed: u64,
    breathing: bool,
    transcript: String,
}

/// Speech backend that writes prompts to the log instead of a speaker.
struct LogSpeech;

impl SpeechBackend for LogSpeech {
    fn speak_blocking(&mut self, text: &str) -> Result<(), String> {
        tracing::info!(text, "speak");
        Ok(())
    }
}

fn run_simulate(config: AppConfig, plan: SimulationPlan) -> Result<ExitCode> {
    let size = FrameSize::new(config.camera.frame_width, config.camera.frame_height);
    let clock = Arc::new(ManualClock::new());
    let (poses, faces) = SyntheticSubject::new(plan.seed).recording(
        size,
        plan.frames,
        plan.slouch_after,
        plan.blink_period,
    );
    let speech = Arc::new(SpeechEngine::new(Box::new(LogSpeech), &config.speech));

    let mut monitor = WellnessMonitor::new(
        &config,
        Collaborators {
            pose_model: Arc::new(ScriptedPoseModel::new(poses)),
            face_model: Arc::new(ScriptedFaceModel::new(faces)),
            microphone: Arc::new(ScriptedMicrophone::new(CaptureOutcome::Captured(
                tone_buffer(1500, 4.0, 16000),
            ))),
            transcriber: Arc::new(ScriptedTranscriber::new(Transcription::Text(
                plan.transcript,
            ))),
            speaker: speech.clone(),
            clock: clock.clone(),
        },
    );
    monitor.set_session_callback(|detected, duration| {
        tracing::info!(detected, duration, "breathing session complete");
    });
    if plan.breathing {
        monitor
            .start_stepped()
            .context("starting breathing sessions")?;
    }

    let mut camera = ScriptedCamera::new(size, plan.frames).paced(clock, config.camera.fps);
    monitor
        .run(&mut camera, None)
        .context("camera stream failed")?;
    monitor.stop();
    speech.shutdown();

    emit_json(&SimulationReport {
        frames: plan.frames,
        summary: monitor.summary(),
    })?;
    Ok(ExitCode::from(0))
}

fn run_chant(config: AppConfig, wav: PathBuf, transcript: Option<String>) -> Result<ExitCode> {
    let buffer = AudioBuffer::from_wav(&wav)?;
    let transcriber = ScriptedTranscriber::new(match transcript {
        Some(text) => Transcription::Text(text),
        None => Transcription::Unrecognized,
    });
    let mut detector = ChantDetector::new(&config.chant, Arc::new(ManualClock::new()));
    let outcome = detector.evaluate(&CaptureOutcome::Captured(buffer), &transcriber);

    emit_json(&ChantReport {
        wav: wav.display().to_string(),
        outcome: &outcome,
    })?;
    Ok(ExitCode::from(0))
}

fn run_config(output: Option<PathBuf>) -> Result<ExitCode> {
    let config = AppConfig::default();
    match output {
        Some(path) => {
            config.save_to_file(&path)?;
            eprintln!("Wrote default configuration to {}", path.display());
        }
        None => emit_json(&config)?,
    }
    Ok(ExitCode::from(0))
}

fn run_validate(path: PathBuf) -> Result<ExitCode> {
    let contents =
        fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    let config: AppConfig = serde_json::from_str(&contents)
        .with_context(|| format!("parsing {}", path.display()))?;

    let problems = config.validate();
    if problems.is_empty() {
        println!("Configuration OK");
        return Ok(ExitCode::from(0));
    }
    for problem in &problems {
        println!("{problem}");
    }
    Ok(ExitCode::from(2))
}

fn run_self_test(config: AppConfig, transcript: String, silent: bool) -> Result<ExitCode> {
    let microphone = if silent {
        ScriptedMicrophone::new(CaptureOutcome::TimedOut)
    } else {
        ScriptedMicrophone::new(CaptureOutcome::Captured(tone_buffer(1500, 2.0, 16000)))
    };
    let speech = Arc::new(SpeechEngine::new(Box::new(LogSpeech), &config.speech));
    let monitor = WellnessMonitor::new(
        &config,
        Collaborators {
            pose_model: Arc::new(ScriptedPoseModel::new(Vec::new())),
            face_model: Arc::new(ScriptedFaceModel::new(Vec::new())),
            microphone: Arc::new(microphone),
            transcriber: Arc::new(ScriptedTranscriber::new(Transcription::Text(transcript))),
            speaker: speech.clone(),
            clock: Arc::new(ManualClock::new()),
        },
    );
    let report = monitor.self_test();
    speech.shutdown();

    emit_json(&report)?;
    Ok(ExitCode::from(if report.passed() { 0 } else { 3 }))
}

fn emit_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[derive(Serialize)]
struct SimulationReport {
    frames: u64,
    summary: MonitorSummary,
}

#[derive(Serialize)]
struct ChantReport<'a> {
    wav: String,
    outcome: &'a ChantOutcome,
}
