//! Configuration management for the wellness monitor
//!
//! This module provides runtime configuration loading from JSON files so the
//! posture tolerances, eye calibration window, chant keywords and breathing
//! cadence can be tuned without recompilation. Every section has defaults
//! matching the behaviour users saw before a config file existed.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::analysis::UncalibratedPolicy;

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub posture: PostureConfig,
    #[serde(default)]
    pub eye: EyeConfig,
    #[serde(default)]
    pub chant: ChantConfig,
    #[serde(default)]
    pub breathing: BreathingConfig,
    #[serde(default)]
    pub speech: SpeechConfig,
}

/// Camera capture parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CameraConfig {
    pub frame_width: u32,
    pub frame_height: u32,
    /// Nominal capture rate; the simulator advances its clock by 1/fps
    pub fps: u32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            frame_width: 640,
            frame_height: 480,
            fps: 30,
        }
    }
}

/// Posture auto-calibration and tolerance parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostureConfig {
    /// Consecutive valid frames averaged into the baseline
    pub auto_calibration_frames: usize,
    /// Multiplier applied to the baseline shoulder tilt
    pub shoulder_tilt_tolerance: f64,
    /// Multiplier applied to the baseline head-forward offset
    pub head_forward_tolerance: f64,
    /// Fraction of the baseline shoulder-hip height that must be kept
    pub slouch_tolerance: f64,
    /// Allowed head tilt deviation in absolute degrees
    pub head_tilt_tolerance: f64,
    /// Shoulder width (fraction of frame width) below which the user should move closer
    pub move_closer_below: f64,
    /// Shoulder width (fraction of frame width) above which the user should move back
    pub move_back_above: f64,
    /// State reported for frames classified before calibration completes
    #[serde(default)]
    pub uncalibrated_policy: UncalibratedPolicy,
    /// How calibration head-tilt samples are averaged into the baseline
    #[serde(default)]
    pub head_tilt_averaging: HeadTiltAveraging,
}

/// Head tilt baseline and deviation arithmetic
///
/// `Arithmetic` averages the raw angles and compares with a plain absolute
/// difference. `Circular` averages unit vectors and wraps the difference into
/// [-180, 180), which keeps a baseline near +/-180 degrees stable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeadTiltAveraging {
    #[default]
    Arithmetic,
    Circular,
}

impl Default for PostureConfig {
    fn default() -> Self {
        Self {
            auto_calibration_frames: 75,
            shoulder_tilt_tolerance: 1.5,
            head_forward_tolerance: 1.5,
            slouch_tolerance: 0.8,
            head_tilt_tolerance: 15.0,
            move_closer_below: 0.15,
            move_back_above: 0.6,
            uncalibrated_policy: UncalibratedPolicy::default(),
            head_tilt_averaging: HeadTiltAveraging::default(),
        }
    }
}

/// Eye-aspect-ratio calibration parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EyeConfig {
    /// Threshold used when calibration saw no valid EAR at all
    pub default_ear_threshold: f64,
    /// Length of the time-based calibration window in milliseconds
    pub calibration_window_ms: u64,
    /// State reported for frames classified before calibration completes
    #[serde(default)]
    pub uncalibrated_policy: UncalibratedPolicy,
}

impl Default for EyeConfig {
    fn default() -> Self {
        Self {
            default_ear_threshold: 0.22,
            calibration_window_ms: 3000,
            uncalibrated_policy: UncalibratedPolicy::default(),
        }
    }
}

impl EyeConfig {
    pub fn calibration_window(&self) -> Duration {
        Duration::from_millis(self.calibration_window_ms)
    }
}

/// Chant detection parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChantConfig {
    /// RMS below which a capture is treated as silence
    pub silence_threshold: f64,
    /// Case-insensitive substrings accepted as a chant
    pub keywords: Vec<String>,
    /// Treat "speech heard but not understood" as a detected chant
    pub unrecognized_counts_as_detected: bool,
    /// Treat a failing transcription service as a detected chant
    pub transcription_error_counts_as_detected: bool,
    /// Seconds of room noise sampled to set the microphone energy floor
    #[serde(default = "default_ambient_noise_secs")]
    pub ambient_noise_secs: f64,
}

fn default_ambient_noise_secs() -> f64 {
    2.0
}

impl Default for ChantConfig {
    fn default() -> Self {
        Self {
            silence_threshold: 300.0,
            keywords: ["om", "aum", "ohm", "oom", "um", "hmm"]
                .iter()
                .map(|k| k.to_string())
                .collect(),
            unrecognized_counts_as_detected: true,
            transcription_error_counts_as_detected: true,
            ambient_noise_secs: default_ambient_noise_secs(),
        }
    }
}

impl ChantConfig {
    pub fn ambient_noise_duration(&self) -> Duration {
        seconds_or(self.ambient_noise_secs, default_ambient_noise_secs())
    }
}

/// Longest accepted step or capture duration in seconds
pub const MAX_STEP_SECS: f64 = 600.0;

/// Convert configured seconds, falling back when the value is negative,
/// non-finite or longer than `MAX_STEP_SECS`.
fn seconds_or(value: f64, fallback: f64) -> Duration {
    if (0.0..=MAX_STEP_SECS).contains(&value) {
        Duration::from_secs_f64(value)
    } else {
        log::warn!(
            "[Config] Duration {} s out of range, using {} s",
            value,
            fallback
        );
        Duration::from_secs_f64(fallback)
    }
}

/// Guided breathing session cadence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreathingConfig {
    /// Seconds between scheduled sessions
    pub default_interval_secs: u64,
    pub min_interval_secs: u64,
    pub max_interval_secs: u64,
    pub inhale_secs: f64,
    pub exhale_secs: f64,
    /// Upper bound on a single chant capture
    pub max_listen_secs: f64,
    /// Scheduler polling cadence in milliseconds
    pub poll_interval_ms: u64,
    pub prompt_script_id: String,
    pub inhale_prompt: String,
    pub exhale_prompt: String,
    pub chant_prompt: String,
}

impl Default for BreathingConfig {
    fn default() -> Self {
        Self {
            default_interval_secs: 20,
            min_interval_secs: 10,
            max_interval_secs: 300,
            inhale_secs: 4.0,
            exhale_secs: 6.0,
            max_listen_secs: 15.0,
            poll_interval_ms: 100,
            prompt_script_id: "om-breathing".to_string(),
            inhale_prompt: "Inhale...".to_string(),
            exhale_prompt: "Exhale...".to_string(),
            chant_prompt: "Begin chant Om...".to_string(),
        }
    }
}

impl BreathingConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.default_interval_secs)
    }

    pub fn inhale_duration(&self) -> Duration {
        seconds_or(self.inhale_secs, 4.0)
    }

    pub fn exhale_duration(&self) -> Duration {
        seconds_or(self.exhale_secs, 6.0)
    }

    pub fn max_listen(&self) -> Duration {
        seconds_or(self.max_listen_secs, 15.0)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Text-to-speech voice selection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Substrings matched against backend voice names, first match wins
    pub voice_preferences: Vec<String>,
    pub rate_wpm: u32,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            voice_preferences: vec!["female".to_string(), "zira".to_string()],
            rate_wpm: 140,
        }
    }
}

impl AppConfig {
    /// Load configuration from JSON file
    ///
    /// Missing sections fall back to their defaults. If the file doesn't
    /// exist or the JSON is invalid, the whole default config is returned and
    /// a warning is logged.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// Write configuration as pretty JSON, creating parent directories
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Validate configuration values
    ///
    /// Returns one human-readable line per problem; an empty list means the
    /// configuration is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.camera.fps == 0 {
            errors.push("Invalid camera fps".to_string());
        }
        if self.camera.frame_width < 320 || self.camera.frame_height < 240 {
            errors.push("Frame size too small".to_string());
        }

        let breathing = &self.breathing;
        if breathing.default_interval_secs < breathing.min_interval_secs {
            errors.push("Breathing interval too small".to_string());
        }
        if breathing.default_interval_secs > breathing.max_interval_secs {
            errors.push("Breathing interval too large".to_string());
        }
        let step_ok = |secs: f64| secs > 0.0 && secs <= MAX_STEP_SECS;
        if !step_ok(breathing.inhale_secs)
            || !step_ok(breathing.exhale_secs)
            || !step_ok(breathing.max_listen_secs)
        {
            errors.push("Invalid breathing durations".to_string());
        }
        if !(0.0..=MAX_STEP_SECS).contains(&self.chant.ambient_noise_secs) {
            errors.push("Invalid ambient noise duration".to_string());
        }

        let posture = &self.posture;
        for (name, value) in [
            ("shoulder_tilt_tolerance", posture.shoulder_tilt_tolerance),
            ("head_forward_tolerance", posture.head_forward_tolerance),
            ("slouch_tolerance", posture.slouch_tolerance),
        ] {
            if value <= 0.0 {
                errors.push(format!("Invalid posture {}", name));
            }
        }
        if posture.auto_calibration_frames == 0 {
            errors.push("Posture calibration needs at least one frame".to_string());
        }

        if self.chant.keywords.is_empty() {
            errors.push("Chant keyword list is empty".to_string());
        }

        errors
    }
}
