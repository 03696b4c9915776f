// Calibration module - baseline collection and calibration bookkeeping
//
// Three components:
// 1. CalibrationProcedure: accumulates samples until its trigger fires
// 2. CalibrationState: the calibrated flag and the immutable baseline
// 3. CalibrationInfo: read-only snapshot for the UI
//
// The threshold itself is derived by the owning SignalClassifier from the
// baseline, using its classifier-specific rule.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod procedure;
pub mod progress;
pub mod state;

pub use procedure::CalibrationProcedure;
pub use progress::CalibrationInfo;
pub use state::CalibrationState;

/// When a calibration window is considered complete
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationTrigger {
    /// After this many valid samples (posture)
    SampleCount(usize),
    /// After this much time since the first calibrating observation (eyes)
    ElapsedTime(Duration),
    /// No window at all; the threshold comes from configuration (audio)
    Preset,
}

impl CalibrationTrigger {
    pub fn target_sample_count(&self) -> Option<usize> {
        match self {
            CalibrationTrigger::SampleCount(n) => Some(*n),
            _ => None,
        }
    }
}
