// Progress reporting for calibration

use serde::Serialize;

/// Snapshot returned by `get_calibration_info()`
///
/// `progress` runs 0.0-1.0 over the window (sample fraction for count
/// triggers, time fraction for elapsed-time triggers) and is 1.0 once
/// calibrated.
#[derive(Debug, Clone, Serialize)]
pub struct CalibrationInfo<R, T> {
    pub is_calibrated: bool,
    pub sample_count: usize,
    pub target_sample_count: Option<usize>,
    pub progress: f64,
    pub baseline: Option<R>,
    pub threshold: Option<T>,
}

impl<R, T> CalibrationInfo<R, T> {
    pub fn progress_percent(&self) -> u8 {
        (self.progress.clamp(0.0, 1.0) * 100.0).round() as u8
    }
}
