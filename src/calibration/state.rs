// CalibrationState - calibrated flag and baseline storage
//
// `is_calibrated` flips to true once per calibration cycle and only an
// explicit reset clears it. The baseline is written at that transition and
// is read-only afterwards.

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CalibrationState<R> {
    is_calibrated: bool,
    /// Valid samples that went into the baseline
    sample_count: usize,
    target_sample_count: Option<usize>,
    baseline: Option<R>,
    /// Completed calibration cycles since construction
    cycles: u32,
}

impl<R: Clone> CalibrationState<R> {
    pub fn new(target_sample_count: Option<usize>) -> Self {
        Self {
            is_calibrated: false,
            sample_count: 0,
            target_sample_count,
            baseline: None,
            cycles: 0,
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.is_calibrated
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn target_sample_count(&self) -> Option<usize> {
        self.target_sample_count
    }

    pub fn baseline(&self) -> Option<&R> {
        self.baseline.as_ref()
    }

    pub fn cycles(&self) -> u32 {
        self.cycles
    }

    /// Record the calibration transition. Ignored when already calibrated.
    pub fn mark_calibrated(&mut self, baseline: Option<R>, sample_count: usize) -> bool {
        if self.is_calibrated {
            return false;
        }
        self.is_calibrated = true;
        self.baseline = baseline;
        self.sample_count = sample_count;
        self.cycles += 1;
        true
    }

    pub fn reset(&mut self) {
        self.is_calibrated = false;
        self.sample_count = 0;
        self.baseline = None;
    }
}
