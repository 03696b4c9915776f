// CalibrationProcedure - sample accumulation for one calibration window
//
// The window opens on the first calibrating observation. Count triggers cap
// the accumulator at the target; time triggers accept samples until the
// window has elapsed. Samples are dropped as soon as the window is reset.

use std::time::{Duration, Instant};

use super::CalibrationTrigger;

#[derive(Debug, Clone)]
pub struct CalibrationProcedure<S> {
    trigger: CalibrationTrigger,
    samples: Vec<S>,
    window_start: Option<Instant>,
}

impl<S> CalibrationProcedure<S> {
    pub fn new(trigger: CalibrationTrigger) -> Self {
        Self {
            trigger,
            samples: Vec::new(),
            window_start: None,
        }
    }

    pub fn trigger(&self) -> CalibrationTrigger {
        self.trigger
    }

    /// Open the window if it is not already open.
    pub fn begin(&mut self, now: Instant) {
        if self.window_start.is_none() {
            self.window_start = Some(now);
        }
    }

    pub fn is_open(&self) -> bool {
        self.window_start.is_some()
    }

    /// Add a sample unless the window is already complete.
    ///
    /// # Returns
    /// * `true` - sample accepted
    /// * `false` - window full or elapsed
    pub fn add_sample(&mut self, sample: S, now: Instant) -> bool {
        if self.is_complete(now) {
            return false;
        }
        self.samples.push(sample);
        true
    }

    pub fn samples(&self) -> &[S] {
        &self.samples
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn is_complete(&self, now: Instant) -> bool {
        match self.trigger {
            CalibrationTrigger::SampleCount(target) => self.samples.len() >= target,
            CalibrationTrigger::ElapsedTime(window) => self
                .window_start
                .map(|start| now.saturating_duration_since(start) >= window)
                .unwrap_or(false),
            CalibrationTrigger::Preset => true,
        }
    }

    pub fn elapsed(&self, now: Instant) -> Duration {
        self.window_start
            .map(|start| now.saturating_duration_since(start))
            .unwrap_or_default()
    }

    /// Fraction of the window completed, 0.0-1.0.
    pub fn progress(&self, now: Instant) -> f64 {
        let fraction = match self.trigger {
            CalibrationTrigger::SampleCount(0) | CalibrationTrigger::Preset => 1.0,
            CalibrationTrigger::SampleCount(target) => self.samples.len() as f64 / target as f64,
            CalibrationTrigger::ElapsedTime(window) if window.is_zero() => 1.0,
            CalibrationTrigger::ElapsedTime(window) => {
                self.elapsed(now).as_secs_f64() / window.as_secs_f64()
            }
        };
        fraction.clamp(0.0, 1.0)
    }

    /// Close the window and discard every accumulated sample.
    pub fn reset(&mut self) {
        self.samples = Vec::new();
        self.window_start = None;
    }
}
