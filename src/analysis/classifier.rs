// SignalClassifier - baseline-calibrated binary classifier
//
// One generic state machine shared by every detector:
//
//   CALIBRATING --(trigger fires, threshold derived)--> CLASSIFYING
//        ^                                                  |
//        +------------------ reset_calibration() -----------+
//
// The classifier-specific parts (how a baseline is reduced from samples, how
// a threshold is derived from the baseline, and the comparison itself) live
// behind the ThresholdRule trait.
//
// Counting rules:
// - calibration samples never touch RunningStats
// - missing samples are never accumulated or counted
// - observations before calibration completes follow the UncalibratedPolicy
//   and are not counted either

use std::fmt::Debug;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::stats::{DetectorStats, RunningStats};
use crate::calibration::{
    CalibrationInfo, CalibrationProcedure, CalibrationState, CalibrationTrigger,
};
use crate::engine::backend::TimeSource;
use crate::error::{log_calibration_error, CalibrationError};

/// Classifier-specific half of a SignalClassifier.
///
/// `reduce` and `derive_threshold` must be pure so that recomputing a
/// threshold from the same samples always yields the same value.
pub trait ThresholdRule: Send {
    type Sample: Clone + Debug + Send;
    type Reference: Clone + Debug + Send;
    type Threshold: Clone + Debug + Send;

    /// Collapse calibration samples into a baseline. `None` when the samples
    /// carry no information (usually: there are none).
    fn reduce(&self, samples: &[Self::Sample]) -> Option<Self::Reference>;

    /// Derive the decision threshold. `None` means calibration cannot
    /// complete with this baseline.
    fn derive_threshold(&self, reference: Option<&Self::Reference>) -> Option<Self::Threshold>;

    fn is_positive(&self, sample: &Self::Sample, threshold: &Self::Threshold) -> bool;
}

/// Discrete output of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectorState {
    /// Good posture / eyes open / voiced
    Positive,
    Negative,
    /// Calibrating, or no feature available
    Unknown,
}

impl DetectorState {
    pub fn is_positive(&self) -> bool {
        matches!(self, DetectorState::Positive)
    }
}

/// What to report for valid samples observed before calibration completes.
///
/// `AssumePositive` keeps feedback quiet until a baseline exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UncalibratedPolicy {
    #[default]
    AssumePositive,
    Unknown,
}

impl UncalibratedPolicy {
    pub fn state(&self) -> DetectorState {
        match self {
            UncalibratedPolicy::AssumePositive => DetectorState::Positive,
            UncalibratedPolicy::Unknown => DetectorState::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationResult<S> {
    pub state: DetectorState,
    /// Raw feature value; `None` when the extractor produced nothing
    pub sample: Option<S>,
    pub is_calibrated: bool,
}

pub struct SignalClassifier<R: ThresholdRule> {
    rule: R,
    procedure: CalibrationProcedure<R::Sample>,
    state: CalibrationState<R::Reference>,
    threshold: Option<R::Threshold>,
    stats: RunningStats,
    policy: UncalibratedPolicy,
    clock: Arc<dyn TimeSource>,
    name: &'static str,
}

impl<R: ThresholdRule> SignalClassifier<R> {
    /// Create a classifier in CALIBRATING.
    ///
    /// A `Preset` trigger calibrates immediately from the rule's fallback.
    pub fn new(
        name: &'static str,
        rule: R,
        trigger: CalibrationTrigger,
        policy: UncalibratedPolicy,
        clock: Arc<dyn TimeSource>,
    ) -> Self {
        let now = clock.now();
        let mut classifier = Self {
            rule,
            procedure: CalibrationProcedure::new(trigger),
            state: CalibrationState::new(trigger.target_sample_count()),
            threshold: None,
            stats: RunningStats::new(now),
            policy,
            clock,
            name,
        };
        if trigger == CalibrationTrigger::Preset {
            classifier.calibrate_or_restart();
        }
        classifier
    }

    /// Feed one (possibly missing) sample.
    ///
    /// With `calibrating` set the sample goes to the calibration window and
    /// the returned state is always `Unknown`.
    pub fn observe(
        &mut self,
        sample: Option<R::Sample>,
        calibrating: bool,
    ) -> ClassificationResult<R::Sample> {
        if calibrating {
            return self.observe_calibrating(sample);
        }

        let Some(sample) = sample else {
            return ClassificationResult {
                state: DetectorState::Unknown,
                sample: None,
                is_calibrated: self.state.is_calibrated(),
            };
        };

        match &self.threshold {
            Some(threshold) if self.state.is_calibrated() => {
                let positive = self.rule.is_positive(&sample, threshold);
                self.stats.record(positive);
                ClassificationResult {
                    state: if positive {
                        DetectorState::Positive
                    } else {
                        DetectorState::Negative
                    },
                    sample: Some(sample),
                    is_calibrated: true,
                }
            }
            _ => ClassificationResult {
                state: self.policy.state(),
                sample: Some(sample),
                is_calibrated: false,
            },
        }
    }

    fn observe_calibrating(&mut self, sample: Option<R::Sample>) -> ClassificationResult<R::Sample> {
        if self.state.is_calibrated() {
            log::debug!(
                "[{}] calibrating observation ignored: already calibrated",
                self.name
            );
            return ClassificationResult {
                state: DetectorState::Unknown,
                sample,
                is_calibrated: true,
            };
        }

        let now = self.clock.now();
        self.procedure.begin(now);
        if let Some(value) = &sample {
            self.procedure.add_sample(value.clone(), now);
        }
        if self.procedure.is_complete(now) {
            self.calibrate_or_restart();
        }

        ClassificationResult {
            state: DetectorState::Unknown,
            sample,
            is_calibrated: self.state.is_calibrated(),
        }
    }

    /// Autonomous transition: on failure the window starts over.
    fn calibrate_or_restart(&mut self) {
        if let Err(err) = self.finalize_calibration() {
            log_calibration_error(&err, self.name);
            self.procedure.reset();
        }
    }

    /// Derive the threshold from whatever the window holds and switch to
    /// CLASSIFYING. A no-op when already calibrated.
    ///
    /// On error the accumulated samples are kept.
    pub fn finalize_calibration(&mut self) -> Result<(), CalibrationError> {
        if self.state.is_calibrated() {
            return Ok(());
        }
        let samples = self.procedure.samples();
        let reference = self.rule.reduce(samples);
        let threshold = self.rule.derive_threshold(reference.as_ref()).ok_or(
            CalibrationError::InsufficientSamples {
                required: self.state.target_sample_count().unwrap_or(1),
                collected: samples.len(),
            },
        )?;

        let count = samples.len();
        self.state.mark_calibrated(reference, count);
        self.threshold = Some(threshold);
        self.procedure.reset();
        log::info!(
            "[{}] calibrated from {} samples: threshold {:?}",
            self.name,
            count,
            self.threshold
        );
        Ok(())
    }

    /// Install an explicit threshold, ending any open calibration window.
    ///
    /// Samples already collected still form the reported baseline.
    pub fn override_threshold(&mut self, threshold: R::Threshold) {
        let samples = self.procedure.samples();
        let reference = self
            .state
            .baseline()
            .cloned()
            .or_else(|| self.rule.reduce(samples));
        let count = if self.state.is_calibrated() {
            self.state.sample_count()
        } else {
            samples.len()
        };
        self.state.reset();
        self.state.mark_calibrated(reference, count);
        self.procedure.reset();
        log::info!("[{}] threshold overridden: {:?}", self.name, threshold);
        self.threshold = Some(threshold);
    }

    /// Back to CALIBRATING. Statistics are left alone.
    pub fn reset_calibration(&mut self) {
        self.state.reset();
        self.threshold = None;
        self.procedure.reset();
        log::info!("[{}] calibration reset", self.name);
        if self.procedure.trigger() == CalibrationTrigger::Preset {
            self.calibrate_or_restart();
        }
    }

    pub fn reset_stats(&mut self) {
        self.stats.reset(self.clock.now());
    }

    pub fn get_stats(&self) -> DetectorStats {
        self.stats
            .snapshot(self.clock.now(), self.state.is_calibrated())
    }

    pub fn calibration_info(&self) -> CalibrationInfo<R::Reference, R::Threshold> {
        let is_calibrated = self.state.is_calibrated();
        let (sample_count, progress) = if is_calibrated {
            (self.state.sample_count(), 1.0)
        } else {
            let now = self.clock.now();
            (self.procedure.sample_count(), self.procedure.progress(now))
        };
        CalibrationInfo {
            is_calibrated,
            sample_count,
            target_sample_count: self.state.target_sample_count(),
            progress,
            baseline: self.state.baseline().cloned(),
            threshold: self.threshold.clone(),
        }
    }

    pub fn is_calibrated(&self) -> bool {
        self.state.is_calibrated()
    }

    /// Completed calibration cycles since construction
    pub fn calibration_cycles(&self) -> u32 {
        self.state.cycles()
    }

    pub fn threshold(&self) -> Option<&R::Threshold> {
        self.threshold.as_ref()
    }

    pub fn rule(&self) -> &R {
        &self.rule
    }

    pub fn policy(&self) -> UncalibratedPolicy {
        self.policy
    }
}
