// EyeDetector - face keypoints to eyes open/closed
//
// Calibration watches the average EAR for a fixed time window and keeps the
// lowest and highest value seen; the threshold is their midpoint. A window
// that never saw both eyes falls back to a configured constant.

use std::sync::Arc;

use serde::Serialize;

use crate::analysis::features::{EyeFeatureExtractor, EyeMetrics, FaceKeypoints, FeatureExtractor};
use crate::analysis::{DetectorState, DetectorStats, SignalClassifier, ThresholdRule};
use crate::calibration::{CalibrationInfo, CalibrationTrigger};
use crate::config::EyeConfig;
use crate::engine::backend::TimeSource;
use crate::error::CalibrationError;

/// Lowest and highest average EAR seen during calibration
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EarRange {
    pub lowest: f64,
    pub highest: f64,
}

impl EarRange {
    pub fn range(&self) -> f64 {
        self.highest - self.lowest
    }

    pub fn midpoint(&self) -> f64 {
        (self.lowest + self.highest) / 2.0
    }
}

#[derive(Debug, Clone)]
pub struct EyeRule {
    fallback_threshold: f64,
}

impl EyeRule {
    pub fn new(fallback_threshold: f64) -> Self {
        Self { fallback_threshold }
    }
}

impl ThresholdRule for EyeRule {
    type Sample = f64;
    type Reference = EarRange;
    type Threshold = f64;

    fn reduce(&self, samples: &[f64]) -> Option<EarRange> {
        samples.iter().fold(None, |range, &ear| match range {
            None => Some(EarRange {
                lowest: ear,
                highest: ear,
            }),
            Some(r) => Some(EarRange {
                lowest: r.lowest.min(ear),
                highest: r.highest.max(ear),
            }),
        })
    }

    fn derive_threshold(&self, reference: Option<&EarRange>) -> Option<f64> {
        Some(
            reference
                .map(EarRange::midpoint)
                .unwrap_or(self.fallback_threshold),
        )
    }

    fn is_positive(&self, ear: &f64, threshold: &f64) -> bool {
        *ear > *threshold
    }
}

/// Uniform per-frame eye result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EyeReport {
    pub state: DetectorState,
    pub metrics: Option<EyeMetrics>,
    pub is_calibrated: bool,
}

impl EyeReport {
    pub fn eyes_open(&self) -> bool {
        self.state.is_positive()
    }

    pub fn average_ear(&self) -> Option<f64> {
        self.metrics.and_then(|m| m.average_ear)
    }
}

pub struct EyeDetector {
    extractor: EyeFeatureExtractor,
    classifier: SignalClassifier<EyeRule>,
}

impl EyeDetector {
    pub fn new(config: &EyeConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            extractor: EyeFeatureExtractor,
            classifier: SignalClassifier::new(
                "EyeDetector",
                EyeRule::new(config.default_ear_threshold),
                CalibrationTrigger::ElapsedTime(config.calibration_window()),
                config.uncalibrated_policy,
                clock,
            ),
        }
    }

    /// Observe one frame's face. Only the two-eye average is classified.
    pub fn observe(&mut self, face: Option<&FaceKeypoints>, calibrating: bool) -> EyeReport {
        let metrics = face.and_then(|f| self.extractor.extract(f));
        self.observe_metrics(metrics, calibrating)
    }

    pub fn observe_metrics(&mut self, metrics: Option<EyeMetrics>, calibrating: bool) -> EyeReport {
        let ear = metrics.and_then(|m| m.average_ear);
        let result = self.classifier.observe(ear, calibrating);
        EyeReport {
            state: result.state,
            metrics,
            is_calibrated: result.is_calibrated,
        }
    }

    pub fn observe_ear(&mut self, ear: Option<f64>, calibrating: bool) -> EyeReport {
        let metrics = ear.map(|value| EyeMetrics {
            left_ear: Some(value),
            right_ear: Some(value),
            average_ear: Some(value),
        });
        self.observe_metrics(metrics, calibrating)
    }

    /// Fix the threshold manually, or derive it now from what the window saw.
    ///
    /// # Arguments
    /// * `threshold` - `Some(value)` to override; `None` to calibrate from the
    ///   observed range (or the fallback constant when nothing was observed)
    ///
    /// # Errors
    /// * `CalibrationError::InvalidThreshold` - value is not finite and positive
    pub fn set_threshold(&mut self, threshold: Option<f64>) -> Result<(), CalibrationError> {
        match threshold {
            Some(value) if !value.is_finite() || value <= 0.0 => {
                Err(CalibrationError::InvalidThreshold { value })
            }
            Some(value) => {
                self.classifier.override_threshold(value);
                Ok(())
            }
            None => self.classifier.finalize_calibration(),
        }
    }

    /// Current decision threshold.
    ///
    /// # Errors
    /// * `CalibrationError::NotCalibrated` - no threshold derived yet
    pub fn threshold(&self) -> Result<f64, CalibrationError> {
        self.classifier
            .threshold()
            .copied()
            .ok_or(CalibrationError::NotCalibrated)
    }

    pub fn reset_calibration(&mut self) {
        self.classifier.reset_calibration();
    }

    pub fn reset_stats(&mut self) {
        self.classifier.reset_stats();
    }

    pub fn get_stats(&self) -> DetectorStats {
        self.classifier.get_stats()
    }

    pub fn get_calibration_info(&self) -> CalibrationInfo<EarRange, f64> {
        self.classifier.calibration_info()
    }

    pub fn is_calibrated(&self) -> bool {
        self.classifier.is_calibrated()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::backend::{ManualClock, SyntheticSubject};
    use std::time::Duration;

    fn detector(clock: Arc<ManualClock>) -> EyeDetector {
        EyeDetector::new(&EyeConfig::default(), clock)
    }

    #[test]
    fn threshold_is_midpoint_of_observed_range() {
        let clock = Arc::new(ManualClock::new());
        let mut eyes = detector(clock.clone());
        for ear in [0.18, 0.30, 0.25] {
            eyes.observe_ear(Some(ear), true);
            clock.advance(Duration::from_millis(500));
        }
        eyes.set_threshold(None).unwrap();
        assert!((eyes.threshold().unwrap() - 0.24).abs() < 1e-12);

        assert!(eyes.observe_ear(Some(0.26), false).eyes_open());
        assert_eq!(eyes.observe_ear(Some(0.20), false).state, DetectorState::Negative);

        let info = eyes.get_calibration_info();
        let range = info.baseline.unwrap();
        assert_eq!(range.lowest, 0.18);
        assert_eq!(range.highest, 0.30);
        assert!((range.range() - 0.12).abs() < 1e-12);
    }

    #[test]
    fn window_elapsing_calibrates_autonomously() {
        let clock = Arc::new(ManualClock::new());
        let mut eyes = detector(clock.clone());
        eyes.observe_ear(Some(0.2), true);
        clock.advance(Duration::from_secs(2));
        eyes.observe_ear(Some(0.3), true);
        assert!(!eyes.is_calibrated());
        clock.advance(Duration::from_secs(1));
        eyes.observe_ear(None, true);
        assert!(eyes.is_calibrated());
        assert!((eyes.threshold().unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn empty_window_falls_back_to_default() {
        let clock = Arc::new(ManualClock::new());
        let mut eyes = detector(clock.clone());
        eyes.observe(None, true);
        clock.advance(Duration::from_secs(3));
        eyes.observe(None, true);
        assert!(eyes.is_calibrated());
        assert_eq!(eyes.threshold(), Ok(0.22));
        assert!(eyes.get_calibration_info().baseline.is_none());
    }

    #[test]
    fn uncalibrated_defaults_to_open_and_is_not_counted() {
        let clock = Arc::new(ManualClock::new());
        let mut eyes = detector(clock);
        let report = eyes.observe_ear(Some(0.05), false);
        assert!(report.eyes_open());
        assert!(!report.is_calibrated);
        assert_eq!(eyes.get_stats().total, 0);
        assert_eq!(eyes.threshold(), Err(CalibrationError::NotCalibrated));
    }

    #[test]
    fn manual_threshold_is_validated() {
        let clock = Arc::new(ManualClock::new());
        let mut eyes = detector(clock);
        assert_eq!(
            eyes.set_threshold(Some(-1.0)),
            Err(CalibrationError::InvalidThreshold { value: -1.0 })
        );
        assert!(eyes.set_threshold(Some(f64::NAN)).is_err());
        eyes.set_threshold(Some(0.3)).unwrap();
        assert!(eyes.is_calibrated());
        assert!(!eyes.observe_ear(Some(0.29), false).eyes_open());
    }

    #[test]
    fn one_eye_only_is_unknown() {
        let clock = Arc::new(ManualClock::new());
        let mut eyes = detector(clock);
        eyes.set_threshold(Some(0.2)).unwrap();
        let report = eyes.observe_metrics(
            Some(EyeMetrics {
                left_ear: Some(0.3),
                right_ear: None,
                average_ear: None,
            }),
            false,
        );
        assert_eq!(report.state, DetectorState::Unknown);
        assert_eq!(eyes.get_stats().total, 0);
    }

    #[test]
    fn face_with_one_eye_reports_no_metrics() {
        let clock = Arc::new(ManualClock::new());
        let mut eyes = detector(clock);
        eyes.set_threshold(Some(0.2)).unwrap();
        let mut face = SyntheticSubject::new(3).face(true);
        face.right_eye = None;
        let report = eyes.observe(Some(&face), false);
        assert_eq!(report.state, DetectorState::Unknown);
        assert_eq!(report.metrics, None);
        assert_eq!(eyes.get_stats().total, 0);
    }

    #[test]
    fn reset_stats_then_get_stats_is_zeroed() {
        let clock = Arc::new(ManualClock::new());
        let mut eyes = detector(clock);
        eyes.set_threshold(Some(0.2)).unwrap();
        eyes.observe_ear(Some(0.3), false);
        eyes.observe_ear(Some(0.1), false);
        eyes.reset_stats();
        let stats = eyes.get_stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.positive_percent, 0.0);
        assert_eq!(stats.negative_percent, 0.0);
    }
}
