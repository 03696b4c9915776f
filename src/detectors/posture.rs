// PostureDetector - pose keypoints to good/bad posture
//
// Baseline is the per-metric arithmetic mean over the first valid calibration
// frames (head tilt may opt into a circular mean).
// A frame is good only when every metric stays inside its tolerance; the
// violated metrics are reported so the UI can say which one failed.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::analysis::features::{
    DistanceWarning, FeatureExtractor, PoseKeypoints, PostureFeatureExtractor, PostureMetrics,
};
use crate::analysis::{
    ClassificationResult, DetectorState, DetectorStats, SignalClassifier, ThresholdRule,
};
use crate::calibration::{CalibrationInfo, CalibrationTrigger};
use crate::config::{HeadTiltAveraging, PostureConfig};
use crate::engine::backend::TimeSource;
use crate::error::CalibrationError;

/// Floor for the head-forward baseline so a zero mean does not fail every frame
pub const MIN_HEAD_FORWARD_BASELINE: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostureViolation {
    ShoulderTilt,
    HeadForward,
    Slouching,
    HeadTilt,
}

impl PostureViolation {
    pub fn description(&self) -> &'static str {
        match self {
            PostureViolation::ShoulderTilt => "Shoulders are tilted",
            PostureViolation::HeadForward => "Head is too far forward",
            PostureViolation::Slouching => "Slouching",
            PostureViolation::HeadTilt => "Head is tilted",
        }
    }
}

/// Limits derived from the baseline at the calibration transition
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PostureThreshold {
    pub max_shoulder_tilt: f64,
    pub max_head_forward: f64,
    pub min_shoulder_hip_height: f64,
    pub head_tilt_center: f64,
    pub head_tilt_tolerance: f64,
}

/// Signed difference `a - b` wrapped into [-180, 180) degrees
pub fn angle_difference(a: f64, b: f64) -> f64 {
    (a - b + 180.0).rem_euclid(360.0) - 180.0
}

fn circular_mean_degrees(angles: impl Iterator<Item = f64>) -> f64 {
    let (sin, cos) = angles.fold((0.0, 0.0), |(s, c), a| {
        let r = a.to_radians();
        (s + r.sin(), c + r.cos())
    });
    sin.atan2(cos).to_degrees()
}

#[derive(Debug, Clone)]
pub struct PostureRule {
    shoulder_tilt_tolerance: f64,
    head_forward_tolerance: f64,
    slouch_tolerance: f64,
    head_tilt_tolerance: f64,
    head_tilt_averaging: HeadTiltAveraging,
}

impl PostureRule {
    pub fn new(config: &PostureConfig) -> Self {
        Self {
            shoulder_tilt_tolerance: config.shoulder_tilt_tolerance,
            head_forward_tolerance: config.head_forward_tolerance,
            slouch_tolerance: config.slouch_tolerance,
            head_tilt_tolerance: config.head_tilt_tolerance,
            head_tilt_averaging: config.head_tilt_averaging,
        }
    }

    /// Deviation of a head tilt from the calibrated center, in degrees
    pub fn head_tilt_deviation(&self, head_tilt: f64, center: f64) -> f64 {
        match self.head_tilt_averaging {
            HeadTiltAveraging::Arithmetic => (head_tilt - center).abs(),
            HeadTiltAveraging::Circular => angle_difference(head_tilt, center).abs(),
        }
    }

    /// Every constraint the metrics break, in a fixed order.
    pub fn violations(
        &self,
        metrics: &PostureMetrics,
        threshold: &PostureThreshold,
    ) -> Vec<PostureViolation> {
        let mut violations = Vec::new();
        if metrics.shoulder_tilt > threshold.max_shoulder_tilt {
            violations.push(PostureViolation::ShoulderTilt);
        }
        if metrics.head_forward > threshold.max_head_forward {
            violations.push(PostureViolation::HeadForward);
        }
        if metrics.shoulder_hip_height < threshold.min_shoulder_hip_height {
            violations.push(PostureViolation::Slouching);
        }
        if self.head_tilt_deviation(metrics.head_tilt, threshold.head_tilt_center)
            > threshold.head_tilt_tolerance
        {
            violations.push(PostureViolation::HeadTilt);
        }
        violations
    }
}

impl ThresholdRule for PostureRule {
    type Sample = PostureMetrics;
    type Reference = PostureMetrics;
    type Threshold = PostureThreshold;

    fn reduce(&self, samples: &[PostureMetrics]) -> Option<PostureMetrics> {
        if samples.is_empty() {
            return None;
        }
        let n = samples.len() as f64;
        let mean = |f: fn(&PostureMetrics) -> f64| samples.iter().map(f).sum::<f64>() / n;
        Some(PostureMetrics {
            shoulder_tilt: mean(|m| m.shoulder_tilt),
            head_forward: mean(|m| m.head_forward).max(MIN_HEAD_FORWARD_BASELINE),
            shoulder_hip_height: mean(|m| m.shoulder_hip_height),
            head_tilt: match self.head_tilt_averaging {
                HeadTiltAveraging::Arithmetic => mean(|m| m.head_tilt),
                HeadTiltAveraging::Circular => {
                    circular_mean_degrees(samples.iter().map(|m| m.head_tilt))
                }
            },
        })
    }

    fn derive_threshold(&self, reference: Option<&PostureMetrics>) -> Option<PostureThreshold> {
        let base = reference?;
        Some(PostureThreshold {
            max_shoulder_tilt: base.shoulder_tilt * self.shoulder_tilt_tolerance,
            max_head_forward: base.head_forward.max(MIN_HEAD_FORWARD_BASELINE)
                * self.head_forward_tolerance,
            min_shoulder_hip_height: base.shoulder_hip_height * self.slouch_tolerance,
            head_tilt_center: base.head_tilt,
            head_tilt_tolerance: self.head_tilt_tolerance,
        })
    }

    fn is_positive(&self, sample: &PostureMetrics, threshold: &PostureThreshold) -> bool {
        self.violations(sample, threshold).is_empty()
    }
}

/// Uniform per-frame posture result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostureReport {
    pub state: DetectorState,
    pub warning: Option<DistanceWarning>,
    pub metrics: Option<PostureMetrics>,
    pub violations: Vec<PostureViolation>,
    pub is_calibrated: bool,
}

impl PostureReport {
    pub fn is_good(&self) -> bool {
        self.state.is_positive()
    }
}

pub struct PostureDetector {
    extractor: PostureFeatureExtractor,
    classifier: SignalClassifier<PostureRule>,
}

impl PostureDetector {
    pub fn new(config: &PostureConfig, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            extractor: PostureFeatureExtractor::new(config),
            classifier: SignalClassifier::new(
                "PostureDetector",
                PostureRule::new(config),
                CalibrationTrigger::SampleCount(config.auto_calibration_frames),
                config.uncalibrated_policy,
                clock,
            ),
        }
    }

    /// Observe one frame's pose.
    ///
    /// # Arguments
    /// * `pose` - keypoints, or `None` when no body was detected
    /// * `calibrating` - route valid metrics into the calibration window
    pub fn observe(&mut self, pose: Option<&PoseKeypoints>, calibrating: bool) -> PostureReport {
        let warning = pose.and_then(|p| self.extractor.distance_warning(p));
        let metrics = pose.and_then(|p| self.extractor.extract(p));
        let mut report = self.observe_metrics(metrics, calibrating);
        report.warning = warning;
        report
    }

    /// Observe pre-computed metrics (no distance warning available).
    pub fn observe_metrics(
        &mut self,
        metrics: Option<PostureMetrics>,
        calibrating: bool,
    ) -> PostureReport {
        let ClassificationResult {
            state,
            sample,
            is_calibrated,
        } = self.classifier.observe(metrics, calibrating);

        let violations = match (state, sample.as_ref(), self.classifier.threshold()) {
            (DetectorState::Negative, Some(m), Some(t)) => self.classifier.rule().violations(m, t),
            _ => Vec::new(),
        };

        PostureReport {
            state,
            warning: None,
            metrics: sample,
            violations,
            is_calibrated,
        }
    }

    pub fn finalize_calibration(&mut self) -> Result<(), CalibrationError> {
        self.classifier.finalize_calibration()
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

    pub fn get_calibration_info(&self) -> CalibrationInfo<PostureMetrics, PostureThreshold> {
        self.classifier.calibration_info()
    }

    pub fn is_calibrated(&self) -> bool {
        self.classifier.is_calibrated()
    }
}
