// Analysis module - feature extraction and calibrated classification
//
// Pipeline per modality:
//   keypoints / audio buffer -> FeatureExtractor -> scalar feature(s)
//     -> SignalClassifier (calibrating or classifying) -> DetectorState + stats
//
// The concrete rules for posture, eyes and chant loudness live with their
// detectors in `crate::detectors`.

pub mod classifier;
pub mod features;
pub mod stats;

pub use classifier::{
    ClassificationResult, DetectorState, SignalClassifier, ThresholdRule, UncalibratedPolicy,
};
pub use stats::{DetectorStats, RunningStats};
