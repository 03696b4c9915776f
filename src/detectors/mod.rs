// Detectors - a feature extractor composed with a SignalClassifier
//
// - PostureDetector: 75-frame count window, AND-of-tolerances rule
// - EyeDetector: time window, EAR midpoint threshold
// - ChantDetector: preset loudness threshold plus keyword matching
//
// Each detector owns its calibration state, threshold and statistics.

pub mod chant;
pub mod eye;
pub mod posture;

pub use chant::{ChantDetector, ChantOutcome, ChantVerdict, LoudnessRule};
pub use eye::{EarRange, EyeDetector, EyeReport, EyeRule};
pub use posture::{
    PostureDetector, PostureReport, PostureRule, PostureThreshold, PostureViolation,
};
