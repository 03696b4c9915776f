// Types module - Data structures for landmark and audio features
//
// Keypoints arrive from the external landmark models in frame pixel space.
// Metrics are the scalar features the classifiers consume.

use serde::{Deserialize, Serialize};

/// 2D point in frame pixel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point2 {
    pub x: f64,
    pub y: f64,
}

impl Point2 {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point2) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }

    pub fn midpoint(&self, other: &Point2) -> Point2 {
        Point2::new((self.x + other.x) / 2.0, (self.y + other.y) / 2.0)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameSize {
    pub width: u32,
    pub height: u32,
}

impl FrameSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// The 7 body landmarks the posture metrics need
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoseKeypoints {
    pub nose: Point2,
    pub left_ear: Point2,
    pub right_ear: Point2,
    pub left_shoulder: Point2,
    pub right_shoulder: Point2,
    pub left_hip: Point2,
    pub right_hip: Point2,
    /// Size of the frame the points were measured in
    pub frame: FrameSize,
}

impl PoseKeypoints {
    pub(crate) fn points(&self) -> [Point2; 7] {
        [
            self.nose,
            self.left_ear,
            self.right_ear,
            self.left_shoulder,
            self.right_shoulder,
            self.left_hip,
            self.right_hip,
        ]
    }
}

/// Six landmarks around one eye.
///
/// The corners span the eye horizontally; the upper/lower pairs are the two
/// vertical lid measurements (outer pair nearer `outer_corner`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EyeKeypoints {
    pub outer_corner: Point2,
    pub upper_outer: Point2,
    pub upper_inner: Point2,
    pub inner_corner: Point2,
    pub lower_inner: Point2,
    pub lower_outer: Point2,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FaceKeypoints {
    pub left_eye: Option<EyeKeypoints>,
    pub right_eye: Option<EyeKeypoints>,
}

/// Scalar posture features for one frame
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PostureMetrics {
    /// Shoulder line angle from horizontal, degrees
    pub shoulder_tilt: f64,
    /// Mean ear-minus-shoulder horizontal offset over frame width
    pub head_forward: f64,
    /// Shoulder-to-hip vertical distance over frame height
    pub shoulder_hip_height: f64,
    /// Nose angle relative to the shoulder midpoint, degrees
    pub head_tilt: f64,
}

impl PostureMetrics {
    pub fn is_finite(&self) -> bool {
        self.shoulder_tilt.is_finite()
            && self.head_forward.is_finite()
            && self.shoulder_hip_height.is_finite()
            && self.head_tilt.is_finite()
    }
}

/// Eye aspect ratios; extractors fill every field or return no metrics
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EyeMetrics {
    pub left_ear: Option<f64>,
    pub right_ear: Option<f64>,
    pub average_ear: Option<f64>,
}

/// Loudness and length of one captured utterance
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioFeatures {
    /// Seconds, rounded to hundredths
    pub duration_secs: f64,
    pub rms: f64,
    pub is_silent: bool,
}

/// Framing hint derived from apparent shoulder width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceWarning {
    MoveCloser,
    MoveBack,
}

impl DistanceWarning {
    pub fn message(&self) -> &'static str {
        match self {
            DistanceWarning::MoveCloser => "Move closer to camera",
            DistanceWarning::MoveBack => "Move back from camera",
        }
    }
}
