// Posture features - geometry of shoulders, ears, nose and hips

use super::types::{DistanceWarning, PoseKeypoints, PostureMetrics};
use super::FeatureExtractor;
use crate::config::PostureConfig;

/// Guards the atan2 arguments against an exactly-zero denominator
const ANGLE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone)]
pub struct PostureFeatureExtractor {
    move_closer_below: f64,
    move_back_above: f64,
}

impl PostureFeatureExtractor {
    pub fn new(config: &PostureConfig) -> Self {
        Self {
            move_closer_below: config.move_closer_below,
            move_back_above: config.move_back_above,
        }
    }

    /// Shoulder width as a fraction of frame width decides the hint.
    pub fn distance_warning(&self, pose: &PoseKeypoints) -> Option<DistanceWarning> {
        if pose.frame.width == 0 {
            return None;
        }
        let width = pose.frame.width as f64;
        let shoulder_width = (pose.left_shoulder.x - pose.right_shoulder.x).abs();
        if shoulder_width < width * self.move_closer_below {
            Some(DistanceWarning::MoveCloser)
        } else if shoulder_width > width * self.move_back_above {
            Some(DistanceWarning::MoveBack)
        } else {
            None
        }
    }
}

impl Default for PostureFeatureExtractor {
    fn default() -> Self {
        Self::new(&PostureConfig::default())
    }
}

impl FeatureExtractor for PostureFeatureExtractor {
    type Input = PoseKeypoints;
    type Output = PostureMetrics;

    fn extract(&self, pose: &PoseKeypoints) -> Option<PostureMetrics> {
        if pose.frame.width == 0 || pose.frame.height == 0 {
            return None;
        }
        if !pose.points().iter().all(|p| p.is_finite()) {
            return None;
        }
        let w = pose.frame.width as f64;
        let h = pose.frame.height as f64;

        let (ls, rs) = (pose.left_shoulder, pose.right_shoulder);
        let shoulder_tilt = (ls.y - rs.y)
            .abs()
            .atan2((ls.x - rs.x).abs() + ANGLE_EPSILON)
            .to_degrees();

        let head_forward = ((pose.left_ear.x - ls.x) + (pose.right_ear.x - rs.x)) / 2.0 / w;

        let mid_shoulder = ls.midpoint(&rs);
        let mid_hip = pose.left_hip.midpoint(&pose.right_hip);
        let shoulder_hip_height = (mid_hip.y - mid_shoulder.y) / h;

        let head_tilt = (pose.nose.x - mid_shoulder.x)
            .atan2(pose.nose.y - mid_shoulder.y + ANGLE_EPSILON)
            .to_degrees();

        let metrics = PostureMetrics {
            shoulder_tilt,
            head_forward,
            shoulder_hip_height,
            head_tilt,
        };
        metrics.is_finite().then_some(metrics)
    }
}
