// Feature extraction - keypoints and audio buffers to scalar features
//
// Module organization:
// - types: Keypoint and metric structures
// - posture: shoulder tilt, head forward, shoulder-hip height, head tilt
// - eye: eye aspect ratio (EAR) per eye and averaged
// - audio: duration, RMS loudness, keyword matching
//
// Every extractor is pure and returns `None` when the required landmarks or
// samples are absent or produce non-finite values.

mod audio;
mod eye;
mod posture;
mod types;

pub use audio::{rms, AudioFeatureExtractor, KeywordMatcher};
pub use eye::{eye_aspect_ratio, EyeFeatureExtractor};
pub use posture::PostureFeatureExtractor;
pub use types::{
    AudioFeatures, DistanceWarning, EyeKeypoints, EyeMetrics, FaceKeypoints, FrameSize, Point2,
    PoseKeypoints, PostureMetrics,
};

/// Capability shared by all extractors: one fixed-format input to an
/// optional feature value.
pub trait FeatureExtractor {
    type Input;
    type Output;

    fn extract(&self, input: &Self::Input) -> Option<Self::Output>;
}
