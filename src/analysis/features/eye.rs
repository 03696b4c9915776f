// Eye features - eye aspect ratio from six lid/corner landmarks

use super::types::{EyeKeypoints, EyeMetrics, FaceKeypoints};
use super::FeatureExtractor;

/// Eye width below this many pixels is treated as a failed landmark fit
const MIN_EYE_WIDTH: f64 = 1e-6;

/// EAR = (|upper_outer - lower_outer| + |upper_inner - lower_inner|) / (2 |outer - inner|)
pub fn eye_aspect_ratio(eye: &EyeKeypoints) -> Option<f64> {
    let horizontal = eye.outer_corner.distance(&eye.inner_corner);
    if !horizontal.is_finite() || horizontal <= MIN_EYE_WIDTH {
        return None;
    }
    let vertical_outer = eye.upper_outer.distance(&eye.lower_outer);
    let vertical_inner = eye.upper_inner.distance(&eye.lower_inner);
    let ear = (vertical_outer + vertical_inner) / (2.0 * horizontal);
    ear.is_finite().then_some(ear)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EyeFeatureExtractor;

impl FeatureExtractor for EyeFeatureExtractor {
    type Input = FaceKeypoints;
    type Output = EyeMetrics;

    /// `None` unless both eyes produced a ratio.
    fn extract(&self, face: &FaceKeypoints) -> Option<EyeMetrics> {
        let left = eye_aspect_ratio(face.left_eye.as_ref()?)?;
        let right = eye_aspect_ratio(face.right_eye.as_ref()?)?;
        Some(EyeMetrics {
            left_ear: Some(left),
            right_ear: Some(right),
            average_ear: Some((left + right) / 2.0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::features::Point2;

    fn eye(opening: f64) -> EyeKeypoints {
        EyeKeypoints {
            outer_corner: Point2::new(0.0, 0.0),
            upper_outer: Point2::new(10.0, -opening / 2.0),
            upper_inner: Point2::new(20.0, -opening / 2.0),
            inner_corner: Point2::new(30.0, 0.0),
            lower_inner: Point2::new(20.0, opening / 2.0),
            lower_outer: Point2::new(10.0, opening / 2.0),
        }
    }

    #[test]
    fn ear_matches_formula() {
        let ear = eye_aspect_ratio(&eye(9.0)).unwrap();
        assert!((ear - 0.3).abs() < 1e-12);
    }

    #[test]
    fn zero_width_eye_has_no_ratio() {
        let mut e = eye(9.0);
        e.inner_corner = e.outer_corner;
        assert_eq!(eye_aspect_ratio(&e), None);
    }

    #[test]
    fn metrics_require_both_eyes() {
        let extractor = EyeFeatureExtractor;
        let both = extractor
            .extract(&FaceKeypoints {
                left_eye: Some(eye(9.0)),
                right_eye: Some(eye(6.0)),
            })
            .unwrap();
        assert!((both.average_ear.unwrap() - 0.25).abs() < 1e-12);

        let one = extractor.extract(&FaceKeypoints {
            left_eye: Some(eye(9.0)),
            right_eye: None,
        });
        assert_eq!(one, None);

        let mut flat = eye(6.0);
        flat.inner_corner = flat.outer_corner;
        let degenerate = extractor.extract(&FaceKeypoints {
            left_eye: Some(eye(9.0)),
            right_eye: Some(flat),
        });
        assert_eq!(degenerate, None);
    }

    #[test]
    fn no_eyes_yield_none() {
        assert_eq!(EyeFeatureExtractor.extract(&FaceKeypoints::default()), None);
    }
}
