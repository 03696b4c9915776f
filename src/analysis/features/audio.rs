// Audio features - duration, RMS loudness and chant keyword matching

use super::types::AudioFeatures;
use super::FeatureExtractor;
use crate::audio::AudioBuffer;
use crate::config::ChantConfig;

/// Root-mean-square amplitude of the raw signed samples, in sample units.
///
/// Returns 0.0 for an empty buffer or an unsupported sample width.
pub fn rms(buffer: &AudioBuffer) -> f64 {
    let mut count = 0usize;
    let mut sum_squares = 0.0f64;
    for sample in buffer.samples() {
        let s = sample as f64;
        sum_squares += s * s;
        count += 1;
    }
    if count == 0 {
        return 0.0;
    }
    (sum_squares / count as f64).sqrt()
}

#[derive(Debug, Clone)]
pub struct AudioFeatureExtractor {
    silence_threshold: f64,
}

impl AudioFeatureExtractor {
    pub fn new(silence_threshold: f64) -> Self {
        Self { silence_threshold }
    }

    pub fn silence_threshold(&self) -> f64 {
        self.silence_threshold
    }
}

impl Default for AudioFeatureExtractor {
    fn default() -> Self {
        Self::new(ChantConfig::default().silence_threshold)
    }
}

impl FeatureExtractor for AudioFeatureExtractor {
    type Input = AudioBuffer;
    type Output = AudioFeatures;

    fn extract(&self, buffer: &AudioBuffer) -> Option<AudioFeatures> {
        let duration_secs = buffer.duration_secs()?;
        let rms = rms(buffer);
        Some(AudioFeatures {
            duration_secs: (duration_secs * 100.0).round() / 100.0,
            rms,
            is_silent: rms < self.silence_threshold,
        })
    }
}

/// Case-insensitive substring match against a keyword set.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    keywords: Vec<String>,
}

impl KeywordMatcher {
    pub fn new<I, S>(keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            keywords: keywords
                .into_iter()
                .map(|k| k.as_ref().trim().to_lowercase())
                .filter(|k| !k.is_empty())
                .collect(),
        }
    }

    /// First keyword contained in `text`, if any.
    pub fn find(&self, text: &str) -> Option<&str> {
        let lowered = text.to_lowercase();
        self.keywords
            .iter()
            .find(|k| lowered.contains(k.as_str()))
            .map(String::as_str)
    }

    pub fn matches(&self, text: &str) -> bool {
        self.find(text).is_some()
    }
}
