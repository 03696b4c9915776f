// Session records and aggregate chant statistics

use std::time::{Duration, Instant};

use serde::Serialize;

use crate::detectors::ChantVerdict;

/// One executed breathing + chant session
///
/// Fully populated when the runner returns; folded into ChantStats and then
/// only kept by whoever subscribed to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub struct ChantSession {
    pub sequence_number: u64,
    pub prompt_script_id: String,
    pub detected: bool,
    /// Seconds of captured chant audio
    pub duration: f64,
    pub started_at: Instant,
    pub ended_at: Instant,
    /// Fired by `force_session()` rather than the interval timer
    pub forced: bool,
    pub verdict: ChantVerdict,
}

impl ChantSession {
    /// Wall time spent in the whole session, prompts included
    pub fn elapsed(&self) -> Duration {
        self.ended_at.saturating_duration_since(self.started_at)
    }
}

/// Aggregate counters owned by the scheduler
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChantStats {
    pub total_sessions: u64,
    pub successful_detections: u64,
    /// Percent of sessions with a detected chant
    pub success_rate: f64,
    /// Captured seconds over all sessions, detected or not
    pub total_chant_duration: f64,
    /// `total_chant_duration / successful_detections`, 0 when none succeeded
    pub average_chant_duration: f64,
}

impl ChantStats {
    pub fn record(&mut self, detected: bool, duration: f64) {
        self.total_sessions += 1;
        if detected {
            self.successful_detections += 1;
        }
        self.total_chant_duration += duration;

        self.success_rate =
            self.successful_detections as f64 / self.total_sessions as f64 * 100.0;
        self.average_chant_duration = if self.successful_detections > 0 {
            self.total_chant_duration / self.successful_detections as f64
        } else {
            0.0
        };
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_rate_over_mixed_results() {
        let mut stats = ChantStats::default();
        stats.record(true, 4.0);
        stats.record(false, 2.0);
        stats.record(true, 6.0);
        assert_eq!(stats.total_sessions, 3);
        assert_eq!(stats.successful_detections, 2);
        assert!((stats.success_rate - 66.7).abs() < 0.1);
        assert_eq!(stats.total_chant_duration, 12.0);
        assert_eq!(stats.average_chant_duration, 6.0);
    }

    #[test]
    fn no_successes_means_zero_average() {
        let mut stats = ChantStats::default();
        stats.record(false, 3.5);
        assert_eq!(stats.success_rate, 0.0);
        assert_eq!(stats.average_chant_duration, 0.0);
        assert_eq!(stats.total_chant_duration, 3.5);
        stats.reset();
        assert_eq!(stats, ChantStats::default());
    }
}
