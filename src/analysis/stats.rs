// RunningStats - per-detector counts of classified samples

use std::time::Instant;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct RunningStats {
    total: u64,
    positive: u64,
    negative: u64,
    start_time: Instant,
}

impl RunningStats {
    pub fn new(start_time: Instant) -> Self {
        Self {
            total: 0,
            positive: 0,
            negative: 0,
            start_time,
        }
    }

    pub fn record(&mut self, positive: bool) {
        self.total += 1;
        if positive {
            self.positive += 1;
        } else {
            self.negative += 1;
        }
    }

    pub fn reset(&mut self, now: Instant) {
        *self = Self::new(now);
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn snapshot(&self, now: Instant, is_calibrated: bool) -> DetectorStats {
        let (positive_percent, negative_percent) = if self.total > 0 {
            let positive = self.positive as f64 / self.total as f64 * 100.0;
            (positive, 100.0 - positive)
        } else {
            (0.0, 0.0)
        };
        DetectorStats {
            elapsed_secs: now.saturating_duration_since(self.start_time).as_secs_f64(),
            total: self.total,
            positive_count: self.positive,
            negative_count: self.negative,
            positive_percent,
            negative_percent,
            is_calibrated,
        }
    }
}

/// Result of `get_stats()`; percentages are 0 when nothing was classified
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectorStats {
    pub elapsed_secs: f64,
    pub total: u64,
    pub positive_count: u64,
    pub negative_count: u64,
    pub positive_percent: f64,
    pub negative_percent: f64,
    pub is_calibrated: bool,
}
