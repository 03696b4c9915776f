// Wellness Monitor Core - posture, eye and chant monitoring
// Self-calibrating detectors plus a guided breathing & chant scheduler

// Module declarations
pub mod analysis;
pub mod audio;
pub mod calibration;
pub mod config;
pub mod detectors;
pub mod engine;
pub mod error;
pub mod session;

// Re-exports for convenience
pub use config::AppConfig;
pub use detectors::{ChantDetector, EyeDetector, PostureDetector};
pub use engine::{Collaborators, FrameReport, MonitorSummary, WellnessMonitor};
pub use session::{ChantSession, ChantStats, SchedulerStatus, SessionScheduler};
