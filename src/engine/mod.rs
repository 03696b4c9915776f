//! Engine module housing the monitor core.
//!
//! `backend` holds the collaborator traits (camera, landmark models,
//! microphone, recognizer, speech) plus deterministic stand-ins; `core` is
//! the `WellnessMonitor` orchestration layer built on top of them.

pub mod backend;
pub mod core;

pub use backend::{SystemTimeSource, TimeSource};
pub use core::{Collaborators, FrameReport, MonitorSummary, SelfTestReport, WellnessMonitor};
