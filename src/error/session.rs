// Session error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Session error code constants
///
/// Error code range: 3001-3008
pub struct SessionErrorCodes {}

impl SessionErrorCodes {
    /// Unexpected failure inside one of the session steps
    pub const FAULT: i32 = 3001;

    /// Speech recognition service failed or could not be reached
    pub const TRANSCRIPTION_UNAVAILABLE: i32 = 3002;

    /// Scheduler is not running (or is paused)
    pub const NOT_RUNNING: i32 = 3003;

    /// Scheduler was already started
    pub const ALREADY_STARTED: i32 = 3004;

    /// Scheduler reached its terminal state
    pub const STOPPED: i32 = 3005;

    /// Interval outside the configured bounds
    pub const INVALID_INTERVAL: i32 = 3006;

    /// Shared session state lock was poisoned
    pub const LOCK_POISONED: i32 = 3007;

    /// Stepped scheduling requested on a wall-clock time source
    pub const REAL_TIME_CLOCK: i32 = 3008;
}

/// Log a session error with structured context
pub fn log_session_error(err: &SessionError, context: &str) {
    error!(
        "Session error in {}: code={}, component=SessionScheduler, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Session-related errors
///
/// `Fault` is caught at the session boundary by the scheduler: it is logged,
/// it does not advance the last session time and it never stops the
/// scheduler worker. `TranscriptionUnavailable` never reaches callers; the
/// chant detector degrades it to the configured fallback policy.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionError {
    /// A step failed unexpectedly
    Fault { step: String, reason: String },

    /// Transcription service error
    TranscriptionUnavailable { reason: String },

    /// Operation requires a running, unpaused scheduler
    NotRunning,

    /// start() called twice
    AlreadyStarted,

    /// Scheduler is stopped and cannot be restarted
    Stopped,

    /// Interval outside [min, max] seconds
    InvalidInterval { secs: u64, min: u64, max: u64 },

    /// Mutex/RwLock was poisoned
    LockPoisoned { component: String },

    /// Stepped scheduling runs sessions inline and needs a simulated clock
    RealTimeClock,
}

impl ErrorCode for SessionError {
    fn code(&self) -> i32 {
        match self {
            SessionError::Fault { .. } => SessionErrorCodes::FAULT,
            SessionError::TranscriptionUnavailable { .. } => {
                SessionErrorCodes::TRANSCRIPTION_UNAVAILABLE
            }
            SessionError::NotRunning => SessionErrorCodes::NOT_RUNNING,
            SessionError::AlreadyStarted => SessionErrorCodes::ALREADY_STARTED,
            SessionError::Stopped => SessionErrorCodes::STOPPED,
            SessionError::InvalidInterval { .. } => SessionErrorCodes::INVALID_INTERVAL,
            SessionError::LockPoisoned { .. } => SessionErrorCodes::LOCK_POISONED,
            SessionError::RealTimeClock => SessionErrorCodes::REAL_TIME_CLOCK,
        }
    }

    fn message(&self) -> String {
        match self {
            SessionError::Fault { step, reason } => {
                format!("Session step '{}' failed: {}", step, reason)
            }
            SessionError::TranscriptionUnavailable { reason } => {
                format!("Transcription unavailable: {}", reason)
            }
            SessionError::NotRunning => {
                "Scheduler not running. Call start() or resume() first.".to_string()
            }
            SessionError::AlreadyStarted => "Scheduler already started".to_string(),
            SessionError::Stopped => "Scheduler stopped".to_string(),
            SessionError::InvalidInterval { secs, min, max } => {
                format!(
                    "Interval must be between {} and {} seconds (got {})",
                    min, max, secs
                )
            }
            SessionError::LockPoisoned { component } => {
                format!("Lock poisoned for component: {}", component)
            }
            SessionError::RealTimeClock => {
                "Stepped breathing needs a simulated clock. Use start() instead.".to_string()
            }
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SessionError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SessionError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_error_codes() {
        assert_eq!(
            SessionError::Fault {
                step: "listen".to_string(),
                reason: "mic".to_string()
            }
            .code(),
            SessionErrorCodes::FAULT
        );
        assert_eq!(SessionError::NotRunning.code(), 3003);
        assert_eq!(SessionError::RealTimeClock.code(), 3008);
        assert_eq!(SessionError::Stopped.code(), SessionErrorCodes::STOPPED);
        assert_eq!(
            SessionError::InvalidInterval {
                secs: 5,
                min: 10,
                max: 300
            }
            .code(),
            SessionErrorCodes::INVALID_INTERVAL
        );
    }

    #[test]
    fn test_invalid_interval_message() {
        let err = SessionError::InvalidInterval {
            secs: 5,
            min: 10,
            max: 300,
        };
        assert_eq!(
            err.message(),
            "Interval must be between 10 and 300 seconds (got 5)"
        );
    }
}
