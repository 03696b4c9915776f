// Sensor error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Sensor error code constants
///
/// Error code range: 1001-1003
pub struct SensorErrorCodes {}

impl SensorErrorCodes {
    /// Camera or microphone could not be opened
    pub const UNAVAILABLE: i32 = 1001;

    /// A read from an opened device failed
    pub const READ_FAILED: i32 = 1002;

    /// The device is already held by another owner
    pub const BUSY: i32 = 1003;
}

/// Log a sensor error with structured context
///
/// Emits a single `error!` line carrying the error code, the device component
/// and the call site that observed the failure.
pub fn log_sensor_error(err: &SensorError, context: &str) {
    error!(
        "Sensor error in {}: code={}, component=Sensor, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Sensor-related errors
///
/// A `SensorError::Unavailable` is fatal to the orchestrator: the core cannot
/// recover a camera or microphone that failed to open. Frames without
/// landmarks are not errors; extractors report them as absent features.
#[derive(Debug, Clone, PartialEq)]
pub enum SensorError {
    /// Device failed to open
    Unavailable { device: String, reason: String },

    /// Device opened but a read failed
    ReadFailed { device: String, reason: String },

    /// A second handle was requested while the device is in use
    Busy { device: String },
}

impl ErrorCode for SensorError {
    fn code(&self) -> i32 {
        match self {
            SensorError::Unavailable { .. } => SensorErrorCodes::UNAVAILABLE,
            SensorError::ReadFailed { .. } => SensorErrorCodes::READ_FAILED,
            SensorError::Busy { .. } => SensorErrorCodes::BUSY,
        }
    }

    fn message(&self) -> String {
        match self {
            SensorError::Unavailable { device, reason } => {
                format!("{} unavailable: {}", device, reason)
            }
            SensorError::ReadFailed { device, reason } => {
                format!("{} read failed: {}", device, reason)
            }
            SensorError::Busy { device } => {
                format!("{} is already in use by another owner", device)
            }
        }
    }
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SensorError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SensorError {}

/// Convert from std::io::Error to SensorError
impl From<std::io::Error> for SensorError {
    fn from(err: std::io::Error) -> Self {
        SensorError::ReadFailed {
            device: "io".to_string(),
            reason: err.to_string(),
        }
    }
}
