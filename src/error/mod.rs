// Error types for the wellness monitor
//
// This module defines custom error types for sensor, calibration and session
// operations, each carrying a numeric code so the orchestrator and the CLI can
// report failures consistently.

mod calibration;
mod sensor;
mod session;

pub use calibration::{log_calibration_error, CalibrationError, CalibrationErrorCodes};
pub use sensor::{log_sensor_error, SensorError, SensorErrorCodes};
pub use session::{log_session_error, SessionError, SessionErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent error handling across
/// the library and the CLI.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
