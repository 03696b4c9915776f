// Calibration error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Calibration error code constants
///
/// Error code range: 2001-2003
pub struct CalibrationErrorCodes {}

impl CalibrationErrorCodes {
    /// Insufficient samples collected for calibration
    pub const INSUFFICIENT_SAMPLES: i32 = 2001;

    /// Calibration has not completed yet
    pub const NOT_CALIBRATED: i32 = 2002;

    /// A manually supplied threshold is not usable
    pub const INVALID_THRESHOLD: i32 = 2003;
}

/// Log a calibration error with structured context
///
/// This function logs calibration errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_calibration_error(err: &CalibrationError, context: &str) {
    error!(
        "Calibration error in {}: code={}, component=SignalClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Calibration-related errors
///
/// These errors cover explicit calibration operations (finalizing a window,
/// overriding a threshold). Per-frame observation never fails: missing
/// features degrade to an unknown state instead.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Insufficient samples collected for calibration
    InsufficientSamples { required: usize, collected: usize },

    /// Calibration not complete
    NotCalibrated,

    /// Manual threshold is not a finite positive number
    InvalidThreshold { value: f64 },
}

impl ErrorCode for CalibrationError {
    fn code(&self) -> i32 {
        match self {
            CalibrationError::InsufficientSamples { .. } => {
                CalibrationErrorCodes::INSUFFICIENT_SAMPLES
            }
            CalibrationError::NotCalibrated => CalibrationErrorCodes::NOT_CALIBRATED,
            CalibrationError::InvalidThreshold { .. } => CalibrationErrorCodes::INVALID_THRESHOLD,
        }
    }

    fn message(&self) -> String {
        match self {
            CalibrationError::InsufficientSamples {
                required,
                collected,
            } => {
                format!("Insufficient samples: need {}, got {}", required, collected)
            }
            CalibrationError::NotCalibrated => "Calibration not complete".to_string(),
            CalibrationError::InvalidThreshold { value } => {
                format!("Invalid threshold: {}", value)
            }
        }
    }
}

impl fmt::Display for CalibrationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CalibrationError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CalibrationError {}
