// Error types for the few-shot classifier
//
// This module defines custom error types for frame capture and classification,
// providing structured error handling with stable numeric codes.

mod capture;
mod classifier;

pub use capture::{log_capture_error, CaptureError, CaptureErrorCodes};
pub use classifier::{log_classifier_error, ClassifierError, ClassifierErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, so callers and telemetry can handle them
/// uniformly.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
