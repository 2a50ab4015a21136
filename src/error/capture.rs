// Frame capture error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Capture error code constants
///
/// Error code range: 1001-1005
pub struct CaptureErrorCodes {}

impl CaptureErrorCodes {
    /// Access to the frame source was denied
    pub const PERMISSION_DENIED: i32 = 1001;

    /// Frame source device is missing or busy
    pub const DEVICE_UNAVAILABLE: i32 = 1002;

    /// Frame requested before the source was opened
    pub const NOT_OPEN: i32 = 1003;

    /// No frame has been produced yet
    pub const FRAME_UNAVAILABLE: i32 = 1004;

    /// Frame dimensions do not match its pixel buffer
    pub const INVALID_FRAME: i32 = 1005;
}

/// Log a capture error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
pub fn log_capture_error(err: &CaptureError, context: &str) {
    error!(
        "Capture error in {}: code={}, component=FrameSource, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Frame capture errors
///
/// These errors cover frame source acquisition and per-frame reads.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Camera (or other source) permission denied
    PermissionDenied { detail: String },

    /// Source device missing or busy
    DeviceUnavailable { reason: String },

    /// Source not opened yet (or already closed)
    NotOpen,

    /// Source is open but has not produced a frame yet
    FrameUnavailable,

    /// Frame dimensions and pixel buffer disagree
    InvalidFrame { expected: usize, actual: usize },
}

impl ErrorCode for CaptureError {
    fn code(&self) -> i32 {
        match self {
            CaptureError::PermissionDenied { .. } => CaptureErrorCodes::PERMISSION_DENIED,
            CaptureError::DeviceUnavailable { .. } => CaptureErrorCodes::DEVICE_UNAVAILABLE,
            CaptureError::NotOpen => CaptureErrorCodes::NOT_OPEN,
            CaptureError::FrameUnavailable => CaptureErrorCodes::FRAME_UNAVAILABLE,
            CaptureError::InvalidFrame { .. } => CaptureErrorCodes::INVALID_FRAME,
        }
    }

    fn message(&self) -> String {
        match self {
            CaptureError::PermissionDenied { detail } => {
                format!("Capture permission denied: {}", detail)
            }
            CaptureError::DeviceUnavailable { reason } => {
                format!("Capture device unavailable: {}", reason)
            }
            CaptureError::NotOpen => "Frame source not open. Call start() first.".to_string(),
            CaptureError::FrameUnavailable => "No frame available yet".to_string(),
            CaptureError::InvalidFrame { expected, actual } => {
                format!(
                    "Invalid frame: expected {} pixel values, got {}",
                    expected, actual
                )
            }
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CaptureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CaptureError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_error_codes() {
        assert_eq!(
            CaptureError::PermissionDenied {
                detail: "test".to_string()
            }
            .code(),
            1001
        );
        assert_eq!(
            CaptureError::DeviceUnavailable {
                reason: "test".to_string()
            }
            .code(),
            1002
        );
        assert_eq!(CaptureError::NotOpen.code(), 1003);
        assert_eq!(CaptureError::FrameUnavailable.code(), 1004);
        assert_eq!(
            CaptureError::InvalidFrame {
                expected: 3,
                actual: 2
            }
            .code(),
            1005
        );
    }

    #[test]
    fn test_capture_error_messages() {
        let err = CaptureError::PermissionDenied {
            detail: "user dismissed prompt".to_string(),
        };
        assert_eq!(
            err.message(),
            "Capture permission denied: user dismissed prompt"
        );

        let err = CaptureError::InvalidFrame {
            expected: 12,
            actual: 9,
        };
        assert!(err.message().contains("expected 12"));
        assert!(err.message().contains("got 9"));
    }

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::NotOpen;
        let display = format!("{}", err);
        assert!(display.contains("CaptureError"));
        assert!(display.contains("1003"));
    }
}
