// Classifier error types and constants

use crate::error::{CaptureError, ErrorCode};
use log::error;
use std::fmt;

/// Classifier error code constants
///
/// Error code range: 2001-2011
pub struct ClassifierErrorCodes {}

impl ClassifierErrorCodes {
    /// Example recording requested with no class selected
    pub const NO_CLASS_SELECTED: i32 = 2001;

    /// Class index outside the configured class list
    pub const UNKNOWN_CLASS: i32 = 2002;

    /// Vector or frame length does not match the expected size
    pub const DIMENSION_MISMATCH: i32 = 2003;

    /// Feature vector has zero or non-finite norm
    pub const DEGENERATE_FEATURES: i32 = 2004;

    /// Feature extractor failed to initialize
    pub const EXTRACTOR_INIT: i32 = 2005;

    /// Operation requires a loaded extractor / running engine
    pub const NOT_READY: i32 = 2006;

    /// Reference row does not belong to any class range
    pub const ROW_OUT_OF_RANGE: i32 = 2007;

    /// Similarity backend dropped or failed a job
    pub const BACKEND_FAILURE: i32 = 2008;

    /// Engine has been shut down
    pub const SHUT_DOWN: i32 = 2009;

    /// Frame capture failed
    pub const CAPTURE: i32 = 2010;

    /// Configuration rejected by validation
    pub const INVALID_CONFIG: i32 = 2011;
}

/// Log a classifier error with structured context
///
/// Logs the numeric code, the component and the human-readable message.
pub fn log_classifier_error(err: &ClassifierError, context: &str) {
    error!(
        "Classifier error in {}: code={}, component=FewShotClassifier, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Classifier-related errors
///
/// These errors cover feature extraction, example storage, reference-set
/// lookups and engine lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifierError {
    /// record_example called while no class is selected
    NoClassSelected,

    /// Class index outside `0..class_count`
    UnknownClass { index: usize, class_count: usize },

    /// Length mismatch between a vector/frame and the configured size
    DimensionMismatch { expected: usize, actual: usize },

    /// Logits with zero or non-finite L2 norm cannot be normalized
    DegenerateFeatures { norm: f32 },

    /// Feature extractor initialization failed
    ExtractorInit { reason: String },

    /// Extractor or engine used before it finished loading
    NotReady,

    /// Reference row not covered by any class boundary
    RowOutOfRange { row: usize, rows: usize },

    /// Similarity job failed or its completion channel closed
    BackendFailure { reason: String },

    /// Engine was shut down; no further transitions are possible
    ShutDown,

    /// Frame source error surfaced through the classifier
    Capture(CaptureError),

    /// Configuration rejected by validation
    InvalidConfig { reason: String },
}

impl ErrorCode for ClassifierError {
    fn code(&self) -> i32 {
        match self {
            ClassifierError::NoClassSelected => ClassifierErrorCodes::NO_CLASS_SELECTED,
            ClassifierError::UnknownClass { .. } => ClassifierErrorCodes::UNKNOWN_CLASS,
            ClassifierError::DimensionMismatch { .. } => ClassifierErrorCodes::DIMENSION_MISMATCH,
            ClassifierError::DegenerateFeatures { .. } => {
                ClassifierErrorCodes::DEGENERATE_FEATURES
            }
            ClassifierError::ExtractorInit { .. } => ClassifierErrorCodes::EXTRACTOR_INIT,
            ClassifierError::NotReady => ClassifierErrorCodes::NOT_READY,
            ClassifierError::RowOutOfRange { .. } => ClassifierErrorCodes::ROW_OUT_OF_RANGE,
            ClassifierError::BackendFailure { .. } => ClassifierErrorCodes::BACKEND_FAILURE,
            ClassifierError::ShutDown => ClassifierErrorCodes::SHUT_DOWN,
            ClassifierError::Capture(_) => ClassifierErrorCodes::CAPTURE,
            ClassifierError::InvalidConfig { .. } => ClassifierErrorCodes::INVALID_CONFIG,
        }
    }

    fn message(&self) -> String {
        match self {
            ClassifierError::NoClassSelected => {
                "No class selected. Call start_recording() first.".to_string()
            }
            ClassifierError::UnknownClass { index, class_count } => {
                format!(
                    "Unknown class index {} (configured classes: {})",
                    index, class_count
                )
            }
            ClassifierError::DimensionMismatch { expected, actual } => {
                format!("Dimension mismatch: expected {}, got {}", expected, actual)
            }
            ClassifierError::DegenerateFeatures { norm } => {
                format!("Cannot normalize feature vector with norm {}", norm)
            }
            ClassifierError::ExtractorInit { reason } => {
                format!("Feature extractor failed to initialize: {}", reason)
            }
            ClassifierError::NotReady => "Classifier not ready".to_string(),
            ClassifierError::RowOutOfRange { row, rows } => {
                format!(
                    "Reference row {} is not owned by any class ({} rows)",
                    row, rows
                )
            }
            ClassifierError::BackendFailure { reason } => {
                format!("Similarity backend failure: {}", reason)
            }
            ClassifierError::ShutDown => "Classifier has been shut down".to_string(),
            ClassifierError::Capture(err) => err.message(),
            ClassifierError::InvalidConfig { reason } => {
                format!("Invalid configuration: {}", reason)
            }
        }
    }
}

impl fmt::Display for ClassifierError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ClassifierError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for ClassifierError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassifierError::Capture(err) => Some(err),
            _ => None,
        }
    }
}

impl From<CaptureError> for ClassifierError {
    fn from(err: CaptureError) -> Self {
        ClassifierError::Capture(err)
    }
}
