// Few-Shot Classifier Core - online k-NN over pretrained image features
// Frames → feature vectors → per-class example sets → top-K majority vote

// Module declarations
pub mod analysis;
pub mod config;
pub mod engine;
pub mod error;
pub mod managers;
pub mod telemetry;

// Re-exports for convenience
pub use analysis::{ClassificationResult, Prediction};
pub use config::AppConfig;
pub use engine::{ClassSpec, ClassifierEngine, EngineController, EngineNotice, EngineState};
pub use error::{CaptureError, ClassifierError, ErrorCode};

/// Install the global tracing subscriber (also captures `log` records).
///
/// Output goes to stderr so stdout stays free for JSON reports. Safe to call
/// more than once; later calls are ignored.
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
