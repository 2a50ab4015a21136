// Analysis module - feature pipeline and nearest-neighbour classification
//
// Pipeline for one frame:
//   FeatureExtractor → squash + L2 normalize → ExampleStore (recording)
//                                            → SimilarityBackend → KnnClassifier (classifying)
//
// Output: ClassificationResult published to callbacks, broadcast channels
// and the telemetry hub once per classification cycle.

pub mod examples;
pub mod features;
pub mod knn;
pub mod reference;
pub mod similarity;

pub use examples::{ClassExampleSet, ClassLabel, ExampleStore};
pub use features::{FeatureExtractor, FeatureVector, ProjectionExtractor};
pub use knn::{ClassConfidences, KnnClassifier, Prediction};
pub use reference::{ClassSpan, ReferenceSet};
pub use similarity::{BlockingPoolSimilarity, CpuSimilarity, PendingScores, SimilarityBackend};

/// Classification result for one tick
///
/// Sent to prediction subscribers and recorded by the telemetry hub.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassificationResult {
    /// Vote shares, or the insufficient-data marker
    pub prediction: Prediction,
    /// Tick counter value that produced this result
    pub tick: u64,
    /// Timestamp in milliseconds since engine creation
    pub timestamp_ms: u64,
}

impl ClassificationResult {
    /// Highest-voted class, if any examples took part
    pub fn top_class(&self) -> Option<usize> {
        self.prediction.confidences().and_then(|c| c.top_class())
    }
}
