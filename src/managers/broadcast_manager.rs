// BroadcastChannelManager: Centralized tokio broadcast channel management
// Single Responsibility: Broadcast channel lifecycle and subscription

use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;

use crate::analysis::ClassificationResult;
use crate::engine::core::{EngineNotice, ExampleCountChanged};

/// Manages all tokio broadcast channels published by the engine
///
/// # Channel Types
/// - Predictions: one ClassificationResult per classification cycle
/// - Example counts: running per-class counts while recording / clearing
/// - Notices: readiness, capture permission and state changes
///
/// Channels are created up front so subscribers can attach before `start()`.
/// Publishing with no subscriber is not an error.
pub struct BroadcastChannelManager {
    predictions: broadcast::Sender<ClassificationResult>,
    example_counts: broadcast::Sender<ExampleCountChanged>,
    notices: broadcast::Sender<EngineNotice>,
}

impl BroadcastChannelManager {
    /// Create a manager with default buffer sizes
    ///
    /// # Notes
    /// - Predictions: 100 messages (a little over a second at 60 ticks/s)
    /// - Example counts: 100 messages (recording also runs once per tick)
    /// - Notices: 32 messages (lifecycle changes are rare)
    pub fn new() -> Self {
        Self::with_capacity(100, 100, 32)
    }

    pub fn with_capacity(predictions: usize, example_counts: usize, notices: usize) -> Self {
        let (predictions, _) = broadcast::channel(predictions.max(1));
        let (example_counts, _) = broadcast::channel(example_counts.max(1));
        let (notices, _) = broadcast::channel(notices.max(1));
        Self {
            predictions,
            example_counts,
            notices,
        }
    }

    // ========================================================================
    // PREDICTIONS CHANNEL
    // ========================================================================

    pub fn publish_prediction(&self, result: ClassificationResult) {
        let _ = self.predictions.send(result);
    }

    /// Subscribe to classification results
    ///
    /// Subscribers that fall behind by more than the buffer size observe
    /// `RecvError::Lagged` and skip ahead.
    pub fn subscribe_predictions(&self) -> broadcast::Receiver<ClassificationResult> {
        self.predictions.subscribe()
    }

    /// Classification results as a `Stream`
    pub fn prediction_stream(&self) -> BroadcastStream<ClassificationResult> {
        BroadcastStream::new(self.predictions.subscribe())
    }

    // ========================================================================
    // EXAMPLE COUNT CHANNEL
    // ========================================================================

    pub fn publish_example_count(&self, update: ExampleCountChanged) {
        let _ = self.example_counts.send(update);
    }

    pub fn subscribe_example_counts(&self) -> broadcast::Receiver<ExampleCountChanged> {
        self.example_counts.subscribe()
    }

    // ========================================================================
    // NOTICE CHANNEL
    // ========================================================================

    pub fn publish_notice(&self, notice: EngineNotice) {
        let _ = self.notices.send(notice);
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<EngineNotice> {
        self.notices.subscribe()
    }
}

impl Default for BroadcastChannelManager {
    fn default() -> Self {
        Self::new()
    }
}
