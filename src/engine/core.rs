//! ClassifierEngine: the single control loop of the few-shot classifier.
//!
//! The engine owns every piece of mutable state (example store, cached
//! reference set, selected class, tick counters) and is driven one tick at a
//! time. UI-side requests arrive as [`EngineCommand`]s through an
//! [`EngineController`] and are applied between ticks, so nothing here is
//! shared or locked.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::analysis::{
    BlockingPoolSimilarity, ClassLabel, ClassificationResult, CpuSimilarity, ExampleStore,
    FeatureExtractor, FeatureVector, KnnClassifier, Prediction, ProjectionExtractor,
    SimilarityBackend,
};
use crate::config::AppConfig;
use crate::engine::backend::{Frame, FrameSource, SyntheticFrameSource, SystemTimeSource, TimeSource};
use crate::engine::readback::{self, ReadbackPlan, ReadbackStrategy};
use crate::engine::state::EngineState;
use crate::error::{log_capture_error, log_classifier_error, ClassifierError, ErrorCode};
use crate::managers::BroadcastChannelManager;
use crate::telemetry::{self, LifecyclePhase};

/// Invoked with a class's running example count after every change
pub type CountCallback = Box<dyn FnMut(usize) + Send>;

/// Invoked once per classification cycle
pub type PredictionCallback = Box<dyn FnMut(&Prediction) + Send>;

/// One configured class and its optional count callback
pub struct ClassSpec {
    pub name: String,
    on_count: Option<CountCallback>,
}

impl ClassSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            on_count: None,
        }
    }

    pub fn on_count(mut self, callback: impl FnMut(usize) + Send + 'static) -> Self {
        self.on_count = Some(Box::new(callback));
        self
    }
}

/// Per-class count update published on the example-count channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExampleCountChanged {
    pub class: usize,
    pub count: usize,
}

/// Observable engine notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "notice", rename_all = "snake_case")]
pub enum EngineNotice {
    /// Extractor loaded and warmed up
    Ready,
    /// Result of opening the frame source
    CapturePermission {
        granted: bool,
        detail: Option<String>,
    },
    StateChanged {
        from: EngineState,
        to: EngineState,
    },
}

/// Requests applied by the loop between ticks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    StartRecording(usize),
    StopRecording,
    ClearClass(usize),
    SetVisible(bool),
    /// Return to Idle and leave the loop; examples are kept
    Stop,
    /// Release everything and leave the loop
    Shutdown,
}

/// Cloneable handle for sending commands to a running engine
#[derive(Clone)]
pub struct EngineController {
    tx: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineController {
    pub fn send(&self, command: EngineCommand) -> Result<(), ClassifierError> {
        self.tx
            .send(command)
            .map_err(|_| ClassifierError::ShutDown)
    }

    pub fn start_recording(&self, class: usize) -> Result<(), ClassifierError> {
        self.send(EngineCommand::StartRecording(class))
    }

    pub fn stop_recording(&self) -> Result<(), ClassifierError> {
        self.send(EngineCommand::StopRecording)
    }

    pub fn clear_class(&self, class: usize) -> Result<(), ClassifierError> {
        self.send(EngineCommand::ClearClass(class))
    }

    pub fn set_visible(&self, visible: bool) -> Result<(), ClassifierError> {
        self.send(EngineCommand::SetVisible(visible))
    }

    pub fn stop(&self) -> Result<(), ClassifierError> {
        self.send(EngineCommand::Stop)
    }

    pub fn shutdown(&self) -> Result<(), ClassifierError> {
        self.send(EngineCommand::Shutdown)
    }
}

/// What one tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Engine not running (idle, paused, shut down)
    Inactive,
    /// Running, but no examples to classify against
    NoExamples,
    Recorded {
        class: usize,
        count: usize,
    },
    Classified {
        result: ClassificationResult,
    },
    /// Throttled readback: the scores were not ready after `waited`, so the
    /// job's result is discarded and no prediction is emitted
    ReadbackMissed {
        waited: Duration,
    },
}

/// Builder wiring collaborators into a [`ClassifierEngine`]
///
/// Anything not supplied falls back to the configuration's defaults:
/// projection extractor, synthetic frame source, similarity backend per
/// `scheduler.offload_similarity`, readback strategy per `scheduler.readback`.
pub struct EngineBuilder {
    config: AppConfig,
    classes: Option<Vec<ClassSpec>>,
    extractor: Option<Box<dyn FeatureExtractor>>,
    source: Option<Box<dyn FrameSource>>,
    similarity: Option<Arc<dyn SimilarityBackend>>,
    readback: Option<Box<dyn ReadbackStrategy>>,
    time_source: Option<Arc<dyn TimeSource>>,
    on_prediction: Option<PredictionCallback>,
}

impl EngineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            classes: None,
            extractor: None,
            source: None,
            similarity: None,
            readback: None,
            time_source: None,
            on_prediction: None,
        }
    }

    /// Replace the configured class names with specs carrying callbacks
    pub fn classes(mut self, classes: Vec<ClassSpec>) -> Self {
        self.classes = Some(classes);
        self
    }

    pub fn extractor(mut self, extractor: impl FeatureExtractor + 'static) -> Self {
        self.extractor = Some(Box::new(extractor));
        self
    }

    pub fn frame_source(mut self, source: impl FrameSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn similarity(mut self, backend: Arc<dyn SimilarityBackend>) -> Self {
        self.similarity = Some(backend);
        self
    }

    pub fn readback(mut self, strategy: impl ReadbackStrategy + 'static) -> Self {
        self.readback = Some(Box::new(strategy));
        self
    }

    pub fn time_source(mut self, time_source: Arc<dyn TimeSource>) -> Self {
        self.time_source = Some(time_source);
        self
    }

    pub fn on_prediction(mut self, callback: impl FnMut(&Prediction) + Send + 'static) -> Self {
        self.on_prediction = Some(Box::new(callback));
        self
    }

    pub fn build(self) -> Result<ClassifierEngine, ClassifierError> {
        let mut config = self.config;
        let classes = match self.classes {
            Some(classes) => {
                config.classes = classes.iter().map(|spec| spec.name.clone()).collect();
                classes
            }
            None => config.classes.iter().map(ClassSpec::new).collect(),
        };
        config.validate()?;

        let extractor = self
            .extractor
            .unwrap_or_else(|| Box::new(ProjectionExtractor::new(&config.extractor)));
        let source = self.source.unwrap_or_else(|| {
            Box::new(SyntheticFrameSource::new(
                &config.extractor,
                config.extractor.seed,
            ))
        });
        let similarity = self.similarity.unwrap_or_else(|| {
            if config.scheduler.offload_similarity {
                Arc::new(BlockingPoolSimilarity)
            } else {
                Arc::new(CpuSimilarity)
            }
        });
        let readback = self
            .readback
            .unwrap_or_else(|| readback::from_config(&config.scheduler));
        let time_source = self
            .time_source
            .unwrap_or_else(|| Arc::new(SystemTimeSource::default()));

        let names: Vec<&str> = classes.iter().map(|spec| spec.name.as_str()).collect();
        let store = ExampleStore::new(&names, extractor.output_len());
        let count_callbacks = classes.into_iter().map(|spec| spec.on_count).collect();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let start_instant = time_source.now();

        Ok(ClassifierEngine {
            knn: KnnClassifier::new(config.classifier.top_k),
            config,
            state: EngineState::Idle,
            store,
            extractor,
            source,
            similarity,
            readback,
            time_source,
            broadcasts: BroadcastChannelManager::new(),
            count_callbacks,
            on_prediction: self.on_prediction,
            command_tx,
            command_rx,
            tick_count: 0,
            classify_ticks: 0,
            start_instant,
        })
    }
}

/// Online few-shot classifier: recording, voting and the tick loop
pub struct ClassifierEngine {
    config: AppConfig,
    state: EngineState,
    store: ExampleStore,
    knn: KnnClassifier,
    extractor: Box<dyn FeatureExtractor>,
    source: Box<dyn FrameSource>,
    similarity: Arc<dyn SimilarityBackend>,
    readback: Box<dyn ReadbackStrategy>,
    time_source: Arc<dyn TimeSource>,
    broadcasts: BroadcastChannelManager,
    count_callbacks: Vec<Option<CountCallback>>,
    on_prediction: Option<PredictionCallback>,
    command_tx: mpsc::UnboundedSender<EngineCommand>,
    command_rx: mpsc::UnboundedReceiver<EngineCommand>,
    tick_count: u64,
    classify_ticks: u64,
    start_instant: Instant,
}

impl ClassifierEngine {
    /// Engine with every collaborator taken from the configuration
    pub fn new(config: AppConfig) -> Result<Self, ClassifierError> {
        EngineBuilder::new(config).build()
    }

    pub fn builder(config: AppConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    // ========================================================================
    // ACCESSORS
    // ========================================================================

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn labels(&self) -> &[ClassLabel] {
        self.store.labels()
    }

    pub fn counts(&self) -> Vec<usize> {
        self.store.counts()
    }

    pub fn example_count(&self, class: usize) -> Result<usize, ClassifierError> {
        self.store.count(class)
    }

    pub fn total_examples(&self) -> usize {
        self.store.total_examples()
    }

    pub fn store(&self) -> &ExampleStore {
        &self.store
    }

    pub fn broadcasts(&self) -> &BroadcastChannelManager {
        &self.broadcasts
    }

    pub fn controller(&self) -> EngineController {
        EngineController {
            tx: self.command_tx.clone(),
        }
    }

    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    pub fn last_readback_latency(&self) -> Option<Duration> {
        self.readback.last_latency()
    }

    // ========================================================================
    // LIFECYCLE
    // ========================================================================

    /// Open the frame source, load and warm up the extractor, enter Ready.
    ///
    /// A no-op when already started. On a denied frame source a single
    /// `CapturePermission { granted: false }` notice is published and the
    /// engine stays Idle.
    pub fn start(&mut self) -> Result<(), ClassifierError> {
        if self.state == EngineState::Shutdown {
            return Err(ClassifierError::ShutDown);
        }
        if self.state.is_active() {
            return Ok(());
        }

        if let Err(err) = self.source.open() {
            log_capture_error(&err, "start");
            telemetry::hub().record_phase(LifecyclePhase::CaptureDenied);
            self.broadcasts
                .publish_notice(EngineNotice::CapturePermission {
                    granted: false,
                    detail: Some(err.message()),
                });
            return Err(err.into());
        }
        telemetry::hub().record_phase(LifecyclePhase::CaptureGranted);
        self.broadcasts
            .publish_notice(EngineNotice::CapturePermission {
                granted: true,
                detail: None,
            });

        self.set_state(EngineState::Loading);
        telemetry::hub().record_phase(LifecyclePhase::Loading);

        if let Err(err) = self.load_extractor() {
            log_classifier_error(&err, "start");
            telemetry::hub().record_error(&err, "extractor init");
            self.source.close();
            self.set_state(EngineState::Idle);
            return Err(err);
        }

        self.set_state(EngineState::Ready);
        telemetry::hub().record_phase(LifecyclePhase::Ready);
        self.broadcasts.publish_notice(EngineNotice::Ready);
        log::info!(
            "[ClassifierEngine] Ready with {} classes, K={}",
            self.store.class_count(),
            self.knn.top_k()
        );
        Ok(())
    }

    /// Return to Idle, closing the frame source. Examples are kept.
    pub fn stop(&mut self) {
        if matches!(self.state, EngineState::Idle | EngineState::Shutdown) {
            return;
        }
        self.source.close();
        self.set_state(EngineState::Idle);
        telemetry::hub().record_phase(LifecyclePhase::Stopped);
    }

    /// Release the frame source and every stored example. Terminal.
    pub fn shutdown(&mut self) {
        if self.state == EngineState::Shutdown {
            return;
        }
        self.source.close();
        self.store.clear_all();
        self.set_state(EngineState::Shutdown);
        telemetry::hub().record_phase(LifecyclePhase::Shutdown);
    }

    /// Select the class that recording ticks append to
    pub fn start_recording(&mut self, class: usize) -> Result<(), ClassifierError> {
        self.ensure_not_shut_down()?;
        self.store.label(class)?;
        if !self.state.is_active() || self.state == EngineState::Loading {
            return Err(ClassifierError::NotReady);
        }
        self.set_state(self.state.recording(class));
        Ok(())
    }

    /// Release the recording input; a no-op when not recording
    pub fn stop_recording(&mut self) {
        self.set_state(self.state.not_recording());
    }

    /// Pause on visibility loss, resume the prior state on regain
    pub fn set_visible(&mut self, visible: bool) {
        let next = if visible {
            self.state.visible()
        } else {
            self.state.hidden()
        };
        if next == self.state {
            return;
        }
        self.set_state(next);
        telemetry::hub().record_phase(if visible {
            LifecyclePhase::Resumed
        } else {
            LifecyclePhase::Paused
        });
    }

    // ========================================================================
    // EXAMPLES
    // ========================================================================

    /// Capture the current frame and store it as an example of `class`
    ///
    /// # Returns
    /// The class's new example count.
    pub fn record_example(&mut self, class: usize) -> Result<usize, ClassifierError> {
        self.ensure_running()?;
        self.store.label(class)?;

        let frame = self.source.next_frame()?;
        let vector = self.features_for(&frame)?;
        let count = self.store.push(class, vector)?;

        self.notify_count(class, count);
        telemetry::hub().record_example(class, count);
        Ok(count)
    }

    /// Record for the currently selected class
    ///
    /// # Errors
    /// `NoClassSelected` when no class is being recorded; nothing is captured.
    pub fn record_selected(&mut self) -> Result<usize, ClassifierError> {
        let class = self
            .state
            .recording_class()
            .ok_or(ClassifierError::NoClassSelected)?;
        self.record_example(class)
    }

    /// Discard every example of `class`; a no-op for an empty class
    pub fn clear_class(&mut self, class: usize) -> Result<(), ClassifierError> {
        self.ensure_not_shut_down()?;
        let removed = self.store.clear(class)?;
        if removed > 0 {
            log::info!(
                "[ClassifierEngine] Cleared {} examples from class {}",
                removed,
                class
            );
            self.notify_count(class, 0);
            telemetry::hub().record_clear(class, removed);
        }
        Ok(())
    }

    // ========================================================================
    // CLASSIFICATION
    // ========================================================================

    /// Classify the current frame, waiting for true completion
    pub async fn classify(&mut self) -> Result<ClassificationResult, ClassifierError> {
        self.ensure_running()?;
        self.classify_with(ReadbackPlan::Await)
            .await?
            .ok_or_else(|| ClassifierError::BackendFailure {
                reason: "awaited readback produced no scores".to_string(),
            })
    }

    /// Run one scheduling tick
    pub async fn tick(&mut self) -> Result<TickOutcome, ClassifierError> {
        match self.state {
            EngineState::Recording { class } => {
                self.tick_count += 1;
                let count = self.record_example(class)?;
                Ok(TickOutcome::Recorded { class, count })
            }
            EngineState::Ready => {
                self.tick_count += 1;
                if self.store.total_examples() == 0 {
                    return Ok(TickOutcome::NoExamples);
                }
                let plan = self.readback.plan(self.classify_ticks);
                self.classify_ticks += 1;
                match self.classify_with(plan).await? {
                    Some(result) => Ok(TickOutcome::Classified { result }),
                    None => Ok(TickOutcome::ReadbackMissed {
                        waited: match plan {
                            ReadbackPlan::Throttle(wait) => wait,
                            _ => Duration::ZERO,
                        },
                    }),
                }
            }
            _ => Ok(TickOutcome::Inactive),
        }
    }

    /// Start (if needed) and drive ticks until a Stop or Shutdown command.
    ///
    /// Commands are applied between ticks. Each tick is followed by one frame
    /// interval; a command arriving during that wait is applied and the next
    /// tick runs at once.
    ///
    /// Dropping this future mid-tick abandons the in-flight similarity job:
    /// the job runs to completion and its result is discarded.
    pub async fn run(&mut self) -> Result<(), ClassifierError> {
        self.start()?;
        let frame_interval = Duration::from_millis(self.config.scheduler.frame_interval_ms);
        tracing::info!("[ClassifierEngine] Tick loop started");

        loop {
            while let Ok(command) = self.command_rx.try_recv() {
                self.apply(command);
            }
            if !self.state.is_active() {
                break;
            }

            match self.tick().await {
                Ok(outcome) => {
                    tracing::trace!("[ClassifierEngine] tick {}: {:?}", self.tick_count, outcome);
                }
                Err(err) => {
                    log_classifier_error(&err, "tick");
                    telemetry::hub().record_error(&err, "tick");
                }
            }

            let command = tokio::select! {
                _ = tokio::time::sleep(frame_interval) => None,
                command = self.command_rx.recv() => command,
            };
            if let Some(command) = command {
                self.apply(command);
            }
        }

        tracing::info!(
            "[ClassifierEngine] Tick loop stopped after {} ticks ({})",
            self.tick_count,
            self.state.name()
        );
        Ok(())
    }

    /// Apply one command; failures are logged, never propagated into the loop
    pub fn apply(&mut self, command: EngineCommand) {
        let result = match command {
            EngineCommand::StartRecording(class) => self.start_recording(class),
            EngineCommand::StopRecording => {
                self.stop_recording();
                Ok(())
            }
            EngineCommand::ClearClass(class) => self.clear_class(class),
            EngineCommand::SetVisible(visible) => {
                self.set_visible(visible);
                Ok(())
            }
            EngineCommand::Stop => {
                self.stop();
                Ok(())
            }
            EngineCommand::Shutdown => {
                self.shutdown();
                Ok(())
            }
        };

        if let Err(err) = result {
            log_classifier_error(&err, "apply command");
            telemetry::hub().record_error(&err, format!("{:?}", command));
        }
    }

    // ========================================================================
    // INTERNALS
    // ========================================================================

    fn load_extractor(&mut self) -> Result<(), ClassifierError> {
        self.extractor.load().map_err(|err| match err {
            ClassifierError::ExtractorInit { .. } => err,
            other => ClassifierError::ExtractorInit {
                reason: other.message(),
            },
        })?;

        if self.extractor.output_len() != self.store.dim() {
            return Err(ClassifierError::ExtractorInit {
                reason: format!(
                    "extractor produces {} values, store expects {}",
                    self.extractor.output_len(),
                    self.store.dim()
                ),
            });
        }

        let geometry = &self.config.extractor;
        let warmup = Frame::uniform(
            geometry.input_width,
            geometry.input_height,
            geometry.channels,
            0.5,
        );
        self.extractor
            .extract(&warmup)
            .map_err(|err| ClassifierError::ExtractorInit {
                reason: format!("warm-up failed: {}", err.message()),
            })?;
        Ok(())
    }

    fn features_for(&self, frame: &Frame) -> Result<FeatureVector, ClassifierError> {
        let logits = self.extractor.extract(frame)?;
        FeatureVector::from_logits(&logits, self.config.classifier.squash_denominator)
    }

    /// Classify the current frame under `plan`
    ///
    /// `None` when a throttled readback found the scores still pending.
    async fn classify_with(
        &mut self,
        plan: ReadbackPlan,
    ) -> Result<Option<ClassificationResult>, ClassifierError> {
        let frame = self.source.next_frame()?;
        let query = self.features_for(&frame)?;
        drop(frame);

        let prediction = if self.store.total_examples() == 0 {
            Prediction::InsufficientData
        } else {
            let reference = self.store.reference_set();
            let submitted = self.time_source.now();
            let mut pending = self
                .similarity
                .submit(Arc::clone(&reference), Arc::new(query));

            let scores = match plan {
                ReadbackPlan::Await => pending.wait().await?,
                ReadbackPlan::Measure => {
                    let scores = pending.wait().await?;
                    let latency = self.time_source.now().saturating_duration_since(submitted);
                    self.readback.observe_latency(latency);
                    telemetry::hub().record_readback_latency(latency);
                    tracing::debug!("[ClassifierEngine] Readback latency {:?}", latency);
                    scores
                }
                ReadbackPlan::Throttle(wait) => {
                    tokio::time::sleep(wait).await;
                    match pending.try_take() {
                        Some(scores) => scores?,
                        None => {
                            tracing::debug!(
                                "[ClassifierEngine] Scores not ready after {:?}, skipping vote",
                                wait
                            );
                            return Ok(None);
                        }
                    }
                }
            };

            self.knn
                .vote(&reference, &scores, self.store.class_count())?
        };

        let result = ClassificationResult {
            prediction,
            tick: self.tick_count,
            timestamp_ms: self.elapsed_ms(),
        };
        self.emit_prediction(&result);
        Ok(Some(result))
    }

    fn emit_prediction(&mut self, result: &ClassificationResult) {
        if let Some(callback) = self.on_prediction.as_mut() {
            callback(&result.prediction);
        }
        telemetry::hub().record_prediction(result);
        self.broadcasts.publish_prediction(result.clone());
    }

    fn notify_count(&mut self, class: usize, count: usize) {
        if let Some(Some(callback)) = self.count_callbacks.get_mut(class) {
            callback(count);
        }
        self.broadcasts
            .publish_example_count(ExampleCountChanged { class, count });
    }

    fn set_state(&mut self, next: EngineState) {
        if next == self.state {
            return;
        }
        let from = self.state;
        self.state = next;
        log::info!("[ClassifierEngine] {} -> {}", from.name(), next.name());
        self.broadcasts
            .publish_notice(EngineNotice::StateChanged { from, to: next });
    }

    fn elapsed_ms(&self) -> u64 {
        self.time_source
            .now()
            .saturating_duration_since(self.start_instant)
            .as_millis() as u64
    }

    fn ensure_not_shut_down(&self) -> Result<(), ClassifierError> {
        if self.state == EngineState::Shutdown {
            Err(ClassifierError::ShutDown)
        } else {
            Ok(())
        }
    }

    fn ensure_running(&self) -> Result<(), ClassifierError> {
        self.ensure_not_shut_down()?;
        if self.state.is_running() {
            Ok(())
        } else {
            Err(ClassifierError::NotReady)
        }
    }
}
