//! Similarity backends: query · reference rows with asynchronous completion.
//!
//! A backend receives the reference set and a query vector and hands back a
//! [`PendingScores`] carrying a single oneshot completion. The engine decides
//! (through its readback strategy) how to wait for it. A job whose receiver
//! has been dropped still runs to completion; its result is simply discarded.

use std::sync::Arc;

use tokio::sync::oneshot;

use crate::analysis::features::{dot, FeatureVector};
use crate::analysis::reference::ReferenceSet;
use crate::error::ClassifierError;

/// In-flight similarity job
pub struct PendingScores {
    rx: oneshot::Receiver<Result<Vec<f32>, ClassifierError>>,
}

impl PendingScores {
    /// Pair a pending job with the sender its worker completes
    pub fn channel() -> (oneshot::Sender<Result<Vec<f32>, ClassifierError>>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self { rx })
    }

    /// Take the scores if the job has already finished, without waiting
    pub fn try_take(&mut self) -> Option<Result<Vec<f32>, ClassifierError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(oneshot::error::TryRecvError::Empty) => None,
            Err(oneshot::error::TryRecvError::Closed) => Some(Err(ClassifierError::BackendFailure {
                reason: "similarity job dropped before completion".to_string(),
            })),
        }
    }

    /// Wait for the scores (one per reference row, in row order)
    pub async fn wait(self) -> Result<Vec<f32>, ClassifierError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(ClassifierError::BackendFailure {
                reason: "similarity job dropped before completion".to_string(),
            }),
        }
    }
}

/// Computes similarities between a query and every reference row
pub trait SimilarityBackend: Send + Sync {
    fn submit(&self, reference: Arc<ReferenceSet>, query: Arc<FeatureVector>) -> PendingScores;
}

/// Dot product of the query with every row
pub fn score_rows(
    reference: &ReferenceSet,
    query: &FeatureVector,
) -> Result<Vec<f32>, ClassifierError> {
    if !reference.is_empty() && reference.dim() != query.len() {
        return Err(ClassifierError::DimensionMismatch {
            expected: reference.dim(),
            actual: query.len(),
        });
    }
    Ok(reference
        .iter_rows()
        .map(|row| dot(row, query.as_slice()))
        .collect())
}

/// Computes scores on the calling thread; the job is complete on return
#[derive(Debug, Default, Clone, Copy)]
pub struct CpuSimilarity;

impl SimilarityBackend for CpuSimilarity {
    fn submit(&self, reference: Arc<ReferenceSet>, query: Arc<FeatureVector>) -> PendingScores {
        let (tx, pending) = PendingScores::channel();
        let _ = tx.send(score_rows(&reference, &query));
        pending
    }
}

/// Offloads scoring to tokio's blocking pool
///
/// Must be used from within a tokio runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct BlockingPoolSimilarity;

impl SimilarityBackend for BlockingPoolSimilarity {
    fn submit(&self, reference: Arc<ReferenceSet>, query: Arc<FeatureVector>) -> PendingScores {
        let (tx, pending) = PendingScores::channel();
        tokio::task::spawn_blocking(move || {
            let result = score_rows(&reference, &query);
            if tx.send(result).is_err() {
                log::debug!("[BlockingPoolSimilarity] Receiver gone, discarding scores");
            }
        });
        pending
    }
}
