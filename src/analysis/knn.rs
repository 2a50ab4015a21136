// KnnClassifier - k-nearest-neighbour majority vote over stored examples
//
// Given one similarity score per reference row, the classifier keeps the K
// best rows (K = min(top_k, rows)), maps each back to its class through the
// reference set's spans and reports per-class vote shares (votes / K).
//
// Ordering is total and deterministic: higher score first, equal scores go
// to the lower row index, NaN sorts after every real score.

use std::cmp::Ordering;

use crate::analysis::examples::ExampleStore;
use crate::analysis::features::FeatureVector;
use crate::analysis::reference::ReferenceSet;
use crate::analysis::similarity::score_rows;
use crate::error::ClassifierError;

/// Per-class vote shares from one classification
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ClassConfidences {
    /// Number of neighbours that voted
    pub k: usize,
    /// Vote share per class, in class order; sums to 1 when K > 0
    pub scores: Vec<f32>,
}

impl ClassConfidences {
    pub fn confidence(&self, class: usize) -> f32 {
        self.scores.get(class).copied().unwrap_or(0.0)
    }

    /// Class with the largest share; lowest index wins ties
    pub fn top_class(&self) -> Option<usize> {
        let mut best: Option<(usize, f32)> = None;
        for (class, score) in self.scores.iter().copied().enumerate() {
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((class, score)),
            }
        }
        best.map(|(class, _)| class)
    }
}

/// Outcome of one classification cycle
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Prediction {
    /// No examples stored in any class; nothing to vote with
    InsufficientData,
    /// Vote shares per class
    Confidences(ClassConfidences),
}

impl Prediction {
    pub fn confidences(&self) -> Option<&ClassConfidences> {
        match self {
            Prediction::InsufficientData => None,
            Prediction::Confidences(confidences) => Some(confidences),
        }
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, Prediction::InsufficientData)
    }
}

/// k-NN voter with a fixed neighbour cap
#[derive(Debug, Clone, Copy)]
pub struct KnnClassifier {
    top_k: usize,
}

impl KnnClassifier {
    /// Default neighbour cap
    pub const DEFAULT_TOP_K: usize = 10;

    pub fn new(top_k: usize) -> Self {
        Self { top_k: top_k.max(1) }
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Effective K for a reference set of `rows` rows
    pub fn effective_k(&self, rows: usize) -> usize {
        self.top_k.min(rows)
    }

    /// Indices of the K best rows, best first
    pub fn select_top_k(&self, scores: &[f32]) -> Vec<usize> {
        let k = self.effective_k(scores.len());
        if k == 0 {
            return Vec::new();
        }

        let rank = |a: &usize, b: &usize| -> Ordering {
            rank_score(scores[*b], scores[*a]).then_with(|| a.cmp(b))
        };

        let mut indices: Vec<usize> = (0..scores.len()).collect();
        if k < indices.len() {
            indices.select_nth_unstable_by(k - 1, rank);
            indices.truncate(k);
        }
        indices.sort_unstable_by(rank);
        indices
    }

    /// Turn per-row scores into a prediction
    ///
    /// # Errors
    /// * `DimensionMismatch` - `scores` does not have one entry per row
    /// * `RowOutOfRange` - a selected row has no owning class
    pub fn vote(
        &self,
        reference: &ReferenceSet,
        scores: &[f32],
        class_count: usize,
    ) -> Result<Prediction, ClassifierError> {
        if reference.is_empty() {
            return Ok(Prediction::InsufficientData);
        }
        if scores.len() != reference.rows() {
            return Err(ClassifierError::DimensionMismatch {
                expected: reference.rows(),
                actual: scores.len(),
            });
        }

        let selected = self.select_top_k(scores);
        let k = selected.len();
        let mut votes = vec![0usize; class_count];
        for row in selected {
            let class = reference.class_of_row(row)?;
            match votes.get_mut(class) {
                Some(count) => *count += 1,
                None => {
                    return Err(ClassifierError::UnknownClass {
                        index: class,
                        class_count,
                    })
                }
            }
        }

        let scores = votes
            .into_iter()
            .map(|count| count as f32 / k as f32)
            .collect();
        Ok(Prediction::Confidences(ClassConfidences { k, scores }))
    }

    /// Classify an already extracted query against the store's examples
    ///
    /// Synchronous path used outside the tick loop; rebuilds the reference
    /// set first if the store changed.
    pub fn classify(
        &self,
        store: &mut ExampleStore,
        query: &FeatureVector,
    ) -> Result<Prediction, ClassifierError> {
        if store.total_examples() == 0 {
            return Ok(Prediction::InsufficientData);
        }
        let reference = store.reference_set();
        let scores = score_rows(&reference, query)?;
        self.vote(&reference, &scores, store.class_count())
    }
}

impl Default for KnnClassifier {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TOP_K)
    }
}

/// Ascending order for scores: NaN below every real value, -0.0 equal to 0.0
fn rank_score(a: f32, b: f32) -> Ordering {
    a.partial_cmp(&b)
        .unwrap_or_else(|| b.is_nan().cmp(&a.is_nan()))
}

#[cfg(test)]
#[path = "knn_tests.rs"]
mod tests;
