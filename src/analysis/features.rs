// Feature extraction - frame → normalized feature vector
//
// The extractor itself is a black box behind the FeatureExtractor trait. This
// module owns the deterministic post-processing applied to its raw logits:
//
// 1. Squash: divide every logit by a fixed denominator
// 2. Normalize: divide by the L2 norm so the vector has unit length
//
// Unit length makes the dot product between two feature vectors equal to
// their cosine similarity, which is what the k-NN vote ranks on.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ExtractorConfig;
use crate::engine::backend::Frame;
use crate::error::ClassifierError;

/// Unit-length feature vector produced from one frame
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Vec<f32>,
}

impl FeatureVector {
    /// Squash and normalize raw logits into a feature vector
    ///
    /// # Errors
    /// `DegenerateFeatures` when the squashed logits have zero or non-finite norm.
    pub fn from_logits(logits: &[f32], squash_denominator: f32) -> Result<Self, ClassifierError> {
        squash_and_normalize(logits, squash_denominator).map(|values| Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.values
    }

    /// L2 norm (1.0 within rounding for every constructed vector)
    pub fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    /// Dot product, equal to cosine similarity for two feature vectors
    pub fn dot(&self, other: &[f32]) -> f32 {
        dot(&self.values, other)
    }
}

/// Dot product of two equally sized slices
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Divide by `denominator`, then scale to unit L2 norm
pub fn squash_and_normalize(logits: &[f32], denominator: f32) -> Result<Vec<f32>, ClassifierError> {
    let squashed: Vec<f32> = logits.iter().map(|v| v / denominator).collect();
    let norm = squashed.iter().map(|v| v * v).sum::<f32>().sqrt();

    if !norm.is_finite() || norm <= 0.0 {
        return Err(ClassifierError::DegenerateFeatures { norm });
    }

    Ok(squashed.into_iter().map(|v| v / norm).collect())
}

/// Pretrained feature extractor contract
///
/// Implementations turn a fixed-size frame into a fixed-length logits vector.
pub trait FeatureExtractor: Send {
    /// One-time initialization (weight loading). Must precede `extract`.
    fn load(&mut self) -> Result<(), ClassifierError>;

    /// Whether `load` has completed successfully
    fn is_loaded(&self) -> bool;

    /// Number of values expected per frame
    fn input_len(&self) -> usize;

    /// Number of logits produced per frame
    fn output_len(&self) -> usize;

    /// Raw logits for one frame
    fn extract(&self, frame: &Frame) -> Result<Vec<f32>, ClassifierError>;
}

/// Seeded random-projection extractor
///
/// Stands in for a pretrained network: logits are `W · pixels` with `W`
/// drawn uniformly from [-1, 1]. Identical frames map to identical vectors
/// and nearby frames to nearby vectors, which is all the vote needs.
pub struct ProjectionExtractor {
    input_len: usize,
    output_len: usize,
    seed: u64,
    /// Row-major `output_len × input_len`, empty until loaded
    weights: Vec<f32>,
}

impl ProjectionExtractor {
    pub fn new(config: &ExtractorConfig) -> Self {
        Self {
            input_len: config.input_len(),
            output_len: config.feature_len,
            seed: config.seed,
            weights: Vec::new(),
        }
    }
}

impl FeatureExtractor for ProjectionExtractor {
    fn load(&mut self) -> Result<(), ClassifierError> {
        if self.is_loaded() {
            return Ok(());
        }
        if self.input_len == 0 || self.output_len == 0 {
            return Err(ClassifierError::ExtractorInit {
                reason: format!(
                    "projection shape {}x{} is empty",
                    self.output_len, self.input_len
                ),
            });
        }

        let mut rng = StdRng::seed_from_u64(self.seed);
        self.weights = (0..self.input_len * self.output_len)
            .map(|_| rng.gen_range(-1.0_f32..=1.0))
            .collect();

        log::info!(
            "[ProjectionExtractor] Loaded {}x{} projection (seed {})",
            self.output_len,
            self.input_len,
            self.seed
        );
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        !self.weights.is_empty()
    }

    fn input_len(&self) -> usize {
        self.input_len
    }

    fn output_len(&self) -> usize {
        self.output_len
    }

    fn extract(&self, frame: &Frame) -> Result<Vec<f32>, ClassifierError> {
        if !self.is_loaded() {
            return Err(ClassifierError::NotReady);
        }
        let pixels = frame.pixels();
        if pixels.len() != self.input_len {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.input_len,
                actual: pixels.len(),
            });
        }

        Ok(self
            .weights
            .chunks_exact(self.input_len)
            .map(|row| dot(row, pixels))
            .collect())
    }
}
