// ExampleStore - labelled feature vectors per class
//
// Each configured class owns an append-only ClassExampleSet. Every mutation
// bumps the store generation; the cached ReferenceSet remembers the generation
// it was built from and is rebuilt lazily once the two disagree.

use std::sync::Arc;

use crate::analysis::features::FeatureVector;
use crate::analysis::reference::ReferenceSet;
use crate::error::ClassifierError;

/// One of the fixed, mutually exclusive categories
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ClassLabel {
    /// Position in the fixed class order
    pub index: usize,
    /// Human-readable name
    pub name: String,
}

/// Ordered, append-only examples for one class
#[derive(Debug, Clone, Default)]
pub struct ClassExampleSet {
    vectors: Vec<FeatureVector>,
}

impl ClassExampleSet {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    pub fn vectors(&self) -> &[FeatureVector] {
        &self.vectors
    }

    fn push(&mut self, vector: FeatureVector) {
        self.vectors.push(vector);
    }

    fn clear(&mut self) {
        // Drop the allocation too; a cleared class may stay empty for a while
        self.vectors = Vec::new();
    }
}

/// Per-class example storage with a lazily rebuilt reference set
pub struct ExampleStore {
    labels: Vec<ClassLabel>,
    sets: Vec<ClassExampleSet>,
    dim: usize,
    generation: u64,
    cached: Option<Arc<ReferenceSet>>,
}

impl ExampleStore {
    /// Create an empty store for the given class names and vector length
    pub fn new<S: AsRef<str>>(class_names: &[S], dim: usize) -> Self {
        let labels = class_names
            .iter()
            .enumerate()
            .map(|(index, name)| ClassLabel {
                index,
                name: name.as_ref().to_string(),
            })
            .collect::<Vec<_>>();
        let sets = vec![ClassExampleSet::default(); labels.len()];

        Self {
            labels,
            sets,
            dim,
            generation: 0,
            cached: None,
        }
    }

    pub fn class_count(&self) -> usize {
        self.labels.len()
    }

    pub fn labels(&self) -> &[ClassLabel] {
        &self.labels
    }

    pub fn label(&self, class: usize) -> Result<&ClassLabel, ClassifierError> {
        self.labels.get(class).ok_or(ClassifierError::UnknownClass {
            index: class,
            class_count: self.labels.len(),
        })
    }

    /// Feature vector length accepted by `push`
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Mutation counter; changes on every append and every effective clear
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn set(&self, class: usize) -> Result<&ClassExampleSet, ClassifierError> {
        self.check_class(class)?;
        Ok(&self.sets[class])
    }

    /// Append one example and return the class's new count
    pub fn push(&mut self, class: usize, vector: FeatureVector) -> Result<usize, ClassifierError> {
        self.check_class(class)?;
        if vector.len() != self.dim {
            return Err(ClassifierError::DimensionMismatch {
                expected: self.dim,
                actual: vector.len(),
            });
        }

        self.sets[class].push(vector);
        self.invalidate();
        Ok(self.sets[class].len())
    }

    /// Discard every example of one class
    ///
    /// Returns the number of examples removed. Clearing an empty class is a
    /// no-op and leaves the cached reference set valid.
    pub fn clear(&mut self, class: usize) -> Result<usize, ClassifierError> {
        self.check_class(class)?;
        let removed = self.sets[class].len();
        if removed > 0 {
            self.sets[class].clear();
            self.invalidate();
        }
        Ok(removed)
    }

    /// Discard every example of every class
    pub fn clear_all(&mut self) {
        for set in &mut self.sets {
            set.clear();
        }
        self.invalidate();
        self.cached = None;
    }

    pub fn count(&self, class: usize) -> Result<usize, ClassifierError> {
        self.check_class(class)?;
        Ok(self.sets[class].len())
    }

    /// Example counts in class order
    pub fn counts(&self) -> Vec<usize> {
        self.sets.iter().map(ClassExampleSet::len).collect()
    }

    pub fn total_examples(&self) -> usize {
        self.sets.iter().map(ClassExampleSet::len).sum()
    }

    /// Whether the cached reference set matches the current examples
    pub fn is_reference_fresh(&self) -> bool {
        self.cached
            .as_ref()
            .is_some_and(|cached| cached.generation() == self.generation)
    }

    /// Reference set for the current examples, rebuilt only when stale
    pub fn reference_set(&mut self) -> Arc<ReferenceSet> {
        if let Some(cached) = &self.cached {
            if cached.generation() == self.generation {
                return Arc::clone(cached);
            }
        }

        let rebuilt = Arc::new(ReferenceSet::build(&self.sets, self.dim, self.generation));
        log::debug!(
            "[ExampleStore] Rebuilt reference set: {} rows, generation {}",
            rebuilt.rows(),
            self.generation
        );
        self.cached = Some(Arc::clone(&rebuilt));
        rebuilt
    }

    fn invalidate(&mut self) {
        self.generation = self.generation.wrapping_add(1);
    }

    fn check_class(&self, class: usize) -> Result<(), ClassifierError> {
        if class < self.labels.len() {
            Ok(())
        } else {
            Err(ClassifierError::UnknownClass {
                index: class,
                class_count: self.labels.len(),
            })
        }
    }
}
