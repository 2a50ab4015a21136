// ReferenceSet - concatenated training matrix for nearest-neighbour queries
//
// Rows are the examples of every non-empty class, in class order. The class
// boundaries are recorded by the same loop that copies the rows, so the
// row → class mapping cannot drift from the matrix layout.

use crate::analysis::examples::ClassExampleSet;
use crate::error::ClassifierError;

/// Contiguous row range owned by one class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassSpan {
    pub class: usize,
    /// First row (inclusive)
    pub start: usize,
    /// Last row (exclusive)
    pub end: usize,
}

/// Row-major matrix of every stored feature vector
#[derive(Debug, Clone)]
pub struct ReferenceSet {
    data: Vec<f32>,
    dim: usize,
    rows: usize,
    spans: Vec<ClassSpan>,
    generation: u64,
}

impl ReferenceSet {
    /// Concatenate the class sets in order, skipping empty ones
    pub fn build(sets: &[ClassExampleSet], dim: usize, generation: u64) -> Self {
        let total: usize = sets.iter().map(ClassExampleSet::len).sum();
        let mut data = Vec::with_capacity(total * dim);
        let mut spans = Vec::new();
        let mut rows = 0;

        for (class, set) in sets.iter().enumerate() {
            if set.is_empty() {
                continue;
            }
            let start = rows;
            for vector in set.vectors() {
                data.extend_from_slice(vector.as_slice());
                rows += 1;
            }
            spans.push(ClassSpan {
                class,
                start,
                end: rows,
            });
        }

        Self {
            data,
            dim,
            rows,
            spans,
            generation,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Store generation this set was built from
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn spans(&self) -> &[ClassSpan] {
        &self.spans
    }

    pub fn row(&self, row: usize) -> Option<&[f32]> {
        if row >= self.rows {
            return None;
        }
        Some(&self.data[row * self.dim..(row + 1) * self.dim])
    }

    /// Iterate rows in order
    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> {
        // chunks_exact panics on a zero chunk size
        self.data.chunks_exact(self.dim.max(1))
    }

    /// Class owning `row`
    ///
    /// # Errors
    /// `RowOutOfRange` when no span contains the row. There is no fallback
    /// class: an unmapped row means the caller mixed up reference sets.
    pub fn class_of_row(&self, row: usize) -> Result<usize, ClassifierError> {
        let idx = self.spans.partition_point(|span| span.end <= row);
        match self.spans.get(idx) {
            Some(span) if span.start <= row && row < span.end => Ok(span.class),
            _ => Err(ClassifierError::RowOutOfRange {
                row,
                rows: self.rows,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::examples::ExampleStore;
    use crate::analysis::features::FeatureVector;

    fn vector(values: &[f32]) -> FeatureVector {
        FeatureVector::from_logits(values, 1.0).unwrap()
    }

    fn store_with_counts(counts: &[usize]) -> ExampleStore {
        let names: Vec<String> = (0..counts.len()).map(|i| format!("c{i}")).collect();
        let mut store = ExampleStore::new(&names, 2);
        for (class, count) in counts.iter().enumerate() {
            for i in 0..*count {
                store
                    .push(class, vector(&[class as f32 + 1.0, i as f32]))
                    .unwrap();
            }
        }
        store
    }

    #[test]
    fn test_build_skips_empty_classes() {
        let mut store = store_with_counts(&[2, 0, 3]);
        let reference = store.reference_set();

        assert_eq!(reference.rows(), 5);
        assert_eq!(
            reference.spans(),
            &[
                ClassSpan {
                    class: 0,
                    start: 0,
                    end: 2
                },
                ClassSpan {
                    class: 2,
                    start: 2,
                    end: 5
                },
            ]
        );
    }

    #[test]
    fn test_class_of_row_follows_cumulative_counts() {
        let mut store = store_with_counts(&[5, 3, 0]);
        let reference = store.reference_set();

        for row in 0..5 {
            assert_eq!(reference.class_of_row(row).unwrap(), 0);
        }
        for row in 5..8 {
            assert_eq!(reference.class_of_row(row).unwrap(), 1);
        }
    }

    #[test]
    fn test_class_of_row_out_of_range_is_error() {
        let mut store = store_with_counts(&[1, 1, 1]);
        let reference = store.reference_set();

        assert_eq!(
            reference.class_of_row(3).unwrap_err(),
            ClassifierError::RowOutOfRange { row: 3, rows: 3 }
        );
        // No "default to last class" fallback
        assert!(reference.class_of_row(usize::MAX).is_err());
    }

    #[test]
    fn test_empty_reference_set() {
        let mut store = store_with_counts(&[0, 0, 0]);
        let reference = store.reference_set();
        assert!(reference.is_empty());
        assert!(reference.class_of_row(0).is_err());
        assert_eq!(reference.iter_rows().count(), 0);
    }

    #[test]
    fn test_rows_preserve_vectors() {
        let mut store = store_with_counts(&[1, 2, 0]);
        let reference = store.reference_set();
        let first_b = store.set(1).unwrap().vectors()[0].as_slice().to_vec();
        assert_eq!(reference.row(1).unwrap(), first_b.as_slice());
        assert!(reference.row(3).is_none());
        assert_eq!(reference.iter_rows().count(), 3);
    }

    #[test]
    fn test_mapping_rebuilt_after_earlier_class_changes() {
        let mut store = store_with_counts(&[2, 2, 0]);
        let before = store.reference_set();
        assert_eq!(before.class_of_row(2).unwrap(), 1);

        store.clear(0).unwrap();
        let after = store.reference_set();
        assert_eq!(after.rows(), 2);
        assert_eq!(after.class_of_row(0).unwrap(), 1);
        assert_ne!(before.generation(), after.generation());
    }
}
