use super::*;

/// Helper to build a unit vector from raw values
fn vector(values: &[f32]) -> FeatureVector {
    FeatureVector::from_logits(values, 10.0).unwrap()
}

/// Helper to create a three-class store over 3-d vectors
fn create_store() -> ExampleStore {
    ExampleStore::new(&["A", "B", "C"], 3)
}

fn confidences(prediction: &Prediction) -> &ClassConfidences {
    prediction
        .confidences()
        .expect("expected confidences, got insufficient data")
}

#[test]
fn test_empty_store_is_insufficient_data() {
    let classifier = KnnClassifier::default();
    let mut store = create_store();

    let prediction = classifier
        .classify(&mut store, &vector(&[1.0, 0.0, 0.0]))
        .unwrap();
    assert_eq!(prediction, Prediction::InsufficientData);
    assert!(prediction.confidences().is_none());
}

#[test]
fn test_identical_vector_gets_full_confidence() {
    let classifier = KnnClassifier::new(3);
    let mut store = create_store();
    let a = vector(&[1.0, 0.2, 0.0]);
    for _ in 0..3 {
        store.push(0, a.clone()).unwrap();
    }
    store.push(1, vector(&[0.0, 1.0, 0.0])).unwrap();

    let prediction = classifier.classify(&mut store, &a).unwrap();
    let result = confidences(&prediction);
    assert_eq!(result.k, 3);
    assert_eq!(result.confidence(0), 1.0);
    assert_eq!(result.confidence(1), 0.0);
    assert_eq!(result.top_class(), Some(0));
}

#[test]
fn test_five_three_zero_scenario() {
    let classifier = KnnClassifier::default();
    let mut store = create_store();
    for i in 0..5 {
        store.push(0, vector(&[1.0, 0.05 * i as f32, 0.0])).unwrap();
    }
    for i in 0..3 {
        store.push(1, vector(&[0.0, 1.0, 0.05 * i as f32])).unwrap();
    }

    let prediction = classifier
        .classify(&mut store, &vector(&[1.0, 0.1, 0.0]))
        .unwrap();
    let result = confidences(&prediction);

    assert_eq!(result.k, 8, "K = min(10, 8)");
    assert!(result.confidence(0) > result.confidence(1));
    assert_eq!(result.confidence(2), 0.0);
    assert!((result.confidence(0) - 5.0 / 8.0).abs() < 1e-6);
    assert!((result.confidence(1) - 3.0 / 8.0).abs() < 1e-6);
}

#[test]
fn test_confidences_sum_to_one() {
    let classifier = KnnClassifier::new(4);
    let mut store = create_store();
    store.push(0, vector(&[1.0, 0.0, 0.0])).unwrap();
    store.push(1, vector(&[0.9, 0.1, 0.0])).unwrap();
    store.push(2, vector(&[0.8, 0.2, 0.0])).unwrap();
    store.push(2, vector(&[0.0, 0.0, 1.0])).unwrap();
    store.push(1, vector(&[0.0, 1.0, 0.0])).unwrap();

    let prediction = classifier
        .classify(&mut store, &vector(&[1.0, 0.0, 0.0]))
        .unwrap();
    let result = confidences(&prediction);
    let sum: f32 = result.scores.iter().sum();
    assert_eq!(result.k, 4);
    assert!((sum - 1.0).abs() < 1e-6);
}

#[test]
fn test_cleared_class_gets_zero_confidence() {
    let classifier = KnnClassifier::default();
    let mut store = create_store();
    let a = vector(&[1.0, 0.0, 0.0]);
    store.push(0, a.clone()).unwrap();
    store.push(1, vector(&[0.0, 1.0, 0.0])).unwrap();
    store.push(1, vector(&[0.1, 1.0, 0.0])).unwrap();

    let before = classifier.classify(&mut store, &a).unwrap();
    assert!(confidences(&before).confidence(0) > 0.0);

    store.clear(0).unwrap();
    let after = classifier.classify(&mut store, &a).unwrap();
    assert_eq!(confidences(&after).confidence(0), 0.0);
    assert_eq!(confidences(&after).confidence(1), 1.0);
}

#[test]
fn test_record_clear_record_other_class() {
    let classifier = KnnClassifier::default();
    let mut store = create_store();
    store.push(0, vector(&[1.0, 0.0, 0.0])).unwrap();
    store.clear(0).unwrap();
    let b = vector(&[0.0, 0.0, 1.0]);
    store.push(1, b.clone()).unwrap();

    let prediction = classifier.classify(&mut store, &b).unwrap();
    let result = confidences(&prediction);
    assert_eq!(result.k, 1);
    assert_eq!(result.confidence(1), 1.0);
    assert_eq!(result.confidence(0), 0.0);
}

#[test]
fn test_select_top_k_orders_best_first() {
    let classifier = KnnClassifier::new(3);
    let scores = [0.1, 0.9, 0.5, 0.7, 0.2];
    assert_eq!(classifier.select_top_k(&scores), vec![1, 3, 2]);
}

#[test]
fn test_select_top_k_ties_prefer_lower_row() {
    let classifier = KnnClassifier::new(2);
    let scores = [0.5, 0.8, 0.8, 0.8, 0.1];
    assert_eq!(classifier.select_top_k(&scores), vec![1, 2]);

    // Same result regardless of how many times we ask
    for _ in 0..10 {
        assert_eq!(classifier.select_top_k(&scores), vec![1, 2]);
    }
}

#[test]
fn test_tie_break_decides_vote() {
    // Two identical vectors in different classes; K = 1 picks the earlier row
    let classifier = KnnClassifier::new(1);
    let mut store = create_store();
    let shared = vector(&[0.0, 1.0, 1.0]);
    store.push(2, shared.clone()).unwrap();
    store.push(1, shared.clone()).unwrap();

    let prediction = classifier.classify(&mut store, &shared).unwrap();
    // Class 1 rows come before class 2 rows in the reference set
    assert_eq!(confidences(&prediction).confidence(1), 1.0);
}

#[test]
fn test_select_top_k_nan_sorts_last() {
    let classifier = KnnClassifier::new(2);
    let scores = [f32::NAN, 0.3, f32::NAN, 0.1];
    assert_eq!(classifier.select_top_k(&scores), vec![1, 3]);
}

#[test]
fn test_select_top_k_signed_zeros_tie_on_row() {
    let classifier = KnnClassifier::new(2);
    assert_eq!(classifier.select_top_k(&[-0.0, 0.0, -0.5]), vec![0, 1]);
    assert_eq!(classifier.select_top_k(&[f32::NAN, f32::NAN]), vec![0, 1]);
}

#[test]
fn test_select_top_k_caps_at_row_count() {
    let classifier = KnnClassifier::new(10);
    assert_eq!(classifier.select_top_k(&[0.2, 0.4]), vec![1, 0]);
    assert!(classifier.select_top_k(&[]).is_empty());
    assert_eq!(classifier.effective_k(8), 8);
    assert_eq!(classifier.effective_k(25), 10);
}

#[test]
fn test_vote_rejects_score_length_mismatch() {
    let classifier = KnnClassifier::default();
    let mut store = create_store();
    store.push(0, vector(&[1.0, 0.0, 0.0])).unwrap();
    let reference = store.reference_set();

    let err = classifier.vote(&reference, &[0.5, 0.2], 3).unwrap_err();
    assert_eq!(
        err,
        ClassifierError::DimensionMismatch {
            expected: 1,
            actual: 2
        }
    );
}

#[test]
fn test_vote_with_too_few_classes_is_error() {
    let classifier = KnnClassifier::default();
    let mut store = create_store();
    store.push(2, vector(&[1.0, 0.0, 0.0])).unwrap();
    let reference = store.reference_set();

    // Row 0 belongs to class 2, which a two-class vote cannot hold
    let err = classifier.vote(&reference, &[1.0], 2).unwrap_err();
    assert!(matches!(err, ClassifierError::UnknownClass { index: 2, .. }));
}

#[test]
fn test_top_class_prefers_lowest_index_on_tie() {
    let result = ClassConfidences {
        k: 4,
        scores: vec![0.5, 0.5, 0.0],
    };
    assert_eq!(result.top_class(), Some(0));
}

#[test]
fn test_prediction_serializes_with_kind_tag() {
    let json = serde_json::to_string(&Prediction::InsufficientData).unwrap();
    assert_eq!(json, r#"{"kind":"insufficient_data"}"#);

    let json = serde_json::to_string(&Prediction::Confidences(ClassConfidences {
        k: 2,
        scores: vec![1.0, 0.0],
    }))
    .unwrap();
    assert!(json.contains(r#""kind":"confidences""#));
}
