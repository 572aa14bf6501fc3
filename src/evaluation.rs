//! Test set evaluation
//!
//! Batched inference over a labeled dataset and accuracy scoring.

use tracing::info;

use crate::dataset::SignDataset;
use crate::errors::{RecognitionError, RecognitionResult};
use crate::labels::sign_name;
use crate::preprocess::NormalizedTensor;
use crate::recognition::{argmax, Classifier};

/// Accuracy summary of one evaluation run
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationReport {
    pub total: usize,
    pub correct: usize,
    /// (actual, predicted) per sample, in dataset order
    pub predictions: Vec<(usize, usize)>,
    /// Files skipped while loading the test set
    pub skipped: usize,
}

impl EvaluationReport {
    /// Accuracy in percent
    pub fn accuracy(&self) -> f64 {
        accuracy_score(&self.predictions) * 100.0
    }

    /// Up to `len` consecutive predictions starting at `start`
    pub fn window(&self, start: usize, len: usize) -> &[(usize, usize)] {
        let start = start.min(self.predictions.len());
        let end = start.saturating_add(len).min(self.predictions.len());
        &self.predictions[start..end]
    }

    pub fn summary(&self) -> String {
        format!(
            "Test Data accuracy: {:.2} ({}/{} correct, {} skipped)",
            self.accuracy(),
            self.correct,
            self.total,
            self.skipped
        )
    }

    /// One line per (actual, predicted) pair
    pub fn format_window(&self, start: usize, len: usize) -> String {
        self.window(start, len)
            .iter()
            .map(|&(actual, predicted)| {
                let mark = if actual == predicted { "ok" } else { "MISS" };
                format!(
                    "[{mark:>4}] actual: {actual:>2} {:<30} predicted: {predicted:>2} {}",
                    sign_name(actual),
                    sign_name(predicted)
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Fraction of pairs whose prediction matches the label (0.0 for no pairs)
pub fn accuracy_score(pairs: &[(usize, usize)]) -> f64 {
    if pairs.is_empty() {
        return 0.0;
    }
    let correct = pairs.iter().filter(|(a, p)| a == p).count();
    correct as f64 / pairs.len() as f64
}

/// Run the classifier over every sample of `dataset` in batches.
///
/// `skipped` is the number of files dropped while loading `dataset`.
pub fn evaluate<C: Classifier + ?Sized>(
    classifier: &C,
    dataset: &SignDataset,
    batch_size: usize,
    skipped: usize,
) -> RecognitionResult<EvaluationReport> {
    if dataset.is_empty() {
        return Err(RecognitionError::inference("test set is empty"));
    }

    let batch_size = batch_size.max(1);
    let mut predictions = Vec::with_capacity(dataset.len());

    for chunk in dataset.samples().chunks(batch_size) {
        let batch = chunk
            .iter()
            .map(|sample| {
                NormalizedTensor::from_vec(sample.pixels.clone())
                    .ok_or_else(|| RecognitionError::inference("sample has the wrong tensor size"))
            })
            .collect::<RecognitionResult<Vec<_>>>()?;

        let outputs = classifier.predict(&batch)?;
        if outputs.len() != chunk.len() {
            return Err(RecognitionError::inference(format!(
                "expected {} predictions, got {}",
                chunk.len(),
                outputs.len()
            )));
        }

        for (sample, probabilities) in chunk.iter().zip(&outputs) {
            let predicted = argmax(probabilities)
                .ok_or_else(|| RecognitionError::inference("empty or all-NaN prediction"))?;
            predictions.push((sample.label, predicted));
        }
    }

    let correct = predictions.iter().filter(|(a, p)| a == p).count();
    let report = EvaluationReport {
        total: predictions.len(),
        correct,
        predictions,
        skipped,
    };
    info!("{}", report.summary());
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::NUM_CLASSES;
    use crate::preprocess::TENSOR_LEN;
    use crate::types::SignSample;

    /// Predicts the class encoded in the first pixel value (value * 100).
    struct PixelCodeClassifier;

    impl Classifier for PixelCodeClassifier {
        fn predict(&self, batch: &[NormalizedTensor]) -> RecognitionResult<Vec<Vec<f32>>> {
            Ok(batch
                .iter()
                .map(|t| {
                    let class = (t.as_slice()[0] * 100.0).round() as usize;
                    let mut probs = vec![0.0; NUM_CLASSES];
                    probs[class.min(NUM_CLASSES - 1)] = 1.0;
                    probs
                })
                .collect())
        }
    }

    fn sample(encoded: usize, label: usize) -> SignSample {
        let mut pixels = vec![0.0; TENSOR_LEN];
        pixels[0] = encoded as f32 / 100.0;
        SignSample { pixels, label }
    }

    #[test]
    fn test_accuracy_score() {
        assert_eq!(accuracy_score(&[]), 0.0);
        assert_eq!(accuracy_score(&[(1, 1), (2, 3), (4, 4), (5, 5)]), 0.75);
    }

    #[test]
    fn test_evaluate_counts_correct_across_batches() {
        let dataset = SignDataset::new(vec![
            sample(14, 14),
            sample(3, 3),
            sample(7, 8),
            sample(0, 0),
            sample(42, 42),
        ]);
        let report = evaluate(&PixelCodeClassifier, &dataset, 2, 0).unwrap();
        assert_eq!(report.total, 5);
        assert_eq!(report.correct, 4);
        assert!((report.accuracy() - 80.0).abs() < 1e-9);
        assert_eq!(report.predictions[2], (8, 7));
    }

    #[test]
    fn test_evaluate_empty_dataset_is_error() {
        let err = evaluate(&PixelCodeClassifier, &SignDataset::default(), 8, 0).unwrap_err();
        assert!(matches!(err, RecognitionError::Inference { .. }));
    }

    #[test]
    fn test_report_carries_skipped_count() {
        let dataset = SignDataset::new(vec![sample(1, 1), sample(2, 2)]);
        let report = evaluate(&PixelCodeClassifier, &dataset, 8, 3).unwrap();
        assert_eq!(report.skipped, 3);
        assert_eq!(
            report.summary(),
            "Test Data accuracy: 100.00 (2/2 correct, 3 skipped)"
        );
    }

    #[test]
    fn test_window_is_clamped() {
        let report = EvaluationReport {
            total: 3,
            correct: 3,
            predictions: vec![(1, 1), (2, 2), (3, 3)],
            skipped: 0,
        };
        assert_eq!(report.window(1, 24), &[(2, 2), (3, 3)]);
        assert!(report.window(10, 5).is_empty());
        assert_eq!(report.format_window(0, 1).lines().count(), 1);
    }
}
