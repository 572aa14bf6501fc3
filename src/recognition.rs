//! Recognition service
//!
//! Preprocess → classify → argmax → label table. Failures are logged and
//! reported as `None`; nothing propagates to the caller as a panic.

use image::DynamicImage;
use std::path::Path;
use tracing::{debug, warn};

use crate::errors::{RecognitionError, RecognitionResult};
use crate::labels::NUM_CLASSES;
use crate::preprocess::{NormalizedTensor, Preprocessor};
use crate::types::{Recognition, SignClass};

/// A trained model mapping a batch of normalized images to class probabilities.
///
/// Must return exactly one probability vector per input, in input order.
pub trait Classifier {
    fn predict(&self, batch: &[NormalizedTensor]) -> RecognitionResult<Vec<Vec<f32>>>;
}

impl<C: Classifier + ?Sized> Classifier for Box<C> {
    fn predict(&self, batch: &[NormalizedTensor]) -> RecognitionResult<Vec<Vec<f32>>> {
        (**self).predict(batch)
    }
}

/// Index of the largest value; ties go to the first index and NaN never wins.
pub fn argmax(values: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (idx, &value) in values.iter().enumerate() {
        if value.is_nan() {
            continue;
        }
        match best {
            Some((_, best_value)) if value <= best_value => {}
            _ => best = Some((idx, value)),
        }
    }
    best.map(|(idx, _)| idx)
}

/// Turns image files into sign names using a shared, read-only classifier.
pub struct RecognitionService<C> {
    classifier: C,
    preprocessor: Preprocessor,
}

impl<C: Classifier> RecognitionService<C> {
    pub fn new(classifier: C) -> Self {
        Self::with_preprocessor(classifier, Preprocessor::default())
    }

    pub fn with_preprocessor(classifier: C, preprocessor: Preprocessor) -> Self {
        Self {
            classifier,
            preprocessor,
        }
    }

    pub fn classifier(&self) -> &C {
        &self.classifier
    }

    pub fn preprocessor(&self) -> &Preprocessor {
        &self.preprocessor
    }

    /// Recognise the sign in `image_path`, or `None` if decoding or
    /// inference failed (the error is logged).
    pub fn recognise(&self, image_path: &Path) -> Option<Recognition> {
        match self.try_recognise(image_path) {
            Ok(recognition) => Some(recognition),
            Err(e) => {
                warn!("Error in processing the image {}: {:#}", image_path.display(), anyhow::Error::from(e));
                None
            }
        }
    }

    /// Same as [`recognise`](Self::recognise) but keeps the failure reason.
    pub fn try_recognise(&self, image_path: &Path) -> RecognitionResult<Recognition> {
        let tensor = self.preprocessor.preprocess_path(image_path)?;
        let recognition = self.classify(tensor)?;
        debug!(
            "{} -> {} (p={:.3})",
            image_path.display(),
            recognition.class,
            recognition.confidence
        );
        Ok(recognition)
    }

    /// Recognise an encoded image held in memory.
    pub fn recognise_bytes(&self, bytes: &[u8]) -> Option<Recognition> {
        let result = self
            .preprocessor
            .preprocess_bytes(bytes)
            .and_then(|tensor| self.classify(tensor));
        match result {
            Ok(recognition) => Some(recognition),
            Err(e) => {
                warn!("Error in processing the image buffer: {:#}", anyhow::Error::from(e));
                None
            }
        }
    }

    /// Recognise an image that is already decoded.
    pub fn recognise_image(&self, image: &DynamicImage) -> Option<Recognition> {
        let tensor = self.preprocessor.preprocess_image(image);
        match self.classify(tensor) {
            Ok(recognition) => Some(recognition),
            Err(e) => {
                warn!("Error in processing the image: {:#}", anyhow::Error::from(e));
                None
            }
        }
    }

    /// Classify one already normalized tensor.
    pub fn classify(&self, tensor: NormalizedTensor) -> RecognitionResult<Recognition> {
        let batch = [tensor];
        let mut predictions = self.classifier.predict(&batch)?;
        if predictions.len() != 1 {
            return Err(RecognitionError::inference(format!(
                "expected 1 prediction for a batch of 1, got {}",
                predictions.len()
            )));
        }
        let probabilities = predictions.swap_remove(0);
        if probabilities.len() != NUM_CLASSES {
            warn!(
                "classifier returned {} scores, expected {}",
                probabilities.len(),
                NUM_CLASSES
            );
        }

        let class_id = argmax(&probabilities)
            .ok_or_else(|| RecognitionError::inference("empty or all-NaN prediction"))?;
        let class = SignClass(class_id);

        Ok(Recognition {
            class,
            name: class.name().to_string(),
            confidence: probabilities[class_id],
        })
    }
}
