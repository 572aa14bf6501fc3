use std::path::{Path, PathBuf};
use std::sync::Mutex;

use image::{ImageBuffer, Rgb};
use road_sign_lib::errors::{RecognitionError, RecognitionResult};
use road_sign_lib::preprocess::{NormalizedTensor, TENSOR_LEN};
use road_sign_lib::{Classifier, RecognitionService, SignClass, NUM_CLASSES};

/// Returns the same scores for every input and remembers what it was given.
struct RecordingClassifier {
    scores: Vec<f32>,
    seen: Mutex<Vec<NormalizedTensor>>,
}

impl RecordingClassifier {
    fn new(scores: Vec<f32>) -> Self {
        Self {
            scores,
            seen: Mutex::new(Vec::new()),
        }
    }

    fn peak_at(class_id: usize) -> Self {
        let mut scores = vec![0.01; NUM_CLASSES];
        scores[class_id] = 0.9;
        Self::new(scores)
    }

    fn seen(&self) -> Vec<NormalizedTensor> {
        self.seen.lock().unwrap().clone()
    }
}

impl Classifier for RecordingClassifier {
    fn predict(&self, batch: &[NormalizedTensor]) -> RecognitionResult<Vec<Vec<f32>>> {
        self.seen.lock().unwrap().extend(batch.iter().cloned());
        Ok(batch.iter().map(|_| self.scores.clone()).collect())
    }
}

struct FailingClassifier;

impl Classifier for FailingClassifier {
    fn predict(&self, _batch: &[NormalizedTensor]) -> RecognitionResult<Vec<Vec<f32>>> {
        Err(RecognitionError::inference("out of memory"))
    }
}

/// Answers every batch with one empty probability vector.
struct EmptyScoresClassifier;

impl Classifier for EmptyScoresClassifier {
    fn predict(&self, _batch: &[NormalizedTensor]) -> RecognitionResult<Vec<Vec<f32>>> {
        Ok(vec![vec![]])
    }
}

fn write_image(dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
    let path = dir.join(name);
    let img = ImageBuffer::from_fn(width, height, |x, y| {
        Rgb([(x * 7 % 256) as u8, (y * 13 % 256) as u8, 128])
    });
    img.save(&path).unwrap();
    path
}

#[test]
fn missing_file_gives_no_result() {
    let dir = tempfile::tempdir().unwrap();
    let service = RecognitionService::new(RecordingClassifier::peak_at(14));

    assert!(service.recognise(&dir.path().join("nope.png")).is_none());
    assert!(service.classifier().seen().is_empty());
}

#[test]
fn non_image_file_gives_no_result() {
    let dir = tempfile::tempdir().unwrap();
    let fake = dir.path().join("sign.png");
    std::fs::write(&fake, "this is a text file").unwrap();

    let service = RecognitionService::new(RecordingClassifier::peak_at(14));
    assert!(service.recognise(&fake).is_none());
    assert!(service.recognise_bytes(b"still not an image").is_none());
}

#[test]
fn stop_sign_is_recognised() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "stop.png", 30, 30);

    let service = RecognitionService::new(RecordingClassifier::peak_at(14));
    let recognition = service.recognise(&path).unwrap();
    assert_eq!(recognition.class, SignClass(14));
    assert_eq!(recognition.name, "Stop");
}

#[test]
fn uniform_scores_pick_first_class() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "any.png", 30, 30);

    let service = RecognitionService::new(RecordingClassifier::new(vec![1.0 / 43.0; NUM_CLASSES]));
    let recognition = service.recognise(&path).unwrap();
    assert_eq!(recognition.class, SignClass(0));
    assert_eq!(recognition.name, "Speed limit (20km/h)");
}

#[test]
fn repeated_recognition_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "repeat.jpg", 41, 37);

    let service = RecognitionService::new(RecordingClassifier::peak_at(25));
    let first = service.recognise(&path).unwrap();
    let second = service.recognise(&path).unwrap();
    assert_eq!(first, second);

    let seen = service.classifier().seen();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[0], seen[1]);
}

#[test]
fn any_image_size_reaches_the_model_as_30x30x3() {
    let dir = tempfile::tempdir().unwrap();
    let sizes = [(30, 30), (64, 20), (12, 90), (200, 150), (3, 3)];

    let service = RecognitionService::new(RecordingClassifier::peak_at(1));
    for (i, (w, h)) in sizes.iter().enumerate() {
        let path = write_image(dir.path(), &format!("img{}.png", i), *w, *h);
        assert!(service.recognise(&path).is_some());
    }

    let seen = service.classifier().seen();
    assert_eq!(seen.len(), sizes.len());
    for tensor in seen {
        assert_eq!(tensor.shape(), [30, 30, 3]);
        assert_eq!(tensor.as_slice().len(), TENSOR_LEN);
        assert!(tensor.as_slice().iter().all(|v| (0.0..=1.0).contains(v)));
    }
}

#[test]
fn encoded_bytes_match_file_recognition() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "bytes.png", 50, 40);
    let bytes = std::fs::read(&path).unwrap();

    let service = RecognitionService::new(RecordingClassifier::peak_at(33));
    let from_file = service.recognise(&path).unwrap();
    let from_bytes = service.recognise_bytes(&bytes).unwrap();
    assert_eq!(from_file, from_bytes);
}

#[test]
fn classifier_error_gives_no_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "wide.png", 70, 5);

    let service = RecognitionService::new(FailingClassifier);
    assert!(service.try_recognise(&path).is_err());
    assert!(service.recognise(&path).is_none());
    assert!(service.recognise_bytes(&std::fs::read(&path).unwrap()).is_none());
}

#[test]
fn empty_probability_vector_gives_no_result() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_image(dir.path(), "sign.png", 30, 30);

    let service = RecognitionService::new(EmptyScoresClassifier);
    assert!(service.recognise(&path).is_none());
    assert!(service.recognise_bytes(&std::fs::read(&path).unwrap()).is_none());
}
