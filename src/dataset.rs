//! Labeled dataset loading
//!
//! Training images live in `Train/<class id>/`, test images are listed in a
//! CSV manifest. Every image goes through the same [`Preprocessor`] used for
//! recognition. Images that fail to decode are logged and collected in a
//! [`LoadReport`]; in strict mode the first failure aborts the load.

use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::csv_loader::load_manifest;
use crate::errors::DatasetError;
use crate::labels::{sign_name, NUM_CLASSES};
use crate::preprocess::Preprocessor;
use crate::types::SignSample;

const SPLIT_TOLERANCE: f64 = 1e-4;

const IMAGE_EXTENSIONS: [&str; 7] = ["png", "jpg", "jpeg", "ppm", "bmp", "gif", "webp"];

/// Outcome of a dataset load
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub loaded: usize,
    /// Files that could not be decoded
    pub skipped: Vec<PathBuf>,
}

impl LoadReport {
    pub fn skipped_count(&self) -> usize {
        self.skipped.len()
    }
}

/// In-memory set of preprocessed samples
#[derive(Debug, Clone, Default)]
pub struct SignDataset {
    samples: Vec<SignSample>,
}

impl SignDataset {
    pub fn new(samples: Vec<SignSample>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[SignSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<SignSample> {
        self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sample count per class id
    pub fn class_counts(&self) -> [usize; NUM_CLASSES] {
        let mut counts = [0; NUM_CLASSES];
        for sample in &self.samples {
            if let Some(count) = counts.get_mut(sample.label) {
                *count += 1;
            }
        }
        counts
    }

    /// Shuffle with a fixed seed and split into (train, validation).
    ///
    /// The validation part is rounded up, so 5 samples at 0.7 split 3/2.
    pub fn split(self, train_ratio: f32, seed: u64) -> (Self, Self) {
        let mut samples = self.samples;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        samples.shuffle(&mut rng);

        let validation_fraction = 1.0 - f64::from(train_ratio.clamp(0.0, 1.0));
        // tolerance absorbs f32 noise such as 1 - 0.7 = 0.30000001
        let validation_len =
            ((samples.len() as f64 * validation_fraction) - SPLIT_TOLERANCE).ceil().max(0.0) as usize;
        let train_len = samples.len() - validation_len.min(samples.len());
        let validation = samples.split_off(train_len);

        (Self { samples }, Self { samples: validation })
    }
}

/// Loads datasets through a shared preprocessor.
#[derive(Debug, Clone, Copy, Default)]
pub struct DatasetLoader {
    pub preprocessor: Preprocessor,
    /// Abort on the first undecodable image instead of skipping it
    pub strict: bool,
}

impl DatasetLoader {
    pub fn new(preprocessor: Preprocessor, strict: bool) -> Self {
        Self {
            preprocessor,
            strict,
        }
    }

    /// Load `train_dir/<class id>/*` for every class id.
    pub fn load_training_set(
        &self,
        train_dir: &Path,
    ) -> Result<(SignDataset, LoadReport), DatasetError> {
        if !train_dir.is_dir() {
            return Err(DatasetError::MissingDirectory(train_dir.to_path_buf()));
        }

        let mut samples = Vec::new();
        let mut report = LoadReport::default();

        for class_id in 0..NUM_CLASSES {
            let class_dir = train_dir.join(class_id.to_string());
            if !class_dir.is_dir() {
                warn!("class directory missing: {}", class_dir.display());
                continue;
            }

            let before = samples.len();
            for path in list_images(&class_dir)? {
                self.load_one(&path, class_id, &mut samples, &mut report)?;
            }
            debug!(
                "class {} ({}): {} images",
                class_id,
                sign_name(class_id),
                samples.len() - before
            );
        }

        if samples.is_empty() {
            return Err(DatasetError::Empty(train_dir.to_path_buf()));
        }

        info!(
            "Loaded {} training images ({} skipped)",
            report.loaded,
            report.skipped_count()
        );
        Ok((SignDataset::new(samples), report))
    }

    /// Load every image listed in `manifest`, resolving paths against `root`.
    pub fn load_test_set(
        &self,
        root: &Path,
        manifest: &Path,
    ) -> Result<(SignDataset, LoadReport), DatasetError> {
        let entries = load_manifest(manifest)?;

        let mut samples = Vec::with_capacity(entries.len());
        let mut report = LoadReport::default();
        for entry in &entries {
            let path = root.join(&entry.path);
            self.load_one(&path, entry.class_id, &mut samples, &mut report)?;
        }

        if samples.is_empty() {
            return Err(DatasetError::Empty(manifest.to_path_buf()));
        }

        info!(
            "Loaded {} test images ({} skipped)",
            report.loaded,
            report.skipped_count()
        );
        Ok((SignDataset::new(samples), report))
    }

    fn load_one(
        &self,
        path: &Path,
        label: usize,
        samples: &mut Vec<SignSample>,
        report: &mut LoadReport,
    ) -> Result<(), DatasetError> {
        match self.preprocessor.preprocess_path(path) {
            Ok(tensor) => {
                samples.push(SignSample {
                    pixels: tensor.into_vec(),
                    label,
                });
                report.loaded += 1;
                Ok(())
            }
            Err(e) if self.strict => Err(e.into()),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                report.skipped.push(path.to_path_buf());
                Ok(())
            }
        }
    }
}

fn list_images(dir: &Path) -> Result<Vec<PathBuf>, DatasetError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let is_image = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
        if is_image {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

/// (sign name, count) pairs sorted by ascending count, ties by name.
pub fn class_distribution(counts: &[usize; NUM_CLASSES]) -> Vec<(&'static str, usize)> {
    let mut pairs: Vec<_> = counts
        .iter()
        .enumerate()
        .map(|(id, &count)| (sign_name(id), count))
        .collect();
    pairs.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgb};

    fn write_png(path: &Path, color: [u8; 3]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        ImageBuffer::from_pixel(12, 9, Rgb(color)).save(path).unwrap();
    }

    fn sample(label: usize) -> SignSample {
        SignSample {
            pixels: vec![0.0; crate::preprocess::TENSOR_LEN],
            label,
        }
    }

    #[test]
    fn test_load_training_set_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("Train");
        write_png(&train.join("0/a.png"), [255, 0, 0]);
        write_png(&train.join("0/b.png"), [0, 255, 0]);
        write_png(&train.join("14/stop.png"), [200, 10, 10]);
        std::fs::write(train.join("14/broken.png"), b"not an image").unwrap();
        std::fs::write(train.join("14/notes.txt"), b"ignored").unwrap();

        let loader = DatasetLoader::default();
        let (dataset, report) = loader.load_training_set(&train).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(report.loaded, 3);
        assert_eq!(report.skipped, vec![train.join("14/broken.png")]);
        let counts = dataset.class_counts();
        assert_eq!(counts[0], 2);
        assert_eq!(counts[14], 1);
        assert!(dataset.samples().iter().all(|s| s.pixels.len() == 2700));
    }

    #[test]
    fn test_strict_mode_fails_on_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let train = dir.path().join("Train");
        write_png(&train.join("1/a.png"), [1, 2, 3]);
        std::fs::write(train.join("1/bad.jpg"), b"garbage").unwrap();

        let loader = DatasetLoader::new(Preprocessor::default(), true);
        let err = loader.load_training_set(&train).unwrap_err();
        assert!(matches!(err, DatasetError::Decode(_)));
    }

    #[test]
    fn test_missing_train_dir() {
        let dir = tempfile::tempdir().unwrap();
        let err = DatasetLoader::default()
            .load_training_set(&dir.path().join("nope"))
            .unwrap_err();
        assert!(matches!(err, DatasetError::MissingDirectory(_)));
    }

    #[test]
    fn test_load_test_set_from_manifest() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("Test/00000.png"), [10, 20, 30]);
        write_png(&dir.path().join("Test/00001.png"), [30, 20, 10]);
        let manifest = dir.path().join("Test.csv");
        std::fs::write(
            &manifest,
            "ClassId,Path\n14,Test/00000.png\n3,Test/00001.png\n7,Test/missing.png\n",
        )
        .unwrap();

        let (dataset, report) = DatasetLoader::default()
            .load_test_set(dir.path(), &manifest)
            .unwrap();
        let labels: Vec<_> = dataset.samples().iter().map(|s| s.label).collect();
        assert_eq!(labels, vec![14, 3]);
        assert_eq!(report.skipped, vec![dir.path().join("Test/missing.png")]);
    }

    #[test]
    fn test_split_is_seeded() {
        let make = || SignDataset::new((0..100).map(|i| sample(i % NUM_CLASSES)).collect());
        let (train_a, val_a) = make().split(0.7, 42);
        let (train_b, val_b) = make().split(0.7, 42);

        assert_eq!(train_a.len(), 70);
        assert_eq!(val_a.len(), 30);
        let labels = |d: &SignDataset| d.samples().iter().map(|s| s.label).collect::<Vec<_>>();
        assert_eq!(labels(&train_a), labels(&train_b));
        assert_eq!(labels(&val_a), labels(&val_b));
    }

    #[test]
    fn test_split_rounds_validation_up() {
        let make = |n: usize| SignDataset::new((0..n).map(|i| sample(i % NUM_CLASSES)).collect());

        let (train, val) = make(5).split(0.7, 42);
        assert_eq!((train.len(), val.len()), (3, 2));

        let (train, val) = make(10).split(0.7, 42);
        assert_eq!((train.len(), val.len()), (7, 3));

        let (train, val) = make(1).split(0.7, 42);
        assert_eq!((train.len(), val.len()), (0, 1));

        let (train, val) = make(4).split(1.0, 42);
        assert_eq!((train.len(), val.len()), (4, 0));

        let (train, val) = make(4).split(0.0, 42);
        assert_eq!((train.len(), val.len()), (0, 4));
    }

    #[test]
    fn test_class_distribution_sorted_ascending() {
        let mut counts = [5; NUM_CLASSES];
        counts[14] = 1;
        counts[2] = 90;
        let dist = class_distribution(&counts);
        assert_eq!(dist.len(), NUM_CLASSES);
        assert_eq!(dist[0], ("Stop", 1));
        assert_eq!(dist[NUM_CLASSES - 1], ("Speed limit (50km/h)", 90));
        assert!(dist.windows(2).all(|w| w[0].1 <= w[1].1));
    }
}
