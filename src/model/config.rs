//! Application settings
//!
//! Compute device, model path, training, dataset and preprocessing settings,
//! saved and loaded as JSON.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::preprocess::{ChannelOrder, Preprocessor};

/// Compute device
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub enum DeviceType {
    /// WGPU (GPU) backend
    #[default]
    Wgpu,
    /// NdArray (CPU) backend
    Cpu,
}

impl std::fmt::Display for DeviceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DeviceType::Wgpu => write!(f, "WGPU (GPU)"),
            DeviceType::Cpu => write!(f, "CPU (NdArray)"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    /// Model archive path (.tar.gz)
    pub model_path: String,
    /// Dropout rate used while training
    pub dropout: f64,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self {
            model_path: "models/road_sign_classifier.tar.gz".to_string(),
            dropout: 0.5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingSettings {
    pub num_epochs: usize,
    pub batch_size: usize,
    pub num_workers: usize,
    pub learning_rate: f64,
    /// Inverse time decay per batch; `None` uses `learning_rate / (epochs / 2)`
    #[serde(default)]
    pub lr_decay: Option<f64>,
    /// Seed for the train/validation shuffle
    pub seed: u64,
    /// Fraction of the training set kept for training (rest is validation)
    pub train_ratio: f32,
    /// Random affine augmentation of training batches
    #[serde(default = "default_true")]
    pub augment: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self {
            num_epochs: 30,
            batch_size: 32,
            num_workers: 1,
            learning_rate: 1e-3,
            lr_decay: None,
            seed: 42,
            train_ratio: 0.7,
            augment: true,
        }
    }
}

impl TrainingSettings {
    /// Decay applied by the learning rate schedule
    pub fn lr_decay(&self) -> f64 {
        self.lr_decay.unwrap_or_else(|| {
            let half_epochs = (self.num_epochs as f64 * 0.5).max(1.0);
            self.learning_rate / half_epochs
        })
    }
}

/// Dataset layout: `<root>/<train_dir>/<class id>/*` and `<root>/<test_manifest>`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetSettings {
    pub root: String,
    pub train_dir: String,
    pub test_manifest: String,
    /// Fail on the first undecodable image instead of skipping it
    #[serde(default)]
    pub strict_decode: bool,
}

impl Default for DatasetSettings {
    fn default() -> Self {
        Self {
            root: "./dataset".to_string(),
            train_dir: "Train".to_string(),
            test_manifest: "Test.csv".to_string(),
            strict_decode: false,
        }
    }
}

impl DatasetSettings {
    pub fn train_path(&self) -> PathBuf {
        Path::new(&self.root).join(&self.train_dir)
    }

    pub fn manifest_path(&self) -> PathBuf {
        Path::new(&self.root).join(&self.test_manifest)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreprocessSettings {
    pub channel_order: ChannelOrder,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub device_type: DeviceType,
    pub model: ModelSettings,
    pub training: TrainingSettings,
    pub dataset: DatasetSettings,
    #[serde(default)]
    pub preprocess: PreprocessSettings,
    /// Directory the shell resolves relative image names against
    #[serde(default)]
    pub images_directory: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::default(),
            model: ModelSettings::default(),
            training: TrainingSettings::default(),
            dataset: DatasetSettings::default(),
            preprocess: PreprocessSettings::default(),
            images_directory: Some("./dataset/Test".to_string()),
        }
    }
}

impl AppConfig {
    pub fn default_path() -> PathBuf {
        PathBuf::from("config.json")
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: AppConfig = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Load `path`; a missing or broken file falls back to defaults.
    pub fn load_or_default_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            info!("No config file at {}, using defaults", path.display());
            return Self::default();
        }

        match Self::load(path) {
            Ok(config) => {
                info!("Loaded config file: {}", path.display());
                config
            }
            Err(e) => {
                warn!(
                    "Failed to read config file ({}): {}; using defaults",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    pub fn load_or_default() -> Self {
        Self::load_or_default_from(Self::default_path())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    pub fn preprocessor(&self) -> Preprocessor {
        Preprocessor::new(self.preprocess.channel_order)
    }

    pub fn model_path(&self) -> PathBuf {
        PathBuf::from(&self.model.model_path)
    }

    /// Directory the shell resolves relative image names against
    pub fn images_directory(&self) -> Option<PathBuf> {
        self.images_directory.as_ref().map(PathBuf::from)
    }

    pub fn display(&self) -> String {
        format!(
            "device: {}\nmodel: {}\nepochs: {}, batch size: {}, learning rate: {}, seed: {}, train ratio: {}, augment: {}\ndataset: {} (train: {}, test manifest: {}, strict: {})\nchannel order: {}",
            self.device_type,
            self.model.model_path,
            self.training.num_epochs,
            self.training.batch_size,
            self.training.learning_rate,
            self.training.seed,
            self.training.train_ratio,
            self.training.augment,
            self.dataset.root,
            self.dataset.train_dir,
            self.dataset.test_manifest,
            self.dataset.strict_decode,
            self.preprocess.channel_order,
        )
    }
}
