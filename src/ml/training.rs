//! Model training
//!
//! Explicit pipeline: load dataset → split → (augmented) batches → learner
//! fit → model archive. Each stage is a function returning data to the next.

use anyhow::{Context, Result};
use burn::{
    data::dataloader::batcher::Batcher,
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Int, Tensor},
};
use burn_dataset::InMemDataset;
use burn_wgpu::WgpuDevice;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::dataset::{DatasetLoader, LoadReport, SignDataset};
use crate::ml::augment::{augment, AugmentConfig};
use crate::ml::schedule::InverseTimeDecay;
use crate::ml::{ModelConfig, SignClassifier};
use crate::model::{save_model_archive, AppConfig, DeviceType, ModelMetadata, TrainingSettings};
use crate::preprocess::{CHANNELS, IMAGE_SIZE};
use crate::types::SignSample;

/// Backend used for training
pub type TrainBackend = burn_autodiff::Autodiff<burn::backend::Wgpu>;
/// Backend used for validation during training
pub type ValidBackend = burn::backend::Wgpu;

/// Batcher: stacks samples into `[batch, 30, 30, 3]` images plus targets.
#[derive(Clone)]
pub struct SignBatcher<B: Backend> {
    device: B::Device,
    augment: Option<AugmentConfig>,
}

impl<B: Backend> SignBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self {
            device,
            augment: None,
        }
    }

    /// Apply random augmentation to every item of every batch.
    pub fn with_augmentation(mut self, config: AugmentConfig) -> Self {
        self.augment = Some(config);
        self
    }
}

impl<B: Backend> Batcher<B, SignSample, SignBatch<B>> for SignBatcher<B> {
    fn batch(&self, items: Vec<SignSample>, _device: &B::Device) -> SignBatch<B> {
        let batch_size = items.len();
        let mut pixels = Vec::with_capacity(batch_size * IMAGE_SIZE * IMAGE_SIZE * CHANNELS);
        let mut targets = Vec::with_capacity(batch_size);
        let mut rng = rand::thread_rng();

        for item in items {
            match &self.augment {
                Some(config) => pixels.extend(augment(&item.pixels, config, &mut rng)),
                None => pixels.extend_from_slice(&item.pixels),
            }
            targets.push(item.label as i64);
        }

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, IMAGE_SIZE, IMAGE_SIZE, CHANNELS]);
        let targets = Tensor::<B, 1, Int>::from_ints(targets.as_slice(), &self.device);

        SignBatch { images, targets }
    }
}

#[derive(Clone, Debug)]
pub struct SignBatch<B: Backend> {
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: burn::tensor::backend::AutodiffBackend>
    burn::train::TrainStep<SignBatch<B>, burn::train::ClassificationOutput<B>> for SignClassifier<B>
{
    fn step(&self, batch: SignBatch<B>) -> burn::train::TrainOutput<burn::train::ClassificationOutput<B>> {
        let item = self.forward_classification(batch.images, batch.targets);
        let grads = item.loss.backward();
        burn::train::TrainOutput::new(self, grads, item)
    }
}

impl<B: Backend> burn::train::ValidStep<SignBatch<B>, burn::train::ClassificationOutput<B>>
    for SignClassifier<B>
{
    fn step(&self, batch: SignBatch<B>) -> burn::train::ClassificationOutput<B> {
        self.forward_classification(batch.images, batch.targets)
    }
}

/// Serialize network weights (full precision).
pub fn model_to_bytes<B: Backend>(model: SignClassifier<B>) -> Result<Vec<u8>> {
    let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
    Recorder::<B>::record(&recorder, model.into_record(), ())
        .map_err(|e| anyhow::anyhow!("Failed to serialize model weights: {:?}", e))
}

/// Result of a training run
pub struct TrainingOutcome {
    pub model: SignClassifier<ValidBackend>,
    pub train_samples: usize,
    pub validation_samples: usize,
}

/// Fit a fresh network on `train`, validating on `valid`.
pub fn train(
    train: SignDataset,
    valid: SignDataset,
    settings: &TrainingSettings,
    dropout: f64,
    device_type: DeviceType,
    artifact_dir: &Path,
) -> Result<TrainingOutcome> {
    use burn::{
        data::dataloader::DataLoaderBuilder,
        optim::AdamConfig,
        train::{
            metric::{AccuracyMetric, LossMetric},
            LearnerBuilder, LearningStrategy,
        },
    };

    if train.is_empty() || valid.is_empty() {
        anyhow::bail!(
            "training needs samples in both splits (train: {}, validation: {})",
            train.len(),
            valid.len()
        );
    }

    let device = match device_type {
        DeviceType::Wgpu => WgpuDevice::DiscreteGpu(0),
        DeviceType::Cpu => WgpuDevice::Cpu,
    };
    info!("Training on {:?}", device);

    let train_samples = train.len();
    let validation_samples = valid.len();

    let mut batcher_train = SignBatcher::<TrainBackend>::new(device.clone());
    if settings.augment {
        batcher_train = batcher_train.with_augmentation(AugmentConfig::default());
    }
    let batcher_valid = SignBatcher::<ValidBackend>::new(device.clone());

    let dataloader_train = DataLoaderBuilder::new(batcher_train)
        .batch_size(settings.batch_size)
        .shuffle(settings.seed)
        .num_workers(settings.num_workers)
        .build(InMemDataset::new(train.into_samples()));

    let dataloader_valid = DataLoaderBuilder::new(batcher_valid)
        .batch_size(settings.batch_size)
        .num_workers(settings.num_workers)
        .build(InMemDataset::new(valid.into_samples()));

    let model = ModelConfig::default()
        .with_dropout(dropout)
        .init::<TrainBackend>(&device);

    std::fs::create_dir_all(artifact_dir)
        .with_context(|| format!("Failed to create artifact directory {:?}", artifact_dir))?;
    let artifact_dir_str = artifact_dir.to_string_lossy().to_string();

    let lr_scheduler = InverseTimeDecay::new(settings.learning_rate, settings.lr_decay());

    info!(
        "Training: {} samples, {} validation, {} epochs, batch size {}, learning rate {} (decay {:.2e})",
        train_samples,
        validation_samples,
        settings.num_epochs,
        settings.batch_size,
        settings.learning_rate,
        settings.lr_decay()
    );

    let learner = LearnerBuilder::new(&artifact_dir_str)
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .learning_strategy(LearningStrategy::SingleDevice(device.clone()))
        .num_epochs(settings.num_epochs)
        .summary()
        .build(model, AdamConfig::new().init(), lr_scheduler);

    let model_trained = learner.fit(dataloader_train, dataloader_valid);
    let model = model_trained.model;
    debug!("trained model has {} parameters", model.num_params());

    Ok(TrainingOutcome {
        model,
        train_samples,
        validation_samples,
    })
}

/// Write the trained network and its metadata. Returns the archive path.
pub fn persist(
    outcome: TrainingOutcome,
    settings: &TrainingSettings,
    config: &AppConfig,
    output_path: &Path,
) -> Result<PathBuf> {
    let mut metadata = ModelMetadata::new(config.preprocess.channel_order, settings.num_epochs as u32);
    metadata.batch_size = settings.batch_size as u32;
    metadata.learning_rate = settings.learning_rate;
    metadata.train_samples = outcome.train_samples as u32;

    let weights = model_to_bytes(outcome.model)?;
    let path = save_model_archive(output_path, &metadata, &weights)?;
    info!(
        "Saved model to {} ({:.2} MB)",
        path.display(),
        weights.len() as f64 / 1024.0 / 1024.0
    );
    Ok(path)
}

/// Full pipeline driven by the application config.
pub fn train_model(config: &AppConfig) -> Result<(PathBuf, LoadReport)> {
    let loader = DatasetLoader::new(config.preprocessor(), config.dataset.strict_decode);
    let (dataset, report) = loader
        .load_training_set(&config.dataset.train_path())
        .context("Failed to load training set")?;

    let settings = &config.training;
    let (train_set, valid_set) = dataset.split(settings.train_ratio, settings.seed);

    let artifact_dir = std::env::temp_dir().join("road_sign_training");
    let outcome = train(
        train_set,
        valid_set,
        settings,
        config.model.dropout,
        config.device_type,
        &artifact_dir,
    )?;

    let path = persist(outcome, settings, config, &config.model_path())?;
    std::fs::remove_dir_all(&artifact_dir).ok();

    Ok((path, report))
}
