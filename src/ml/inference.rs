//! Model inference
//!
//! Burn-backed [`Classifier`] implementation and model loading.

use anyhow::Result;
use burn::{
    module::Module,
    record::{BinBytesRecorder, FullPrecisionSettings, Recorder},
    tensor::{backend::Backend, Tensor},
};
use std::path::Path;
use tracing::info;

use crate::errors::{RecognitionError, RecognitionResult};
use crate::labels::NUM_CLASSES;
use crate::ml::{ModelConfig, SignClassifier};
use crate::model::{load_model_archive, DeviceType, ModelMetadata};
use crate::preprocess::{NormalizedTensor, CHANNELS, IMAGE_SIZE};
use crate::recognition::Classifier;

/// CPU inference backend
pub type CpuBackend = burn_ndarray::NdArray<f32>;
/// GPU inference backend
pub type GpuBackend = burn::backend::Wgpu;

/// Trained network bound to a device
pub struct BurnClassifier<B: Backend> {
    model: SignClassifier<B>,
    device: B::Device,
}

impl<B: Backend> BurnClassifier<B> {
    pub fn new(model: SignClassifier<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Restore a network from serialized weights.
    pub fn from_weights(weights: Vec<u8>, device: B::Device) -> Result<Self> {
        // dropout is inactive outside training
        let model = ModelConfig::new(NUM_CLASSES)
            .with_dropout(0.0)
            .init::<B>(&device);

        let recorder = BinBytesRecorder::<FullPrecisionSettings>::default();
        let record = Recorder::<B>::load(&recorder, weights, &device)
            .map_err(|e| anyhow::anyhow!("Failed to load model weights: {:?}", e))?;

        Ok(Self::new(model.load_record(record), device))
    }

    /// Load a model archive written by training.
    pub fn load<P: AsRef<Path>>(model_path: P, device: B::Device) -> Result<(Self, ModelMetadata)> {
        let (metadata, weights) = load_model_archive(model_path.as_ref())?;
        metadata.validate()?;
        let classifier = Self::from_weights(weights, device)?;
        Ok((classifier, metadata))
    }

    pub fn model(&self) -> &SignClassifier<B> {
        &self.model
    }
}

impl<B: Backend> Classifier for BurnClassifier<B> {
    fn predict(&self, batch: &[NormalizedTensor]) -> RecognitionResult<Vec<Vec<f32>>> {
        if batch.is_empty() {
            return Ok(Vec::new());
        }

        let batch_size = batch.len();
        let pixels: Vec<f32> = batch
            .iter()
            .flat_map(|t| t.as_slice().iter().copied())
            .collect();

        let images = Tensor::<B, 1>::from_floats(pixels.as_slice(), &self.device)
            .reshape([batch_size, IMAGE_SIZE, IMAGE_SIZE, CHANNELS]);

        let probabilities = self.model.probabilities(images);
        let [rows, classes] = probabilities.dims();
        let values = probabilities
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| RecognitionError::inference(format!("failed to read model output: {:?}", e)))?;

        if rows != batch_size || classes == 0 {
            return Err(RecognitionError::inference(format!(
                "unexpected output shape [{}, {}]",
                rows, classes
            )));
        }

        Ok(values.chunks(classes).map(|row| row.to_vec()).collect())
    }
}

/// Load a model archive on the configured device.
pub fn load_classifier(
    model_path: &Path,
    device_type: DeviceType,
) -> Result<(Box<dyn Classifier>, ModelMetadata)> {
    info!("Loading model {} on {}", model_path.display(), device_type);
    match device_type {
        DeviceType::Cpu => {
            let (classifier, metadata) =
                BurnClassifier::<CpuBackend>::load(model_path, Default::default())?;
            Ok((Box::new(classifier), metadata))
        }
        DeviceType::Wgpu => {
            let (classifier, metadata) =
                BurnClassifier::<GpuBackend>::load(model_path, Default::default())?;
            Ok((Box::new(classifier), metadata))
        }
    }
}
