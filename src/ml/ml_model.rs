//! Road sign CNN
//!
//! Two conv blocks followed by a dense head, ending in a 43-way softmax.
//! Batch normalization follows each pooling layer and the dense layer.

use burn::{
    config::Config,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        loss::CrossEntropyLossConfig,
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig, Relu,
    },
    tensor::{activation::softmax, backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

use crate::labels::NUM_CLASSES;
use crate::preprocess::{CHANNELS, IMAGE_SIZE};

/// Width of the dense layer
const HIDDEN_UNITS: usize = 512;

/// Model configuration
#[derive(Config, Debug)]
pub struct ModelConfig {
    /// Number of output classes
    pub num_classes: usize,
    /// Dropout rate before the output layer
    #[config(default = 0.5)]
    pub dropout: f64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new(NUM_CLASSES)
    }
}

impl ModelConfig {
    /// Side length of the feature map entering the dense head.
    ///
    /// conv 3x3 (-2), conv 3x3 (-2), pool /2, conv 3x3 (-2), conv 3x3 (-2), pool /2
    pub fn feature_map_size(image_size: usize) -> usize {
        let block1 = image_size.saturating_sub(4) / 2;
        block1.saturating_sub(4) / 2
    }

    pub fn init<B: Backend>(&self, device: &B::Device) -> SignClassifier<B> {
        let feature_map_size = Self::feature_map_size(IMAGE_SIZE);
        let features = 128 * feature_map_size * feature_map_size;

        SignClassifier {
            conv1: Conv2dConfig::new([CHANNELS, 16], [3, 3]).init(device),
            conv2: Conv2dConfig::new([16, 32], [3, 3]).init(device),
            pool1: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            norm1: BatchNormConfig::new(32).init(device),

            conv3: Conv2dConfig::new([32, 64], [3, 3]).init(device),
            conv4: Conv2dConfig::new([64, 128], [3, 3]).init(device),
            pool2: MaxPool2dConfig::new([2, 2]).with_strides([2, 2]).init(),
            norm2: BatchNormConfig::new(128).init(device),

            fc1: LinearConfig::new(features, HIDDEN_UNITS).init(device),
            norm3: BatchNormConfig::new(HIDDEN_UNITS).init(device),
            dropout: DropoutConfig::new(self.dropout).init(),
            fc2: LinearConfig::new(HIDDEN_UNITS, self.num_classes).init(device),

            activation: Relu::new(),
        }
    }
}

/// Road sign classifier network
///
/// Input: batch of normalized HWC images `[batch, 30, 30, 3]`.
/// Output: per-class logits `[batch, num_classes]`.
#[derive(Module, Debug)]
pub struct SignClassifier<B: Backend> {
    conv1: Conv2d<B>, // 3 -> 16
    conv2: Conv2d<B>, // 16 -> 32
    pool1: MaxPool2d,
    norm1: BatchNorm<B>,

    conv3: Conv2d<B>, // 32 -> 64
    conv4: Conv2d<B>, // 64 -> 128
    pool2: MaxPool2d,
    norm2: BatchNorm<B>,

    fc1: Linear<B>,
    norm3: BatchNorm<B>,
    dropout: Dropout,
    fc2: Linear<B>,

    activation: Relu,
}

impl<B: Backend> SignClassifier<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let [batch_size, _, _, _] = images.dims();

        // HWC -> CHW
        let x = images.permute([0, 3, 1, 2]);

        let x = self.activation.forward(self.conv1.forward(x));
        let x = self.activation.forward(self.conv2.forward(x));
        let x = self.norm1.forward(self.pool1.forward(x));

        let x = self.activation.forward(self.conv3.forward(x));
        let x = self.activation.forward(self.conv4.forward(x));
        let x = self.norm2.forward(self.pool2.forward(x));

        let [_, c, h, w] = x.dims();
        let x = x.reshape([batch_size, c * h * w]);

        let x = self.activation.forward(self.fc1.forward(x));
        // [batch, 512] -> [batch, 512, 1] so the norm sees 512 channels
        let x = self
            .norm3
            .forward(x.reshape([batch_size, HIDDEN_UNITS, 1]))
            .reshape([batch_size, HIDDEN_UNITS]);
        let x = self.dropout.forward(x);
        self.fc2.forward(x)
    }

    /// Class probabilities `[batch, num_classes]`
    pub fn probabilities(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        softmax(self.forward(images), 1)
    }

    /// Forward pass plus cross-entropy loss (training)
    pub fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.forward(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_feature_map_size() {
        assert_eq!(ModelConfig::feature_map_size(30), 4);
    }

    #[test]
    fn test_output_is_probability_vector() {
        let device = Default::default();
        let model = ModelConfig::default().init::<TestBackend>(&device);

        let images = Tensor::<TestBackend, 4>::ones([2, IMAGE_SIZE, IMAGE_SIZE, CHANNELS], &device)
            .mul_scalar(0.5);
        let probs = model.probabilities(images);
        assert_eq!(probs.dims(), [2, NUM_CLASSES]);

        let values = probs.into_data().to_vec::<f32>().unwrap();
        for row in values.chunks(NUM_CLASSES) {
            let sum: f32 = row.iter().sum();
            assert!((sum - 1.0).abs() < 1e-4);
            assert!(row.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }
}
