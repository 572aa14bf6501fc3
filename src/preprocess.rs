//! Image preprocessing
//!
//! Decodes an image, forces RGB channel order, resizes to the 30x30 model
//! input and scales every channel into [0, 1].

use image::imageops::FilterType;
use image::{DynamicImage, RgbImage};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::errors::{RecognitionError, RecognitionResult};

/// Model input side length (pixels)
pub const IMAGE_SIZE: usize = 30;

/// Color channels per pixel
pub const CHANNELS: usize = 3;

/// Number of floats in one normalized tensor
pub const TENSOR_LEN: usize = IMAGE_SIZE * IMAGE_SIZE * CHANNELS;

/// Channel layout written into the tensor.
///
/// Decoding always yields RGB. `Bgr` swaps red and blue afterwards, for models
/// trained on data read by a BGR-native decoder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

impl std::fmt::Display for ChannelOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelOrder::Rgb => write!(f, "RGB"),
            ChannelOrder::Bgr => write!(f, "BGR"),
        }
    }
}

/// Normalized (30, 30, 3) image in row-major HWC layout.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTensor {
    data: Vec<f32>,
}

impl NormalizedTensor {
    /// Wrap raw HWC data. Returns `None` unless the length is exactly
    /// `30 * 30 * 3`.
    pub fn from_vec(data: Vec<f32>) -> Option<Self> {
        (data.len() == TENSOR_LEN).then_some(Self { data })
    }

    pub fn shape(&self) -> [usize; 3] {
        [IMAGE_SIZE, IMAGE_SIZE, CHANNELS]
    }

    /// Value at row `y`, column `x`, channel `c`; `None` outside the tensor
    pub fn get(&self, y: usize, x: usize, c: usize) -> Option<f32> {
        if y >= IMAGE_SIZE || x >= IMAGE_SIZE || c >= CHANNELS {
            return None;
        }
        self.data.get((y * IMAGE_SIZE + x) * CHANNELS + c).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.data
    }
}

/// Preprocessing options shared by recognition, training and evaluation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Preprocessor {
    pub channel_order: ChannelOrder,
}

impl Preprocessor {
    pub fn new(channel_order: ChannelOrder) -> Self {
        Self { channel_order }
    }

    /// Decode the image at `path` and normalize it.
    pub fn preprocess_path(&self, path: &Path) -> RecognitionResult<NormalizedTensor> {
        let image = image::open(path).map_err(|source| RecognitionError::Decode {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.preprocess_image(&image))
    }

    /// Decode an in-memory encoded image (PNG, JPEG, ...) and normalize it.
    pub fn preprocess_bytes(&self, bytes: &[u8]) -> RecognitionResult<NormalizedTensor> {
        let image = image::load_from_memory(bytes).map_err(RecognitionError::DecodeBuffer)?;
        Ok(self.preprocess_image(&image))
    }

    /// Normalize an already decoded image.
    pub fn preprocess_image(&self, image: &DynamicImage) -> NormalizedTensor {
        let rgb = image.to_rgb8();
        let resized = image::imageops::resize(
            &rgb,
            IMAGE_SIZE as u32,
            IMAGE_SIZE as u32,
            FilterType::Triangle,
        );
        self.normalize(&resized)
    }

    fn normalize(&self, rgb: &RgbImage) -> NormalizedTensor {
        let mut data = Vec::with_capacity(TENSOR_LEN);
        for pixel in rgb.pixels() {
            let [r, g, b] = pixel.0;
            let ordered = match self.channel_order {
                ChannelOrder::Rgb => [r, g, b],
                ChannelOrder::Bgr => [b, g, r],
            };
            data.extend(ordered.iter().map(|&v| v as f32 / 255.0));
        }
        NormalizedTensor { data }
    }
}

/// Preprocess with the default (RGB) options.
pub fn preprocess(path: &Path) -> RecognitionResult<NormalizedTensor> {
    Preprocessor::default().preprocess_path(path)
}
