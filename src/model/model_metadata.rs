//! Model metadata definition
//!
//! Stored as `metadata.json` next to the weights inside the model archive.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::labels::{self, NUM_CLASSES};
use crate::preprocess::{ChannelOrder, IMAGE_SIZE};

/// Model metadata
///
/// Contents of the tar.gz archive:
/// - metadata.json: this struct (JSON)
/// - model.bin: model weights (binary)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Class names in output order
    pub class_labels: Vec<String>,

    /// Model input side length (pixels)
    pub model_input_size: u32,

    /// Channel order the model was trained with
    #[serde(default)]
    pub channel_order: ChannelOrder,

    pub num_epochs: u32,
    #[serde(default)]
    pub batch_size: u32,
    #[serde(default)]
    pub learning_rate: f64,
    /// Number of training samples after the validation split
    #[serde(default)]
    pub train_samples: u32,

    /// Training timestamp (RFC 3339)
    pub trained_at: String,
}

impl ModelMetadata {
    pub fn new(channel_order: ChannelOrder, num_epochs: u32) -> Self {
        Self {
            class_labels: labels::class_labels(),
            model_input_size: IMAGE_SIZE as u32,
            channel_order,
            num_epochs,
            batch_size: 0,
            learning_rate: 0.0,
            train_samples: 0,
            trained_at: chrono::Local::now().to_rfc3339(),
        }
    }

    /// Check that a stored model fits this build's input and label table.
    pub fn validate(&self) -> Result<()> {
        if self.model_input_size as usize != IMAGE_SIZE {
            anyhow::bail!(
                "model expects {}x{} input, this build uses {}x{}",
                self.model_input_size,
                self.model_input_size,
                IMAGE_SIZE,
                IMAGE_SIZE
            );
        }
        if self.class_labels.len() != NUM_CLASSES {
            anyhow::bail!(
                "model has {} classes, expected {}",
                self.class_labels.len(),
                NUM_CLASSES
            );
        }
        let mismatched = self
            .class_labels
            .iter()
            .zip(labels::SIGN_NAMES)
            .filter(|(stored, name)| stored.as_str() != *name)
            .count();
        if mismatched > 0 {
            warn!("{} stored class labels differ from the built-in label table", mismatched);
        }
        Ok(())
    }

    pub fn to_json_string(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("Failed to serialize metadata to JSON")
    }

    pub fn from_json_string(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to deserialize metadata from JSON")
    }
}
