//! Error types for the recognition pipeline.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while turning an image into a sign class.
#[derive(Error, Debug)]
pub enum RecognitionError {
    /// The image file is missing, unreadable or not a supported image.
    #[error("failed to decode image {}", path.display())]
    Decode {
        /// The offending path.
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    /// An in-memory buffer could not be decoded.
    #[error("failed to decode image buffer")]
    DecodeBuffer(#[source] image::ImageError),

    /// The classifier failed on a well-formed tensor.
    #[error("inference: {message}")]
    Inference {
        /// What went wrong.
        message: String,
    },
}

impl RecognitionError {
    pub fn inference(message: impl Into<String>) -> Self {
        Self::Inference {
            message: message.into(),
        }
    }

    /// True for decode failures (path or buffer).
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode { .. } | Self::DecodeBuffer(_))
    }
}

/// Errors raised while loading a labeled dataset.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset directory not found: {}", .0.display())]
    MissingDirectory(PathBuf),

    #[error("no samples found in {}", .0.display())]
    Empty(PathBuf),

    #[error("class id {class_id} in manifest row {row} is out of range")]
    ClassOutOfRange { row: usize, class_id: usize },

    /// Raised in strict mode on the first image that fails to decode.
    #[error(transparent)]
    Decode(#[from] RecognitionError),

    #[error("manifest")]
    Manifest(#[from] csv::Error),

    #[error("io")]
    Io(#[from] std::io::Error),
}

/// Convenient result alias for recognition operations.
pub type RecognitionResult<T> = Result<T, RecognitionError>;
