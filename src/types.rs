use serde::{Deserialize, Serialize};

use crate::labels;

/// Road sign class id (0..=42 for valid model output)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SignClass(pub usize);

impl SignClass {
    pub fn id(self) -> usize {
        self.0
    }

    /// Display name from the label table
    pub fn name(self) -> &'static str {
        labels::sign_name(self.0)
    }
}

impl std::fmt::Display for SignClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.0)
    }
}

/// Successful recognition of one image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    pub class: SignClass,
    pub name: String,
    /// Probability the classifier assigned to `class`
    pub confidence: f32,
}

/// One labeled, preprocessed dataset image
#[derive(Debug, Clone)]
pub struct SignSample {
    /// Normalized HWC pixels, 30 * 30 * 3 floats
    pub pixels: Vec<f32>,
    pub label: usize,
}
