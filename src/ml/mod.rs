pub mod augment;
pub mod inference;
pub mod ml_model;
pub mod schedule;
pub mod training;

pub use augment::{augment, AugmentConfig};
pub use inference::{load_classifier, BurnClassifier, CpuBackend, GpuBackend};
pub use ml_model::{ModelConfig, SignClassifier};
pub use schedule::InverseTimeDecay;
pub use training::{model_to_bytes, persist, train, train_model, SignBatch, SignBatcher, TrainingOutcome};
