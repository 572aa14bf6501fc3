pub mod config;
pub mod model_metadata;
pub mod model_storage;

pub use config::{AppConfig, DatasetSettings, DeviceType, ModelSettings, TrainingSettings};
pub use model_metadata::ModelMetadata;
pub use model_storage::{describe_metadata, load_metadata, load_model_archive, save_model_archive};
