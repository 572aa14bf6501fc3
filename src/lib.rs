pub mod csv_loader;
pub mod dataset;
pub mod errors;
pub mod evaluation;
pub mod history;
pub mod labels;
pub mod model;
pub mod preprocess;
pub mod recognition;
pub mod shell;
pub mod types;

#[cfg(feature = "ml")]
pub mod ml;

pub use dataset::{class_distribution, DatasetLoader, LoadReport, SignDataset};
pub use errors::{DatasetError, RecognitionError, RecognitionResult};
pub use evaluation::{evaluate, EvaluationReport};
pub use labels::{sign_name, NUM_CLASSES, UNKNOWN_SIGN};
pub use model::AppConfig;
pub use preprocess::{preprocess, ChannelOrder, NormalizedTensor, Preprocessor};
pub use recognition::{argmax, Classifier, RecognitionService};
pub use types::{Recognition, SignClass};
