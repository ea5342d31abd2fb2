mod utils;
pub mod annotation;
pub mod common;
pub mod data;
pub mod detection_runners;
pub mod error;
pub mod model_cache;
pub mod pipeline;
pub mod provisioning;

pub use annotation::Annotator;
pub use common::{ClassLabelTable, Detection, DetectionBox, DetectionSet, DetectionSummary, ModelConfig, RawDetection};
pub use detection_runners::{Detector, OrtLoader, OrtYolo};
pub use error::{FetchError, InferenceError, LoadError, ProvisionError};
pub use model_cache::{ModelCache, ModelHandle, ModelLoader};
pub use pipeline::DetectionPipeline;
pub use provisioning::{ArtifactFetcher, HttpFetcher, ModelProvisioner};

pub type Result<T, E = InferenceError> = std::result::Result<T, E>;
