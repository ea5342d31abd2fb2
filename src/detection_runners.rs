pub mod inference_process;
pub mod ort_detector;

use image::RgbImage;

use crate::common::RawDetection;
use crate::error::InferenceError;

pub use inference_process::InferenceProcess;
pub use ort_detector::*;

/// A loaded model that turns an image into raw predictions.
///
/// Every returned detection has `confidence >= threshold` and a box in the
/// pixel space of `image`. Implementations are shared between threads through
/// the model cache, so `detect` takes `&self`.
pub trait Detector: Send + Sync {
    fn detect(&self, image: &RgbImage, threshold: f32) -> Result<Vec<RawDetection>, InferenceError>;

    /// Short description used in logs.
    fn name(&self) -> String {
        "detector".to_string()
    }
}
