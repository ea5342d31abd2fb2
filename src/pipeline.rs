//! Image in, annotated image and labelled detections out.

use std::sync::Arc;
use std::time::Instant;

use image::RgbImage;

use crate::annotation::Annotator;
use crate::common::{ClassLabelTable, Detection, DetectionSet, ModelConfig};
use crate::detection_runners::OrtLoader;
use crate::error::{InferenceError, LoadError};
use crate::model_cache::{ModelCache, ModelHandle};
use crate::provisioning::ModelProvisioner;

#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    cache: Arc<ModelCache>,
    labels: ClassLabelTable,
    annotator: Annotator,
}

impl DetectionPipeline {
    pub fn new(cache: Arc<ModelCache>, labels: ClassLabelTable, annotator: Annotator) -> Self {
        Self {
            cache,
            labels,
            annotator,
        }
    }

    /// Wires the default provisioner, the ONNX loader and the annotator from `config`.
    ///
    /// Nothing is downloaded or loaded here; that happens on the first
    /// [`get_model`](Self::get_model) or [`detect`](Self::detect).
    pub fn from_config(config: &ModelConfig) -> Result<Self, LoadError> {
        let labels = match &config.labels_path {
            Some(path) => ClassLabelTable::from_file(path)?,
            None => ClassLabelTable::default(),
        };

        let annotator = match &config.font_path {
            Some(path) => Annotator::without_font().with_font_file(path).unwrap_or_else(|err| {
                log::warn!("Cannot use font {}: {err}", path.display());
                Annotator::new()
            }),
            None => Annotator::new(),
        };

        let provisioner = ModelProvisioner::new(&config.source_url).with_checksum(config.checksum.clone());
        let loader = OrtLoader::new(config.clone(), labels.clone());
        let cache = ModelCache::new(provisioner, Arc::new(loader), &config.weights_path);

        Ok(Self::new(Arc::new(cache), labels, annotator))
    }

    /// Warms the model cache.
    pub fn get_model(&self) -> Result<ModelHandle, LoadError> {
        self.cache.get_model()
    }

    pub fn cache(&self) -> &Arc<ModelCache> {
        &self.cache
    }

    pub fn labels(&self) -> &ClassLabelTable {
        &self.labels
    }

    pub fn annotator(&self) -> &Annotator {
        &self.annotator
    }

    /// Runs the model over `image` and draws the result.
    ///
    /// Detections keep the detector's order and are labelled through the
    /// label table, with `Class {index}` for unknown indices.
    pub fn detect(&self, image: &RgbImage, threshold: f32) -> Result<(RgbImage, DetectionSet), InferenceError> {
        let threshold = checked_threshold(threshold)?;
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return Err(InferenceError::InvalidImage { width, height });
        }

        let model = self.cache.get_model()?;

        let now = Instant::now();
        let raw = model.detect(image, threshold)?;
        let detections: Vec<Detection> = raw
            .iter()
            .map(|r| Detection::from_raw(r, &self.labels))
            .collect();
        log::info!(
            "{} detections at threshold {threshold:.2} on {width}x{height} in {:?}",
            detections.len(),
            now.elapsed()
        );

        let annotated = self.annotator.render(image, &detections);
        Ok((annotated, DetectionSet::new(detections)))
    }
}

/// Rejects NaN and clamps anything else into `[0, 1]`.
pub fn checked_threshold(threshold: f32) -> Result<f32, InferenceError> {
    if threshold.is_nan() {
        return Err(InferenceError::InvalidThreshold(threshold));
    }
    let clamped = threshold.clamp(0.0, 1.0);
    if clamped != threshold {
        log::warn!("Confidence threshold {threshold} clamped to {clamped}");
    }
    Ok(clamped)
}
