use std::path::Path;
use std::sync::Arc;

use image::RgbImage;
use ndarray::{s, ArrayD, ArrayView2, Axis, Ix2, IxDyn};
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::TensorRef;
use rayon::prelude::*;
use regex::Regex;

use crate::common::{
    BoxType, ClassLabelTable, ClssType, DetectionBox, InferenceDevice, ModelConfig, ModelVersion, RawDetection,
    YoloPreds,
};
use crate::data::CROSS_MARK;
use crate::detection_runners::ort_detector::image_ops::{self, Letterboxed};
use crate::detection_runners::ort_detector::nms::{nms, sort_by_confidence};
use crate::detection_runners::ort_detector::session_pool::SessionPool;
use crate::detection_runners::{Detector, InferenceProcess};
use crate::error::{InferenceError, LoadError};
use crate::model_cache::{ModelHandle, ModelLoader};

/// YOLO detector running on a small pool of ONNX Runtime sessions.
pub struct OrtYolo {
    sessions: SessionPool<Session>,
    input_name: String,
    output_name: String,
    input_size: u32,
    iou: f32,
    layout: YoloPreds,
    version: ModelVersion,
    device: InferenceDevice,
    names: Option<Vec<String>>,
}

impl std::fmt::Debug for OrtYolo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrtYolo")
            .field("input", &self.input_name)
            .field("output", &self.output_name)
            .field("input_size", &self.input_size)
            .field("version", &self.version)
            .field("device", &self.device)
            .field("sessions", &self.sessions.size())
            .finish_non_exhaustive()
    }
}

impl OrtYolo {
    /// Builds `config.sessions` ONNX Runtime sessions over the YOLO export at `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Local path of the `.onnx` artifact.
    /// * `config` - Input size, IoU threshold, YOLO version and execution device.
    ///
    /// # Returns
    ///
    /// * `Result<Self, LoadError>` - `LoadError::InvalidModel` when the file is
    ///   not a usable ONNX graph.
    pub fn load(path: &Path, config: &ModelConfig) -> Result<Self, LoadError> {
        let invalid = |reason: String| LoadError::invalid(path, reason);

        let (device, session) = Self::build_session(path, config.inference_device)?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| invalid("model has no inputs".to_string()))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| invalid("model has no outputs".to_string()))?;

        let names = Self::fetch_names(&session);

        let mut sessions = Vec::with_capacity(config.sessions.max(1));
        sessions.push(session);
        while sessions.len() < config.sessions {
            let (_, session) = Self::build_session(path, device)?;
            sessions.push(session);
        }
        let sessions = SessionPool::new(sessions).ok_or_else(|| invalid("no sessions".to_string()))?;

        log::info!(
            "Backend: ONNXRuntime | Version: {} | Device: {} | Sessions: {} | Input: {}x{} | Classes in metadata: {}",
            config.model_version.name(),
            device,
            sessions.size(),
            config.input_size,
            config.input_size,
            names.as_ref().map(|n| n.len().to_string()).unwrap_or_else(|| "-".to_string()),
        );

        Ok(Self {
            sessions,
            input_name,
            output_name,
            input_size: config.input_size,
            iou: config.iou_threshold,
            layout: config.model_version.layout(),
            version: config.model_version,
            device,
            names,
        })
    }

    /// One session on `device`, or on the CPU when that provider is missing.
    fn build_session(path: &Path, device: InferenceDevice) -> Result<(InferenceDevice, Session), LoadError> {
        let invalid = |reason: String| LoadError::invalid(path, reason);

        let (device, providers) = Self::execution_providers(device);
        let session = Session::builder()
            .map_err(|e| invalid(e.to_string()))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| invalid(e.to_string()))?
            .with_execution_providers(providers)
            .map_err(|e| invalid(e.to_string()))?
            .commit_from_file(path)
            .map_err(|e| invalid(e.to_string()))?;
        Ok((device, session))
    }

    /// Picks the execution provider for `device`, falling back to the CPU
    /// when it is not available in this ONNX Runtime build.
    fn execution_providers(device: InferenceDevice) -> (InferenceDevice, Vec<ExecutionProviderDispatch>) {
        fn available(ep: &impl ExecutionProvider) -> bool {
            ep.is_available().unwrap_or(false)
        }

        match device {
            InferenceDevice::CUDA(device_id) => {
                let ep = CUDAExecutionProvider::default().with_device_id(device_id as i32);
                if available(&ep) {
                    return (device, vec![ep.build()]);
                }
                log::warn!("{CROSS_MARK} CUDA execution provider not available, Using cpu");
            }
            InferenceDevice::CoreML => {
                let ep = CoreMLExecutionProvider::default().with_subgraphs(false);
                if available(&ep) {
                    return (device, vec![ep.build()]);
                }
                log::warn!("{CROSS_MARK} CoreML execution provider not available, Using cpu");
            }
            InferenceDevice::CPU => {}
        }
        (InferenceDevice::CPU, vec![CPUExecutionProvider::default().build()])
    }

    /// Class names from the ONNX metadata.
    ///
    /// String format: `{0: 'person', 1: 'bicycle', 2: 'sports ball', ..., 27: "yellow_lady's_slipper"}`
    fn fetch_names(session: &Session) -> Option<Vec<String>> {
        let raw = session.metadata().ok()?.custom("names").ok()??;
        Some(parse_names(&raw))
    }

    pub fn names(&self) -> Option<&[String]> {
        self.names.as_deref()
    }

    pub fn version(&self) -> ModelVersion {
        self.version
    }

    pub fn device(&self) -> InferenceDevice {
        self.device
    }

    pub fn input_size(&self) -> u32 {
        self.input_size
    }
}

fn runtime_err(e: impl std::fmt::Display) -> InferenceError {
    InferenceError::Runtime(e.to_string())
}

pub(crate) fn parse_names(raw: &str) -> Vec<String> {
    let Ok(re) = Regex::new(r#"(['"])([-()\w '"]+)(['"])"#) else {
        return Vec::new();
    };
    re.captures_iter(raw)
        .map(|c| c.extract())
        .map(|(_, [_, name, _])| name.to_string())
        .collect()
}

impl InferenceProcess for OrtYolo {
    type Input = RgbImage;
    type Prepared = Letterboxed;
    type Raw = ArrayD<f32>;
    type Output = Vec<RawDetection>;

    fn preprocess(&self, x: &RgbImage) -> Result<Letterboxed, InferenceError> {
        image_ops::letterbox(x, self.input_size)
    }

    fn inference(&self, x: &Letterboxed) -> Result<ArrayD<f32>, InferenceError> {
        let input = TensorRef::from_array_view(&x.tensor).map_err(runtime_err)?;
        let mut session = self.sessions.acquire();
        let outputs = session
            .run(ort::inputs![self.input_name.as_str() => input])
            .map_err(runtime_err)?;

        let output = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| InferenceError::Output(format!("output '{}' not found", self.output_name)))?;
        let (shape, data) = output.try_extract_tensor::<f32>().map_err(runtime_err)?;
        let shape: Vec<usize> = shape.iter().map(|&d| d as usize).collect();
        let ys = ArrayD::from_shape_vec(IxDyn(&shape), data.to_vec())
            .map_err(|e| InferenceError::Output(e.to_string()))?;
        Ok(ys)
    }

    fn postprocess(&self, ys: ArrayD<f32>, x: &Letterboxed, thresh: f32) -> Result<Vec<RawDetection>, InferenceError> {
        if ys.ndim() != 3 || ys.shape()[0] != 1 {
            return Err(InferenceError::Output(format!("expected a [1, _, _] tensor, got {:?}", ys.shape())));
        }
        let preds = ys
            .index_axis(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|e| InferenceError::Output(e.to_string()))?;

        let decoder = Decoder {
            layout: self.layout,
            ratio: x.ratio,
            image_width: x.image_width as f32,
            image_height: x.image_height as f32,
            iou: self.iou,
        };
        decoder.decode(preds, thresh)
    }
}

impl Detector for OrtYolo {
    fn detect(&self, image: &RgbImage, threshold: f32) -> Result<Vec<RawDetection>, InferenceError> {
        self.run(image, threshold)
    }

    fn name(&self) -> String {
        format!("{} ({})", self.version.name(), self.device)
    }
}

/// Turns one image's prediction matrix into detections in image space.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Decoder {
    pub layout: YoloPreds,
    pub ratio: f32,
    pub image_width: f32,
    pub image_height: f32,
    pub iou: f32,
}

impl Decoder {
    /// Number of classes implied by the width of a prediction row.
    fn class_count(&self, preds: &ArrayView2<f32>) -> Option<usize> {
        let values = if self.layout.anchors_first { preds.ncols() } else { preds.nrows() };
        match self.layout.clss {
            ClssType::Clss => values.checked_sub(4),
            ClssType::ConfClss => values.checked_sub(5),
            ClssType::ConfCls => Some(0),
        }
    }

    pub fn decode(&self, preds: ArrayView2<f32>, thresh: f32) -> Result<Vec<RawDetection>, InferenceError> {
        let nc = self
            .class_count(&preds)
            .filter(|&nc| self.layout.clss == ClssType::ConfCls || nc > 0)
            .ok_or_else(|| InferenceError::Output(format!("prediction matrix {:?} too narrow", preds.dim())))?;
        let parsed = self
            .layout
            .parse_preds(preds, nc)
            .ok_or_else(|| InferenceError::Output(format!("prediction matrix {:?} too narrow", preds.dim())))?;

        let mut detections: Vec<RawDetection> = parsed
            .bboxes
            .axis_iter(Axis(0))
            .into_par_iter()
            .enumerate()
            .filter_map(|(i, bbox)| {
                // confidence & class_id
                let (class_id, confidence) = match &parsed.ids {
                    Some(ids) => (ids[[i, 0]].max(0.) as usize, parsed.clss[[i, 0]]),
                    None => {
                        let (class_id, &confidence) = parsed
                            .clss
                            .slice(s![i, ..])
                            .into_iter()
                            .enumerate()
                            .max_by(|a, b| a.1.total_cmp(b.1))?;

                        match &parsed.confs {
                            None => (class_id, confidence),
                            Some(confs) => (class_id, confidence * confs[[i, 0]]),
                        }
                    }
                };

                // filtering low scores
                if confidence.is_nan() || confidence < thresh {
                    return None;
                }

                let bbox = match self.layout.bbox {
                    BoxType::Cxcywh => DetectionBox::from_cxcy_wh(bbox[0], bbox[1], bbox[2], bbox[3]),
                    BoxType::Xyxy => DetectionBox::new(bbox[0], bbox[1], bbox[2], bbox[3]),
                };
                let bbox = bbox
                    .scale(1.0 / self.ratio)
                    .clip(self.image_width, self.image_height);
                if bbox.area() <= 0. {
                    return None;
                }

                Some(RawDetection::new(class_id, confidence.min(1.0), bbox))
            })
            .collect();

        if self.layout.apply_nms {
            nms(&mut detections, self.iou);
        } else {
            sort_by_confidence(&mut detections);
        }
        Ok(detections)
    }
}

/// Loads [`OrtYolo`] detectors for the model cache.
#[derive(Debug, Clone)]
pub struct OrtLoader {
    config: ModelConfig,
    labels: ClassLabelTable,
}

impl OrtLoader {
    pub fn new(config: ModelConfig, labels: ClassLabelTable) -> Self {
        Self { config, labels }
    }
}

impl ModelLoader for OrtLoader {
    fn load(&self, path: &Path) -> Result<ModelHandle, LoadError> {
        let yolo = OrtYolo::load(path, &self.config)?;
        if let Some(names) = yolo.names() {
            if names.len() != self.labels.len() {
                log::warn!(
                    "Model metadata lists {} classes but the label table has {}",
                    names.len(),
                    self.labels.len()
                );
            }
        }
        Ok(Arc::new(yolo))
    }
}
