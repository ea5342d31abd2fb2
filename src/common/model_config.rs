use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::common::inference_device::InferenceDevice;
use crate::common::model_version::ModelVersion;
use crate::data::FsAccess;

/// Google Drive id of the published Woody weights.
pub const WOODY_MODEL_FILE_ID: &str = "1thy-dO8ugVAUpfdrepi662dq3QOvIkMg";
pub const DEFAULT_ARTIFACT_NAME: &str = "best.onnx";
pub const DEFAULT_CONFIDENCE: f32 = 0.25;
pub const DEFAULT_IOU: f32 = 0.7;
pub const DEFAULT_INPUT_SIZE: u32 = 640;
pub const DEFAULT_SESSIONS: usize = 2;

pub fn default_source_url() -> String {
    format!("https://drive.google.com/uc?export=download&confirm=t&id={WOODY_MODEL_FILE_ID}")
}

fn default_weights_path() -> PathBuf {
    FsAccess::Cache.file_or_local(DEFAULT_ARTIFACT_NAME)
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub weights_path: PathBuf,
    pub source_url: String,
    /// Hex encoded SHA-256 of the artifact; skipped when absent.
    pub checksum: Option<String>,
    pub labels_path: Option<PathBuf>,
    pub model_version: ModelVersion,
    pub inference_device: InferenceDevice,
    pub input_size: u32,
    pub iou_threshold: f32,
    pub default_confidence: f32,
    pub font_path: Option<PathBuf>,
    /// Number of ORT sessions shared by concurrent callers.
    pub sessions: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            weights_path: default_weights_path(),
            source_url: default_source_url(),
            checksum: None,
            labels_path: None,
            model_version: ModelVersion::default(),
            inference_device: InferenceDevice::default(),
            input_size: DEFAULT_INPUT_SIZE,
            iou_threshold: DEFAULT_IOU,
            default_confidence: DEFAULT_CONFIDENCE,
            font_path: None,
            sessions: DEFAULT_SESSIONS,
        }
    }
}

impl ModelConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads a JSON config; missing fields keep their defaults.
    pub fn from_json_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ModelConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.input_size == 0 || self.input_size % 32 != 0 {
            anyhow::bail!("input_size must be a positive multiple of 32, got {}", self.input_size);
        }
        if !(0.0..=1.0).contains(&self.iou_threshold) {
            anyhow::bail!("iou_threshold must be within [0, 1], got {}", self.iou_threshold);
        }
        if !(0.0..=1.0).contains(&self.default_confidence) {
            anyhow::bail!("default_confidence must be within [0, 1], got {}", self.default_confidence);
        }
        if self.sessions == 0 {
            anyhow::bail!("sessions must be at least 1");
        }
        Ok(())
    }

    pub fn with_weights_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.weights_path = path.into();
        self
    }

    pub fn with_source_url(mut self, url: &str) -> Self {
        self.source_url = url.to_string();
        self
    }

    pub fn with_checksum(mut self, sha256_hex: &str) -> Self {
        self.checksum = Some(sha256_hex.to_lowercase());
        self
    }

    pub fn with_labels_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.labels_path = Some(path.into());
        self
    }

    pub fn with_model_version(mut self, version: ModelVersion) -> Self {
        self.model_version = version;
        self
    }

    pub fn with_device(mut self, device: InferenceDevice) -> Self {
        self.inference_device = device;
        self
    }

    pub fn with_input_size(mut self, size: u32) -> Self {
        self.input_size = size;
        self
    }

    pub fn with_iou(mut self, iou: f32) -> Self {
        self.iou_threshold = iou;
        self
    }

    pub fn with_font_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.font_path = Some(path.into());
        self
    }

    pub fn with_sessions(mut self, sessions: usize) -> Self {
        self.sessions = sessions;
        self
    }
}

impl std::fmt::Display for ModelConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let labels = match &self.labels_path {
            Some(path) => path.display().to_string(),
            None => "<built-in>".to_string(),
        };
        writeln!(f, "Weights File Path: {}", self.weights_path.display())?;
        writeln!(f, "Source: {}", self.source_url)?;
        writeln!(f, "Labels Path: {labels}")?;
        writeln!(f, "Inference Device: {}", self.inference_device)?;
        writeln!(f, "Model Version: {}", self.model_version.name())?;
        writeln!(f, "Model Input Resolution: {}x{}", self.input_size, self.input_size)?;
        writeln!(f, "Sessions: {}", self.sessions)?;
        write!(f, "IoU Threshold: {}", self.iou_threshold)
    }
}
