//! Error taxonomy for artifact provisioning, model loading and inference.

use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

/// Failure of the transport that brings a model artifact onto local disk.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("I/O error while fetching: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

/// The model artifact could not be made available at its expected path.
#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("failed to fetch model artifact from {source_url}: {error}")]
    Fetch {
        source_url: String,
        #[source]
        error: FetchError,
    },

    #[error("I/O error on {path}: {error}")]
    Io {
        path: PathBuf,
        #[source]
        error: std::io::Error,
    },

    #[error("fetched model artifact for {0} is empty")]
    EmptyArtifact(PathBuf),

    #[error("fetched model artifact for {path} is {kind}, not an ONNX graph")]
    UnexpectedPayload { path: PathBuf, kind: &'static str },

    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl ProvisionError {
    pub(crate) fn io(path: impl Into<PathBuf>, error: std::io::Error) -> Self {
        ProvisionError::Io {
            path: path.into(),
            error,
        }
    }
}

/// The model could not be brought into a usable in-memory state.
///
/// Cloneable so that every caller waiting on the same initialisation attempt
/// receives the same failure.
#[derive(Error, Debug, Clone)]
pub enum LoadError {
    #[error("model artifact unavailable: {0}")]
    Provision(Arc<ProvisionError>),

    #[error("model artifact at {path} is not a usable detector: {reason}")]
    InvalidModel { path: PathBuf, reason: String },

    #[error("failed to read class labels from {path}: {reason}")]
    Labels { path: PathBuf, reason: String },

    #[error("model initialisation panicked")]
    Panicked,
}

impl From<ProvisionError> for LoadError {
    fn from(err: ProvisionError) -> Self {
        LoadError::Provision(Arc::new(err))
    }
}

impl LoadError {
    pub fn invalid(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        LoadError::InvalidModel {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True when another download attempt could change the outcome.
    pub fn is_provisioning(&self) -> bool {
        matches!(self, LoadError::Provision(_))
    }
}

/// A detection request failed.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("confidence threshold must be a number, got {0}")]
    InvalidThreshold(f32),

    #[error("image has no pixels ({width}x{height})")]
    InvalidImage { width: u32, height: u32 },

    #[error("preprocessing failed: {0}")]
    Preprocess(String),

    #[error("detector runtime failure: {0}")]
    Runtime(String),

    #[error("unexpected detector output: {0}")]
    Output(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provision_failure_converts_into_load_error() {
        let err: LoadError = ProvisionError::EmptyArtifact(PathBuf::from("best.onnx")).into();
        assert!(err.is_provisioning());
        assert!(err.to_string().contains("best.onnx"));
    }

    #[test]
    fn load_error_is_transparent_inside_inference_error() {
        let load = LoadError::invalid("best.onnx", "not an onnx graph");
        let inference: InferenceError = load.clone().into();
        assert_eq!(inference.to_string(), load.to_string());
        assert!(!load.is_provisioning());
    }
}
