#![allow(dead_code)]

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use image::RgbImage;
use parking_lot::Mutex;

use woody_detect::{
    ArtifactFetcher, DetectionBox, Detector, FetchError, InferenceError, LoadError, ModelHandle, ModelLoader,
    RawDetection,
};

/// Returns a fixed list of predictions, filtered by the threshold.
pub struct FixedDetector {
    pub predictions: Vec<RawDetection>,
    pub thresholds: Mutex<Vec<f32>>,
}

impl FixedDetector {
    pub fn new(predictions: Vec<RawDetection>) -> Self {
        Self {
            predictions,
            thresholds: Mutex::new(Vec::new()),
        }
    }
}

impl Detector for FixedDetector {
    fn detect(&self, _image: &RgbImage, threshold: f32) -> Result<Vec<RawDetection>, InferenceError> {
        self.thresholds.lock().push(threshold);
        Ok(self
            .predictions
            .iter()
            .filter(|p| p.confidence >= threshold)
            .copied()
            .collect())
    }
}

pub fn raw(class_id: usize, confidence: f32, bbox: (f32, f32, f32, f32)) -> RawDetection {
    RawDetection::new(class_id, confidence, DetectionBox::new(bbox.0, bbox.1, bbox.2, bbox.3))
}

/// Hands out one shared detector, optionally failing the first `failures` loads.
pub struct StubLoader {
    pub handle: ModelHandle,
    pub calls: AtomicUsize,
    pub failures: usize,
    pub delay: Duration,
}

impl StubLoader {
    pub fn new(detector: impl Detector + 'static) -> Self {
        Self {
            handle: Arc::new(detector),
            calls: AtomicUsize::new(0),
            failures: 0,
            delay: Duration::ZERO,
        }
    }

    pub fn failing_first(mut self, failures: usize) -> Self {
        self.failures = failures;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ModelLoader for StubLoader {
    fn load(&self, path: &Path) -> Result<ModelHandle, LoadError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        if call < self.failures {
            return Err(LoadError::invalid(path, "corrupt graph"));
        }
        Ok(self.handle.clone())
    }
}

/// Writes a payload, or fails, counting every call.
pub struct StubFetcher {
    pub payload: Option<Vec<u8>>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn serving(payload: &[u8]) -> Self {
        Self {
            payload: Some(payload.to_vec()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn offline() -> Self {
        Self {
            payload: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl ArtifactFetcher for StubFetcher {
    fn fetch(&self, source: &str, dest: &Path) -> Result<(), FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.payload {
            Some(bytes) => {
                fs::write(dest, bytes)?;
                Ok(())
            }
            None => {
                // leave a partial file behind, like an interrupted download
                fs::write(dest, b"partial")?;
                Err(FetchError::Status {
                    url: source.to_string(),
                    status: 503,
                })
            }
        }
    }
}
