use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::common::{ClassLabelTable, DetectionBox};

/// One prediction as the detector reports it, before label resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawDetection {
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: DetectionBox,
}

impl RawDetection {
    pub fn new(class_id: usize, confidence: f32, bbox: DetectionBox) -> Self {
        Self {
            class_id,
            confidence,
            bbox,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    pub class_id: usize,
    pub confidence: f32,
    pub bbox: DetectionBox,
}

impl Detection {
    /// Labels a raw detection through `labels`, falling back to `Class {index}`.
    pub fn from_raw(raw: &RawDetection, labels: &ClassLabelTable) -> Self {
        Self {
            label: labels.resolve(raw.class_id),
            class_id: raw.class_id,
            confidence: raw.confidence,
            bbox: raw.bbox,
        }
    }

    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.label, self.confidence)
    }
}

/// Detections of one image in the detector's output order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DetectionSet {
    detections: Vec<Detection>,
}

/// Aggregate figures shown next to an annotated image.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub count: usize,
    pub mean_confidence: Option<f32>,
    pub per_label: BTreeMap<String, usize>,
}

impl DetectionSet {
    pub fn new(detections: Vec<Detection>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.detections.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.detections
    }

    pub fn into_vec(self) -> Vec<Detection> {
        self.detections
    }

    pub fn summary(&self) -> DetectionSummary {
        let mut per_label = BTreeMap::new();
        for det in &self.detections {
            *per_label.entry(det.label.clone()).or_insert(0) += 1;
        }

        let mean_confidence = if self.detections.is_empty() {
            None
        } else {
            let total: f32 = self.detections.iter().map(|d| d.confidence).sum();
            Some(total / self.detections.len() as f32)
        };

        DetectionSummary {
            count: self.detections.len(),
            mean_confidence,
            per_label,
        }
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.iter()
    }
}

impl IntoIterator for DetectionSet {
    type Item = Detection;
    type IntoIter = std::vec::IntoIter<Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.detections.into_iter()
    }
}
