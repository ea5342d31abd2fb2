use std::path::Path;
use std::sync::Arc;

use crate::error::LoadError;
use crate::utils;

/// Labels of the Woody furniture / wood-type detector, in class-index order.
pub const WOODY_LABELS: [&str; 13] = [
    "Chair",
    "Liquor stand",
    "chair",
    "chair 3",
    "chair1",
    "chair2",
    "coaster",
    "counter",
    "non",
    "table",
    "wood",
    "woodCoaster",
    "table 2",
];

/// Maps a detector class index to a human readable label.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassLabelTable {
    labels: Arc<[String]>,
}

impl Default for ClassLabelTable {
    fn default() -> Self {
        Self::from_labels(WOODY_LABELS)
    }
}

impl ClassLabelTable {
    pub fn from_labels<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
        }
    }

    /// Reads one label per line, skipping blank lines.
    pub fn from_file(path: &Path) -> Result<Self, LoadError> {
        let lines = utils::file_to_vec(path).map_err(|e| LoadError::Labels {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let labels: Vec<String> = lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        if labels.is_empty() {
            return Err(LoadError::Labels {
                path: path.to_path_buf(),
                reason: "no labels found".to_string(),
            });
        }
        Ok(Self::from_labels(labels))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&str> {
        self.labels.get(index).map(String::as_str)
    }

    /// Label for `index`, or `Class {index}` when the detector reports an
    /// index past the end of the table.
    pub fn resolve(&self, index: usize) -> String {
        match self.get(index) {
            Some(label) => label.to_string(),
            None => format!("Class {index}"),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
