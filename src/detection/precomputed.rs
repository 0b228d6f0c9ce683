use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde_json::Value;

use super::{Detector, DetectorInput, parse_detections};
use crate::models::RawDetection;

/// Serves detections produced ahead of time by an external model.
///
/// The source file is a JSON object mapping image file names to arrays of
/// raw detections. Images missing from the file have no detections.
#[derive(Debug, Default)]
pub struct PrecomputedDetector {
    by_file: HashMap<String, Vec<RawDetection>>,
}

impl PrecomputedDetector {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read detections file {}", path.display()))?;
        Self::from_json_str(&text)
            .with_context(|| format!("Invalid detections file {}", path.display()))
    }

    pub fn from_json_str(text: &str) -> anyhow::Result<Self> {
        let Value::Object(map) = serde_json::from_str::<Value>(text)? else {
            anyhow::bail!("expected a JSON object keyed by file name");
        };

        let mut by_file = HashMap::with_capacity(map.len());
        for (file_name, detections) in map {
            let parsed = parse_detections(detections)
                .with_context(|| format!("Bad detections for {}", file_name))?;
            by_file.insert(file_name, parsed);
        }
        Ok(Self { by_file })
    }

    pub fn len(&self) -> usize {
        self.by_file.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_file.is_empty()
    }
}

impl Detector for PrecomputedDetector {
    fn detect(&self, input: &DetectorInput<'_>) -> anyhow::Result<Vec<RawDetection>> {
        Ok(self.by_file.get(input.file_name).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "Precomputed Detections"
    }
}
