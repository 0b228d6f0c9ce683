use std::collections::HashMap;
use std::path::Path;

use detlabel::{Detector, DetectorInput, ImageRecord, PipelineConfig, RawDetection};
use image::{ImageBuffer, Rgb};
use serde_json::Value;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const RED: Rgb<u8> = Rgb([255, 0, 0]);

/// Writes a white PNG of the given size into `dir` and returns its record.
pub fn write_test_image(dir: &Path, file_name: &str, width: u32, height: u32) -> ImageRecord {
    let img = ImageBuffer::from_pixel(width, height, WHITE);
    let path = dir.join(file_name);
    img.save_with_format(&path, image::ImageFormat::Png)
        .expect("Failed to save test image");
    ImageRecord::new(file_name, path)
}

/// Writes bytes that no decoder accepts.
pub fn write_corrupt_image(dir: &Path, file_name: &str) -> ImageRecord {
    let path = dir.join(file_name);
    std::fs::write(&path, b"definitely not an image").expect("Failed to write corrupt image");
    ImageRecord::new(file_name, path)
}

/// Config writing everything under `output_dir`
pub fn test_config(output_dir: &Path) -> PipelineConfig {
    PipelineConfig::default().with_output_dir(output_dir)
}

pub fn raw(value: Value) -> RawDetection {
    RawDetection::from_value(value).expect("detection fixture must be a JSON object")
}

/// Detector returning canned detections per file name, or failing for
/// names listed in `failing`.
#[derive(Default)]
pub struct ScriptedDetector {
    pub responses: HashMap<String, Vec<RawDetection>>,
    pub failing: Vec<String>,
}

impl ScriptedDetector {
    pub fn with(mut self, file_name: &str, detections: Vec<Value>) -> Self {
        self.responses
            .insert(file_name.to_string(), detections.into_iter().map(raw).collect());
        self
    }

    pub fn failing_on(mut self, file_name: &str) -> Self {
        self.failing.push(file_name.to_string());
        self
    }
}

impl Detector for ScriptedDetector {
    fn detect(&self, input: &DetectorInput<'_>) -> anyhow::Result<Vec<RawDetection>> {
        if self.failing.iter().any(|name| name == input.file_name) {
            anyhow::bail!("model crashed on {}", input.file_name);
        }
        Ok(self.responses.get(input.file_name).cloned().unwrap_or_default())
    }

    fn name(&self) -> &str {
        "Scripted Detector"
    }
}

/// Reads the results table as rows of strings, header included.
pub fn read_table(path: &Path) -> Vec<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .from_path(path)
        .expect("Failed to open results table");
    reader
        .records()
        .map(|r| r.expect("bad csv row").iter().map(str::to_string).collect())
        .collect()
}
