use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::annotate::{DEFAULT_FONT_SCALE, DEFAULT_THICKNESS};

/// Settings for one pipeline run.
///
/// Loaded from a JSON file when one is given; missing fields keep their
/// defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Annotated images and the results table go here
    pub output_dir: PathBuf,
    /// Downloaded dataset images go here
    pub image_dir: PathBuf,
    pub output_prefix: String,
    pub results_file: String,
    /// Number of dataset entries to process
    pub sample_limit: usize,
    pub font_path: Option<PathBuf>,
    pub font_scale: f32,
    pub box_thickness: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("detection_output"),
            image_dir: PathBuf::from("images"),
            output_prefix: "detected_".to_string(),
            results_file: "detections.csv".to_string(),
            sample_limit: 1000,
            font_path: None,
            font_scale: DEFAULT_FONT_SCALE,
            box_thickness: DEFAULT_THICKNESS,
        }
    }
}

impl PipelineConfig {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&text).with_context(|| format!("Invalid config {}", path.display()))
    }

    pub fn with_output_dir(mut self, output_dir: impl Into<PathBuf>) -> Self {
        self.output_dir = output_dir.into();
        self
    }

    /// Where the annotated copy of `file_name` is saved.
    ///
    /// Root, `.` and `..` components are dropped so the result always stays
    /// under `output_dir`.
    pub fn annotated_path(&self, file_name: &str) -> PathBuf {
        let relative: Vec<&str> = Path::new(file_name)
            .components()
            .filter_map(|c| match c {
                Component::Normal(part) => part.to_str(),
                _ => None,
            })
            .collect();
        self.output_dir.join(format!("{}{}", self.output_prefix, relative.join("/")))
    }

    pub fn results_path(&self) -> PathBuf {
        self.output_dir.join(&self.results_file)
    }
}
