use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use image::{ImageReader, RgbImage};
use tracing::{debug, info, warn};

use crate::annotate::Annotator;
use crate::config::PipelineConfig;
use crate::detection::{Detector, DetectorInput, normalize_detection};
use crate::models::{AnnotatedDetection, ImageRecord, RawDetection};
use crate::recorder::DetectionRecorder;

/// Progress of one image through the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageStage {
    Pending,
    Opened,
    Detected,
    AnnotatedAndSaved,
    Recorded,
}

impl fmt::Display for ImageStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImageStage::Pending => "pending",
            ImageStage::Opened => "opened",
            ImageStage::Detected => "detected",
            ImageStage::AnnotatedAndSaved => "annotated and saved",
            ImageStage::Recorded => "recorded",
        };
        f.write_str(name)
    }
}

/// Why an image produced no output
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("cannot open image: {0}")]
    ImageOpen(String),

    #[error("detector failed: {0}")]
    Detector(String),
}

/// What happened to one image
#[derive(Debug, Clone, PartialEq)]
pub enum ImageOutcome {
    Processed {
        file_name: String,
        output_path: PathBuf,
        detections: Vec<AnnotatedDetection>,
    },
    Skipped {
        file_name: String,
        /// Last stage reached before giving up
        stage: ImageStage,
        reason: SkipReason,
    },
}

impl ImageOutcome {
    pub fn file_name(&self) -> &str {
        match self {
            ImageOutcome::Processed { file_name, .. } | ImageOutcome::Skipped { file_name, .. } => file_name,
        }
    }

    pub fn is_processed(&self) -> bool {
        matches!(self, ImageOutcome::Processed { .. })
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub outcomes: Vec<ImageOutcome>,
    pub results_path: PathBuf,
    pub rows_written: usize,
}

impl RunReport {
    pub fn processed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_processed()).count()
    }

    pub fn skipped(&self) -> usize {
        self.outcomes.len() - self.processed()
    }
}

/// Output locations, created once before any image is processed
#[derive(Debug, Clone)]
pub struct OutputLayout {
    config: PipelineConfig,
}

impl OutputLayout {
    pub fn prepare(config: &PipelineConfig) -> anyhow::Result<Self> {
        std::fs::create_dir_all(&config.output_dir)
            .with_context(|| format!("Failed to create output directory {}", config.output_dir.display()))?;
        Ok(Self {
            config: config.clone(),
        })
    }

    pub fn annotated_path(&self, file_name: &str) -> PathBuf {
        self.config.annotated_path(file_name)
    }

    pub fn results_path(&self) -> PathBuf {
        self.config.results_path()
    }
}

/// Drives every image through open, detect, normalize, annotate, save and
/// record, then writes the results table.
pub struct PipelineDriver {
    config: PipelineConfig,
    annotator: Annotator,
}

impl PipelineDriver {
    pub fn new(config: PipelineConfig, annotator: Annotator) -> Self {
        Self { config, annotator }
    }

    /// Process `records` in order.
    ///
    /// Unreadable images and detector failures skip only that image. Failing
    /// to write an annotated image or the results table aborts the run.
    pub fn run(&self, records: &[ImageRecord], detector: &dyn Detector) -> anyhow::Result<RunReport> {
        let layout = OutputLayout::prepare(&self.config)?;
        let mut recorder = DetectionRecorder::new();
        let mut outcomes = Vec::with_capacity(records.len());

        info!("Running {} over {} images", detector.name(), records.len());

        for record in records {
            let outcome = self.process_image(record, detector, &layout, &mut recorder)?;
            if let ImageOutcome::Skipped { file_name, stage, reason } = &outcome {
                warn!("Skipped {} ({}): {}", file_name, stage, reason);
            }
            outcomes.push(outcome);
        }

        let results_path = layout.results_path();
        let rows_written = recorder.len();
        recorder.flush(&results_path)?;
        info!("Detection results saved to {}", results_path.display());

        Ok(RunReport {
            outcomes,
            results_path,
            rows_written,
        })
    }

    fn process_image(
        &self,
        record: &ImageRecord,
        detector: &dyn Detector,
        layout: &OutputLayout,
        recorder: &mut DetectionRecorder,
    ) -> anyhow::Result<ImageOutcome> {
        let file_name = record.file_name.clone();
        info!("Processing {}...", record.local_path.display());

        let image = match open_rgb(&record.local_path) {
            Ok(image) => image,
            Err(e) => {
                return Ok(ImageOutcome::Skipped {
                    file_name,
                    stage: ImageStage::Pending,
                    reason: SkipReason::ImageOpen(format!("{:#}", e)),
                });
            }
        };
        debug!("{}: {} ({}x{})", file_name, ImageStage::Opened, image.width(), image.height());

        let input = DetectorInput {
            file_name: &record.file_name,
            path: &record.local_path,
            image: &image,
        };
        let raw = match detector.detect(&input) {
            Ok(raw) => raw,
            Err(e) => {
                return Ok(ImageOutcome::Skipped {
                    file_name,
                    stage: ImageStage::Opened,
                    reason: SkipReason::Detector(format!("{:#}", e)),
                });
            }
        };
        info!("Found {} objects in {}.", raw.len(), file_name);

        let detections = keep_usable(&file_name, &raw);
        debug!("{}: {} ({} usable)", file_name, ImageStage::Detected, detections.len());

        let annotated = self.annotator.annotate(&image, &detections);
        let output_path = layout.annotated_path(&file_name);
        save_image(&annotated, &output_path)?;
        debug!("{}: {}", file_name, ImageStage::AnnotatedAndSaved);

        recorder.record(&file_name, &detections);
        debug!("{}: {}", file_name, ImageStage::Recorded);

        Ok(ImageOutcome::Processed {
            file_name,
            output_path,
            detections,
        })
    }
}

/// Normalize in order, dropping detections that cannot be used
pub fn keep_usable(file_name: &str, raw: &[RawDetection]) -> Vec<AnnotatedDetection> {
    raw.iter()
        .enumerate()
        .filter_map(|(idx, det)| match normalize_detection(det) {
            Ok(normalized) => Some(normalized),
            Err(e) => {
                warn!("Dropping detection {} in {}: {}", idx, file_name, e);
                None
            }
        })
        .collect()
}

/// Decode an image file and convert it to 3-channel RGB
pub fn open_rgb(path: &Path) -> anyhow::Result<RgbImage> {
    let image = ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))?;
    Ok(image.to_rgb8())
}

fn save_image(image: &RgbImage, path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    image
        .save(path)
        .with_context(|| format!("Failed to save annotated image {}", path.display()))
}
