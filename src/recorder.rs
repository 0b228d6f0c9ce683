use std::io::Write;
use std::path::Path;

use anyhow::Context;

use crate::models::{AnnotatedDetection, DetectionRow};

/// Column names of the results table
pub const HEADER: [&str; 8] = [
    "image_name",
    "detection_index",
    "label",
    "score",
    "xmin",
    "ymin",
    "xmax",
    "ymax",
];

/// Accumulates one row per kept detection across the whole run.
///
/// Rows are only ever appended. The table is written once, by `flush`,
/// which consumes the recorder.
#[derive(Debug, Default)]
pub struct DetectionRecorder {
    rows: Vec<DetectionRow>,
}

impl DetectionRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows for one image, indexed from zero in detection order
    pub fn record(&mut self, image_name: &str, detections: &[AnnotatedDetection]) {
        self.rows.extend(
            detections
                .iter()
                .enumerate()
                .map(|(idx, det)| DetectionRow::new(image_name, idx, det)),
        );
    }

    pub fn rows(&self) -> &[DetectionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Write header and rows as CSV to any writer
    pub fn write_to<W: Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(HEADER)?;
        for row in &self.rows {
            wtr.write_record(row.to_record())?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Persist the table to `destination`, creating parent directories
    pub fn flush(self, destination: &Path) -> anyhow::Result<()> {
        if let Some(parent) = destination.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        let file = std::fs::File::create(destination)
            .with_context(|| format!("Failed to create results table {}", destination.display()))?;
        self.write_to(file)
            .with_context(|| format!("Failed to write results table {}", destination.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Rectangle;

    fn det(label: &str, score: f64, x: i64) -> AnnotatedDetection {
        AnnotatedDetection::new(Rectangle::new(x, x, x + 10, x + 10), Some(label.into()), Some(score))
    }

    #[test]
    fn test_indices_follow_detection_order() {
        let mut recorder = DetectionRecorder::new();
        recorder.record("a.jpg", &[det("cat", 0.9, 0), det("dog", 0.8, 5), det("cow", 0.7, 9)]);
        recorder.record("b.jpg", &[det("bird", 0.5, 1)]);

        let summary: Vec<(&str, usize, &str)> = recorder
            .rows()
            .iter()
            .map(|r| (r.image_name.as_str(), r.detection_index, r.label.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("a.jpg", 0, "cat"),
                ("a.jpg", 1, "dog"),
                ("a.jpg", 2, "cow"),
                ("b.jpg", 0, "bird"),
            ]
        );
    }

    #[test]
    fn test_empty_detections_add_no_rows() {
        let mut recorder = DetectionRecorder::new();
        recorder.record("a.jpg", &[]);
        assert!(recorder.is_empty());
    }

    #[test]
    fn test_csv_layout() -> anyhow::Result<()> {
        let mut recorder = DetectionRecorder::new();
        recorder.record(
            "cat.jpg",
            &[AnnotatedDetection::new(Rectangle::new(5, 5, 50, 60), Some("cat".into()), Some(0.91))],
        );
        let mut out = Vec::new();
        recorder.write_to(&mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "image_name,detection_index,label,score,xmin,ymin,xmax,ymax\ncat.jpg,0,cat,0.91,5,5,50,60\n"
        );
        Ok(())
    }

    #[test]
    fn test_header_written_without_rows() -> anyhow::Result<()> {
        let mut out = Vec::new();
        DetectionRecorder::new().write_to(&mut out)?;
        assert_eq!(
            String::from_utf8(out)?,
            "image_name,detection_index,label,score,xmin,ymin,xmax,ymax\n"
        );
        Ok(())
    }

    #[test]
    fn test_labels_with_commas_are_quoted() -> anyhow::Result<()> {
        let mut recorder = DetectionRecorder::new();
        recorder.record("a.jpg", &[det("hot dog, plain", 0.5, 0)]);
        let mut out = Vec::new();
        recorder.write_to(&mut out)?;
        assert!(String::from_utf8(out)?.contains("\"hot dog, plain\""));
        Ok(())
    }

    #[test]
    fn test_flush_creates_parent_dirs() -> anyhow::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let path = dir.path().join("nested/out/detections.csv");
        let mut recorder = DetectionRecorder::new();
        recorder.record("a.jpg", &[det("cat", 0.25, 0)]);
        recorder.flush(&path)?;
        let text = std::fs::read_to_string(&path)?;
        assert_eq!(text.lines().count(), 2);
        Ok(())
    }
}
