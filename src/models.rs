use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Label used when a detector omits one.
pub const DEFAULT_LABEL: &str = "object";

/// Score used when a detector omits one.
pub const DEFAULT_SCORE: f64 = 0.0;

/// One detection exactly as an external detector produced it.
///
/// The shape is not fixed: the box may live under `box` or `bbox` and may be
/// a keyed mapping or a 4-element sequence. Nothing is validated until
/// normalization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawDetection(pub Map<String, Value>);

impl RawDetection {
    /// Wrap a JSON value, returning `None` unless it is an object
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for RawDetection {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Axis-aligned box in pixel space.
///
/// Coordinates are kept in the order the detector reported them; no
/// `xmin <= xmax` ordering is guaranteed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rectangle {
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

impl Rectangle {
    pub fn new(xmin: i64, ymin: i64, xmax: i64, ymax: i64) -> Self {
        Self { xmin, ymin, xmax, ymax }
    }

    pub fn from_array([xmin, ymin, xmax, ymax]: [i64; 4]) -> Self {
        Self::new(xmin, ymin, xmax, ymax)
    }

    /// Corners reordered so the first is top-left and the second bottom-right
    pub fn ordered(&self) -> ((i64, i64), (i64, i64)) {
        (
            (self.xmin.min(self.xmax), self.ymin.min(self.ymax)),
            (self.xmin.max(self.xmax), self.ymin.max(self.ymax)),
        )
    }
}

/// A normalized detection, ready to draw and record.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedDetection {
    pub rect: Rectangle,
    pub label: String,
    pub score: f64,
}

impl AnnotatedDetection {
    /// Build a detection, applying the label and score defaults
    pub fn new(rect: Rectangle, label: Option<String>, score: Option<f64>) -> Self {
        Self {
            rect,
            label: label.unwrap_or_else(|| DEFAULT_LABEL.to_string()),
            score: score.unwrap_or(DEFAULT_SCORE),
        }
    }

    /// Text drawn next to the box, e.g. `cat: 0.91`
    pub fn caption(&self) -> String {
        format!("{}: {:.2}", self.label, self.score)
    }
}

/// One line of the results table.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionRow {
    pub image_name: String,
    pub detection_index: usize,
    pub label: String,
    pub score: f64,
    pub xmin: i64,
    pub ymin: i64,
    pub xmax: i64,
    pub ymax: i64,
}

impl DetectionRow {
    pub fn new(image_name: &str, detection_index: usize, detection: &AnnotatedDetection) -> Self {
        let Rectangle { xmin, ymin, xmax, ymax } = detection.rect;
        Self {
            image_name: image_name.to_string(),
            detection_index,
            label: detection.label.clone(),
            score: detection.score,
            xmin,
            ymin,
            xmax,
            ymax,
        }
    }

    /// Fields in results-table column order
    pub fn to_record(&self) -> [String; 8] {
        [
            self.image_name.clone(),
            self.detection_index.to_string(),
            self.label.clone(),
            self.score.to_string(),
            self.xmin.to_string(),
            self.ymin.to_string(),
            self.xmax.to_string(),
            self.ymax.to_string(),
        ]
    }
}

/// A dataset image that has been retrieved to local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRecord {
    pub file_name: String,
    pub local_path: PathBuf,
}

impl ImageRecord {
    pub fn new(file_name: impl Into<String>, local_path: impl Into<PathBuf>) -> Self {
        Self {
            file_name: file_name.into(),
            local_path: local_path.into(),
        }
    }
}
