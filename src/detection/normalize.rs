use serde_json::{Map, Value};
use thiserror::Error;

use crate::models::{AnnotatedDetection, RawDetection, Rectangle};

/// Key the box is normally reported under
pub const BOX_KEY: &str = "box";

/// Older detectors report the box under this key instead
pub const LEGACY_BOX_KEY: &str = "bbox";

const CORNER_KEYS: [&str; 4] = ["xmin", "ymin", "xmax", "ymax"];

/// Why a raw detection could not be turned into a rectangle
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedDetection {
    #[error("no `box` or `bbox` field")]
    MissingBox,

    #[error("coordinate {field} is not numeric: {value}")]
    NonNumericCoordinate { field: String, value: Value },

    #[error("expected 4 coordinates, found {found}")]
    WrongElementCount { found: usize },

    #[error("box is neither a mapping nor a sequence: {0}")]
    UnsupportedBoxValue(Value),

    #[error("score is not numeric: {0}")]
    NonNumericScore(Value),
}

/// Shape of the box value, resolved once per detection
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BoxEncoding<'a> {
    Keyed(&'a Map<String, Value>),
    Sequence(&'a [Value]),
    Unsupported(&'a Value),
    Absent,
}

impl<'a> BoxEncoding<'a> {
    /// Look for the box under the primary key, then the legacy key
    pub fn of(raw: &'a RawDetection) -> Self {
        match raw.get(BOX_KEY).or_else(|| raw.get(LEGACY_BOX_KEY)) {
            Some(Value::Object(map)) => BoxEncoding::Keyed(map),
            Some(Value::Array(items)) => BoxEncoding::Sequence(items),
            Some(other) => BoxEncoding::Unsupported(other),
            None => BoxEncoding::Absent,
        }
    }

    pub fn to_rectangle(self) -> Result<Rectangle, MalformedDetection> {
        match self {
            BoxEncoding::Keyed(map) => keyed_rectangle(map),
            BoxEncoding::Sequence(items) => sequence_rectangle(items),
            BoxEncoding::Unsupported(value) => {
                Err(MalformedDetection::UnsupportedBoxValue(value.clone()))
            }
            BoxEncoding::Absent => Err(MalformedDetection::MissingBox),
        }
    }
}

/// Missing corner keys count as zero
fn keyed_rectangle(map: &Map<String, Value>) -> Result<Rectangle, MalformedDetection> {
    let mut coords = [0i64; 4];
    for (slot, key) in coords.iter_mut().zip(CORNER_KEYS) {
        if let Some(value) = map.get(key) {
            *slot = coordinate(value).ok_or_else(|| MalformedDetection::NonNumericCoordinate {
                field: key.to_string(),
                value: value.clone(),
            })?;
        }
    }
    Ok(Rectangle::from_array(coords))
}

fn sequence_rectangle(items: &[Value]) -> Result<Rectangle, MalformedDetection> {
    // Every element is converted before the length is checked.
    let coords = items
        .iter()
        .enumerate()
        .map(|(idx, value)| {
            coordinate(value).ok_or_else(|| MalformedDetection::NonNumericCoordinate {
                field: format!("[{}]", idx),
                value: value.clone(),
            })
        })
        .collect::<Result<Vec<i64>, _>>()?;

    let coords: [i64; 4] = coords
        .try_into()
        .map_err(|v: Vec<i64>| MalformedDetection::WrongElementCount { found: v.len() })?;
    Ok(Rectangle::from_array(coords))
}

/// Parse as float, then truncate toward zero
fn coordinate(value: &Value) -> Option<i64> {
    let v = number(value)?;
    if !v.is_finite() || v < i64::MIN as f64 || v >= i64::MAX as f64 {
        return None;
    }
    Some(v.trunc() as i64)
}

fn number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }
}

fn label(raw: &RawDetection) -> Option<String> {
    match raw.get("label")? {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn score(raw: &RawDetection) -> Result<Option<f64>, MalformedDetection> {
    match raw.get("score") {
        None | Some(Value::Null) => Ok(None),
        Some(value) => number(value)
            .map(Some)
            .ok_or_else(|| MalformedDetection::NonNumericScore(value.clone())),
    }
}

/// Resolve only the geometry of a raw detection
pub fn normalize(raw: &RawDetection) -> Result<Rectangle, MalformedDetection> {
    BoxEncoding::of(raw).to_rectangle()
}

/// Resolve geometry, label and score of a raw detection
pub fn normalize_detection(raw: &RawDetection) -> Result<AnnotatedDetection, MalformedDetection> {
    let rect = normalize(raw)?;
    Ok(AnnotatedDetection::new(rect, label(raw), score(raw)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawDetection {
        RawDetection::from_value(value).unwrap()
    }

    #[test]
    fn test_keyed_box() {
        let det = raw(json!({"box": {"xmin": 5, "ymin": 5, "xmax": 50, "ymax": 60}}));
        assert_eq!(normalize(&det), Ok(Rectangle::new(5, 5, 50, 60)));
    }

    #[test]
    fn test_keyed_box_missing_keys_default_to_zero() {
        let det = raw(json!({"box": {"xmax": 10, "ymax": 20}}));
        assert_eq!(normalize(&det), Ok(Rectangle::new(0, 0, 10, 20)));

        let det = raw(json!({"box": {}}));
        assert_eq!(normalize(&det), Ok(Rectangle::new(0, 0, 0, 0)));
    }

    #[test]
    fn test_sequence_box() {
        let det = raw(json!({"box": [1.9, "2.5", -3.7, 4]}));
        assert_eq!(normalize(&det), Ok(Rectangle::new(1, 2, -3, 4)));
    }

    #[test]
    fn test_legacy_key_used_when_primary_absent() {
        let det = raw(json!({"bbox": [1, 2, 3, 4]}));
        assert_eq!(normalize(&det), Ok(Rectangle::new(1, 2, 3, 4)));
    }

    #[test]
    fn test_primary_key_wins() {
        let det = raw(json!({"box": [1, 2, 3, 4], "bbox": [9, 9, 9, 9]}));
        assert_eq!(normalize(&det), Ok(Rectangle::new(1, 2, 3, 4)));
    }

    #[test]
    fn test_missing_box() {
        let det = raw(json!({"label": "cat", "score": 0.5}));
        assert_eq!(normalize(&det), Err(MalformedDetection::MissingBox));
    }

    #[test]
    fn test_wrong_element_count() {
        let det = raw(json!({"box": [1, 2, 3]}));
        assert_eq!(
            normalize(&det),
            Err(MalformedDetection::WrongElementCount { found: 3 })
        );
        let det = raw(json!({"box": [1, 2, 3, 4, 5]}));
        assert_eq!(
            normalize(&det),
            Err(MalformedDetection::WrongElementCount { found: 5 })
        );
    }

    #[test]
    fn test_non_numeric_coordinate() {
        let det = raw(json!({"box": [1, "abc", 3, 4]}));
        assert!(matches!(
            normalize(&det),
            Err(MalformedDetection::NonNumericCoordinate { .. })
        ));

        let det = raw(json!({"box": {"xmin": "abc"}}));
        assert!(matches!(
            normalize(&det),
            Err(MalformedDetection::NonNumericCoordinate { field, .. }) if field == "xmin"
        ));
    }

    #[test]
    fn test_conversion_checked_before_count() {
        let det = raw(json!({"box": ["x", 2, 3]}));
        assert!(matches!(
            normalize(&det),
            Err(MalformedDetection::NonNumericCoordinate { .. })
        ));
    }

    #[test]
    fn test_non_finite_coordinate_rejected() {
        let det = raw(json!({"box": ["nan", 0, 1, 1]}));
        assert!(normalize(&det).is_err());
        let det = raw(json!({"box": {"xmax": "inf"}}));
        assert!(normalize(&det).is_err());
    }

    #[test]
    fn test_scalar_and_null_boxes_rejected() {
        let det = raw(json!({"box": 42}));
        assert!(matches!(
            normalize(&det),
            Err(MalformedDetection::UnsupportedBoxValue(_))
        ));
        let det = raw(json!({"box": null}));
        assert!(matches!(
            normalize(&det),
            Err(MalformedDetection::UnsupportedBoxValue(_))
        ));
    }

    #[test]
    fn test_inverted_box_is_kept_as_is() {
        let det = raw(json!({"box": [50, 60, 5, 5]}));
        assert_eq!(normalize(&det), Ok(Rectangle::new(50, 60, 5, 5)));
    }

    #[test]
    fn test_label_and_score() {
        let det = raw(json!({"label": "cat", "score": 0.91, "box": [5, 5, 50, 60]}));
        let normalized = normalize_detection(&det).unwrap();
        assert_eq!(normalized.label, "cat");
        assert_eq!(normalized.score, 0.91);

        let det = raw(json!({"box": [5, 5, 50, 60]}));
        let normalized = normalize_detection(&det).unwrap();
        assert_eq!(normalized.label, "object");
        assert_eq!(normalized.score, 0.0);
    }

    #[test]
    fn test_non_numeric_score_rejected() {
        let det = raw(json!({"score": "high", "box": [5, 5, 50, 60]}));
        assert!(matches!(
            normalize_detection(&det),
            Err(MalformedDetection::NonNumericScore(_))
        ));
    }
}
