pub mod command;
pub mod normalize;
pub mod precomputed;

use std::path::Path;

use image::RgbImage;

use crate::models::RawDetection;

pub use command::CommandDetector;
pub use normalize::{BoxEncoding, MalformedDetection, normalize, normalize_detection};
pub use precomputed::PrecomputedDetector;

/// What a detector gets to look at for one image
pub struct DetectorInput<'a> {
    pub file_name: &'a str,
    pub path: &'a Path,
    pub image: &'a RgbImage,
}

/// An object detector treated as a black box.
///
/// Implementations return detections in a stable order for a given image.
/// The model, device and batching are entirely up to the implementation.
pub trait Detector {
    fn detect(&self, input: &DetectorInput<'_>) -> anyhow::Result<Vec<RawDetection>>;

    /// Human-readable name (used in log output)
    fn name(&self) -> &str;
}

/// Decode a detector's JSON array output
pub fn parse_detections(value: serde_json::Value) -> anyhow::Result<Vec<RawDetection>> {
    let serde_json::Value::Array(items) = value else {
        anyhow::bail!("detector output is not a JSON array");
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| {
            RawDetection::from_value(item)
                .ok_or_else(|| anyhow::anyhow!("detection {} is not a JSON object", idx))
        })
        .collect()
}
