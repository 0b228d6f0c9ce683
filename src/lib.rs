pub mod annotate;
pub mod config;
pub mod dataset;
pub mod detection;
pub mod models;
pub mod pipeline;
pub mod recorder;

pub use annotate::{AnnotationStyle, Annotator};
pub use config::PipelineConfig;
pub use dataset::{DatasetEntry, Retriever};
pub use detection::{CommandDetector, Detector, DetectorInput, PrecomputedDetector};
pub use models::{AnnotatedDetection, DetectionRow, ImageRecord, RawDetection, Rectangle};
pub use pipeline::{ImageOutcome, ImageStage, PipelineDriver, RunReport, SkipReason};
pub use recorder::DetectionRecorder;

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise `default_filter` is used.
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
