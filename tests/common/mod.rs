mod fixtures;
pub use fixtures::*;

// Re-export commonly used types from detlabel for tests
pub use detlabel::{Annotator, ImageOutcome, ImageRecord, ImageStage, PipelineDriver, SkipReason};
