use std::process::Command;

use anyhow::Context;
use tracing::debug;

use super::{Detector, DetectorInput, parse_detections};
use crate::models::RawDetection;

/// Runs an external model process once per image.
///
/// The image path is appended as the last argument; the process must print
/// a JSON array of detections on stdout and exit successfully.
#[derive(Debug, Clone)]
pub struct CommandDetector {
    program: String,
    args: Vec<String>,
}

impl CommandDetector {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }
}

impl Detector for CommandDetector {
    fn detect(&self, input: &DetectorInput<'_>) -> anyhow::Result<Vec<RawDetection>> {
        debug!(program = %self.program, path = %input.path.display(), "running detector command");

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(input.path)
            .output()
            .with_context(|| format!("Failed to launch detector `{}`", self.program))?;

        if !output.status.success() {
            anyhow::bail!(
                "detector `{}` exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let value: serde_json::Value = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("detector `{}` printed invalid JSON", self.program))?;
        parse_detections(value)
    }

    fn name(&self) -> &str {
        &self.program
    }
}
