use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced by a capture run.
///
/// Only `MissingArgument`, `InputFileNotFound`, `Config`, `Load`, `Session` and
/// `CaptureFailure` ever reach the caller. `ContainerSelectorTimeout` and
/// `DegenerateMeasurement` are recovered inside the run and only show up in logs.
#[derive(Debug, Error)]
pub enum ShotError {
    #[error("no HTML file given: pass the path of the document to capture")]
    MissingArgument,

    #[error("HTML file not found: {}", .0.display())]
    InputFileNotFound(PathBuf),

    #[error("container `{selector}` did not appear within {timeout_ms}ms")]
    ContainerSelectorTimeout { selector: String, timeout_ms: u64 },

    #[error("no visible element inside container `{0}`")]
    DegenerateMeasurement(String),

    #[error("invalid configuration: {0:#}")]
    Config(#[source] anyhow::Error),

    #[error("failed to load document: {0:#}")]
    Load(#[source] anyhow::Error),

    #[error("rendering session failed: {0:#}")]
    Session(#[source] anyhow::Error),

    #[error("failed to capture screenshot: {0:#}")]
    CaptureFailure(#[source] anyhow::Error),
}
