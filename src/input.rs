use crate::error::ShotError;
use std::path::{Path, PathBuf};

/// Output file used when none is given.
pub const DEFAULT_OUTPUT: &str = "screenshot.png";

/// An input document that exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputDocument {
    /// Absolute path of the HTML file.
    pub path: PathBuf,
    /// `file:///` URL the browser navigates to.
    pub url: String,
}

impl InputDocument {
    /// Validates the path given on the command line.
    ///
    /// Runs before any browser is launched: a missing argument and a missing file are
    /// reported as distinct errors.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ShotError> {
        let path = path
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or(ShotError::MissingArgument)?;
        let absolute = std::path::absolute(path)
            .map_err(|_| ShotError::InputFileNotFound(path.to_path_buf()))?;
        if !absolute.is_file() {
            return Err(ShotError::InputFileNotFound(absolute));
        }
        Ok(Self {
            url: file_url(&absolute),
            path: absolute,
        })
    }
}

/// Builds a `file:///` URL from an absolute path, with `\` turned into `/`.
pub fn file_url(absolute: &Path) -> String {
    let normalized = absolute.to_string_lossy().replace('\\', "/");
    format!("file:///{}", normalized.trim_start_matches('/'))
}
