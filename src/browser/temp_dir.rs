use anyhow::{Context, Result};
use rand::{Rng, thread_rng};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Browser profile directory, deleted on drop.
#[derive(Debug)]
pub(crate) struct CustomTempDir {
    path: PathBuf,
}

impl CustomTempDir {
    /// Creates `<base>/<prefix>_<timestamp>_<random>`.
    pub(crate) fn new(base: PathBuf, prefix: &str) -> Result<Self> {
        std::fs::create_dir_all(&base)
            .with_context(|| format!("Failed to create {}", base.display()))?;
        let name = format!(
            "{}_{}_{}",
            prefix,
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            thread_rng()
                .sample_iter(&rand::distributions::Alphanumeric)
                .take(6)
                .map(char::from)
                .collect::<String>()
        );
        let path = base.join(name);
        std::fs::create_dir(&path)
            .with_context(|| format!("Failed to create {}", path.display()))?;
        Ok(Self { path })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CustomTempDir {
    /// The browser may still hold files for a moment after exit, so retry briefly.
    fn drop(&mut self) {
        for _ in 0..3 {
            if std::fs::remove_dir_all(&self.path).is_ok() {
                return;
            }
            std::thread::sleep(Duration::from_millis(50));
        }
        let _ = std::fs::remove_dir_all(&self.path);
    }
}
