use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for one capture run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShotConfig {
    /// CSS selector of the element whose descendants define the clip.
    pub container_selector: String,
    /// How long to wait for the container to appear before degrading to the whole page.
    pub selector_timeout_ms: u64,
    /// Upper bound on navigation until the network goes idle.
    pub load_timeout_ms: u64,
    pub padding: PaddingConfig,
    pub viewport_floor: ViewportFloor,
    /// Device scale factor applied together with the computed viewport.
    pub device_scale_factor: f64,
    pub settle: SettleConfig,
    /// Encoder quality for JPEG and WebP output. Ignored for PNG.
    pub quality: u8,
    pub browser: BrowserOptions,
}

/// Padding added around the measured content.
///
/// The two passes are tuned independently and default to different values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaddingConfig {
    /// Padding of the first measurement, which sizes the viewport.
    pub initial: f64,
    /// Padding of the measurement taken after the viewport resize, which becomes the clip.
    pub final_pass: f64,
}

/// Minimum viewport size. Each axis is clamped independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewportFloor {
    pub width: u32,
    pub height: u32,
}

/// Settle windows inserted after the viewport resize.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Wait right after the resize.
    pub first_window_ms: u64,
    /// Wait before each final-pass measurement.
    pub second_window_ms: u64,
    /// Maximum number of final-pass measurements while waiting for two to agree.
    pub max_attempts: u32,
    /// Two measurements agree when every component differs by at most this many pixels.
    pub tolerance_px: f64,
}

/// How to find and start the browser.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    /// Explicit browser executable. Falls back to `$CHROME`, then to a `PATH` lookup.
    pub executable: Option<PathBuf>,
    /// Run with a visible window when `false`.
    pub headless: bool,
}

impl Default for ShotConfig {
    fn default() -> Self {
        Self {
            container_selector: ".container".to_string(),
            selector_timeout_ms: 5_000,
            load_timeout_ms: 30_000,
            padding: PaddingConfig::default(),
            viewport_floor: ViewportFloor::default(),
            device_scale_factor: 1.0,
            settle: SettleConfig::default(),
            quality: 100,
            browser: BrowserOptions::default(),
        }
    }
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            executable: None,
            headless: true,
        }
    }
}

impl Default for PaddingConfig {
    fn default() -> Self {
        Self {
            initial: 15.0,
            final_pass: 20.0,
        }
    }
}

impl Default for ViewportFloor {
    fn default() -> Self {
        Self {
            width: 1000,
            height: 800,
        }
    }
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            first_window_ms: 500,
            second_window_ms: 300,
            max_attempts: 4,
            tolerance_px: 0.5,
        }
    }
}

impl SettleConfig {
    pub fn first_window(&self) -> Duration {
        Duration::from_millis(self.first_window_ms)
    }

    pub fn second_window(&self) -> Duration {
        Duration::from_millis(self.second_window_ms)
    }
}

impl ShotConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a TOML file. Keys that are absent keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: ShotConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(config)
    }

    pub fn with_container_selector(mut self, selector: impl Into<String>) -> Self {
        self.container_selector = selector.into();
        self
    }

    pub fn with_selector_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.selector_timeout_ms = timeout_ms;
        self
    }

    pub fn with_padding(mut self, padding: PaddingConfig) -> Self {
        self.padding = padding;
        self
    }

    pub fn with_viewport_floor(mut self, width: u32, height: u32) -> Self {
        self.viewport_floor = ViewportFloor { width, height };
        self
    }

    pub fn with_device_scale_factor(mut self, factor: f64) -> Self {
        self.device_scale_factor = factor;
        self
    }

    pub fn with_settle(mut self, settle: SettleConfig) -> Self {
        self.settle = settle;
        self
    }

    pub fn with_quality(mut self, quality: u8) -> Self {
        self.quality = quality.min(100);
        self
    }

    pub fn with_executable(mut self, path: impl Into<PathBuf>) -> Self {
        self.browser.executable = Some(path.into());
        self
    }

    pub fn with_headless(mut self, headless: bool) -> Self {
        self.browser.headless = headless;
        self
    }

    pub fn selector_timeout(&self) -> Duration {
        Duration::from_millis(self.selector_timeout_ms)
    }

    pub fn load_timeout(&self) -> Duration {
        Duration::from_millis(self.load_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_keep_both_paddings() {
        let config = ShotConfig::default();
        assert_eq!(config.padding.initial, 15.0);
        assert_eq!(config.padding.final_pass, 20.0);
        assert_eq!(config.viewport_floor, ViewportFloor { width: 1000, height: 800 });
        assert_eq!(config.settle.first_window_ms, 500);
        assert_eq!(config.settle.second_window_ms, 300);
        assert_eq!(config.selector_timeout_ms, 5_000);
        assert!(config.browser.headless);
    }

    #[test]
    fn partial_toml_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r##"
container_selector = "#card"

[padding]
final_pass = 32.0

[settle]
max_attempts = 1
"##
        )
        .unwrap();

        let config = ShotConfig::load(file.path()).unwrap();
        assert_eq!(config.container_selector, "#card");
        assert_eq!(config.padding.initial, 15.0);
        assert_eq!(config.padding.final_pass, 32.0);
        assert_eq!(config.settle.max_attempts, 1);
        assert_eq!(config.settle.second_window_ms, 300);
        assert!(config.browser.headless);
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ShotConfig::load(&dir.path().join("nope.toml")).unwrap_err();
        assert!(err.to_string().contains("Failed to read config file"));
    }

    #[test]
    fn quality_is_capped() {
        assert_eq!(ShotConfig::new().with_quality(250).quality, 100);
    }
}
