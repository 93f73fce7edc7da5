use anyhow::{Context, Result};
use async_trait::async_trait;
use log::warn;
use std::path::Path;
use std::time::Duration;

use crate::browser::Browser;
use crate::config::ShotConfig;
use crate::session::{Capturer, DocumentLoader, ElementQuery, RenderSession, ViewportControl};
use crate::tab::Tab;
use crate::types::{ElementRect, ImageFormat, Rect, Viewport};

/// A browser process plus the single tab a capture run works in.
pub struct BrowserSession {
    browser: Browser,
    tab: Tab,
    load_timeout: Duration,
    quality: u8,
}

impl BrowserSession {
    /// Launches a browser and opens a blank tab in it.
    pub async fn open(config: &ShotConfig) -> Result<Self> {
        let browser = Browser::launch(&config.browser).await?;
        // On failure `browser` is dropped here, which kills the process.
        let tab = browser.new_tab().await.context("Failed to open a tab")?;
        Ok(Self {
            browser,
            tab,
            load_timeout: config.load_timeout(),
            quality: config.quality,
        })
    }

    pub fn tab(&self) -> &Tab {
        &self.tab
    }
}

#[async_trait]
impl DocumentLoader for BrowserSession {
    async fn load(&self, url: &str) -> Result<()> {
        self.tab.goto(url, self.load_timeout).await?;
        Ok(())
    }

    async fn wait_fonts_ready(&self) -> Result<()> {
        self.tab.wait_fonts_ready().await?;
        Ok(())
    }

    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool> {
        self.tab.wait_for_selector(selector, timeout).await
    }
}

#[async_trait]
impl ElementQuery for BrowserSession {
    async fn descendant_rects(&self, selector: &str) -> Result<Option<Vec<ElementRect>>> {
        self.tab.descendant_rects(selector).await
    }
}

#[async_trait]
impl ViewportControl for BrowserSession {
    async fn set_viewport(&self, viewport: &Viewport) -> Result<()> {
        self.tab.set_viewport(viewport).await?;
        Ok(())
    }
}

#[async_trait]
impl Capturer for BrowserSession {
    async fn capture_clip(&self, clip: &Rect, output: &Path) -> Result<()> {
        let format = ImageFormat::from_path(output);
        let bytes = self
            .tab
            .capture_clip(clip, format, Some(self.quality))
            .await?;
        tokio::fs::write(output, bytes)
            .await
            .with_context(|| format!("Failed to write {}", output.display()))
    }
}

#[async_trait]
impl RenderSession for BrowserSession {
    async fn close(&self) -> Result<()> {
        if let Err(e) = self.tab.close().await {
            warn!("Failed to close tab: {:#}", e);
        }
        self.browser.close_async().await
    }
}
