//! Collaborators the capture pipeline drives.
//!
//! The pipeline never talks to the browser directly. It only sees these traits, which the
//! CDP-backed [`BrowserSession`](crate::BrowserSession) implements and tests fake.

use crate::types::{ElementRect, Rect, Viewport};
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// Loads a document and waits for it to become ready.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Navigates to `url` and waits until the network is idle.
    async fn load(&self, url: &str) -> Result<()>;

    /// Waits for `document.fonts.ready`.
    async fn wait_fonts_ready(&self) -> Result<()>;

    /// Waits until `selector` matches an element.
    ///
    /// Returns `Ok(false)` when `timeout` elapses first.
    async fn wait_for_selector(&self, selector: &str, timeout: Duration) -> Result<bool>;
}

/// Reads rendered geometry out of the loaded document.
#[async_trait]
pub trait ElementQuery: Send + Sync {
    /// Rendered rectangles of every descendant of the first element matching `selector`,
    /// in document order, or `None` when nothing matches.
    async fn descendant_rects(&self, selector: &str) -> Result<Option<Vec<ElementRect>>>;
}

/// Resizes the rendering surface.
#[async_trait]
pub trait ViewportControl: Send + Sync {
    async fn set_viewport(&self, viewport: &Viewport) -> Result<()>;
}

/// Captures a region of the page into an image file.
#[async_trait]
pub trait Capturer: Send + Sync {
    async fn capture_clip(&self, clip: &Rect, output: &Path) -> Result<()>;
}

/// One rendering session, owned by a single run.
#[async_trait]
pub trait RenderSession: DocumentLoader + ElementQuery + ViewportControl + Capturer {
    /// Releases the session. Called exactly once, on every exit path of a run.
    async fn close(&self) -> Result<()>;
}
