/*!
Capture an HTML file as a screenshot cropped to the rendered extent of a content container.

The document is loaded in a headless Chrome/Edge over the Chrome DevTools Protocol (CDP).
The rendered rectangles of every element inside the container (`.container` by default)
are unioned into a bounding box, the viewport is resized so that box fits, layout is
given time to settle, the box is measured again and that region is captured.

```no_run
use html_clip_shot::{ShotConfig, capture_file};
use std::path::Path;

#[tokio::main]
async fn main() -> Result<(), html_clip_shot::ShotError> {
    let report = capture_file(
        Some(Path::new("report.html")),
        Path::new("report.png"),
        ShotConfig::default(),
    )
    .await?;
    println!("captured {:?}", report.clip);
    Ok(())
}
```

The measurement protocol only talks to the traits in [`session`], so it can be driven
against any rendering backend.
*/

mod browser;
mod config;
mod error;
mod finalize;
mod input;
mod measure;
mod pipeline;
pub mod session;
mod sizing;
mod stabilize;
mod tab;
mod transport;
mod types;
mod utils;

pub use browser::{Browser, BrowserSession};
pub use config::{BrowserOptions, PaddingConfig, SettleConfig, ShotConfig, ViewportFloor};
pub use error::ShotError;
pub use finalize::ClipFinalizer;
pub use input::{DEFAULT_OUTPUT, InputDocument, file_url};
pub use measure::{BoundingBoxComputer, Bounds};
pub use pipeline::{Orchestrator, RunReport, Stage};
pub use sizing::ViewportSizer;
pub use stabilize::StabilizationWaiter;
pub use tab::Tab;
pub use types::{ElementRect, ImageFormat, Rect, Viewport};

use std::path::Path;

/// Captures the HTML file at `html` into `output` with a freshly launched browser.
///
/// The input is validated before the browser starts. The browser is shut down before
/// this returns, whether the capture succeeded or not.
pub async fn capture_file(
    html: Option<&Path>,
    output: &Path,
    config: ShotConfig,
) -> Result<RunReport, ShotError> {
    let document = InputDocument::resolve(html)?;
    let session = BrowserSession::open(&config)
        .await
        .map_err(ShotError::Session)?;
    Orchestrator::new(config)
        .run(session, &document.url, output)
        .await
}
