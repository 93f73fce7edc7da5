use crate::config::ShotConfig;
use crate::error::ShotError;
use crate::finalize::ClipFinalizer;
use crate::measure::{BoundingBoxComputer, Bounds};
use crate::session::RenderSession;
use crate::sizing::ViewportSizer;
use crate::stabilize::StabilizationWaiter;
use crate::types::{Rect, Viewport};
use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

/// Stages of a capture run, in the only order they are ever visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    LoadDocument,
    WaitFontsReady,
    WaitContainerSelector,
    MeasureInitial,
    SizeViewport,
    ApplyViewport,
    Settle1,
    Settle2,
    MeasureFinal,
    CaptureClip,
    Close,
}

impl Stage {
    pub const ALL: [Stage; 11] = [
        Stage::LoadDocument,
        Stage::WaitFontsReady,
        Stage::WaitContainerSelector,
        Stage::MeasureInitial,
        Stage::SizeViewport,
        Stage::ApplyViewport,
        Stage::Settle1,
        Stage::Settle2,
        Stage::MeasureFinal,
        Stage::CaptureClip,
        Stage::Close,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::LoadDocument => "LOAD_DOCUMENT",
            Stage::WaitFontsReady => "WAIT_FONTS_READY",
            Stage::WaitContainerSelector => "WAIT_CONTAINER_SELECTOR",
            Stage::MeasureInitial => "MEASURE_INITIAL",
            Stage::SizeViewport => "SIZE_VIEWPORT",
            Stage::ApplyViewport => "APPLY_VIEWPORT",
            Stage::Settle1 => "SETTLE_1",
            Stage::Settle2 => "SETTLE_2",
            Stage::MeasureFinal => "MEASURE_FINAL",
            Stage::CaptureClip => "CAPTURE_CLIP",
            Stage::Close => "CLOSE",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a successful run measured and produced.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Whether the container showed up before the selector timeout.
    pub container_found: bool,
    /// First-pass rectangle that sized the viewport.
    pub initial: Rect,
    pub viewport: Viewport,
    /// Region handed to the capturer.
    pub clip: Rect,
    pub output: PathBuf,
}

/// Drives one rendering session through the measure, resize, settle, measure, capture
/// sequence.
///
/// The session is closed on every exit path, including failures of any stage.
#[derive(Debug)]
pub struct Orchestrator {
    config: ShotConfig,
    trail: Vec<Stage>,
}

impl Orchestrator {
    pub fn new(config: ShotConfig) -> Self {
        Self {
            config,
            trail: Vec::with_capacity(Stage::ALL.len()),
        }
    }

    pub fn config(&self) -> &ShotConfig {
        &self.config
    }

    /// Stages entered by the most recent run.
    pub fn trail(&self) -> &[Stage] {
        &self.trail
    }

    /// Runs the whole sequence against `session`, then closes it.
    pub async fn run<S>(&mut self, session: S, url: &str, output: &Path) -> Result<RunReport, ShotError>
    where
        S: RenderSession,
    {
        self.trail.clear();
        let result = self.drive(&session, url, output).await;

        self.enter(Stage::Close);
        if let Err(e) = session.close().await {
            warn!("Failed to close rendering session: {:#}", e);
        }
        if let Err(e) = &result {
            warn!("Capture aborted after {}: {}", self.last_stage(), e);
        }
        result
    }

    async fn drive<S>(&mut self, session: &S, url: &str, output: &Path) -> Result<RunReport, ShotError>
    where
        S: RenderSession,
    {
        let selector = self.config.container_selector.clone();
        let padding = self.config.padding;

        self.enter(Stage::LoadDocument);
        info!("Loading {}", url);
        session.load(url).await.map_err(ShotError::Load)?;

        self.enter(Stage::WaitFontsReady);
        session.wait_fonts_ready().await.map_err(ShotError::Load)?;

        self.enter(Stage::WaitContainerSelector);
        let container_found = self.wait_for_container(session, &selector).await;

        self.enter(Stage::MeasureInitial);
        let initial = match BoundingBoxComputer::new(padding.initial)
            .measure(session, &selector)
            .await
        {
            Bounds::Measured(rect) => rect,
            Bounds::ContainerMissing => {
                debug!("Container `{}` absent, using the default region", selector);
                Rect::DEFAULT
            }
            Bounds::Degenerate => {
                warn!(
                    "{}, using the default region",
                    ShotError::DegenerateMeasurement(selector.clone())
                );
                Rect::DEFAULT
            }
        };

        self.enter(Stage::SizeViewport);
        let viewport = ViewportSizer::new(self.config.viewport_floor)
            .with_device_scale_factor(self.config.device_scale_factor)
            .size(&initial);
        info!("Viewport sized to {}x{}", viewport.width, viewport.height);

        self.enter(Stage::ApplyViewport);
        session
            .set_viewport(&viewport)
            .await
            .map_err(ShotError::Session)?;

        let waiter = StabilizationWaiter::new(&self.config.settle);
        let finalizer = ClipFinalizer::new(padding.final_pass);

        self.enter(Stage::Settle1);
        waiter.settle_after_resize().await;

        self.enter(Stage::Settle2);
        let (finalizer_ref, selector_ref) = (&finalizer, selector.as_str());
        let settled = waiter
            .until_stable(move || finalizer_ref.measure(session, selector_ref))
            .await;

        self.enter(Stage::MeasureFinal);
        let clip = finalizer.finalize(settled, initial);
        info!(
            "Clip region: x={}, y={}, width={}, height={}",
            clip.x, clip.y, clip.width, clip.height
        );

        self.enter(Stage::CaptureClip);
        session
            .capture_clip(&clip, output)
            .await
            .map_err(ShotError::CaptureFailure)?;
        info!("Screenshot saved to {}", output.display());

        Ok(RunReport {
            container_found,
            initial,
            viewport,
            clip,
            output: output.to_path_buf(),
        })
    }

    /// Bounded wait for the container. Never fails the run.
    async fn wait_for_container<S>(&self, session: &S, selector: &str) -> bool
    where
        S: RenderSession,
    {
        let timeout = self.config.selector_timeout();
        match session.wait_for_selector(selector, timeout).await {
            Ok(true) => true,
            Ok(false) => {
                let err = ShotError::ContainerSelectorTimeout {
                    selector: selector.to_string(),
                    timeout_ms: self.config.selector_timeout_ms,
                };
                warn!("{}; capturing the whole page instead", err);
                false
            }
            Err(e) => {
                warn!(
                    "Waiting for `{}` failed: {:#}; capturing the whole page instead",
                    selector, e
                );
                false
            }
        }
    }

    fn enter(&mut self, stage: Stage) {
        debug!("-> {}", stage);
        self.trail.push(stage);
    }

    fn last_stage(&self) -> Stage {
        // `Close` is always last; report the stage that failed before it.
        self.trail
            .iter()
            .rev()
            .copied()
            .find(|s| *s != Stage::Close)
            .unwrap_or(Stage::LoadDocument)
    }
}
