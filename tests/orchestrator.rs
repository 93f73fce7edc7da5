use anyhow::{Result, anyhow};
use async_trait::async_trait;
use html_clip_shot::session::{Capturer, DocumentLoader, ElementQuery, RenderSession, ViewportControl};
use html_clip_shot::{ElementRect, Orchestrator, Rect, SettleConfig, ShotConfig, ShotError, Stage, Viewport};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the fake page looks like at each measurement, in call order.
/// The last entry repeats once the script runs out.
#[derive(Clone)]
enum Page {
    NoContainer,
    Rects(Vec<ElementRect>),
}

#[derive(Default)]
struct Calls {
    loaded: Vec<String>,
    viewports: Vec<Viewport>,
    measurements: usize,
    captured: Vec<(Rect, PathBuf)>,
    closed: usize,
}

struct FakeSession {
    pages: Vec<Page>,
    selector_appears: bool,
    fail_load: bool,
    fail_capture: bool,
    calls: Arc<Mutex<Calls>>,
}

impl FakeSession {
    fn new(pages: Vec<Page>) -> (Self, Arc<Mutex<Calls>>) {
        let calls = Arc::new(Mutex::new(Calls::default()));
        let session = Self {
            pages,
            selector_appears: true,
            fail_load: false,
            fail_capture: false,
            calls: calls.clone(),
        };
        (session, calls)
    }

    fn with_static(rects: Vec<ElementRect>) -> (Self, Arc<Mutex<Calls>>) {
        Self::new(vec![Page::Rects(rects)])
    }
}

#[async_trait]
impl DocumentLoader for FakeSession {
    async fn load(&self, url: &str) -> Result<()> {
        if self.fail_load {
            return Err(anyhow!("net::ERR_FILE_NOT_FOUND"));
        }
        self.calls.lock().unwrap().loaded.push(url.to_string());
        Ok(())
    }

    async fn wait_fonts_ready(&self) -> Result<()> {
        Ok(())
    }

    async fn wait_for_selector(&self, _selector: &str, timeout: Duration) -> Result<bool> {
        if self.selector_appears {
            Ok(true)
        } else {
            tokio::time::sleep(timeout).await;
            Ok(false)
        }
    }
}

#[async_trait]
impl ElementQuery for FakeSession {
    async fn descendant_rects(&self, _selector: &str) -> Result<Option<Vec<ElementRect>>> {
        let mut calls = self.calls.lock().unwrap();
        let index = calls.measurements.min(self.pages.len() - 1);
        calls.measurements += 1;
        Ok(match &self.pages[index] {
            Page::NoContainer => None,
            Page::Rects(rects) => Some(rects.clone()),
        })
    }
}

#[async_trait]
impl ViewportControl for FakeSession {
    async fn set_viewport(&self, viewport: &Viewport) -> Result<()> {
        self.calls.lock().unwrap().viewports.push(*viewport);
        Ok(())
    }
}

#[async_trait]
impl Capturer for FakeSession {
    async fn capture_clip(&self, clip: &Rect, output: &Path) -> Result<()> {
        if self.fail_capture {
            return Err(anyhow!("disk full"));
        }
        self.calls
            .lock()
            .unwrap()
            .captured
            .push((*clip, output.to_path_buf()));
        Ok(())
    }
}

#[async_trait]
impl RenderSession for FakeSession {
    async fn close(&self) -> Result<()> {
        self.calls.lock().unwrap().closed += 1;
        Ok(())
    }
}

fn el(left: f64, top: f64, right: f64, bottom: f64) -> ElementRect {
    ElementRect::new(left, top, right, bottom)
}

const URL: &str = "file:///tmp/card.html";

#[tokio::test(start_paused = true)]
async fn visits_every_stage_in_order() {
    let (session, calls) = FakeSession::with_static(vec![el(100.0, 50.0, 300.0, 150.0)]);
    let mut orchestrator = Orchestrator::new(ShotConfig::default());

    let report = orchestrator.run(session, URL, Path::new("out.png")).await.unwrap();

    assert_eq!(orchestrator.trail(), &Stage::ALL);
    assert!(report.container_found);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.loaded, vec![URL.to_string()]);
    assert_eq!(calls.closed, 1);
    assert_eq!(calls.captured.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn single_element_uses_both_paddings() {
    let (session, calls) = FakeSession::with_static(vec![el(100.0, 50.0, 300.0, 150.0)]);

    let report = Orchestrator::new(ShotConfig::default())
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap();

    assert_eq!(report.initial, Rect::new(85.0, 35.0, 230.0, 130.0));
    assert_eq!((report.viewport.width, report.viewport.height), (1000, 800));
    assert_eq!(report.clip, Rect::new(80.0, 30.0, 240.0, 140.0));
    assert_eq!(calls.lock().unwrap().captured[0].0, report.clip);
}

#[tokio::test(start_paused = true)]
async fn absent_container_uses_default_region_throughout() {
    let (session, calls) = FakeSession::new(vec![Page::NoContainer]);

    let report = Orchestrator::new(ShotConfig::default())
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap();

    assert_eq!(report.initial, Rect::new(0.0, 0.0, 800.0, 600.0));
    assert_eq!(report.clip, Rect::new(0.0, 0.0, 800.0, 600.0));
    assert_eq!(calls.lock().unwrap().viewports, vec![Viewport::new(1000, 800)]);
}

#[tokio::test(start_paused = true)]
async fn selector_timeout_is_recovered() {
    let (mut session, calls) = FakeSession::new(vec![Page::NoContainer]);
    session.selector_appears = false;
    let start = tokio::time::Instant::now();

    let mut orchestrator = Orchestrator::new(ShotConfig::default());
    let report = orchestrator
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap();

    assert!(!report.container_found);
    assert_eq!(report.clip, Rect::DEFAULT);
    assert_eq!(orchestrator.trail().last(), Some(&Stage::Close));
    assert!(start.elapsed() >= Duration::from_millis(5_000));
    assert_eq!(calls.lock().unwrap().captured.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn capture_failure_is_fatal_and_still_closes() {
    let (mut session, calls) = FakeSession::with_static(vec![el(0.0, 0.0, 10.0, 10.0)]);
    session.fail_capture = true;

    let mut orchestrator = Orchestrator::new(ShotConfig::default());
    let err = orchestrator
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, ShotError::CaptureFailure(_)));
    assert!(err.to_string().contains("disk full"));
    assert_eq!(calls.lock().unwrap().closed, 1);
    assert_eq!(
        &orchestrator.trail()[orchestrator.trail().len() - 2..],
        &[Stage::CaptureClip, Stage::Close]
    );
}

#[tokio::test(start_paused = true)]
async fn load_failure_stops_before_measuring() {
    let (mut session, calls) = FakeSession::with_static(vec![el(0.0, 0.0, 10.0, 10.0)]);
    session.fail_load = true;

    let mut orchestrator = Orchestrator::new(ShotConfig::default());
    let err = orchestrator
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap_err();

    assert!(matches!(err, ShotError::Load(_)));
    assert_eq!(orchestrator.trail(), &[Stage::LoadDocument, Stage::Close]);
    let calls = calls.lock().unwrap();
    assert_eq!(calls.measurements, 0);
    assert_eq!(calls.closed, 1);
}

#[tokio::test(start_paused = true)]
async fn final_pass_tracks_layout_shift_after_resize() {
    // Content reflows wider once the viewport grows, then settles.
    let (session, calls) = FakeSession::new(vec![
        Page::Rects(vec![el(10.0, 10.0, 1400.0, 900.0)]),
        Page::Rects(vec![el(10.0, 10.0, 1600.0, 950.0)]),
        Page::Rects(vec![el(10.0, 10.0, 1700.0, 960.0)]),
    ]);

    let report = Orchestrator::new(ShotConfig::default())
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap();

    assert_eq!((report.viewport.width, report.viewport.height), (1420, 920));
    assert_eq!(report.clip, Rect::new(0.0, 0.0, 1730.0, 990.0));
    // Initial pass, two moving final passes, one confirming pass.
    assert_eq!(calls.lock().unwrap().measurements, 4);
}

#[tokio::test(start_paused = true)]
async fn empty_final_measurement_falls_back_to_initial_box() {
    let (session, _calls) = FakeSession::new(vec![
        Page::Rects(vec![el(100.0, 50.0, 300.0, 150.0)]),
        Page::Rects(vec![el(100.0, 50.0, 100.0, 150.0)]),
    ]);

    let report = Orchestrator::new(ShotConfig::default())
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap();

    assert_eq!(report.clip, Rect::new(85.0, 35.0, 230.0, 130.0));
}

#[tokio::test(start_paused = true)]
async fn empty_container_sizes_from_default_region() {
    let (session, calls) = FakeSession::new(vec![Page::Rects(vec![el(5.0, 5.0, 5.0, 5.0)])]);

    let report = Orchestrator::new(ShotConfig::default())
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap();

    assert_eq!(report.initial, Rect::DEFAULT);
    assert_eq!(report.clip, Rect::DEFAULT);
    assert_eq!(calls.lock().unwrap().closed, 1);
}

#[tokio::test(start_paused = true)]
async fn static_content_gives_identical_clips() {
    let rects = vec![el(40.0, 60.0, 700.0, 1300.0), el(50.0, 1290.0, 300.0, 1400.0)];

    let mut clips = Vec::new();
    for _ in 0..2 {
        let (session, _calls) = FakeSession::with_static(rects.clone());
        let report = Orchestrator::new(ShotConfig::default())
            .run(session, URL, Path::new("out.png"))
            .await
            .unwrap();
        clips.push(report.clip);
    }

    assert_eq!(clips[0], clips[1]);
    assert_eq!(clips[0], Rect::new(20.0, 40.0, 700.0, 1380.0));
}

#[tokio::test(start_paused = true)]
async fn single_attempt_settle_takes_800ms_after_resize() {
    let (session, calls) = FakeSession::with_static(vec![el(0.0, 0.0, 10.0, 10.0)]);
    let config = ShotConfig::default().with_settle(SettleConfig {
        max_attempts: 1,
        ..SettleConfig::default()
    });
    let start = tokio::time::Instant::now();

    Orchestrator::new(config)
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap();

    assert_eq!(start.elapsed(), Duration::from_millis(800));
    assert_eq!(calls.lock().unwrap().measurements, 2);
}

#[tokio::test(start_paused = true)]
async fn clip_may_exceed_the_viewport() {
    let (session, _calls) = FakeSession::with_static(vec![el(0.0, 0.0, 300.0, 200.0)]);
    let config = ShotConfig::default().with_viewport_floor(100, 100);

    let report = Orchestrator::new(config)
        .run(session, URL, Path::new("out.png"))
        .await
        .unwrap();

    assert_eq!((report.viewport.width, report.viewport.height), (330, 230));
    assert_eq!(report.clip, Rect::new(0.0, 0.0, 340.0, 240.0));
    assert!(report.clip.width > report.viewport.width as f64);
}
