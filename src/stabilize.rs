use crate::config::SettleConfig;
use crate::measure::Bounds;
use log::debug;
use std::future::Future;
use std::time::Duration;
use tokio::time;

/// Waits for layout to settle after the viewport resize.
///
/// There is no page-level signal for "layout is done", so this is time based: one
/// window right after the resize, then repeated shorter windows each followed by a
/// measurement, until two measurements in a row agree or the attempt budget runs out.
#[derive(Debug, Clone, Copy)]
pub struct StabilizationWaiter {
    first_window: Duration,
    second_window: Duration,
    max_attempts: u32,
    tolerance: f64,
}

impl StabilizationWaiter {
    pub fn new(config: &SettleConfig) -> Self {
        Self {
            first_window: config.first_window(),
            second_window: config.second_window(),
            max_attempts: config.max_attempts.max(1),
            tolerance: config.tolerance_px,
        }
    }

    /// First settle window, right after the resize.
    pub async fn settle_after_resize(&self) {
        time::sleep(self.first_window).await;
    }

    /// Measures after each second settle window until two consecutive measurements
    /// agree, and returns the last one.
    pub async fn until_stable<F, Fut>(&self, mut measure: F) -> Bounds
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Bounds>,
    {
        time::sleep(self.second_window).await;
        let mut current = measure().await;

        for attempt in 2..=self.max_attempts {
            time::sleep(self.second_window).await;
            let next = measure().await;
            let settled = next.approx_eq(&current, self.tolerance);
            current = next;
            if settled {
                debug!("Layout settled after {} measurements", attempt);
                return current;
            }
        }

        if self.max_attempts > 1 {
            debug!(
                "Layout still moving after {} measurements, using the last one",
                self.max_attempts
            );
        }
        current
    }
}
